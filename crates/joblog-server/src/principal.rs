//! Extraction of the requesting principal.
//!
//! Authentication happens upstream. An outer layer may insert a
//! [`Principal`] into the request extensions; when none is present and
//! proxy headers are trusted, `X-Remote-User` and `X-Remote-Superuser`
//! are read instead. Otherwise the request is anonymous.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use joblog::Principal;

use crate::state::AppState;

/// Header carrying the authenticated user name.
pub const REMOTE_USER_HEADER: &str = "x-remote-user";

/// Header marking the user as privileged.
pub const REMOTE_SUPERUSER_HEADER: &str = "x-remote-superuser";

/// The principal making the current request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentPrincipal(pub Principal);

impl FromRequestParts<Arc<AppState>> for CurrentPrincipal {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        if let Some(principal) = parts.extensions.get::<Principal>() {
            return Ok(Self(principal.clone()));
        }
        if state.config().trust_proxy_headers {
            if let Some(principal) = from_headers(&parts.headers) {
                return Ok(Self(principal));
            }
        }
        Ok(Self(Principal::anonymous()))
    }
}

fn from_headers(headers: &HeaderMap) -> Option<Principal> {
    let name = headers
        .get(REMOTE_USER_HEADER)?
        .to_str()
        .ok()
        .map(str::trim)
        .filter(|name| !name.is_empty())?;

    let privileged = headers
        .get(REMOTE_SUPERUSER_HEADER)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"));

    Some(if privileged {
        Principal::admin(name)
    } else {
        Principal::user(name)
    })
}
