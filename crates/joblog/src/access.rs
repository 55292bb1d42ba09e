//! Privilege gating of sensitive logs.
//!
//! Traceback dumps can leak environment details, so they are only served to
//! privileged principals. Job-level visibility is decided before a request
//! gets here.

use serde::{Deserialize, Serialize};

use crate::config::LogConfig;
use crate::store::base_name;

/// Denial reason for restricted logs.
pub const RESTRICTED_REASON: &str = "Traceback is available only for superusers.";

/// The identity a request runs as.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Display name, empty for anonymous requests.
    pub name: String,
    /// Whether the principal holds administrative privilege.
    pub privileged: bool,
}

impl Principal {
    /// An unauthenticated principal.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// A regular, non-privileged principal.
    #[must_use]
    pub fn user(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            privileged: false,
        }
    }

    /// A privileged principal.
    #[must_use]
    pub fn admin(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            privileged: true,
        }
    }
}

/// Outcome of an access check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessVerdict {
    /// Whether the log may be returned.
    pub allowed: bool,
    /// Why access was denied.
    pub reason: Option<String>,
}

impl AccessVerdict {
    /// Access granted.
    #[must_use]
    pub const fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    /// Access denied for `reason`.
    #[must_use]
    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
        }
    }
}

/// Decides which logs a principal may read.
#[derive(Debug, Clone)]
pub struct AccessPolicy {
    restricted_prefix: String,
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self::new("traceback")
    }
}

impl AccessPolicy {
    /// Creates a policy restricting logs whose base name starts with `restricted_prefix`.
    #[must_use]
    pub fn new(restricted_prefix: impl Into<String>) -> Self {
        Self {
            restricted_prefix: restricted_prefix.into(),
        }
    }

    /// Creates a policy from the log configuration.
    #[must_use]
    pub fn from_config(config: &LogConfig) -> Self {
        Self::new(&config.restricted_prefix)
    }

    /// Returns true if `log_name` is in the restricted category.
    #[must_use]
    pub fn is_restricted(&self, log_name: &str) -> bool {
        !self.restricted_prefix.is_empty() && base_name(log_name).starts_with(&self.restricted_prefix)
    }

    /// Checks whether `principal` may read `log_name`.
    #[must_use]
    pub fn check(&self, principal: &Principal, log_name: &str) -> AccessVerdict {
        if self.is_restricted(log_name) && !principal.privileged {
            AccessVerdict::deny(RESTRICTED_REASON)
        } else {
            AccessVerdict::allow()
        }
    }

    /// Filters `log_names` down to those `principal` may read, sorted.
    #[must_use]
    pub fn visible_logs<I, S>(&self, principal: &Principal, log_names: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut visible: Vec<String> = log_names
            .into_iter()
            .map(Into::into)
            .filter(|name| self.check(principal, name).allowed)
            .collect();
        visible.sort();
        visible
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("traceback.log", false ; "top level traceback")]
    #[test_case("traceback", false ; "bare prefix")]
    #[test_case("steps/traceback.log", false ; "nested traceback")]
    #[test_case("build.log", true ; "regular log")]
    #[test_case("my_traceback.log", true ; "prefix not at start")]
    #[test_case("traceback/build.log", true ; "prefix only in directory")]
    fn check_regular_user(name: &str, allowed: bool) {
        let policy = AccessPolicy::default();
        let verdict = policy.check(&Principal::user("alice"), name);
        assert_eq!(verdict.allowed, allowed);
        assert_eq!(verdict.reason.is_some(), !allowed);
    }

    #[test]
    fn denial_reason_is_human_readable() {
        let policy = AccessPolicy::default();
        let verdict = policy.check(&Principal::anonymous(), "traceback.log");
        assert_eq!(verdict, AccessVerdict::deny(RESTRICTED_REASON));
    }

    #[test]
    fn privileged_principal_reads_everything() {
        let policy = AccessPolicy::default();
        let admin = Principal::admin("root");
        assert!(policy.check(&admin, "traceback.log").allowed);
        assert!(policy.check(&admin, "build.log").allowed);
    }

    #[test]
    fn custom_prefix() {
        let policy = AccessPolicy::from_config(&LogConfig::default().with_restricted_prefix("core"));
        assert!(policy.is_restricted("core.dump"));
        assert!(!policy.is_restricted("traceback.log"));
    }

    #[test]
    fn empty_prefix_restricts_nothing() {
        let policy = AccessPolicy::new("");
        assert!(!policy.is_restricted("traceback.log"));
    }

    #[test]
    fn visible_logs_hides_tracebacks_and_sorts() {
        let policy = AccessPolicy::default();
        let names = ["stdout.log", "traceback.log", "build.log"];

        let visible = policy.visible_logs(&Principal::user("bob"), names);
        assert_eq!(visible, vec!["build.log", "stdout.log"]);

        let visible = policy.visible_logs(&Principal::admin("root"), names);
        assert_eq!(visible, vec!["build.log", "stdout.log", "traceback.log"]);
    }

    #[test]
    fn anonymous_is_not_privileged() {
        let principal = Principal::anonymous();
        assert!(!principal.privileged);
        assert!(principal.name.is_empty());
    }
}
