//! HTTP request handlers for the log API.

use std::convert::Infallible;
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::{Path, Query, State};
use axum::http::header::{self, HeaderMap, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::Json;
use joblog::{
    Disposition, JobId, LogChunk, LogListing, LogReply, LogRequest, OutputMode, Stage,
    StreamReply,
};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tracing::debug;
use url::form_urlencoded;

use crate::error::{ServerError, ServerResult};
use crate::principal::CurrentPrincipal;
use crate::render::SnippetContext;
use crate::state::AppState;

/// Query parameters for the log endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct LogQuery {
    /// Byte offset to start from.
    pub offset: Option<String>,
    /// `raw` to download the file.
    pub format: Option<String>,
}

/// Query parameters for the poll endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct PollQuery {
    /// Byte offset to start from.
    pub offset: Option<String>,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Status message.
    pub status: String,
    /// Server uptime in seconds.
    pub uptime_secs: u64,
}

/// Handle GET /api/health - health check endpoint.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs: state.uptime_secs(),
    })
}

/// Handle GET /api/jobs/{id}/logs - logs of a job visible to the caller.
pub async fn list_logs(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    CurrentPrincipal(principal): CurrentPrincipal,
) -> ServerResult<Json<LogListing>> {
    let job_id = parse_job_id(&id)?;
    let listing = tokio::task::spawn_blocking(move || state.endpoint().list(job_id, &principal))
        .await??;
    Ok(Json(listing))
}

/// Handle GET /api/jobs/{id}/log/{*log_name} - raw download or rendered snippet.
pub async fn get_log(
    State(state): State<Arc<AppState>>,
    Path((id, log_name)): Path<(String, String)>,
    Query(query): Query<LogQuery>,
    CurrentPrincipal(principal): CurrentPrincipal,
) -> ServerResult<Response> {
    let job_id = parse_job_id(&id)?;
    let request = LogRequest::new(job_id, log_name.clone())
        .with_offset(parse_offset(query.offset.as_deref())?)
        .with_mode(OutputMode::from_query(query.format.as_deref()))
        .with_principal(principal);

    let endpoint_state = Arc::clone(&state);
    let reply =
        tokio::task::spawn_blocking(move || endpoint_state.endpoint().fetch(&request)).await??;

    let response = reply_response(&state, job_id, &log_name, reply)?;
    debug!(stage = %Stage::Done, job_id = %job_id, log_name = %log_name, "log response sent");
    Ok(response)
}

/// Handle GET /api/jobs/{id}/log-json/{*log_name} - incremental poll.
pub async fn poll_log(
    State(state): State<Arc<AppState>>,
    Path((id, log_name)): Path<(String, String)>,
    Query(query): Query<PollQuery>,
    CurrentPrincipal(principal): CurrentPrincipal,
) -> ServerResult<Response> {
    let job_id = parse_job_id(&id)?;
    let request = LogRequest::new(job_id, log_name.clone())
        .with_offset(parse_offset(query.offset.as_deref())?)
        .with_mode(OutputMode::Poll)
        .with_principal(principal);

    let endpoint_state = Arc::clone(&state);
    let reply =
        tokio::task::spawn_blocking(move || endpoint_state.endpoint().fetch(&request)).await??;

    let response = reply_response(&state, job_id, &log_name, reply)?;
    debug!(stage = %Stage::Done, job_id = %job_id, log_name = %log_name, "poll response sent");
    Ok(response)
}

fn reply_response(
    state: &AppState,
    job_id: JobId,
    log_name: &str,
    reply: LogReply,
) -> ServerResult<Response> {
    match reply {
        LogReply::Stream(stream) => {
            Ok(stream_response(stream, state.config().stream_buffer_chunks))
        }
        LogReply::Snippet(snippet) => {
            let json_url = state.poll_url(job_id, log_name)?;
            let context = SnippetContext::new(snippet, job_id, log_name, json_url);
            state.renderer().render(&context)
        }
        LogReply::Poll(payload) => Ok(Json(payload).into_response()),
    }
}

fn parse_job_id(id: &str) -> ServerResult<JobId> {
    id.parse()
        .map_err(|_| ServerError::InvalidRequest(format!("invalid job ID: {id}")))
}

/// A missing offset means the start of the log.
fn parse_offset(raw: Option<&str>) -> ServerResult<u64> {
    match raw.map(str::trim) {
        None | Some("") => Ok(0),
        Some(value) => value
            .parse()
            .map_err(|_| ServerError::InvalidRequest(format!("invalid offset: {value}"))),
    }
}

fn stream_response(reply: StreamReply, buffer_chunks: usize) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&reply.content_type)
            .unwrap_or_else(|_| HeaderValue::from_static(joblog::format::OCTET_STREAM)),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(reply.content_length));
    if reply.disposition == Disposition::Attachment {
        headers.insert(header::CONTENT_DISPOSITION, attachment_header(&reply.filename));
    }

    (headers, stream_body(reply.stream, buffer_chunks)).into_response()
}

/// Pumps a blocking log stream into a bounded channel feeding the body.
///
/// When the client goes away the receiver is dropped, the next send fails
/// and the stream, with its file handle, is dropped.
fn stream_body<I>(stream: I, buffer_chunks: usize) -> Body
where
    I: Iterator<Item = LogChunk> + Send + 'static,
{
    let (tx, rx) = mpsc::channel::<Bytes>(buffer_chunks.max(1));

    tokio::task::spawn_blocking(move || {
        for chunk in stream {
            if tx.blocking_send(Bytes::from(chunk)).is_err() {
                debug!("client disconnected, stopping log stream");
                break;
            }
        }
    });

    Body::from_stream(ReceiverStream::new(rx).map(Ok::<_, Infallible>))
}

/// Non-ASCII names get an RFC 5987 `filename*` next to an ASCII fallback.
fn attachment_header(filename: &str) -> HeaderValue {
    let fallback: String = filename
        .chars()
        .map(|c| {
            if c == '"' || c == '\\' || !c.is_ascii() || c.is_ascii_control() {
                '_'
            } else {
                c
            }
        })
        .collect();

    let value = if filename.is_ascii() {
        format!("attachment; filename=\"{fallback}\"")
    } else {
        format!(
            "attachment; filename=\"{fallback}\"; filename*=UTF-8''{}",
            percent_encode(filename)
        )
    };

    HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}

/// RFC 5987 value encoding: only unreserved bytes stay literal.
fn percent_encode(value: &str) -> String {
    form_urlencoded::byte_serialize(value.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
        .replace('*', "%2A")
}
