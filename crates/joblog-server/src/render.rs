//! Rendering of log snippets.
//!
//! The server builds a [`SnippetContext`] for every displayable log and hands
//! it to a [`SnippetRenderer`]. The default renderer returns the context as
//! JSON; deployments with a page template plug in their own.

use axum::response::{IntoResponse, Json, Response};
use joblog::{JobId, Snippet};
use serde::{Deserialize, Serialize};

use crate::error::ServerResult;

/// Page title for rendered logs.
pub const SNIPPET_TITLE: &str = "Task log";

/// Everything a template needs to show a log page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnippetContext {
    /// Page title.
    pub title: String,
    /// Offset the page should poll from next.
    pub offset: u64,
    /// 1 when the job has finished, else 0.
    pub task_finished: u8,
    /// Decoded log text.
    pub content: String,
    /// Name of the log.
    pub log_name: String,
    /// Job owning the log.
    pub job_id: JobId,
    /// URL of the JSON poll endpoint for this log.
    pub json_url: String,
}

impl SnippetContext {
    /// Build a context from a snippet.
    #[must_use]
    pub fn new(
        snippet: Snippet,
        job_id: JobId,
        log_name: impl Into<String>,
        json_url: String,
    ) -> Self {
        Self {
            title: SNIPPET_TITLE.to_string(),
            offset: snippet.next_offset,
            task_finished: snippet.task_finished,
            content: snippet.content,
            log_name: log_name.into(),
            job_id,
            json_url,
        }
    }
}

/// Turns a snippet context into a response.
pub trait SnippetRenderer: Send + Sync {
    /// Render `context`.
    ///
    /// # Errors
    ///
    /// Returns an error if the template fails to render.
    fn render(&self, context: &SnippetContext) -> ServerResult<Response>;
}

/// Renders the snippet context as a JSON document.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSnippetRenderer;

impl SnippetRenderer for JsonSnippetRenderer {
    fn render(&self, context: &SnippetContext) -> ServerResult<Response> {
        Ok(Json(context).into_response())
    }
}
