//! Choosing and building the response shape for a log request.

use serde::{Deserialize, Serialize};

use crate::config::FormatConfig;

/// Extensions served inline as renderable documents.
pub const HTML_EXTENSIONS: [&str; 2] = [".html", ".htm"];

/// Fallback content type for logs whose type cannot be guessed.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Output mode requested by the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    /// Let the log name decide.
    #[default]
    Display,
    /// Download the log as a file.
    Raw,
    /// Return the tail as a poll payload, whatever the extension.
    Poll,
}

impl OutputMode {
    /// Parses the `format` query parameter. Anything but `raw` means display.
    #[must_use]
    pub fn from_query(format: Option<&str>) -> Self {
        match format {
            Some("raw") => Self::Raw,
            _ => Self::Display,
        }
    }
}

/// How a streamed log is presented to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Downloaded as a named file.
    Attachment,
    /// Rendered in place.
    Inline,
}

/// The response shape chosen for a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shape {
    /// Stream the bytes from the offset to the end.
    RawStream {
        /// Attachment or inline delivery.
        disposition: Disposition,
    },
    /// Decode the tail as text and hand it to the renderer.
    RenderedSnippet,
    /// Decode the tail as text and return it as a poll payload.
    JsonPoll,
    /// The log may not be displayed.
    Forbidden {
        /// Extensions that may be displayed.
        allowed: Vec<String>,
    },
}

/// Decoded log tail for the snippet view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snippet {
    /// Decoded text.
    pub content: String,
    /// Offset the follow-up poll should start from.
    pub next_offset: u64,
    /// 1 if the job has finished, else 0.
    pub task_finished: u8,
}

/// Payload returned by the poll endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollPayload {
    /// Offset to send with the next poll.
    pub new_offset: u64,
    /// 1 if the job has finished, else 0.
    pub task_finished: u8,
    /// Decoded text read since the previous offset.
    pub content: String,
}

/// Picks response shapes and builds their payloads.
#[derive(Debug, Clone, Default)]
pub struct FormatNegotiator {
    config: FormatConfig,
}

impl FormatNegotiator {
    /// Creates a negotiator with the given configuration.
    #[must_use]
    pub const fn new(config: FormatConfig) -> Self {
        Self { config }
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &FormatConfig {
        &self.config
    }

    /// Returns true if `log_name` ends with an allowed text extension.
    #[must_use]
    pub fn is_displayable(&self, log_name: &str) -> bool {
        self.config
            .allowed_log_extensions
            .iter()
            .any(|ext| log_name.ends_with(ext.as_str()))
    }

    /// Chooses the response shape for `mode` and `log_name`.
    ///
    /// Raw and poll requests are never gated on the extension.
    #[must_use]
    pub fn choose(&self, mode: OutputMode, log_name: &str) -> Shape {
        match mode {
            OutputMode::Raw => {
                return Shape::RawStream {
                    disposition: Disposition::Attachment,
                };
            }
            OutputMode::Poll => return Shape::JsonPoll,
            OutputMode::Display => {}
        }

        if HTML_EXTENSIONS.iter().any(|ext| log_name.ends_with(ext)) {
            return Shape::RawStream {
                disposition: Disposition::Inline,
            };
        }

        if self.is_displayable(log_name) {
            return Shape::RenderedSnippet;
        }

        Shape::Forbidden {
            allowed: self.config.allowed_log_extensions.iter().cloned().collect(),
        }
    }

    /// Guesses a content type from the log name.
    #[must_use]
    pub fn content_type(log_name: &str) -> String {
        mime_guess::from_path(log_name)
            .first()
            .map_or_else(|| OCTET_STREAM.to_string(), |mime| mime.to_string())
    }

    /// Builds the snippet for bytes read from `offset`.
    ///
    /// With the legacy offset the follow-up is `offset + read + 1`. Past the
    /// end of the log that is `offset + 1`, never a step back to `size + 1`.
    #[must_use]
    pub fn snippet(&self, offset: u64, content: &[u8], finished: bool) -> Snippet {
        let read = content.len() as u64;
        let next_offset = if self.config.legacy_snippet_offset {
            offset.saturating_add(read).saturating_add(1)
        } else {
            offset.saturating_add(read)
        };

        Snippet {
            content: String::from_utf8_lossy(content).into_owned(),
            next_offset,
            task_finished: u8::from(finished),
        }
    }

    /// Builds the poll payload for bytes read from `offset`.
    #[must_use]
    pub fn poll(&self, offset: u64, content: &[u8], finished: bool) -> PollPayload {
        PollPayload {
            new_offset: offset.saturating_add(content.len() as u64),
            task_finished: u8::from(finished),
            content: String::from_utf8_lossy(content).into_owned(),
        }
    }
}
