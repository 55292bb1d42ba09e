//! Error types for log retrieval.

use thiserror::Error;

use crate::job::JobId;

/// Errors that can occur while serving job logs.
#[derive(Debug, Error)]
pub enum LogError {
    /// The job id does not resolve to a known job.
    #[error("job not found: {0}")]
    JobNotFound(JobId),

    /// Neither the plain log nor its compressed variant exists.
    #[error("log not found: {name} (job {job})")]
    LogNotFound {
        /// Job the log was requested for.
        job: JobId,
        /// Logical log name as requested.
        name: String,
    },

    /// The principal may not read this log.
    #[error("{0}")]
    Forbidden(String),

    /// The log's extension is not on the display allow-list.
    #[error("Can display only specific file types: {}", .allowed.join(", "))]
    ExtensionNotAllowed {
        /// Extensions that may be displayed.
        allowed: Vec<String>,
    },

    /// The log name is malformed or escapes the job's log directory.
    #[error("invalid log name: {0}")]
    InvalidLogName(String),
}

/// Result type alias for log operations.
pub type Result<T> = std::result::Result<T, LogError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let err = LogError::JobNotFound(JobId(42));
        assert_eq!(err.to_string(), "job not found: 42");

        let err = LogError::LogNotFound {
            job: JobId(7),
            name: "build.log".to_string(),
        };
        assert_eq!(err.to_string(), "log not found: build.log (job 7)");

        let err = LogError::Forbidden("Traceback is available only for superusers.".to_string());
        assert_eq!(err.to_string(), "Traceback is available only for superusers.");
    }

    #[test]
    fn extension_error_lists_allowed() {
        let err = LogError::ExtensionNotAllowed {
            allowed: vec![".log".to_string(), ".txt".to_string()],
        };
        assert_eq!(err.to_string(), "Can display only specific file types: .log, .txt");
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<LogError>();
    }
}
