//! Resolution of logical log names to files on disk.
//!
//! A job's logs live in `<root>/<job id>/`. Once a job finishes its logs may
//! be compacted into `<name>.gz`; [`LogStore::locate`] hides that transition
//! from callers by probing the plain name first and the compressed name second.

use std::fs;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, warn};

use crate::config::LogConfig;
use crate::error::{LogError, Result};
use crate::job::JobId;

/// Outcome of probing the filesystem for a log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The uncompressed log exists.
    Plain(PathBuf),
    /// Only the compressed archive exists.
    Compressed(PathBuf),
    /// Neither variant exists.
    NotFound,
}

/// A resolved physical log, valid for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogResource {
    /// Logical name as requested.
    pub name: String,
    /// Canonical path of the file on disk.
    pub path: PathBuf,
    /// Whether `path` is a gzip archive.
    pub compressed: bool,
    /// On-disk size at resolution time.
    pub stored_size: u64,
}

impl LogResource {
    /// Base name of the logical log, used as the download filename.
    #[must_use]
    pub fn file_name(&self) -> &str {
        base_name(&self.name)
    }
}

/// Returns the last `/`-separated segment of a log name.
#[must_use]
pub fn base_name(log_name: &str) -> &str {
    log_name.rsplit('/').next().unwrap_or(log_name)
}

/// Maps (job, log name) pairs to files.
#[derive(Debug, Clone)]
pub struct LogStore {
    root_dir: PathBuf,
    compressed_suffix: String,
}

impl LogStore {
    /// Creates a store rooted at `root_dir`.
    #[must_use]
    pub fn new(root_dir: impl Into<PathBuf>, compressed_suffix: impl Into<String>) -> Self {
        Self {
            root_dir: root_dir.into(),
            compressed_suffix: compressed_suffix.into(),
        }
    }

    /// Creates a store from the log configuration.
    #[must_use]
    pub fn from_config(config: &LogConfig) -> Self {
        Self::new(&config.root_dir, &config.compressed_suffix)
    }

    /// Directory holding the logs of `job`.
    #[must_use]
    pub fn job_dir(&self, job: JobId) -> PathBuf {
        self.root_dir.join(job.to_string())
    }

    /// Suffix appended to compressed logs.
    #[must_use]
    pub fn compressed_suffix(&self) -> &str {
        &self.compressed_suffix
    }

    /// Finds which variant of a log currently exists.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::InvalidLogName`] if the name is malformed or any
    /// candidate resolves outside the job directory.
    pub fn locate(&self, job: JobId, log_name: &str) -> Result<Resolution> {
        let relative = validate_log_name(log_name)?;

        let Ok(job_dir) = fs::canonicalize(self.job_dir(job)) else {
            debug!(job_id = %job, "job log directory missing");
            return Ok(Resolution::NotFound);
        };

        if let Some(path) = find_file(&job_dir, &job_dir.join(relative), log_name)? {
            return Ok(Resolution::Plain(path));
        }

        if !log_name.ends_with(&self.compressed_suffix) {
            let compressed = job_dir.join(format!("{log_name}{}", self.compressed_suffix));
            if let Some(path) = find_file(&job_dir, &compressed, log_name)? {
                return Ok(Resolution::Compressed(path));
            }
        }

        Ok(Resolution::NotFound)
    }

    /// Resolves a log to a readable resource.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::LogNotFound`] if neither variant exists, or
    /// [`LogError::InvalidLogName`] for names rejected by [`LogStore::locate`].
    pub fn resolve(&self, job: JobId, log_name: &str) -> Result<LogResource> {
        let (path, compressed) = match self.locate(job, log_name)? {
            Resolution::Plain(path) => (path, false),
            Resolution::Compressed(path) => (path, true),
            Resolution::NotFound => {
                return Err(LogError::LogNotFound {
                    job,
                    name: log_name.to_string(),
                });
            }
        };

        // The file may vanish between lookup and stat; report zero rather than fail.
        let stored_size = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
        debug!(job_id = %job, log_name, path = %path.display(), compressed, stored_size, "resolved log");

        Ok(LogResource {
            name: log_name.to_string(),
            path,
            compressed,
            stored_size,
        })
    }
}

/// Rejects names that are empty, absolute or contain anything but plain segments.
fn validate_log_name(log_name: &str) -> Result<&Path> {
    let invalid = || LogError::InvalidLogName(log_name.to_string());

    if log_name.is_empty() || log_name.contains('\0') || log_name.contains('\\') {
        return Err(invalid());
    }

    let path = Path::new(log_name);
    if !path.components().all(|c| matches!(c, Component::Normal(_))) {
        return Err(invalid());
    }

    Ok(path)
}

/// Returns the canonical path of `candidate` if it is a regular file inside `job_dir`.
fn find_file(job_dir: &Path, candidate: &Path, log_name: &str) -> Result<Option<PathBuf>> {
    let Ok(real) = fs::canonicalize(candidate) else {
        return Ok(None);
    };

    if !real.starts_with(job_dir) {
        warn!(log_name, path = %real.display(), "log name escapes job directory");
        return Err(LogError::InvalidLogName(log_name.to_string()));
    }

    Ok(real.is_file().then_some(real))
}
