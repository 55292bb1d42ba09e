//! Configuration for log resolution, reading and shaping.

use std::collections::BTreeSet;
use std::path::PathBuf;

/// Default upper bound for a single streamed chunk (1 MiB).
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;

/// Configuration for the format negotiator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatConfig {
    /// Extensions that may be displayed as a rendered snippet.
    pub allowed_log_extensions: BTreeSet<String>,
    /// Report snippet follow-up offsets as `offset + bytes_read + 1`.
    ///
    /// Older pollers expect this arithmetic; new ones should leave it off.
    /// An offset past the end of the log yields `offset + 1`, not `size + 1`.
    pub legacy_snippet_offset: bool,
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self {
            allowed_log_extensions: BTreeSet::from([".log".to_string()]),
            legacy_snippet_offset: false,
        }
    }
}

impl FormatConfig {
    /// Creates a config allowing exactly the given extensions.
    ///
    /// Extensions without a leading dot get one.
    #[must_use]
    pub fn with_extensions<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            allowed_log_extensions: extensions
                .into_iter()
                .map(|ext| normalize_extension(ext.as_ref()))
                .filter(|ext| ext.len() > 1)
                .collect(),
            ..Self::default()
        }
    }

    /// Adds an allowed extension.
    #[must_use]
    pub fn allow_extension(mut self, ext: &str) -> Self {
        let ext = normalize_extension(ext);
        if ext.len() > 1 {
            self.allowed_log_extensions.insert(ext);
        }
        self
    }

    /// Sets the snippet offset convention.
    #[must_use]
    pub const fn with_legacy_snippet_offset(mut self, enabled: bool) -> Self {
        self.legacy_snippet_offset = enabled;
        self
    }
}

fn normalize_extension(ext: &str) -> String {
    let ext = ext.trim();
    if ext.starts_with('.') {
        ext.to_string()
    } else {
        format!(".{ext}")
    }
}

/// Configuration for the log subsystem.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Directory containing one sub-directory of logs per job.
    pub root_dir: PathBuf,
    /// Maximum size of a streamed chunk in bytes.
    pub chunk_size: usize,
    /// Base-name prefix of logs restricted to privileged principals.
    pub restricted_prefix: String,
    /// Suffix of compressed log archives.
    pub compressed_suffix: String,
    /// Response shaping options.
    pub format: FormatConfig,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("logs"),
            chunk_size: DEFAULT_CHUNK_SIZE,
            restricted_prefix: "traceback".to_string(),
            compressed_suffix: ".gz".to_string(),
            format: FormatConfig::default(),
        }
    }
}

impl LogConfig {
    /// Creates a new config with the given root directory.
    #[must_use]
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            ..Default::default()
        }
    }

    /// Sets the chunk size. Zero is clamped to one byte.
    #[must_use]
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.max(1);
        self
    }

    /// Sets the restricted log prefix.
    #[must_use]
    pub fn with_restricted_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.restricted_prefix = prefix.into();
        self
    }

    /// Sets the compressed archive suffix.
    #[must_use]
    pub fn with_compressed_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.compressed_suffix = suffix.into();
        self
    }

    /// Sets the format options.
    #[must_use]
    pub fn with_format(mut self, format: FormatConfig) -> Self {
        self.format = format;
        self
    }
}
