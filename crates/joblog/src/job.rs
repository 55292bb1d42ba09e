//! The job side of log retrieval.
//!
//! Jobs are owned by whatever scheduler produced them; this crate only reads
//! them through the [`JobCatalog`] trait.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Name of the marker file that flags a job directory as finished.
pub const FINISHED_MARKER: &str = ".finished";

/// Unique identifier of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for JobId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

/// Read-only view of a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    /// Job identifier.
    pub id: JobId,
    /// Whether the job has completed.
    pub finished: bool,
    /// Logical names of the logs the job produced, in order.
    pub log_names: Vec<String>,
}

impl Job {
    /// Creates a running job without logs.
    #[must_use]
    pub const fn new(id: JobId) -> Self {
        Self {
            id,
            finished: false,
            log_names: Vec::new(),
        }
    }

    /// Marks the job finished.
    #[must_use]
    pub const fn finished(mut self) -> Self {
        self.finished = true;
        self
    }

    /// Adds a log name.
    #[must_use]
    pub fn with_log(mut self, name: impl Into<String>) -> Self {
        self.log_names.push(name.into());
        self
    }
}

/// Lookup of jobs by id.
pub trait JobCatalog: Send + Sync {
    /// Returns the job, or `None` if no such job exists.
    fn get(&self, id: JobId) -> Option<Job>;
}

/// Job catalog held in memory, fed by the embedding application.
#[derive(Debug, Default)]
pub struct InMemoryJobCatalog {
    jobs: RwLock<HashMap<JobId, Job>>,
}

impl InMemoryJobCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a job.
    pub fn insert(&self, job: Job) {
        self.jobs.write().insert(job.id, job);
    }

    /// Flags a job finished. Returns false if the job is unknown.
    pub fn mark_finished(&self, id: JobId) -> bool {
        match self.jobs.write().get_mut(&id) {
            Some(job) => {
                job.finished = true;
                true
            }
            None => false,
        }
    }

    /// Number of known jobs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.jobs.read().len()
    }

    /// Returns true if no jobs are known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.jobs.read().is_empty()
    }
}

impl JobCatalog for InMemoryJobCatalog {
    fn get(&self, id: JobId) -> Option<Job> {
        self.jobs.read().get(&id).cloned()
    }
}

/// Job catalog derived from the log directory layout.
///
/// A job exists when `<root>/<id>/` is a directory and is finished once the
/// [`FINISHED_MARKER`] file appears in it. Its log names are the regular files
/// under that directory, nested ones as `dir/name`, with the compressed suffix
/// stripped.
#[derive(Debug, Clone)]
pub struct FsJobCatalog {
    root_dir: PathBuf,
    compressed_suffix: String,
}

impl FsJobCatalog {
    /// Creates a catalog over `root_dir`.
    #[must_use]
    pub fn new(root_dir: impl Into<PathBuf>, compressed_suffix: impl Into<String>) -> Self {
        Self {
            root_dir: root_dir.into(),
            compressed_suffix: compressed_suffix.into(),
        }
    }

    fn scan_log_names(&self, dir: &Path) -> Vec<String> {
        let mut names = BTreeSet::new();
        self.collect_log_names(dir, "", &mut names);
        names.into_iter().collect()
    }

    /// Walks `dir` recursively. Symlinks are neither followed nor listed.
    fn collect_log_names(&self, dir: &Path, prefix: &str, names: &mut BTreeSet<String>) {
        let Ok(entries) = fs::read_dir(dir) else {
            return;
        };

        for entry in entries.filter_map(std::result::Result::ok) {
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            let Ok(file_name) = entry.file_name().into_string() else {
                continue;
            };
            let name = format!("{prefix}{file_name}");

            if file_type.is_dir() {
                self.collect_log_names(&entry.path(), &format!("{name}/"), names);
            } else if file_type.is_file() && name != FINISHED_MARKER {
                let logical = match name.strip_suffix(&self.compressed_suffix) {
                    Some(stem) if !stem.is_empty() && !stem.ends_with('/') => stem.to_string(),
                    _ => name,
                };
                names.insert(logical);
            }
        }
    }
}

impl JobCatalog for FsJobCatalog {
    fn get(&self, id: JobId) -> Option<Job> {
        let dir = self.root_dir.join(id.to_string());
        if !dir.is_dir() {
            debug!(job_id = %id, dir = %dir.display(), "job directory missing");
            return None;
        }

        Some(Job {
            id,
            finished: dir.join(FINISHED_MARKER).is_file(),
            log_names: self.scan_log_names(&dir),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn job_id_parse_and_display() {
        let id: JobId = "42".parse().expect("parse");
        assert_eq!(id, JobId(42));
        assert_eq!(id.to_string(), "42");

        assert!("abc".parse::<JobId>().is_err());
        assert!("-1".parse::<JobId>().is_err());
    }

    #[test]
    fn job_id_serializes_as_number() {
        let json = serde_json::to_string(&JobId(9)).expect("serialize");
        assert_eq!(json, "9");
    }

    #[test]
    fn job_builder() {
        let job = Job::new(JobId(1)).with_log("build.log").finished();
        assert!(job.finished);
        assert_eq!(job.log_names, vec!["build.log".to_string()]);
    }

    #[test]
    fn in_memory_catalog_insert_and_finish() {
        let catalog = InMemoryJobCatalog::new();
        assert!(catalog.is_empty());
        assert!(catalog.get(JobId(1)).is_none());

        catalog.insert(Job::new(JobId(1)));
        assert_eq!(catalog.len(), 1);
        assert!(!catalog.get(JobId(1)).is_some_and(|j| j.finished));

        assert!(catalog.mark_finished(JobId(1)));
        assert!(catalog.get(JobId(1)).is_some_and(|j| j.finished));
        assert!(!catalog.mark_finished(JobId(2)));
    }

    #[test]
    fn fs_catalog_missing_job() {
        let dir = TempDir::new().expect("create temp dir");
        let catalog = FsJobCatalog::new(dir.path(), ".gz");
        assert!(catalog.get(JobId(5)).is_none());
    }

    #[test]
    fn fs_catalog_reads_layout() {
        let dir = TempDir::new().expect("create temp dir");
        let job_dir = dir.path().join("5");
        fs::create_dir_all(&job_dir).expect("mkdir");
        fs::write(job_dir.join("stdout.log"), b"out").expect("write");
        fs::write(job_dir.join("build.log.gz"), b"gz").expect("write");
        fs::write(job_dir.join("traceback.log"), b"tb").expect("write");
        fs::create_dir(job_dir.join("empty")).expect("mkdir");

        let catalog = FsJobCatalog::new(dir.path(), ".gz");
        let job = catalog.get(JobId(5)).expect("job exists");
        assert!(!job.finished);
        assert_eq!(job.log_names, vec!["build.log", "stdout.log", "traceback.log"]);

        fs::write(job_dir.join(FINISHED_MARKER), b"").expect("write marker");
        let job = catalog.get(JobId(5)).expect("job exists");
        assert!(job.finished);
        assert!(!job.log_names.iter().any(|n| n == FINISHED_MARKER));
    }

    #[test]
    fn fs_catalog_dedups_plain_and_compressed() {
        let dir = TempDir::new().expect("create temp dir");
        let job_dir = dir.path().join("8");
        fs::create_dir_all(&job_dir).expect("mkdir");
        fs::write(job_dir.join("build.log"), b"plain").expect("write");
        fs::write(job_dir.join("build.log.gz"), b"gz").expect("write");

        let catalog = FsJobCatalog::new(dir.path(), ".gz");
        let job = catalog.get(JobId(8)).expect("job exists");
        assert_eq!(job.log_names, vec!["build.log"]);
    }

    #[test]
    fn fs_catalog_lists_nested_logs() {
        let dir = TempDir::new().expect("create temp dir");
        let job_dir = dir.path().join("9");
        fs::create_dir_all(job_dir.join("stage").join("deep")).expect("mkdir");
        fs::write(job_dir.join("build.log"), b"top").expect("write");
        fs::write(job_dir.join("stage").join("one.log"), b"one").expect("write");
        fs::write(job_dir.join("stage").join("deep").join("two.log.gz"), b"gz").expect("write");

        let catalog = FsJobCatalog::new(dir.path(), ".gz");
        let job = catalog.get(JobId(9)).expect("job exists");
        assert_eq!(
            job.log_names,
            vec!["build.log", "stage/deep/two.log", "stage/one.log"]
        );
        assert!(!job.finished);
    }

    #[cfg(unix)]
    #[test]
    fn fs_catalog_skips_symlinks() {
        let dir = TempDir::new().expect("create temp dir");
        let outside = TempDir::new().expect("create temp dir");
        fs::write(outside.path().join("secret.log"), b"x").expect("write");
        let job_dir = dir.path().join("3");
        fs::create_dir_all(&job_dir).expect("mkdir");
        std::os::unix::fs::symlink(outside.path(), job_dir.join("linked")).expect("symlink");

        let catalog = FsJobCatalog::new(dir.path(), ".gz");
        assert!(catalog.get(JobId(3)).expect("job exists").log_names.is_empty());
    }
}
