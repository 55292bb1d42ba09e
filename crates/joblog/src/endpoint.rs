//! The log endpoint: one request in, one shaped reply out.
//!
//! Every request walks the same stages:
//!
//! ```text
//! Start -> AccessChecked -> Resolved -> Read -> Shaped -> Done
//! ```
//!
//! and may leave early as `Forbidden` or `NotFound`. A log that vanishes
//! after resolution is not an exit; it reads as empty. The endpoint never
//! retries. Pollers come back with the offset from their last reply.
//!
//! All methods block on file I/O and are meant to run on a blocking pool.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::access::{AccessPolicy, Principal};
use crate::config::LogConfig;
use crate::error::{LogError, Result};
use crate::format::{Disposition, FormatNegotiator, OutputMode, PollPayload, Shape, Snippet};
use crate::job::{Job, JobCatalog, JobId};
use crate::reader::{ChunkedReader, LogStream};
use crate::store::{LogResource, LogStore};

/// Progress of a request through the endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Request received.
    Start,
    /// The principal may read the log.
    AccessChecked,
    /// The log was found on disk.
    Resolved,
    /// Content was opened or read.
    Read,
    /// The reply shape is built.
    Shaped,
    /// The reply was handed back.
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Start => "start",
            Self::AccessChecked => "access_checked",
            Self::Resolved => "resolved",
            Self::Read => "read",
            Self::Shaped => "shaped",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// A request for one job log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRequest {
    /// Job owning the log.
    pub job_id: JobId,
    /// Logical log name.
    pub log_name: String,
    /// Byte offset to read from.
    pub offset: u64,
    /// Requested output mode.
    pub mode: OutputMode,
    /// Who is asking.
    pub principal: Principal,
}

impl LogRequest {
    /// Creates an anonymous display-mode request from offset zero.
    #[must_use]
    pub fn new(job_id: JobId, log_name: impl Into<String>) -> Self {
        Self {
            job_id,
            log_name: log_name.into(),
            offset: 0,
            mode: OutputMode::Display,
            principal: Principal::anonymous(),
        }
    }

    /// Sets the offset.
    #[must_use]
    pub const fn with_offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    /// Sets the output mode.
    #[must_use]
    pub const fn with_mode(mut self, mode: OutputMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets the principal.
    #[must_use]
    pub fn with_principal(mut self, principal: Principal) -> Self {
        self.principal = principal;
        self
    }
}

/// A log body to stream to the client.
#[derive(Debug)]
pub struct StreamReply {
    /// Chunks from the requested offset.
    pub stream: LogStream,
    /// Exact number of bytes `stream` will yield.
    pub content_length: u64,
    /// Guessed content type.
    pub content_type: String,
    /// Base name of the log, for the download filename.
    pub filename: String,
    /// Attachment or inline delivery.
    pub disposition: Disposition,
}

/// Reply of the mode-switched log endpoint.
#[derive(Debug)]
pub enum LogReply {
    /// Stream raw bytes.
    Stream(StreamReply),
    /// Render decoded text.
    Snippet(Snippet),
    /// Return decoded text as a poll payload.
    Poll(PollPayload),
}

/// Logs of a job visible to a principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogListing {
    /// The job.
    pub job_id: JobId,
    /// Whether the job has finished.
    pub finished: bool,
    /// Visible log names, sorted.
    pub logs: Vec<String>,
}

/// Serves job logs by composing store, reader, policy and negotiator.
#[derive(Clone)]
pub struct LogEndpoint {
    catalog: Arc<dyn JobCatalog>,
    store: LogStore,
    reader: ChunkedReader,
    policy: AccessPolicy,
    negotiator: FormatNegotiator,
}

impl fmt::Debug for LogEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogEndpoint")
            .field("store", &self.store)
            .field("reader", &self.reader)
            .field("policy", &self.policy)
            .field("negotiator", &self.negotiator)
            .finish_non_exhaustive()
    }
}

impl LogEndpoint {
    /// Creates an endpoint from configuration.
    #[must_use]
    pub fn new(config: &LogConfig, catalog: Arc<dyn JobCatalog>) -> Self {
        Self {
            catalog,
            store: LogStore::from_config(config),
            reader: ChunkedReader::from_config(config),
            policy: AccessPolicy::from_config(config),
            negotiator: FormatNegotiator::new(config.format.clone()),
        }
    }

    /// Creates an endpoint from explicit parts.
    #[must_use]
    pub fn from_parts(
        catalog: Arc<dyn JobCatalog>,
        store: LogStore,
        reader: ChunkedReader,
        policy: AccessPolicy,
        negotiator: FormatNegotiator,
    ) -> Self {
        Self {
            catalog,
            store,
            reader,
            policy,
            negotiator,
        }
    }

    /// Returns the log store.
    #[must_use]
    pub const fn store(&self) -> &LogStore {
        &self.store
    }

    /// Returns the format negotiator.
    #[must_use]
    pub const fn negotiator(&self) -> &FormatNegotiator {
        &self.negotiator
    }

    /// Serves one log request in the shape its mode and name call for.
    ///
    /// # Errors
    ///
    /// [`LogError::Forbidden`] for restricted logs, [`LogError::JobNotFound`],
    /// [`LogError::ExtensionNotAllowed`] for undisplayable logs in display mode,
    /// and any resolution error from [`LogStore::resolve`].
    pub fn fetch(&self, request: &LogRequest) -> Result<LogReply> {
        let job = self.admit(request)?;
        let shape = self.negotiator.choose(request.mode, &request.log_name);
        debug!(job_id = %job.id, log_name = %request.log_name, ?shape, "shape chosen");

        let reply = match shape {
            Shape::Forbidden { allowed } => {
                debug!(job_id = %job.id, log_name = %request.log_name, "extension not displayable");
                return Err(LogError::ExtensionNotAllowed { allowed });
            }
            Shape::RawStream { disposition } => {
                let resource = self.resolve(request)?;
                LogReply::Stream(self.open_stream(&resource, request.offset, disposition))
            }
            Shape::RenderedSnippet => {
                let resource = self.resolve(request)?;
                let content = self.read(&resource, request.offset);
                LogReply::Snippet(self.negotiator.snippet(request.offset, &content, job.finished))
            }
            Shape::JsonPoll => {
                let resource = self.resolve(request)?;
                let content = self.read(&resource, request.offset);
                LogReply::Poll(self.negotiator.poll(request.offset, &content, job.finished))
            }
        };

        debug!(stage = %Stage::Shaped, job_id = %job.id, log_name = %request.log_name, "log reply ready");
        Ok(reply)
    }

    /// Lists the logs of a job visible to `principal`.
    ///
    /// # Errors
    ///
    /// [`LogError::JobNotFound`] if the job is unknown.
    pub fn list(&self, job_id: JobId, principal: &Principal) -> Result<LogListing> {
        let job = self.job(job_id)?;
        Ok(LogListing {
            job_id: job.id,
            finished: job.finished,
            logs: self.policy.visible_logs(principal, &job.log_names),
        })
    }

    /// Runs the access check, then looks the job up.
    fn admit(&self, request: &LogRequest) -> Result<Job> {
        debug!(
            stage = %Stage::Start,
            job_id = %request.job_id,
            log_name = %request.log_name,
            offset = request.offset,
            "log request"
        );

        let verdict = self.policy.check(&request.principal, &request.log_name);
        if !verdict.allowed {
            debug!(job_id = %request.job_id, log_name = %request.log_name, principal = %request.principal.name, "restricted log denied");
            return Err(LogError::Forbidden(verdict.reason.unwrap_or_default()));
        }
        debug!(stage = %Stage::AccessChecked, job_id = %request.job_id);

        self.job(request.job_id)
    }

    fn job(&self, job_id: JobId) -> Result<Job> {
        self.catalog.get(job_id).ok_or(LogError::JobNotFound(job_id))
    }

    fn resolve(&self, request: &LogRequest) -> Result<LogResource> {
        let resource = self.store.resolve(request.job_id, &request.log_name)?;
        debug!(stage = %Stage::Resolved, job_id = %request.job_id, path = %resource.path.display());
        Ok(resource)
    }

    fn open_stream(&self, resource: &LogResource, offset: u64, disposition: Disposition) -> StreamReply {
        let stream = self.reader.open(resource, offset);
        let content_length = stream.remaining();
        debug!(stage = %Stage::Read, path = %resource.path.display(), offset, content_length);

        StreamReply {
            stream,
            content_length,
            content_type: FormatNegotiator::content_type(resource.file_name()),
            filename: resource.file_name().to_string(),
            disposition,
        }
    }

    fn read(&self, resource: &LogResource, offset: u64) -> Vec<u8> {
        let content = self.reader.read_to_end(resource, offset);
        debug!(stage = %Stage::Read, path = %resource.path.display(), offset, bytes = content.len());
        content
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FormatConfig;
    use crate::job::InMemoryJobCatalog;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::fs;
    use std::io::Write;
    use tempfile::TempDir;

    struct Fixture {
        endpoint: LogEndpoint,
        catalog: Arc<InMemoryJobCatalog>,
        dir: TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            Self::with_config(|config| config)
        }

        fn with_config(adjust: impl FnOnce(LogConfig) -> LogConfig) -> Self {
            let dir = TempDir::new().expect("create temp dir");
            fs::create_dir_all(dir.path().join("42")).expect("create job dir");
            let catalog = Arc::new(InMemoryJobCatalog::new());
            catalog.insert(Job::new(JobId(42)));
            let config = adjust(LogConfig::new(dir.path()).with_chunk_size(4));
            let endpoint = LogEndpoint::new(&config, catalog.clone());
            Self {
                endpoint,
                catalog,
                dir,
            }
        }

        fn write(&self, name: &str, content: &[u8]) {
            fs::write(self.dir.path().join("42").join(name), content).expect("write log");
        }

        fn write_gz(&self, name: &str, content: &[u8]) {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(content).expect("compress");
            let bytes = encoder.finish().expect("finish gzip");
            fs::write(self.dir.path().join("42").join(format!("{name}.gz")), bytes)
                .expect("write archive");
        }
    }

    fn request(name: &str) -> LogRequest {
        LogRequest::new(JobId(42), name)
    }

    fn stream_bytes(reply: LogReply) -> (StreamReply, Vec<u8>) {
        match reply {
            LogReply::Stream(mut reply) => {
                let stream = std::mem::replace(&mut reply.stream, LogStream::empty(""));
                let bytes = stream.flatten().collect();
                (reply, bytes)
            }
            other => panic!("expected stream, got {other:?}"),
        }
    }

    fn snippet(reply: LogReply) -> Snippet {
        match reply {
            LogReply::Snippet(snippet) => snippet,
            other => panic!("expected snippet, got {other:?}"),
        }
    }

    fn poll(endpoint: &LogEndpoint, request: &LogRequest) -> Result<PollPayload> {
        let request = request.clone().with_mode(OutputMode::Poll);
        endpoint.fetch(&request).map(|reply| match reply {
            LogReply::Poll(payload) => payload,
            other => panic!("expected poll payload, got {other:?}"),
        })
    }

    #[test]
    fn poll_scenario_build_log() {
        let fx = Fixture::new();
        fx.write("build.log", b"hello\nworld");

        let payload = poll(&fx.endpoint, &request("build.log")).expect("poll");
        assert_eq!(
            payload,
            PollPayload {
                new_offset: 11,
                task_finished: 0,
                content: "hello\nworld".to_string(),
            }
        );
    }

    #[test]
    fn poll_is_idempotent_and_progressive() {
        let fx = Fixture::new();
        fx.write("build.log", b"first line\n");

        let first = poll(&fx.endpoint, &request("build.log")).expect("poll");
        let again = poll(&fx.endpoint, &request("build.log")).expect("poll");
        assert_eq!(first, again);

        fx.write("build.log", b"first line\nsecond line\n");
        let next = poll(&fx.endpoint, &request("build.log").with_offset(first.new_offset))
            .expect("poll");
        assert_eq!(next.content, "second line\n");
        assert_eq!(next.new_offset, 23);

        let idle = poll(&fx.endpoint, &request("build.log").with_offset(next.new_offset))
            .expect("poll");
        assert!(idle.content.is_empty());
        assert_eq!(idle.new_offset, next.new_offset);
    }

    #[test]
    fn poll_reports_finished_job() {
        let fx = Fixture::new();
        fx.write("build.log", b"done");
        fx.catalog.mark_finished(JobId(42));

        let payload = poll(&fx.endpoint, &request("build.log")).expect("poll");
        assert_eq!(payload.task_finished, 1);
    }

    #[test]
    fn poll_ignores_extension_allow_list() {
        let fx = Fixture::new();
        fx.write("core.bin", b"\x00\x01");

        let payload = poll(&fx.endpoint, &request("core.bin")).expect("poll");
        assert_eq!(payload.new_offset, 2);
    }

    #[test]
    fn traceback_forbidden_in_every_mode() {
        let fx = Fixture::new();
        fx.write("traceback.log", b"secret");

        for mode in [OutputMode::Raw, OutputMode::Display] {
            let result = fx.endpoint.fetch(&request("traceback.log").with_mode(mode));
            assert!(matches!(result, Err(LogError::Forbidden(_))), "mode {mode:?}");
        }
        let result = poll(&fx.endpoint, &request("traceback.log"));
        assert!(matches!(result, Err(LogError::Forbidden(_))));
    }

    #[test]
    fn traceback_visible_to_admin() {
        let fx = Fixture::new();
        fx.write("traceback.log", b"secret");

        let req = request("traceback.log").with_principal(Principal::admin("root"));
        let payload = poll(&fx.endpoint, &req).expect("poll");
        assert_eq!(payload.content, "secret");
    }

    #[test]
    fn access_is_checked_before_job_lookup() {
        let fx = Fixture::new();
        let req = LogRequest::new(JobId(404), "traceback.log");
        assert!(matches!(poll(&fx.endpoint, &req), Err(LogError::Forbidden(_))));
    }

    #[test]
    fn unknown_job_is_not_found() {
        let fx = Fixture::new();
        let req = LogRequest::new(JobId(404), "build.log");
        assert!(matches!(fx.endpoint.fetch(&req), Err(LogError::JobNotFound(JobId(404)))));
        assert!(matches!(poll(&fx.endpoint, &req), Err(LogError::JobNotFound(JobId(404)))));
    }

    #[test]
    fn missing_log_is_not_found() {
        let fx = Fixture::new();
        let result = fx.endpoint.fetch(&request("missing.log"));
        assert!(matches!(result, Err(LogError::LogNotFound { .. })));
    }

    #[test]
    fn snippet_mode_for_plain_logs() {
        let fx = Fixture::new();
        fx.write("build.log", b"hello\nworld");

        let reply = fx.endpoint.fetch(&request("build.log").with_offset(6)).expect("fetch");
        let snippet = snippet(reply);
        assert_eq!(snippet.content, "world");
        assert_eq!(snippet.next_offset, 11);
        assert_eq!(snippet.task_finished, 0);
    }

    #[test]
    fn snippet_mode_legacy_offset() {
        let fx = Fixture::with_config(|c| {
            c.with_format(FormatConfig::default().with_legacy_snippet_offset(true))
        });
        fx.write("build.log", b"hello");

        let snippet = snippet(fx.endpoint.fetch(&request("build.log")).expect("fetch"));
        assert_eq!(snippet.next_offset, 6);
    }

    #[test]
    fn unlisted_extension_forbidden_in_snippet_mode() {
        let fx = Fixture::new();
        fx.write("core.bin", b"\x00");

        let result = fx.endpoint.fetch(&request("core.bin"));
        match result {
            Err(LogError::ExtensionNotAllowed { allowed }) => assert_eq!(allowed, vec![".log"]),
            other => panic!("expected extension error, got {other:?}"),
        }
    }

    #[test]
    fn raw_mode_streams_attachment() {
        let fx = Fixture::new();
        fx.write("build.log", b"0123456789");

        let reply = fx
            .endpoint
            .fetch(&request("build.log").with_mode(OutputMode::Raw).with_offset(3))
            .expect("fetch");
        let (reply, bytes) = stream_bytes(reply);
        assert_eq!(bytes, b"3456789");
        assert_eq!(reply.content_length, 7);
        assert_eq!(reply.filename, "build.log");
        assert_eq!(reply.disposition, Disposition::Attachment);
    }

    #[test]
    fn raw_mode_past_end_is_empty() {
        let fx = Fixture::new();
        fx.write("build.log", b"abc");

        let reply = fx
            .endpoint
            .fetch(&request("build.log").with_mode(OutputMode::Raw).with_offset(10))
            .expect("fetch");
        let (reply, bytes) = stream_bytes(reply);
        assert!(bytes.is_empty());
        assert_eq!(reply.content_length, 0);
    }

    #[test]
    fn html_streams_inline() {
        let fx = Fixture::new();
        fx.write("report.html", b"<p>ok</p>");

        let (reply, bytes) = stream_bytes(fx.endpoint.fetch(&request("report.html")).expect("fetch"));
        assert_eq!(bytes, b"<p>ok</p>");
        assert_eq!(reply.disposition, Disposition::Inline);
        assert_eq!(reply.content_type, "text/html");
    }

    #[test]
    fn compressed_log_served_transparently() {
        let fx = Fixture::new();
        fx.write_gz("build.log", b"hello\nworld");
        fx.catalog.mark_finished(JobId(42));

        for offset in [0u64, 3, 11, 20] {
            let expected = b"hello\nworld".get(offset as usize..).unwrap_or(&[]).to_vec();

            let payload = poll(&fx.endpoint, &request("build.log").with_offset(offset))
                .expect("poll");
            assert_eq!(payload.content.as_bytes(), expected.as_slice());
            assert_eq!(payload.task_finished, 1);

            let (_, bytes) = stream_bytes(
                fx.endpoint
                    .fetch(&request("build.log").with_mode(OutputMode::Raw).with_offset(offset))
                    .expect("fetch"),
            );
            assert_eq!(bytes, expected);
        }
    }

    #[test]
    fn invalid_name_is_rejected() {
        let fx = Fixture::new();
        let result = poll(&fx.endpoint, &request("../etc/passwd"));
        assert!(matches!(result, Err(LogError::InvalidLogName(_))));
    }

    #[test]
    fn list_filters_restricted_logs() {
        let fx = Fixture::new();
        fx.catalog.insert(
            Job::new(JobId(42))
                .with_log("traceback.log")
                .with_log("stdout.log")
                .with_log("build.log"),
        );

        let listing = fx.endpoint.list(JobId(42), &Principal::user("bob")).expect("list");
        assert_eq!(listing.logs, vec!["build.log", "stdout.log"]);
        assert!(!listing.finished);

        let listing = fx.endpoint.list(JobId(42), &Principal::admin("root")).expect("list");
        assert_eq!(listing.logs.len(), 3);

        assert!(matches!(
            fx.endpoint.list(JobId(1), &Principal::anonymous()),
            Err(LogError::JobNotFound(_))
        ));
    }

    #[test]
    fn stage_display() {
        assert_eq!(Stage::AccessChecked.to_string(), "access_checked");
        assert_eq!(Stage::Done.to_string(), "done");
    }
}
