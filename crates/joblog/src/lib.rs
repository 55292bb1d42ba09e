//! # joblog
//!
//! Read path for the logs of background jobs.
//!
//! This crate provides:
//!
//! - [`LogStore`]: Resolves a job's log name to a plain or gzip-compressed file
//! - [`ChunkedReader`]: Offset-based, bounded-chunk reading (tail -f style)
//! - [`AccessPolicy`]: Privilege gating for traceback logs
//! - [`FormatNegotiator`]: Raw stream, rendered snippet or JSON poll
//! - [`LogEndpoint`]: Composes the above per request
//! - [`JobCatalog`]: Seam to the system that owns jobs
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use joblog::{
//!     InMemoryJobCatalog, Job, JobId, LogConfig, LogEndpoint, LogReply, LogRequest, OutputMode,
//! };
//!
//! let catalog = Arc::new(InMemoryJobCatalog::new());
//! catalog.insert(Job::new(JobId(42)).with_log("build.log"));
//!
//! let endpoint = LogEndpoint::new(&LogConfig::new("/var/lib/jobs"), catalog);
//! let request = LogRequest::new(JobId(42), "build.log").with_mode(OutputMode::Poll);
//! if let LogReply::Poll(payload) = endpoint.fetch(&request).unwrap() {
//!     println!("{} -> {}", payload.content, payload.new_offset);
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod access;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod format;
pub mod job;
pub mod reader;
pub mod store;

// Re-export main types
pub use access::{AccessPolicy, AccessVerdict, Principal};
pub use config::{FormatConfig, LogConfig, DEFAULT_CHUNK_SIZE};
pub use endpoint::{LogEndpoint, LogListing, LogReply, LogRequest, Stage, StreamReply};
pub use error::{LogError, Result};
pub use format::{Disposition, FormatNegotiator, OutputMode, PollPayload, Shape, Snippet};
pub use job::{FsJobCatalog, InMemoryJobCatalog, Job, JobCatalog, JobId};
pub use reader::{ChunkedReader, LogChunk, LogStream};
pub use store::{LogResource, LogStore, Resolution};
