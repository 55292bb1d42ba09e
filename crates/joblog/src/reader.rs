//! Chunked, offset-based reading of logs.
//!
//! A [`LogStream`] snapshots the readable length when it is opened and never
//! yields more than that, so a log that keeps growing while it is streamed
//! still produces a body matching the advertised length. Failures are never
//! surfaced to the caller: a log that cannot be opened reads as empty and a
//! read error ends the stream early. The next poll picks up whatever the
//! writer left behind.

use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use flate2::read::MultiGzDecoder;
use tracing::{debug, warn};

use crate::config::LogConfig;
use crate::store::LogResource;

/// A bounded slice of log content.
pub type LogChunk = Vec<u8>;

type Source = Box<dyn Read + Send>;

/// Opens log resources as chunk streams.
#[derive(Debug, Clone, Copy)]
pub struct ChunkedReader {
    chunk_size: usize,
}

impl ChunkedReader {
    /// Creates a reader yielding chunks of at most `chunk_size` bytes.
    #[must_use]
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    /// Creates a reader from the log configuration.
    #[must_use]
    pub fn from_config(config: &LogConfig) -> Self {
        Self::new(config.chunk_size)
    }

    /// Maximum chunk size in bytes.
    #[must_use]
    pub const fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Opens `resource` positioned at `offset`.
    ///
    /// Offsets into compressed resources address the decompressed content.
    #[must_use]
    pub fn open(&self, resource: &LogResource, offset: u64) -> LogStream {
        let opened = if resource.compressed {
            open_compressed(&resource.path, offset)
        } else {
            open_plain(&resource.path, offset)
        };

        match opened {
            Ok((source, remaining)) => LogStream {
                source,
                remaining,
                chunk_size: self.chunk_size,
                path: resource.path.clone(),
            },
            Err(err) => {
                debug!(path = %resource.path.display(), error = %err, "log vanished before open");
                LogStream::empty(&resource.path)
            }
        }
    }

    /// Reads everything from `offset` to the end of the log as it is now.
    #[must_use]
    pub fn read_to_end(&self, resource: &LogResource, offset: u64) -> Vec<u8> {
        let stream = self.open(resource, offset);
        let mut content = Vec::with_capacity(usize::try_from(stream.remaining()).unwrap_or(0));
        for chunk in stream {
            content.extend_from_slice(&chunk);
        }
        content
    }
}

impl Default for ChunkedReader {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_CHUNK_SIZE)
    }
}

fn open_plain(path: &Path, offset: u64) -> io::Result<(Option<Source>, u64)> {
    let mut file = File::open(path)?;
    let size = file.metadata()?.len();
    if offset >= size {
        return Ok((None, 0));
    }

    file.seek(SeekFrom::Start(offset))?;
    Ok((Some(Box::new(file)), size - offset))
}

fn open_compressed(path: &Path, offset: u64) -> io::Result<(Option<Source>, u64)> {
    // Archives don't record a reliable uncompressed length, so measure it.
    let size = io::copy(&mut gz_reader(path)?, &mut io::sink())?;
    if offset >= size {
        return Ok((None, 0));
    }

    let mut decoder = gz_reader(path)?;
    let skipped = io::copy(&mut decoder.by_ref().take(offset), &mut io::sink())?;
    if skipped < offset {
        return Ok((None, 0));
    }

    Ok((Some(Box::new(decoder)), size - offset))
}

fn gz_reader(path: &Path) -> io::Result<MultiGzDecoder<BufReader<File>>> {
    Ok(MultiGzDecoder::new(BufReader::new(File::open(path)?)))
}

/// A lazy, finite sequence of [`LogChunk`]s read from one log.
///
/// The stream owns its file handle; dropping the stream closes the file no
/// matter how far it was consumed.
pub struct LogStream {
    source: Option<Source>,
    remaining: u64,
    chunk_size: usize,
    path: PathBuf,
}

impl LogStream {
    /// A stream that yields nothing.
    #[must_use]
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            source: None,
            remaining: 0,
            chunk_size: 1,
            path: path.into(),
        }
    }

    /// Bytes still to be yielded, as snapshotted at open.
    #[must_use]
    pub const fn remaining(&self) -> u64 {
        self.remaining
    }

    /// Returns true once the file handle has been released.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.source.is_none()
    }

    fn close(&mut self) {
        self.source = None;
        self.remaining = 0;
    }
}

impl std::fmt::Debug for LogStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogStream")
            .field("path", &self.path)
            .field("remaining", &self.remaining)
            .field("chunk_size", &self.chunk_size)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Iterator for LogStream {
    type Item = LogChunk;

    fn next(&mut self) -> Option<LogChunk> {
        if self.remaining == 0 {
            self.close();
            return None;
        }

        let source = self.source.as_mut()?;
        let want = self.remaining.min(self.chunk_size as u64);
        let mut chunk = Vec::with_capacity(want as usize);

        let read = Read::take(source.as_mut(), want).read_to_end(&mut chunk);

        match read {
            Ok(0) => {
                debug!(path = %self.path.display(), remaining = self.remaining, "log shrank while streaming");
                self.close();
                None
            }
            Ok(n) => {
                self.remaining -= n as u64;
                if self.remaining == 0 {
                    self.close();
                }
                Some(chunk)
            }
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "log read failed, ending stream");
                self.close();
                None
            }
        }
    }
}
