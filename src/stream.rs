//! Chunked read streams and buffered write streams.
//!
//! A read stream is a lazy, finite, restartable-per-call sequence of chunks
//! over a content snapshot taken in a single pass through the store's actor;
//! consumers may stop early without materializing the rest. A write stream
//! accumulates pushed chunks and performs exactly one atomic replace-write on
//! commit; cancel (or drop without commit) discards the buffer so no partial
//! content ever becomes visible.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::FsResult;

/// Reference chunk size used when a caller does not pick one.
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// How a read stream cuts content into chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkMode {
    /// Fixed-size byte chunks; the final chunk may be short. Sizes below 1
    /// are treated as 1.
    Bytes(usize),
    /// Split on `\n`, each chunk keeping its terminator; a final unterminated
    /// line is yielded as-is.
    Lines,
}

impl Default for ChunkMode {
    fn default() -> Self {
        ChunkMode::Bytes(DEFAULT_CHUNK_SIZE)
    }
}

/// Per-adapter policy for `read_stream` on a nonexistent file. Backends
/// genuinely differ here, so each config fixes its own and the choice is part
/// of the config type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingStreamBehavior {
    /// Yield a stream with zero chunks (snapshot-store behavior).
    #[default]
    EmptyStream,
    /// Fail with `FileNotFound` (raw-disk behavior).
    Fail,
}

/// Lazy chunk source over an immutable content snapshot.
#[derive(Debug, Clone)]
pub struct ReadStream {
    content: Arc<[u8]>,
    mode: ChunkMode,
}

impl ReadStream {
    pub fn new(content: Arc<[u8]>, mode: ChunkMode) -> Self {
        ReadStream { content, mode }
    }

    pub fn empty(mode: ChunkMode) -> Self {
        ReadStream { content: Arc::from(&[][..]), mode }
    }

    pub fn mode(&self) -> ChunkMode {
        self.mode
    }

    /// Total snapshot length in bytes.
    pub fn content_len(&self) -> usize {
        self.content.len()
    }

    /// A fresh iterator from the start; each call restarts.
    pub fn chunks(&self) -> ReadStreamIter {
        ReadStreamIter { content: Arc::clone(&self.content), pos: 0, mode: self.mode }
    }

    /// Number of chunks. Byte mode is pure arithmetic; line mode falls back
    /// to a full traversal.
    pub fn len_chunks(&self) -> usize {
        match self.mode {
            ChunkMode::Bytes(n) => {
                let n = n.max(1);
                self.content.len().div_ceil(n)
            }
            ChunkMode::Lines => self.chunks().count(),
        }
    }

    /// Bounded slice: up to `count` chunks starting at chunk index `start`.
    /// Byte mode slices by index math; line mode re-derives via traversal.
    pub fn slice(&self, start: usize, count: usize) -> Vec<Vec<u8>> {
        match self.mode {
            ChunkMode::Bytes(n) => {
                let n = n.max(1);
                let mut out = Vec::new();
                for idx in start..start.saturating_add(count) {
                    let lo = match idx.checked_mul(n) {
                        Some(lo) if lo < self.content.len() => lo,
                        _ => break,
                    };
                    let hi = (lo + n).min(self.content.len());
                    out.push(self.content[lo..hi].to_vec());
                }
                out
            }
            ChunkMode::Lines => self.chunks().skip(start).take(count).collect(),
        }
    }

    /// Membership: whether any chunk equals `chunk` exactly. Full traversal;
    /// no cheaper path exists for either mode.
    pub fn contains(&self, chunk: &[u8]) -> bool {
        self.chunks().any(|c| c == chunk)
    }
}

impl IntoIterator for ReadStream {
    type Item = Vec<u8>;
    type IntoIter = ReadStreamIter;

    fn into_iter(self) -> ReadStreamIter {
        self.chunks()
    }
}

impl<'a> IntoIterator for &'a ReadStream {
    type Item = Vec<u8>;
    type IntoIter = ReadStreamIter;

    fn into_iter(self) -> ReadStreamIter {
        self.chunks()
    }
}

pub struct ReadStreamIter {
    content: Arc<[u8]>,
    pos: usize,
    mode: ChunkMode,
}

impl Iterator for ReadStreamIter {
    type Item = Vec<u8>;

    fn next(&mut self) -> Option<Vec<u8>> {
        if self.pos >= self.content.len() {
            return None;
        }
        let rest = &self.content[self.pos..];
        let take = match self.mode {
            ChunkMode::Bytes(n) => n.max(1).min(rest.len()),
            ChunkMode::Lines => match rest.iter().position(|&b| b == b'\n') {
                Some(i) => i + 1,
                None => rest.len(),
            },
        };
        let chunk = rest[..take].to_vec();
        self.pos += take;
        Some(chunk)
    }
}

type CommitFn = Box<dyn FnOnce(Vec<u8>) -> FsResult<()> + Send>;

/// Buffered write sink. Nothing touches the store until `commit`; `cancel`
/// or a plain drop discards the buffer.
pub struct WriteStream {
    target: String,
    buf: Vec<u8>,
    commit: Option<CommitFn>,
}

impl WriteStream {
    pub fn new(target: impl Into<String>, commit: CommitFn) -> Self {
        WriteStream { target: target.into(), buf: Vec::new(), commit: Some(commit) }
    }

    /// Path this stream will commit to.
    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn push(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    pub fn buffered_len(&self) -> usize {
        self.buf.len()
    }

    /// One atomic replace-write of everything pushed so far. Concurrent
    /// streams to the same path are not synchronized beyond this single
    /// commit: last writer wins.
    pub fn commit(mut self) -> FsResult<()> {
        let buf = std::mem::take(&mut self.buf);
        match self.commit.take() {
            Some(commit) => commit(buf),
            None => Ok(()),
        }
    }

    /// Explicit halt: discard the buffer, write nothing.
    pub fn cancel(mut self) {
        self.commit.take();
        self.buf.clear();
        tracing::debug!(target = %self.target, "write stream cancelled, buffer discarded");
    }
}

impl Drop for WriteStream {
    fn drop(&mut self) {
        if self.commit.is_some() {
            tracing::debug!(target = %self.target, "write stream dropped uncommitted");
        }
    }
}
