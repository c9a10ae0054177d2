//! Capacity-bounded buffering in front of an [`IssueStore`].
//!
//! The buffer is either accumulating or ready to flush. It becomes ready
//! when it reaches its capacity, or when the caller reports that the source
//! is exhausted while issues are still buffered. Peak memory is therefore
//! one chunk, and the final partial chunk is never dropped.

use tracing::debug;

use crate::error::DigestError;
use crate::models::Issue;
use crate::store::IssueStore;

/// Default number of issues per flush.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Flush guard state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferState {
    Accumulating,
    ReadyToFlush,
}

/// Buffers issues and writes them to a store one chunk at a time.
pub struct BatchPersister<'a> {
    store: &'a dyn IssueStore,
    project: &'a str,
    capacity: usize,
    buffer: Vec<Issue>,
    flushes: usize,
    persisted: usize,
    peak: usize,
}

impl<'a> BatchPersister<'a> {
    /// A capacity of zero is treated as one.
    pub fn new(store: &'a dyn IssueStore, project: &'a str, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            store,
            project,
            capacity,
            buffer: Vec::with_capacity(capacity),
            flushes: 0,
            persisted: 0,
            peak: 0,
        }
    }

    /// Buffer one issue. Fails if the buffer is already full.
    pub fn append(&mut self, issue: Issue) -> Result<(), DigestError> {
        if self.buffer.len() >= self.capacity {
            return Err(DigestError::BufferOverflow {
                capacity: self.capacity,
            });
        }
        self.buffer.push(issue);
        self.peak = self.peak.max(self.buffer.len());
        Ok(())
    }

    pub fn state(&self, source_exhausted: bool) -> BufferState {
        if self.buffer.len() >= self.capacity || (source_exhausted && !self.buffer.is_empty()) {
            BufferState::ReadyToFlush
        } else {
            BufferState::Accumulating
        }
    }

    pub fn should_flush(&self, source_exhausted: bool) -> bool {
        self.state(source_exhausted) == BufferState::ReadyToFlush
    }

    /// Write the buffer as one `save` call, then clear it.
    ///
    /// On failure the buffer is left untouched so the same chunk can be
    /// retried. Returns the number of issues written; an empty buffer is a
    /// no-op.
    pub async fn flush(&mut self) -> Result<usize, DigestError> {
        if self.buffer.is_empty() {
            return Ok(0);
        }

        let pending = self.buffer.len();
        self.store
            .save(self.project, &self.buffer)
            .await
            .map_err(|source| DigestError::StorageWrite { pending, source })?;

        self.buffer.clear();
        self.flushes += 1;
        self.persisted += pending;
        debug!(
            project = self.project,
            chunk = self.flushes,
            issues = pending,
            "flushed issue chunk"
        );
        Ok(pending)
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of successful flushes.
    pub fn flushes(&self) -> usize {
        self.flushes
    }

    /// Number of issues written by successful flushes.
    pub fn persisted(&self) -> usize {
        self.persisted
    }

    /// Highest number of issues ever buffered at once.
    pub fn peak(&self) -> usize {
        self.peak
    }
}
