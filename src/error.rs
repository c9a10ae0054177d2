//! Error taxonomy for the digest pipeline.
//!
//! Every failure that aborts a digest is one of these variants. Parsing of
//! optional issue fields never produces an error; malformed optional values
//! degrade to "unset" inside the enricher instead.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors raised while digesting a report.
#[derive(Error, Debug)]
pub enum DigestError {
    /// A report file is missing, unreadable, or the read failed mid-way.
    #[error("failed to read {}: {source}", .path.display())]
    ResourceRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Decoded content does not match the expected schema.
    #[error("malformed report file {}: {reason}", .path.display())]
    Format { path: PathBuf, reason: String },

    /// The storage sink rejected a flush. The pending buffer is kept.
    #[error("failed to persist {pending} issues: {source}")]
    StorageWrite {
        pending: usize,
        #[source]
        source: anyhow::Error,
    },

    /// An issue was appended to a buffer that is already full.
    #[error("persistence buffer is full ({capacity} issues); flush before appending")]
    BufferOverflow { capacity: usize },
}

impl DigestError {
    pub(crate) fn read(path: &Path, source: std::io::Error) -> Self {
        DigestError::ResourceRead {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn format(path: &Path, reason: impl Into<String>) -> Self {
        DigestError::Format {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }

    /// Short machine-friendly name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            DigestError::ResourceRead { .. } => "resource_read",
            DigestError::Format { .. } => "format",
            DigestError::StorageWrite { .. } => "storage_write",
            DigestError::BufferOverflow { .. } => "buffer_overflow",
        }
    }
}
