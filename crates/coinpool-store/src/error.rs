use std::io;

use coinpool_types::Digest;

use crate::batch::BatchReport;

/// Errors from single-entry store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The payload failed validation (empty when disallowed, or oversized).
    #[error("invalid payload: {reason}")]
    InvalidPayload { reason: String },

    /// An entry with this digest is already present. Remove it first.
    #[error("duplicate key: {0}")]
    DuplicateKey(Digest),

    /// Eviction could not bring the store back under capacity.
    ///
    /// The insert that triggered eviction remains applied.
    #[error("capacity exhausted after inserting {id}: {total_bytes} bytes held, capacity {capacity}")]
    CapacityExhausted {
        id: Digest,
        total_bytes: u64,
        capacity: u64,
    },
}

impl StoreError {
    pub(crate) fn invalid_payload(reason: impl Into<String>) -> Self {
        Self::InvalidPayload {
            reason: reason.into(),
        }
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors from [`BatchCoordinator::commit`](crate::BatchCoordinator::commit).
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    /// An operation in the batch was invalid; nothing was applied.
    #[error("batch rejected at op {index}: {reason}")]
    Rejected { index: usize, reason: String },

    /// The batch was applied but eviction could not reach capacity.
    #[error("capacity exhausted after batch: {} bytes held, capacity {capacity}", .report.total_bytes_after)]
    CapacityExhausted {
        report: Box<BatchReport>,
        capacity: u64,
    },
}

/// Errors from loading a [`StoreConfig`](crate::StoreConfig).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),
}
