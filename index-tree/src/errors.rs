//! Error types shared by the tree, its node stores and the shared facade.

use std::io;
use thiserror::Error;

/// Errors that can occur in index tree operations
#[derive(Debug, Error)]
pub enum TreeError {
    /// Malformed input rejected at the API boundary (bad envelope,
    /// dimension mismatch, non-finite coordinate, invalid configuration).
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The node store is structurally broken: missing node, record out of
    /// range, truncated or corrupted record, record larger than a page.
    #[error("Store index error: {0}")]
    StoreIndex(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Tree is closed")]
    Closed,
}

impl TreeError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        TreeError::InvalidArgument(msg.into())
    }

    pub(crate) fn store(msg: impl Into<String>) -> Self {
        TreeError::StoreIndex(msg.into())
    }

    /// Returns true for failures originating in the backing store.
    pub fn is_store_failure(&self) -> bool {
        matches!(self, TreeError::StoreIndex(_) | TreeError::Io(_))
    }
}

/// Result type for index tree operations
pub type TreeResult<T> = Result<T, TreeError>;
