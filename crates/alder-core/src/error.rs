//! Error types for the Alder tree-chunk engine.
//!
//! Only recoverable conditions are modelled here. Programmer bugs (calling a
//! derived operation on a chunk with no valid representation, or an
//! unspecified slot reaching the hash collapse) terminate the process with a
//! panic instead of returning an error.
use thiserror::Error;

/// Errors surfaced by the key-value store a chunk is loaded from or saved to.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("key not found: {0}")] NotFound(String),
    #[error("storage backend: {0}")] Backend(String),
}

/// Errors surfaced by chunk operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChunkError {
    #[error("malformed chunk: {0}")] Malformed(String),
    #[error("encoded chunk would exceed {max} bytes")] CapacityExceeded { max: usize },
    #[error("chunk level {0} is not a multiple of 6")] InvalidLevel(u64),
    #[error(transparent)] Store(#[from] StoreError),
}
