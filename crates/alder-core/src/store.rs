//! Chunk blob storage interface and in-memory implementation.
//!
//! Provides the [`KvStore`] trait chunks are loaded from and saved to. Keys
//! are the canonical digest hex strings (see [`crate::types::Digest`]'s
//! `Display`). The [`MemoryKvStore`] is suitable for testing; production
//! uses RocksDB (alder-store).

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::error::StoreError;

/// Key-value storage for encoded chunk blobs.
///
/// Implementations must be safe for shared use across threads; per-chunk
/// serialization is the caller's responsibility.
pub trait KvStore: Send + Sync {
    /// Read the blob stored under `key`.
    ///
    /// # Errors
    ///
    /// - [`StoreError::NotFound`] if the key has never been written
    /// - [`StoreError::Backend`] on transport or backend failure
    fn read(&self, key: &str) -> Result<Vec<u8>, StoreError>;

    /// Store `bytes` under `key`, overwriting any previous blob.
    fn write(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError>;
}

/// In-memory [`KvStore`] backed by a `HashMap`.
#[derive(Default)]
pub struct MemoryKvStore {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blobs.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KvStore for MemoryKvStore {
    fn read(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        self.entries
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    fn write(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        self.entries
            .write()
            .insert(key.to_string(), bytes.to_vec());
        Ok(())
    }
}
