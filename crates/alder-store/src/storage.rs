//! RocksDB-backed chunk blob storage.
//!
//! Implements [`KvStore`] using RocksDB column families for chunk blobs and
//! metadata. Blobs are keyed by the digest hex string; the metadata column
//! family tracks the latest committed root so a restarted process knows
//! where to resume.
//!
//! On first open, creates the database and all column families.

use std::path::Path;

use rocksdb::{ColumnFamilyDescriptor, Options, DB};
use tracing::debug;

use alder_core::error::StoreError;
use alder_core::store::KvStore;
use alder_core::types::Digest;

// --- Column family names ---

const CF_CHUNKS: &str = "chunks";
const CF_METADATA: &str = "metadata";

/// All column family names.
const ALL_CFS: &[&str] = &[CF_CHUNKS, CF_METADATA];

// --- Metadata keys ---

const META_LATEST_ROOT: &[u8] = b"latest_root";

/// RocksDB-backed persistent chunk storage.
///
/// Stores encoded chunk blobs keyed by digest hex string, plus the latest
/// committed root digest in a separate metadata column family.
pub struct RocksKvStore {
    db: DB,
}

impl RocksKvStore {
    /// Open or create a RocksDB database at the given path.
    ///
    /// Creates all column families if they don't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        let cf_descriptors: Vec<ColumnFamilyDescriptor> = ALL_CFS
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()))
            .collect();

        let db = DB::open_cf_descriptors(&db_opts, path.as_ref(), cf_descriptors)
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        debug!(path = %path.as_ref().display(), "opened chunk store");

        Ok(Self { db })
    }

    /// Record the latest committed root digest.
    pub fn set_latest_root(&self, root: &Digest) -> Result<(), StoreError> {
        let cf = self.cf_handle(CF_METADATA)?;
        self.db
            .put_cf(cf, META_LATEST_ROOT, root.to_bytes())
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    /// The latest committed root digest, if one has been recorded.
    pub fn latest_root(&self) -> Result<Option<Digest>, StoreError> {
        let cf = self.cf_handle(CF_METADATA)?;
        match self
            .db
            .get_cf(cf, META_LATEST_ROOT)
            .map_err(|e| StoreError::Backend(e.to_string()))?
        {
            Some(bytes) if bytes.len() == 32 => {
                Ok(Some(Digest::from_bytes(bytes[..].try_into().unwrap())))
            }
            Some(_) => Err(StoreError::Backend("invalid latest-root length".into())),
            None => Ok(None),
        }
    }

    /// Flush all in-memory buffers to disk.
    pub fn flush(&self) -> Result<(), StoreError> {
        self.db
            .flush()
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    // --- Internal helpers ---

    /// Get a column family handle.
    fn cf_handle(&self, name: &str) -> Result<&rocksdb::ColumnFamily, StoreError> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Backend(format!("missing column family: {name}")))
    }
}

impl KvStore for RocksKvStore {
    fn read(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let cf = self.cf_handle(CF_CHUNKS)?;
        match self
            .db
            .get_cf(cf, key.as_bytes())
            .map_err(|e| StoreError::Backend(e.to_string()))?
        {
            Some(bytes) => Ok(bytes),
            None => Err(StoreError::NotFound(key.to_string())),
        }
    }

    fn write(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        let cf = self.cf_handle(CF_CHUNKS)?;
        self.db
            .put_cf(cf, key.as_bytes(), bytes)
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        debug!(key, size = bytes.len(), "stored chunk blob");
        Ok(())
    }
}
