//! # alder-store
//! Persistent chunk storage backed by RocksDB.
//!
//! Implements the [`alder_core::store::KvStore`] interface over a RocksDB
//! database so the tree-chunk engine can load and save chunk blobs across
//! process restarts.

pub mod storage;

pub use storage::RocksKvStore;
