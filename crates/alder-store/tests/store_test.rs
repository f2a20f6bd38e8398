//! End-to-end tests for RocksDB-backed chunk storage.

use alder_core::chunk::Chunk;
use alder_core::error::StoreError;
use alder_core::slot::Slot;
use alder_core::store::KvStore;
use alder_core::types::{Digest, F};
use alder_store::RocksKvStore;
use plonky2::field::types::Field;
use primitive_types::U256;

fn key(n: u64) -> Digest {
    Digest([F::from_canonical_u64(n), F::ZERO, F::ZERO, F::ZERO])
}

fn sample_chunk(level: u64) -> Chunk {
    let mut chunk = Chunk::new(level).unwrap();
    chunk.reset_to_zero();
    chunk
        .mutate_slot(0, Slot::leaf(key(1), U256::from(100u64)))
        .unwrap();
    chunk.mutate_slot(31, Slot::intermediate(key(2))).unwrap();
    chunk
        .mutate_slot(63, Slot::leaf(key(3), U256::from(300u64)))
        .unwrap();
    chunk
}

#[test]
fn save_reload_recompute() {
    let dir = tempfile::tempdir().unwrap();
    let store = RocksKvStore::open(dir.path().join("chunkdata")).unwrap();

    let mut chunk = sample_chunk(0);
    let digest = chunk.save_to_store(&store).unwrap();

    let mut loaded = Chunk::new(0).unwrap();
    loaded.load_from_store(&store, &digest).unwrap();
    loaded.decode().unwrap();
    assert_eq!(loaded.slots(), chunk.slots());

    // Recomputing from the decoded slots reproduces the stored digest.
    loaded.compute_root().unwrap();
    assert_eq!(loaded.digest().unwrap(), digest);
}

#[test]
fn blobs_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chunkdata");

    let mut chunk = sample_chunk(6);
    let digest;
    {
        let store = RocksKvStore::open(&path).unwrap();
        digest = chunk.save_to_store(&store).unwrap();
        store.set_latest_root(&digest).unwrap();
        store.flush().unwrap();
    }

    let store = RocksKvStore::open(&path).unwrap();
    assert_eq!(store.latest_root().unwrap(), Some(digest));

    let mut loaded = Chunk::new(6).unwrap();
    loaded.load_from_store(&store, &digest).unwrap();
    assert_eq!(loaded.data(), chunk.data());
}

#[test]
fn read_missing_key_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let store = RocksKvStore::open(dir.path().join("chunkdata")).unwrap();

    let missing = key(99).to_string();
    assert_eq!(store.read(&missing), Err(StoreError::NotFound(missing.clone())));
}

#[test]
fn latest_root_starts_empty() {
    let dir = tempfile::tempdir().unwrap();
    let store = RocksKvStore::open(dir.path().join("chunkdata")).unwrap();
    assert_eq!(store.latest_root().unwrap(), None);
}

#[test]
fn write_is_idempotent_per_digest() {
    let dir = tempfile::tempdir().unwrap();
    let store = RocksKvStore::open(dir.path().join("chunkdata")).unwrap();

    let mut chunk = sample_chunk(0);
    let first = chunk.save_to_store(&store).unwrap();
    let second = chunk.save_to_store(&store).unwrap();
    assert_eq!(first, second);
    assert_eq!(store.read(&first.to_string()).unwrap(), chunk.data());
}
