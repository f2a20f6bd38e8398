//! Criterion benchmarks for the tree-chunk engine.
//!
//! Covers: encode, decode, and the six-layer root collapse on dense and
//! sparse chunks.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use alder_core::chunk::Chunk;
use alder_core::constants::CHUNK_WIDTH;
use alder_core::slot::Slot;
use alder_core::types::{Digest, F};
use plonky2::field::types::Field;
use primitive_types::U256;

fn key(n: u64) -> Digest {
    Digest([F::from_canonical_u64(n), F::ZERO, F::ZERO, F::ZERO])
}

/// All 64 slots occupied by leaves: the encoder and collapser worst case.
fn dense_chunk() -> Chunk {
    let mut chunk = Chunk::new(0).unwrap();
    chunk.reset_to_zero();
    for i in 0..CHUNK_WIDTH {
        chunk
            .mutate_slot(i, Slot::leaf(key(i as u64 + 1), U256::from(i as u64)))
            .unwrap();
    }
    chunk
}

/// A single leaf: the sparse fast path with almost no hashing.
fn sparse_chunk() -> Chunk {
    let mut chunk = Chunk::new(0).unwrap();
    chunk.reset_to_zero();
    chunk.mutate_slot(0, Slot::leaf(key(1), U256::one())).unwrap();
    chunk
}

fn bench_encode(c: &mut Criterion) {
    c.bench_function("encode_dense", |b| {
        b.iter_with_setup(dense_chunk, |mut chunk| {
            chunk.encode().unwrap();
            black_box(chunk.data().len())
        })
    });
}

fn bench_decode(c: &mut Criterion) {
    let mut chunk = dense_chunk();
    chunk.encode().unwrap();
    let blob = chunk.data().to_vec();

    c.bench_function("decode_dense", |b| {
        b.iter_with_setup(
            || Chunk::from_data(0, blob.clone()).unwrap(),
            |mut chunk| {
                chunk.decode().unwrap();
                black_box(chunk.non_zero_child_count())
            },
        )
    });
}

fn bench_compute_root(c: &mut Criterion) {
    c.bench_function("compute_root_dense", |b| {
        b.iter_with_setup(dense_chunk, |mut chunk| black_box(chunk.digest().unwrap()))
    });

    c.bench_function("compute_root_sparse", |b| {
        b.iter_with_setup(sparse_chunk, |mut chunk| black_box(chunk.digest().unwrap()))
    });
}

criterion_group!(benches, bench_encode, bench_decode, bench_compute_root);
criterion_main!(benches);
