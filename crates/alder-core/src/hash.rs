//! Poseidon hashing for tree nodes and leaves.
//!
//! Uses domain-separated hashing to prevent cross-kind collisions:
//! - Intermediate node: width-12 sponge over `left || right` with the four
//!   capacity elements set to [`NODE_FLAG`].
//! - Leaf finalized at binary depth `d`: sponge over `key || value` with the
//!   capacity set to `1 + d`.
//!
//! The two flag families never overlap, so a leaf digest can never equal an
//! intermediate digest for the same 8 input elements, and the same (key,
//! value) pair hashes differently at every depth.

use plonky2::field::types::Field;
use plonky2::hash::hash_types::NUM_HASH_OUT_ELTS;
use plonky2::hash::hashing::PlonkyPermutation;
use plonky2::hash::poseidon::PoseidonPermutation;
use primitive_types::U256;

use crate::types::{value_to_fields, Digest, F};

/// Capacity flag for intermediate-node hashes.
const NODE_FLAG: u64 = 0;

/// Capacity flag for a leaf finalized at binary depth `level`.
fn leaf_marker(level: u64) -> F {
    F::from_canonical_u64(1 + level)
}

/// One sponge call: absorb two 4-element halves at rate positions 0..8 with
/// the whole state pre-filled from `flag`, permute once, squeeze a digest.
fn hash_pair(flag: F, left: &[F; 4], right: &[F; 4]) -> Digest {
    let mut perm = PoseidonPermutation::<F>::new(core::iter::repeat(flag));
    perm.set_from_slice(left, 0);
    perm.set_from_slice(right, 4);
    perm.permute();

    let mut out = [F::ZERO; 4];
    out.copy_from_slice(&perm.squeeze()[..NUM_HASH_OUT_ELTS]);
    Digest(out)
}

/// Hash two child digests into their parent's digest.
pub fn node_hash(left: &Digest, right: &Digest) -> Digest {
    hash_pair(F::from_canonical_u64(NODE_FLAG), &left.0, &right.0)
}

/// Hash a leaf finalized at binary depth `level`.
pub fn leaf_hash(key: &Digest, value: &U256, level: u64) -> Digest {
    hash_pair(leaf_marker(level), &key.0, &value_to_fields(value))
}
