//! Typed slots of a tree chunk.
//!
//! Each of the 64 child positions of a chunk, and every node on the
//! collapsed layers above them, is a [`Slot`]. Slots stay immutable through
//! the hash collapse: finalizing a leaf produces a new copy carrying the
//! memoized depth and digest, the original is never written back.

use primitive_types::U256;

use crate::hash::leaf_hash;
use crate::types::Digest;

/// A key-value leaf.
///
/// The key has the same 4-field-element shape as a digest. `memo` holds the
/// binary depth the leaf was finalized at together with its digest at that
/// depth; it is populated during the hash collapse and absent on leaves that
/// were just decoded or inserted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LeafSlot {
    pub key: Digest,
    pub value: U256,
    memo: Option<(u64, Digest)>,
}

impl LeafSlot {
    /// A fresh, unfinalized leaf.
    pub fn new(key: Digest, value: U256) -> Self {
        Self {
            key,
            value,
            memo: None,
        }
    }

    /// Binary depth this leaf was finalized at, if any.
    pub fn level(&self) -> Option<u64> {
        self.memo.map(|(level, _)| level)
    }

    /// Memoized digest, present once the leaf has been finalized.
    pub fn digest(&self) -> Option<Digest> {
        self.memo.map(|(_, digest)| digest)
    }

    /// A copy of this leaf finalized at `level`, plus its digest there.
    pub(crate) fn finalized_at(&self, level: u64) -> (LeafSlot, Digest) {
        let digest = leaf_hash(&self.key, &self.value, level);
        (
            Self {
                key: self.key,
                value: self.value,
                memo: Some((level, digest)),
            },
            digest,
        )
    }
}

/// A sub-tree summarized by its precomputed digest.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IntermediateSlot {
    pub digest: Digest,
}

/// One child position of a chunk, or a node on a collapsed layer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Slot {
    /// Uninitialized placeholder. Legal on collapsed layers before a collapse
    /// pass; a bug if it reaches encoding or hashing of the 64-slot layer.
    #[default]
    Unspecified,
    /// Empty sub-tree.
    Zero,
    /// Key-value leaf.
    Leaf(LeafSlot),
    /// Sub-tree with a precomputed digest.
    Intermediate(IntermediateSlot),
}

impl Slot {
    /// A fresh leaf slot.
    pub fn leaf(key: Digest, value: U256) -> Self {
        Self::Leaf(LeafSlot::new(key, value))
    }

    /// An intermediate slot carrying `digest`.
    pub fn intermediate(digest: Digest) -> Self {
        Self::Intermediate(IntermediateSlot { digest })
    }

    /// Check if this slot is the empty sub-tree.
    pub fn is_zero(&self) -> bool {
        matches!(self, Self::Zero)
    }

    /// Single-letter tag for diagnostic dumps.
    pub(crate) fn type_letter(&self) -> char {
        match self {
            Self::Unspecified => 'U',
            Self::Zero => 'Z',
            Self::Leaf(_) => 'L',
            Self::Intermediate(_) => 'I',
        }
    }
}
