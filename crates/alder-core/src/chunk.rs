//! The 64-slot tree-chunk engine.
//!
//! A chunk covers six binary levels of the sparse Merkle state tree and
//! holds three redundant representations of its content, each guarded by a
//! validity flag:
//!
//! - `data`: the canonical byte serialization (`data_valid`)
//! - `children64`: the 64 typed slots (`children64_valid`)
//! - the five collapsed layers plus `child1` (`children_rest_valid`)
//!
//! plus the chunk's root digest behind `hash_valid`. At least one of `data`
//! and `children64` must be valid before any derived operation; mutation
//! goes through [`Chunk::mutate_slot`], which invalidates everything derived
//! from the slots.
//!
//! On the wire a chunk opens with two little-endian `u64` bitmaps, `is_zero`
//! and `is_leaf`, followed by the records of the non-zero slots in ascending
//! slot order: 32-byte key plus 32-byte value for a leaf, a 32-byte digest
//! for an intermediate. If both bitmap bits are set for a slot, `is_zero`
//! wins.

use tracing::{debug, error};

use crate::constants::{
    CHUNK_HEADER_BYTES, CHUNK_WIDTH, INTERMEDIATE_RECORD_BYTES, LEAF_RECORD_BYTES,
    LEVELS_PER_CHUNK, MAX_CHUNK_BYTES,
};
use crate::error::ChunkError;
use crate::hash::node_hash;
use crate::slot::{IntermediateSlot, LeafSlot, Slot};
use crate::store::KvStore;
use crate::types::{value_from_bytes, value_to_bytes, Digest};

/// A 64-slot chunk of the sparse Merkle state tree.
pub struct Chunk {
    /// Binary depth of the chunk's root in the whole tree; always a
    /// multiple of [`LEVELS_PER_CHUNK`] for a well-formed chunk.
    level: u64,

    hash: Digest,
    hash_valid: bool,

    data: Vec<u8>,
    data_valid: bool,

    children64: [Slot; CHUNK_WIDTH],
    children64_valid: bool,

    children32: [Slot; 32],
    children16: [Slot; 16],
    children8: [Slot; 8],
    children4: [Slot; 4],
    children2: [Slot; 2],
    child1: Slot,
    children_rest_valid: bool,
}

impl Chunk {
    /// An empty chunk at `level`: no representation is valid yet.
    ///
    /// # Errors
    ///
    /// [`ChunkError::InvalidLevel`] unless `level` is a multiple of 6.
    pub fn new(level: u64) -> Result<Self, ChunkError> {
        if level % LEVELS_PER_CHUNK != 0 {
            error!(level, "chunk level is not a multiple of 6");
            return Err(ChunkError::InvalidLevel(level));
        }
        Ok(Self {
            level,
            hash: Digest::ZERO,
            hash_valid: false,
            data: Vec::new(),
            data_valid: false,
            children64: [Slot::Unspecified; CHUNK_WIDTH],
            children64_valid: false,
            children32: [Slot::Unspecified; 32],
            children16: [Slot::Unspecified; 16],
            children8: [Slot::Unspecified; 8],
            children4: [Slot::Unspecified; 4],
            children2: [Slot::Unspecified; 2],
            child1: Slot::Unspecified,
            children_rest_valid: false,
        })
    }

    /// A chunk whose canonical bytes were loaded by the caller.
    ///
    /// # Errors
    ///
    /// [`ChunkError::InvalidLevel`] unless `level` is a multiple of 6.
    pub fn from_data(level: u64, data: Vec<u8>) -> Result<Self, ChunkError> {
        let mut chunk = Self::new(level)?;
        chunk.data = data;
        chunk.data_valid = true;
        Ok(chunk)
    }

    /// Make this chunk the all-zero sub-tree: every slot [`Slot::Zero`],
    /// everything derived invalidated.
    pub fn reset_to_zero(&mut self) {
        self.children64 = [Slot::Zero; CHUNK_WIDTH];
        self.children64_valid = true;
        self.data_valid = false;
        self.hash_valid = false;
        self.children_rest_valid = false;
    }

    pub fn level(&self) -> u64 {
        self.level
    }

    /// The canonical byte serialization; meaningful only while
    /// [`data_valid`](Self::data_valid) holds.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// The 64 child slots; meaningful only while
    /// [`children64_valid`](Self::children64_valid) holds.
    pub fn slots(&self) -> &[Slot; CHUNK_WIDTH] {
        &self.children64
    }

    pub fn slot(&self, index: usize) -> &Slot {
        &self.children64[index]
    }

    pub fn data_valid(&self) -> bool {
        self.data_valid
    }

    pub fn children64_valid(&self) -> bool {
        self.children64_valid
    }

    pub fn children_rest_valid(&self) -> bool {
        self.children_rest_valid
    }

    pub fn hash_valid(&self) -> bool {
        self.hash_valid
    }

    /// Read this chunk's blob from `kv` under `hash`'s hex string.
    ///
    /// Adopts `hash` as the chunk's root digest and drops both slot
    /// representations; on success the raw bytes become the only valid
    /// content representation.
    pub fn load_from_store(&mut self, kv: &dyn KvStore, hash: &Digest) -> Result<(), ChunkError> {
        self.hash = *hash;
        self.hash_valid = true;
        self.children64_valid = false;
        self.children_rest_valid = false;

        let key = hash.to_string();
        match kv.read(&key) {
            Ok(bytes) => {
                debug!(key = %key, size = bytes.len(), "loaded chunk blob");
                self.data = bytes;
                self.data_valid = true;
                Ok(())
            }
            Err(err) => {
                error!(key = %key, %err, "failed to read chunk blob");
                self.data_valid = false;
                Err(err.into())
            }
        }
    }

    /// Write this chunk's blob to `kv` under its root digest, encoding and
    /// collapsing first as needed. Returns the digest the blob was stored
    /// under.
    pub fn save_to_store(&mut self, kv: &dyn KvStore) -> Result<Digest, ChunkError> {
        self.encode()?;
        let digest = self.digest()?;
        kv.write(&digest.to_string(), &self.data)?;
        debug!(key = %digest, size = self.data.len(), "stored chunk blob");
        Ok(digest)
    }

    /// Parse `data` into the 64 slots. Idempotent while the slots are valid.
    ///
    /// On error the slot representation is left untouched.
    pub fn decode(&mut self) -> Result<(), ChunkError> {
        if self.children64_valid {
            return Ok(());
        }
        assert!(
            self.data_valid,
            "chunk has no valid representation: decode() requires data"
        );

        let data = &self.data;
        if data.len() < CHUNK_HEADER_BYTES {
            error!(size = data.len(), "chunk blob shorter than its bitmap header");
            return Err(ChunkError::Malformed(format!(
                "blob of {} bytes is shorter than the {CHUNK_HEADER_BYTES}-byte header",
                data.len()
            )));
        }
        let is_zero = u64::from_le_bytes(data[0..8].try_into().unwrap());
        let is_leaf = u64::from_le_bytes(data[8..16].try_into().unwrap());

        let mut slots = [Slot::Zero; CHUNK_WIDTH];
        let mut offset = CHUNK_HEADER_BYTES;
        for (i, slot) in slots.iter_mut().enumerate() {
            let mask = 1u64 << i;
            if is_zero & mask != 0 {
                *slot = Slot::Zero;
            } else if is_leaf & mask != 0 {
                if data.len() - offset < LEAF_RECORD_BYTES {
                    error!(slot = i, offset, size = data.len(), "chunk blob truncated");
                    return Err(ChunkError::Malformed(format!(
                        "leaf record for slot {i} reads past the end ({offset} of {} bytes consumed)",
                        data.len()
                    )));
                }
                let key = Digest::from_bytes(data[offset..offset + 32].try_into().unwrap());
                let value = value_from_bytes(&data[offset + 32..offset + 64]);
                *slot = Slot::Leaf(LeafSlot::new(key, value));
                offset += LEAF_RECORD_BYTES;
            } else {
                if data.len() - offset < INTERMEDIATE_RECORD_BYTES {
                    error!(slot = i, offset, size = data.len(), "chunk blob truncated");
                    return Err(ChunkError::Malformed(format!(
                        "intermediate record for slot {i} reads past the end ({offset} of {} bytes consumed)",
                        data.len()
                    )));
                }
                let digest = Digest::from_bytes(data[offset..offset + 32].try_into().unwrap());
                *slot = Slot::Intermediate(IntermediateSlot { digest });
                offset += INTERMEDIATE_RECORD_BYTES;
            }
        }

        self.children64 = slots;
        self.children64_valid = true;
        Ok(())
    }

    /// Serialize the 64 slots into the canonical byte form. Idempotent while
    /// the data is valid.
    ///
    /// On error the data representation is left untouched.
    pub fn encode(&mut self) -> Result<(), ChunkError> {
        if self.data_valid {
            return Ok(());
        }
        assert!(
            self.children64_valid,
            "chunk has no valid representation: encode() requires slots"
        );

        let mut is_zero = 0u64;
        let mut is_leaf = 0u64;
        let mut buf = Vec::with_capacity(MAX_CHUNK_BYTES);
        buf.extend_from_slice(&[0u8; CHUNK_HEADER_BYTES]);

        for (i, slot) in self.children64.iter().enumerate() {
            let mask = 1u64 << i;
            match slot {
                Slot::Zero => is_zero |= mask,
                Slot::Leaf(leaf) => {
                    is_leaf |= mask;
                    if MAX_CHUNK_BYTES - buf.len() < LEAF_RECORD_BYTES {
                        error!(slot = i, size = buf.len(), "encoded chunk exceeds capacity");
                        return Err(ChunkError::CapacityExceeded { max: MAX_CHUNK_BYTES });
                    }
                    buf.extend_from_slice(&leaf.key.to_bytes());
                    buf.extend_from_slice(&value_to_bytes(&leaf.value));
                }
                Slot::Intermediate(node) => {
                    if MAX_CHUNK_BYTES - buf.len() < INTERMEDIATE_RECORD_BYTES {
                        error!(slot = i, size = buf.len(), "encoded chunk exceeds capacity");
                        return Err(ChunkError::CapacityExceeded { max: MAX_CHUNK_BYTES });
                    }
                    buf.extend_from_slice(&node.digest.to_bytes());
                }
                Slot::Unspecified => {
                    panic!("unspecified slot {i} in the 64-slot layer during encode")
                }
            }
        }

        buf[0..8].copy_from_slice(&is_zero.to_le_bytes());
        buf[8..16].copy_from_slice(&is_leaf.to_le_bytes());

        self.data = buf;
        self.data_valid = true;
        Ok(())
    }

    /// Collapse the 64 slots through six binary layers into the chunk's root
    /// digest, populating the intermediate layers on the way. Idempotent
    /// while both the hash and the collapsed layers are valid.
    pub fn compute_root(&mut self) -> Result<(), ChunkError> {
        if self.hash_valid && self.children_rest_valid {
            return Ok(());
        }
        self.children_rest_valid = false;

        if self.level % LEVELS_PER_CHUNK != 0 {
            error!(level = self.level, "chunk level is not a multiple of 6");
            return Err(ChunkError::InvalidLevel(self.level));
        }

        if !self.children64_valid {
            assert!(
                self.data_valid,
                "chunk has no valid representation: compute_root() requires slots or data"
            );
            self.decode()?;
        }

        Self::collapse_layer(self.level + 5, &self.children64, &mut self.children32);
        Self::collapse_layer(self.level + 4, &self.children32, &mut self.children16);
        Self::collapse_layer(self.level + 3, &self.children16, &mut self.children8);
        Self::collapse_layer(self.level + 2, &self.children8, &mut self.children4);
        Self::collapse_layer(self.level + 1, &self.children4, &mut self.children2);
        Self::collapse_layer(self.level, &self.children2, std::slice::from_mut(&mut self.child1));

        let top = self.child1;
        self.hash = match top {
            Slot::Zero => Digest::ZERO,
            Slot::Leaf(leaf) => match leaf.digest() {
                Some(digest) => digest,
                None => {
                    // A leaf that crossed every layer unpaired settles at the
                    // chunk's own depth.
                    let (finalized, digest) = leaf.finalized_at(self.level);
                    self.child1 = Slot::Leaf(finalized);
                    digest
                }
            },
            Slot::Intermediate(node) => node.digest,
            Slot::Unspecified => panic!("collapse produced an unspecified root slot"),
        };
        self.hash_valid = true;
        self.children_rest_valid = true;
        Ok(())
    }

    /// The chunk's root digest, collapsing first if it is not memoized.
    pub fn digest(&mut self) -> Result<Digest, ChunkError> {
        if !self.hash_valid {
            self.compute_root()?;
        }
        Ok(self.hash)
    }

    /// Replace the slot at `index`, invalidating everything derived from the
    /// slots. On a chunk that only carries bytes the slots are decoded
    /// first; on a chunk with no representation at all the slots start as
    /// the empty sub-tree.
    pub fn mutate_slot(&mut self, index: usize, slot: Slot) -> Result<(), ChunkError> {
        if !self.children64_valid {
            if self.data_valid {
                self.decode()?;
            } else {
                self.children64 = [Slot::Zero; CHUNK_WIDTH];
                self.children64_valid = true;
            }
        }
        self.children64[index] = slot;
        self.data_valid = false;
        self.hash_valid = false;
        self.children_rest_valid = false;
        Ok(())
    }

    /// Count the non-zero slots, preferring the `is_zero` bitmap of the
    /// encoded form over a slot scan.
    pub fn non_zero_child_count(&self) -> usize {
        if self.data_valid {
            let is_zero = u64::from_le_bytes(self.data[0..8].try_into().unwrap());
            CHUNK_WIDTH - is_zero.count_ones() as usize
        } else if self.children64_valid {
            self.children64.iter().filter(|slot| !slot.is_zero()).count()
        } else {
            panic!("chunk has no valid representation: non_zero_child_count() requires slots or data");
        }
    }

    /// Human-readable description of the chunk: level, digest, per-layer
    /// slot letters, per-slot details. Pure inspection, consumes no flags.
    pub fn dump(&self) -> String {
        use std::fmt::Write as _;

        let mut out = String::new();
        let _ = writeln!(out, "chunk level={}", self.level);
        let _ = writeln!(out, "  hash_valid={}", self.hash_valid);
        if self.hash_valid {
            let _ = writeln!(out, "  hash={}", self.hash);
        }
        let _ = writeln!(out, "  children_rest_valid={}", self.children_rest_valid);
        Self::dump_layer(&mut out, "child1", std::slice::from_ref(&self.child1));
        Self::dump_layer(&mut out, "children2", &self.children2);
        Self::dump_layer(&mut out, "children4", &self.children4);
        Self::dump_layer(&mut out, "children8", &self.children8);
        Self::dump_layer(&mut out, "children16", &self.children16);
        Self::dump_layer(&mut out, "children32", &self.children32);
        let _ = writeln!(out, "  children64_valid={}", self.children64_valid);
        Self::dump_layer(&mut out, "children64", &self.children64);
        let _ = writeln!(out, "  data_valid={}", self.data_valid);
        let _ = writeln!(out, "  data_len={}", self.data.len());
        out
    }

    fn dump_layer(out: &mut String, name: &str, slots: &[Slot]) {
        use std::fmt::Write as _;

        let letters: String = slots.iter().map(Slot::type_letter).collect();
        let _ = writeln!(out, "  {name}={letters}");
        for (i, slot) in slots.iter().enumerate() {
            match slot {
                Slot::Leaf(leaf) => {
                    let _ = match leaf.level() {
                        Some(level) => writeln!(
                            out,
                            "    {name}[{i}]=leaf key={} value={} level={level}",
                            leaf.key, leaf.value
                        ),
                        None => {
                            writeln!(out, "    {name}[{i}]=leaf key={} value={}", leaf.key, leaf.value)
                        }
                    };
                }
                Slot::Intermediate(node) => {
                    let _ = writeln!(out, "    {name}[{i}]=intermediate digest={}", node.digest);
                }
                Slot::Zero | Slot::Unspecified => {}
            }
        }
    }

    /// Reduce one layer: every adjacent input pair produces one output slot
    /// at binary depth `depth`.
    // TODO: parallelize the pair loop; pairs within one layer are independent.
    fn collapse_layer(depth: u64, input: &[Slot], output: &mut [Slot]) {
        debug_assert_eq!(input.len(), 2 * output.len());
        for (i, out) in output.iter_mut().enumerate() {
            *out = Self::collapse_pair(depth, &input[2 * i], &input[2 * i + 1]);
        }
    }

    /// Reduce one `(left, right)` sibling pair into the node at binary depth
    /// `depth`.
    ///
    /// A lone leaf over a zero sibling bubbles up unfinalized; it is
    /// finalized exactly once, either on meeting a non-zero sibling (one
    /// level below the produced node, at `depth + 1`) or on reaching the
    /// root of the whole tree alone (`depth == 0`). Zero pairs propagate
    /// without hashing.
    fn collapse_pair(depth: u64, left: &Slot, right: &Slot) -> Slot {
        match (left, right) {
            (Slot::Zero, Slot::Zero) => Slot::Zero,
            (Slot::Zero, Slot::Leaf(leaf)) | (Slot::Leaf(leaf), Slot::Zero) => {
                if depth == 0 {
                    let (finalized, _) = leaf.finalized_at(0);
                    Slot::Leaf(finalized)
                } else {
                    Slot::Leaf(*leaf)
                }
            }
            (Slot::Zero, Slot::Intermediate(node)) => {
                Slot::intermediate(node_hash(&Digest::ZERO, &node.digest))
            }
            (Slot::Intermediate(node), Slot::Zero) => {
                Slot::intermediate(node_hash(&node.digest, &Digest::ZERO))
            }
            (Slot::Leaf(left), Slot::Leaf(right)) => {
                let (_, left_digest) = left.finalized_at(depth + 1);
                let (_, right_digest) = right.finalized_at(depth + 1);
                Slot::intermediate(node_hash(&left_digest, &right_digest))
            }
            (Slot::Leaf(leaf), Slot::Intermediate(node)) => {
                let (_, leaf_digest) = leaf.finalized_at(depth + 1);
                Slot::intermediate(node_hash(&leaf_digest, &node.digest))
            }
            (Slot::Intermediate(node), Slot::Leaf(leaf)) => {
                let (_, leaf_digest) = leaf.finalized_at(depth + 1);
                Slot::intermediate(node_hash(&node.digest, &leaf_digest))
            }
            (Slot::Unspecified, _) | (_, Slot::Unspecified) => {
                panic!("unspecified slot reached the collapse at depth {depth}")
            }
        }
    }
}
