//! Field-element digests and 256-bit scalar packing.
//!
//! Every tree node is identified by a [`Digest`]: four Goldilocks field
//! elements. On the wire a digest (or a leaf key, which has the same shape)
//! is packed into 32 bytes big-endian, limb 3 first, each limb the canonical
//! `u64` of its field element. Leaf values are plain 256-bit unsigned
//! integers, serialized big-endian and hashed as their four little-endian
//! `u64` limbs mapped into the field.

use std::fmt;

use plonky2::field::goldilocks_field::GoldilocksField;
use plonky2::field::types::{Field, PrimeField64};
use primitive_types::U256;

/// The prime field digest limbs live in: `p = 2^64 - 2^32 + 1`.
pub type F = GoldilocksField;

/// A 4-field-element digest identifying a sub-tree.
///
/// Also used for leaf keys, which share the same shape and packing. The
/// all-zero digest denotes the empty sub-tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Digest(pub [F; 4]);

impl Digest {
    /// The digest of the empty sub-tree.
    pub const ZERO: Self = Self([F::ZERO; 4]);

    /// Check if this is the empty-sub-tree digest.
    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    /// Pack into 32 bytes big-endian: limb 3 first, each limb canonical.
    pub fn to_bytes(&self) -> [u8; 32] {
        let mut out = [0u8; 32];
        for (i, fe) in self.0.iter().rev().enumerate() {
            out[i * 8..(i + 1) * 8].copy_from_slice(&fe.to_canonical_u64().to_be_bytes());
        }
        out
    }

    /// Unpack from the 32-byte big-endian form. Limbs at or above the field
    /// order wrap modulo `p`.
    pub fn from_bytes(bytes: &[u8; 32]) -> Self {
        let mut fes = [F::ZERO; 4];
        for (i, limb) in bytes.chunks_exact(8).enumerate() {
            fes[3 - i] = F::from_noncanonical_u64(u64::from_be_bytes(limb.try_into().unwrap()));
        }
        Self(fes)
    }
}

impl Default for Digest {
    fn default() -> Self {
        Self::ZERO
    }
}

impl fmt::Display for Digest {
    /// Lowercase hex of the big-endian packing; the canonical store key.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.to_bytes() {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// Map a 256-bit value onto its four little-endian `u64` limbs in the field.
pub fn value_to_fields(value: &U256) -> [F; 4] {
    let limbs = value.0;
    [
        F::from_noncanonical_u64(limbs[0]),
        F::from_noncanonical_u64(limbs[1]),
        F::from_noncanonical_u64(limbs[2]),
        F::from_noncanonical_u64(limbs[3]),
    ]
}

/// Serialize a 256-bit value as 32 bytes big-endian.
pub fn value_to_bytes(value: &U256) -> [u8; 32] {
    let mut out = [0u8; 32];
    value.to_big_endian(&mut out);
    out
}

/// Parse a 256-bit value from its 32-byte big-endian form.
pub fn value_from_bytes(bytes: &[u8]) -> U256 {
    U256::from_big_endian(bytes)
}
