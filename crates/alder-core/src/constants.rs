//! Chunk layout constants.

/// Leaf slots per chunk: one chunk covers six binary tree levels.
pub const CHUNK_WIDTH: usize = 64;

/// Binary levels covered by one chunk. Chunk levels are always multiples of
/// this.
pub const LEVELS_PER_CHUNK: u64 = 6;

/// Size of the two little-endian `u64` bitmaps (`is_zero`, `is_leaf`) that
/// open every encoded chunk.
pub const CHUNK_HEADER_BYTES: usize = 16;

/// Encoded size of a leaf record: 32-byte key followed by 32-byte value.
pub const LEAF_RECORD_BYTES: usize = 64;

/// Encoded size of an intermediate record: a 32-byte digest.
pub const INTERMEDIATE_RECORD_BYTES: usize = 32;

/// Upper bound on an encoded chunk: the header plus 64 leaf records.
pub const MAX_CHUNK_BYTES: usize = CHUNK_HEADER_BYTES + CHUNK_WIDTH * LEAF_RECORD_BYTES;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_chunk_bytes_value() {
        assert_eq!(MAX_CHUNK_BYTES, 4112);
    }

    #[test]
    fn chunk_width_covers_six_levels() {
        assert_eq!(CHUNK_WIDTH, 1 << LEVELS_PER_CHUNK);
    }
}
