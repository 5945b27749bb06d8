//! Chunk addressing with 32-bit FNV-1a
//!
//! Every reader and the publisher must agree on this function bit for bit.
//! The hash runs over the raw UTF-8 bytes of the package name with no
//! normalization, and the chunk id is the hash modulo [`NUM_CHUNKS`].

use std::fmt;
use std::str::FromStr;

pub const NUM_CHUNKS: u32 = 100;

pub const FNV_OFFSET_BASIS: u32 = 0x811C_9DC5;
pub const FNV_PRIME: u32 = 0x0100_0193;

/// FNV-1a, 32-bit: xor each byte, then multiply, wrapping at 32 bits
pub fn fnv1a_32(bytes: &[u8]) -> u32 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ u32::from(*byte)).wrapping_mul(FNV_PRIME)
    })
}

/// Chunk holding the given package name
pub fn chunk_for(name: &str) -> ChunkId {
    ChunkId(fnv1a_32(name.as_bytes()) % NUM_CHUNKS)
}

/// Identifier of one of the [`NUM_CHUNKS`] shards, rendered as three digits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkId(u32);

impl ChunkId {
    pub fn new(index: u32) -> Option<Self> {
        (index < NUM_CHUNKS).then_some(Self(index))
    }

    pub fn index(&self) -> usize {
        self.0 as usize
    }

    /// All chunk ids in ascending order
    pub fn all() -> impl Iterator<Item = ChunkId> {
        (0..NUM_CHUNKS).map(ChunkId)
    }

    pub fn file_name(&self) -> String {
        format!("chunk_{}.json", self)
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:03}", self.0)
    }
}

impl FromStr for ChunkId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u32>()
            .ok()
            .and_then(ChunkId::new)
            .ok_or_else(|| format!("Invalid chunk id: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_golden_hashes() {
        assert_eq!(fnv1a_32(b""), 0x811C_9DC5);
        assert_eq!(fnv1a_32(b"a"), 0xE40C_292C);
        assert_eq!(fnv1a_32(b"react"), 0x58FD_635C);
        assert_eq!(fnv1a_32(b"lodash"), 0x3F3D_3550);
        assert_eq!(fnv1a_32(b"@types/node"), 0x8C41_6E31);
        assert_eq!(fnv1a_32(b"express"), 297_865_967);
    }

    #[test]
    fn test_golden_chunks() {
        assert_eq!(chunk_for("").to_string(), "061");
        assert_eq!(chunk_for("a").to_string(), "020");
        assert_eq!(chunk_for("react").to_string(), "052");
        assert_eq!(chunk_for("@types/node").to_string(), "089");
        assert_eq!(chunk_for("requests").to_string(), "011");
        assert_eq!(chunk_for("ripgrep").to_string(), "024");
        assert_eq!(chunk_for("express").to_string(), "067");
    }

    #[test]
    fn test_raw_utf8_bytes_no_normalization() {
        assert_eq!(fnv1a_32("café".as_bytes()), 0xA82B_5049);
        assert_eq!(chunk_for("café").to_string(), "089");
        assert_ne!(chunk_for("React"), chunk_for("react"));
    }

    #[test]
    fn test_distribution_is_roughly_uniform() {
        let mut buckets = vec![0usize; NUM_CHUNKS as usize];
        let total = 1000;
        for i in 0..total {
            buckets[chunk_for(&format!("pkg{}", i)).index()] += 1;
        }
        let max = *buckets.iter().max().unwrap() as f64;
        let avg = total as f64 / f64::from(NUM_CHUNKS);
        assert!(max / avg < 2.0, "max/avg = {}", max / avg);
    }

    #[test]
    fn test_chunk_id_parsing() {
        assert_eq!("007".parse::<ChunkId>().unwrap().index(), 7);
        assert!("100".parse::<ChunkId>().is_err());
        assert!("x".parse::<ChunkId>().is_err());
        assert_eq!(ChunkId::all().count(), 100);
        assert_eq!(ChunkId::new(5).unwrap().file_name(), "chunk_005.json");
    }
}
