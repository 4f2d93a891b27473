// Block content digest.
//
// Blocks are identified by their SHA-256. Two blocks with the same digest
// are treated as identical without comparing their bytes, so correctness
// of deduplication rests on SHA-256 collision resistance.

use sha2::{Digest, Sha256};

/// Length of a digest in bytes.
pub const HASH_LEN: usize = 32;

/// Length of a hex-encoded digest.
pub const HASH_HEX_LEN: usize = HASH_LEN * 2;

const HEX_CHARS: &[u8; 16] = b"0123456789abcdef";

/// SHA-256 digest of one block.
#[derive(Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct BlockHash([u8; HASH_LEN]);

impl BlockHash {
    pub const fn from_bytes(bytes: [u8; HASH_LEN]) -> Self {
        Self(bytes)
    }

    /// Hash one block.
    pub fn of(block: &[u8]) -> Self {
        Self(Sha256::digest(block).into())
    }

    pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }

    /// Lowercase hex encoding.
    pub fn to_hex(&self) -> String {
        let mut hex = String::with_capacity(HASH_HEX_LEN);
        for &byte in &self.0 {
            hex.push(HEX_CHARS[(byte >> 4) as usize] as char);
            hex.push(HEX_CHARS[(byte & 0xf) as usize] as char);
        }
        hex
    }

    /// Parse a hex digest (either case). Returns `None` unless `hex` is
    /// exactly 64 hex digits.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.as_bytes();
        if hex.len() != HASH_HEX_LEN {
            return None;
        }
        let mut bytes = [0u8; HASH_LEN];
        for (i, pair) in hex.chunks_exact(2).enumerate() {
            bytes[i] = (nibble(pair[0])? << 4) | nibble(pair[1])?;
        }
        Some(Self(bytes))
    }
}

fn nibble(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

impl std::fmt::Debug for BlockHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BlockHash({})", self.to_hex())
    }
}

impl std::fmt::Display for BlockHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}
