// Fixed-width index record codec.
//
// Each record is exactly 11 bytes:
//
//   tag (1) | block pointer as 8 lowercase hex digits (8) | "\r\n" (2)
//
// Tags are `B` (block from the base file), `C` (block from the payload
// region of the diff artifact) and `E` (terminator, pointer ffffffff).

use super::FormatError;

/// Size in bytes of one encoded record.
pub const RECORD_LEN: usize = 1 + 8 + 2;

/// Line terminator closing every record.
pub const RECORD_EOL: [u8; 2] = *b"\r\n";

/// Pointer value carried by the terminator record.
pub const END_SENTINEL: u32 = 0xffff_ffff;

pub const TAG_BASE: u8 = b'B';
pub const TAG_CHILD: u8 = b'C';
pub const TAG_END: u8 = b'E';

const HEX_DIGITS: &[u8; 16] = b"0123456789abcdef";

/// One entry of the index table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexRecord {
    /// Block index into the base file.
    Base(u32),
    /// Sequential index into the payload region (new blocks only).
    Child(u32),
    /// End of the index table.
    End,
}

impl IndexRecord {
    /// The one-byte type tag.
    pub fn tag(&self) -> u8 {
        match self {
            Self::Base(_) => TAG_BASE,
            Self::Child(_) => TAG_CHILD,
            Self::End => TAG_END,
        }
    }

    /// The raw pointer field.
    pub fn ptr(&self) -> u32 {
        match *self {
            Self::Base(p) | Self::Child(p) => p,
            Self::End => END_SENTINEL,
        }
    }

    /// Encode into the fixed 11-byte layout.
    pub fn encode(&self) -> [u8; RECORD_LEN] {
        let mut out = [0u8; RECORD_LEN];
        out[0] = self.tag();
        let ptr = self.ptr();
        for (i, slot) in out[1..9].iter_mut().enumerate() {
            let shift = 28 - 4 * i;
            *slot = HEX_DIGITS[((ptr >> shift) & 0xf) as usize];
        }
        out[9..].copy_from_slice(&RECORD_EOL);
        out
    }

    /// Decode one record.
    ///
    /// `index` is the record's position in the table and is only used for
    /// error reporting.
    pub fn decode(raw: &[u8; RECORD_LEN], index: u64) -> Result<Self, FormatError> {
        let offset = index * RECORD_LEN as u64;

        if raw[9..] != RECORD_EOL {
            return Err(FormatError::BadTerminator {
                index,
                offset,
                found: [raw[9], raw[10]],
            });
        }

        let mut ptr = 0u32;
        for &c in &raw[1..9] {
            let nibble = match c {
                b'0'..=b'9' => c - b'0',
                b'a'..=b'f' => c - b'a' + 10,
                b'A'..=b'F' => c - b'A' + 10,
                _ => {
                    return Err(FormatError::BadPointer {
                        index,
                        offset,
                        raw: String::from_utf8_lossy(&raw[1..9]).into_owned(),
                    });
                }
            };
            ptr = (ptr << 4) | u32::from(nibble);
        }

        match raw[0] {
            TAG_BASE => Ok(Self::Base(ptr)),
            TAG_CHILD => Ok(Self::Child(ptr)),
            TAG_END if ptr == END_SENTINEL => Ok(Self::End),
            TAG_END => Err(FormatError::BadSentinel { index, offset, ptr }),
            tag => Err(FormatError::UnknownTag {
                index,
                offset,
                tag,
                ptr,
            }),
        }
    }
}

impl std::fmt::Display for IndexRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{:08x}", self.tag() as char, self.ptr())
    }
}
