use serde::{Deserialize, Serialize};

use crate::error::{WriterError, WriterResult};

/// One row of the cross-reference section.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum XrefEntry {
    /// A free number; `next` is the next free number in the chain (0 ends it).
    Free { next: u32, generation: u16 },
    /// An object written at a byte offset.
    InUse { offset: u64, generation: u16 },
    /// An object stored inside an object stream.
    Compressed { stream: u32, index: u32 },
}

impl XrefEntry {
    /// Synthetic head of the free list, always entry 0.
    pub fn free_head(next: u32) -> Self {
        Self::Free {
            next,
            generation: u16::MAX,
        }
    }

    pub fn generation(&self) -> u16 {
        match self {
            Self::Free { generation, .. } | Self::InUse { generation, .. } => *generation,
            Self::Compressed { .. } => 0,
        }
    }

    pub fn is_free(&self) -> bool {
        matches!(self, Self::Free { .. })
    }

    /// The type byte used in cross-reference streams.
    pub fn type_byte(&self) -> u8 {
        match self {
            Self::Free { .. } => 0,
            Self::InUse { .. } => 1,
            Self::Compressed { .. } => 2,
        }
    }

    /// Second and third fields of a cross-reference stream row.
    pub fn stream_fields(&self) -> (u64, u64) {
        match *self {
            Self::Free { next, generation } => (next as u64, generation as u64),
            Self::InUse { offset, generation } => (offset, generation as u64),
            Self::Compressed { stream, index } => (stream as u64, index as u64),
        }
    }

    /// The fixed 20-byte line of a classic `xref` table.
    pub fn classic_line(&self) -> WriterResult<[u8; 20]> {
        let line = match *self {
            Self::Free { next, generation } => format!("{next:010} {generation:05} f \n"),
            Self::InUse { offset, generation } => {
                if offset > 9_999_999_999 {
                    return Err(WriterError::XrefCorrupted(format!(
                        "offset {offset} does not fit a classic xref line"
                    )));
                }
                format!("{offset:010} {generation:05} n \n")
            }
            Self::Compressed { .. } => {
                return Err(WriterError::XrefCorrupted(
                    "compressed entries need a cross-reference stream".into(),
                ))
            }
        };
        let mut out = [0u8; 20];
        out.copy_from_slice(line.as_bytes());
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classic_lines_are_twenty_bytes() {
        let head = XrefEntry::free_head(0).classic_line().unwrap();
        assert_eq!(&head, b"0000000000 65535 f \n");
        let used = XrefEntry::InUse {
            offset: 1234,
            generation: 0,
        };
        assert_eq!(&used.classic_line().unwrap(), b"0000001234 00000 n \n");
        let freed = XrefEntry::Free {
            next: 7,
            generation: 1,
        };
        assert_eq!(&freed.classic_line().unwrap(), b"0000000007 00001 f \n");
    }

    #[test]
    fn compressed_entry_has_no_classic_form() {
        let e = XrefEntry::Compressed { stream: 9, index: 2 };
        assert!(e.classic_line().is_err());
        assert_eq!(e.type_byte(), 2);
        assert_eq!(e.stream_fields(), (9, 2));
    }
}
