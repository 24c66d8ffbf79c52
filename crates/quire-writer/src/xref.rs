use quire_table::{EntryState, IndirectTable, Location};
use quire_types::{Dictionary, ObjectId, PdfString, Stream, Value};

use crate::entry::XrefEntry;
use crate::error::{WriterError, WriterResult};

/// The cross-reference section of a document, one entry per object number.
///
/// Entry 0 is always the synthetic head of the free list. Every other entry
/// corresponds to a number the table ever allocated, so `size()` is the
/// allocated count plus one.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CrossReference {
    entries: Vec<XrefEntry>,
}

impl CrossReference {
    /// Build from the final state of a reference table.
    ///
    /// Every entry must be free or flushed; a live object still in memory
    /// is an error. Free entries are chained in ascending order.
    pub fn build(table: &IndirectTable) -> WriterResult<Self> {
        let mut entries = Vec::with_capacity(table.len() + 1);
        entries.push(XrefEntry::free_head(0));

        for entry in table.entries() {
            let id = entry.id();
            let row = match (entry.state(), entry.location()) {
                (EntryState::Free, _) => XrefEntry::Free {
                    next: 0,
                    generation: id.generation(),
                },
                (EntryState::InUse, _) => return Err(WriterError::UnflushedObject(id)),
                (EntryState::Flushed, Some(Location::Offset(offset))) => XrefEntry::InUse {
                    offset,
                    generation: id.generation(),
                },
                (EntryState::FlushedToObjectStream, Some(Location::ObjectStream { stream, index })) => {
                    XrefEntry::Compressed { stream, index }
                }
                (state, _) => {
                    return Err(WriterError::XrefCorrupted(format!(
                        "object {id} is {state} but has no matching location"
                    )))
                }
            };
            entries.push(row);
        }

        let mut xref = Self { entries };
        xref.chain_free_entries();
        Ok(xref)
    }

    /// Wrap already-parsed entries (used by the reader).
    pub fn from_entries(entries: Vec<XrefEntry>) -> Self {
        Self { entries }
    }

    fn chain_free_entries(&mut self) {
        let mut next = 0u32;
        for number in (0..self.entries.len()).rev() {
            if let XrefEntry::Free { next: link, .. } = &mut self.entries[number] {
                *link = next;
                next = number as u32;
            }
        }
    }

    /// Value of the trailer's `/Size`.
    pub fn size(&self) -> u32 {
        self.entries.len() as u32
    }

    pub fn entries(&self) -> &[XrefEntry] {
        &self.entries
    }

    pub fn get(&self, number: u32) -> Option<&XrefEntry> {
        self.entries.get(number as usize)
    }

    /// Entries other than entry 0.
    pub fn object_count(&self) -> usize {
        self.entries.len().saturating_sub(1)
    }

    pub fn in_use_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e, XrefEntry::InUse { .. }))
            .count()
    }

    /// Free entries, excluding the list head.
    pub fn free_count(&self) -> usize {
        self.entries.iter().skip(1).filter(|e| e.is_free()).count()
    }

    pub fn has_compressed(&self) -> bool {
        self.entries
            .iter()
            .any(|e| matches!(e, XrefEntry::Compressed { .. }))
    }

    /// Numbers on the free chain, starting after the head.
    pub fn free_chain(&self) -> Vec<u32> {
        let mut chain = Vec::new();
        let mut current = match self.entries.first() {
            Some(XrefEntry::Free { next, .. }) => *next,
            _ => 0,
        };
        while current != 0 && chain.len() < self.entries.len() {
            chain.push(current);
            current = match self.get(current) {
                Some(XrefEntry::Free { next, .. }) => *next,
                _ => 0,
            };
        }
        chain
    }

    /// Classic `xref` section with a single subsection starting at 0.
    pub fn to_classic_bytes(&self) -> WriterResult<Vec<u8>> {
        let mut buf = format!("xref\n0 {}\n", self.entries.len()).into_bytes();
        for entry in &self.entries {
            buf.extend_from_slice(&entry.classic_line()?);
        }
        Ok(buf)
    }

    /// Cross-reference stream carrying the same entries plus the trailer keys.
    ///
    /// Field widths are the smallest that fit every value.
    pub fn to_stream(&self, trailer: &Trailer) -> Stream {
        let (mut max_second, mut max_third) = (0u64, 0u64);
        for entry in &self.entries {
            let (second, third) = entry.stream_fields();
            max_second = max_second.max(second);
            max_third = max_third.max(third);
        }
        let widths = [1usize, byte_width(max_second), byte_width(max_third)];

        let mut data = Vec::with_capacity(self.entries.len() * widths.iter().sum::<usize>());
        for entry in &self.entries {
            let (second, third) = entry.stream_fields();
            data.push(entry.type_byte());
            data.extend_from_slice(&second.to_be_bytes()[8 - widths[1]..]);
            data.extend_from_slice(&third.to_be_bytes()[8 - widths[2]..]);
        }

        let mut dict = trailer.to_dictionary();
        dict.insert("Type", Value::name("XRef"));
        dict.insert(
            "W",
            widths.iter().map(|w| Value::from(*w)).collect::<Vec<_>>(),
        );
        Stream::new(dict, data)
    }
}

fn byte_width(max: u64) -> usize {
    let bits = 64 - max.leading_zeros() as usize;
    bits.div_ceil(8).max(1)
}

/// Trailer keys shared by the classic trailer and the xref stream dictionary.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Trailer {
    pub size: u32,
    pub root: ObjectId,
    pub info: Option<ObjectId>,
    /// First 16 bytes of the content digest, written as both `/ID` elements.
    pub file_id: [u8; 16],
}

impl Trailer {
    /// Derive the file identifier from a BLAKE3 digest of the written bytes.
    pub fn file_id_from_digest(digest: &[u8; 32]) -> [u8; 16] {
        let mut id = [0u8; 16];
        id.copy_from_slice(&digest[..16]);
        id
    }

    pub fn to_dictionary(&self) -> Dictionary {
        let mut dict = Dictionary::new();
        dict.insert("Size", self.size);
        dict.insert("Root", self.root);
        if let Some(info) = self.info {
            dict.insert("Info", info);
        }
        let id = Value::String(PdfString::hex(self.file_id.to_vec()));
        dict.insert("ID", vec![id.clone(), id]);
        dict
    }

    /// Hex form of the file identifier.
    pub fn file_id_hex(&self) -> String {
        hex::encode(self.file_id)
    }
}
