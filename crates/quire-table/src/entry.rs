use std::fmt;

use quire_types::{DocumentId, ObjectId, Value};
use serde::{Deserialize, Serialize};

/// Lifecycle state of an indirect object slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryState {
    /// The number is on the free list and carries no payload.
    Free,
    /// The object is live in memory and has not been written yet.
    InUse,
    /// The object was written at a byte offset; payload released.
    Flushed,
    /// The object was written inside an object stream; payload released.
    FlushedToObjectStream,
}

impl EntryState {
    /// Returns `true` for both flushed states.
    pub fn is_flushed(&self) -> bool {
        matches!(self, Self::Flushed | Self::FlushedToObjectStream)
    }
}

impl fmt::Display for EntryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Free => write!(f, "free"),
            Self::InUse => write!(f, "in use"),
            Self::Flushed => write!(f, "flushed"),
            Self::FlushedToObjectStream => write!(f, "flushed to object stream"),
        }
    }
}

/// Where a flushed object's bytes live.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Location {
    /// Byte offset of `n g obj` in the output.
    Offset(u64),
    /// Index within the object stream with the given object number.
    ObjectStream { stream: u32, index: u32 },
}

/// One slot of the indirect reference table.
#[derive(Clone, Debug)]
pub struct IndirectEntry {
    pub(crate) number: u32,
    pub(crate) generation: u16,
    pub(crate) state: EntryState,
    pub(crate) payload: Option<Value>,
    pub(crate) location: Option<Location>,
    pub(crate) owner: DocumentId,
    pub(crate) flush_pending: bool,
}

impl IndirectEntry {
    pub(crate) fn in_use(number: u32, generation: u16, payload: Value, owner: DocumentId) -> Self {
        Self {
            number,
            generation,
            state: EntryState::InUse,
            payload: Some(payload),
            location: None,
            owner,
            flush_pending: false,
        }
    }

    /// The current identity of this slot.
    pub fn id(&self) -> ObjectId {
        ObjectId::new(self.number, self.generation)
    }

    pub fn state(&self) -> EntryState {
        self.state
    }

    /// The live payload, if the entry is in use and not mid-flush.
    pub fn payload(&self) -> Option<&Value> {
        self.payload.as_ref()
    }

    pub fn location(&self) -> Option<Location> {
        self.location
    }

    /// The document this entry belongs to.
    pub fn owner(&self) -> DocumentId {
        self.owner
    }

    /// Returns `true` while a flush of this entry is underway.
    pub fn is_flush_pending(&self) -> bool {
        self.flush_pending
    }
}
