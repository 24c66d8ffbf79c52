use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity of an indirect object within one document.
///
/// An `ObjectId` pairs an object number with a generation. Numbers are
/// handed out by the indirect reference table; the generation only moves
/// when a freed number is reused. Object number 0 is reserved for the head
/// of the cross-reference free list and never names a real object.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId {
    number: u32,
    generation: u16,
}

impl ObjectId {
    /// Highest generation the cross-reference format can express. A number
    /// freed at this generation is retired for good.
    pub const MAX_GENERATION: u16 = u16::MAX;

    /// Create an id from a number and generation.
    pub const fn new(number: u32, generation: u16) -> Self {
        Self { number, generation }
    }

    /// The reserved free-list head (`0 65535`).
    pub const fn free_head() -> Self {
        Self::new(0, Self::MAX_GENERATION)
    }

    /// The object number.
    pub const fn number(&self) -> u32 {
        self.number
    }

    /// The generation number.
    pub const fn generation(&self) -> u16 {
        self.generation
    }

    /// Same number, next generation. Saturates at [`Self::MAX_GENERATION`].
    pub fn next_generation(&self) -> Self {
        Self::new(self.number, self.generation.saturating_add(1))
    }

    /// Returns `true` if this is the reserved number 0.
    pub fn is_reserved(&self) -> bool {
        self.number == 0
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({} {})", self.number, self.generation)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.number, self.generation)
    }
}

impl From<(u32, u16)> for ObjectId {
    fn from((number, generation): (u32, u16)) -> Self {
        Self::new(number, generation)
    }
}

/// Identifies the document that owns an indirect reference table.
///
/// Generated as a UUID v7 so ids sort by creation time in logs.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentId(Uuid);

impl DocumentId {
    /// A fresh, time-ordered document id.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// The underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Short hex representation (first 8 characters).
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0.as_bytes()[..4])
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DocumentId({})", self.short_hex())
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
