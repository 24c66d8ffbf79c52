use quire_types::ObjectId;

use crate::entry::EntryState;

/// Errors from indirect reference table operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TableError {
    /// The object number was never allocated in this table.
    #[error("object {0} is not allocated")]
    NotAllocated(ObjectId),

    /// The number is allocated but currently carries another generation.
    #[error("generation mismatch for object {requested}: current generation is {current}")]
    GenerationMismatch { requested: ObjectId, current: u16 },

    /// The operation needs an in-use entry.
    #[error("object {id} is {state}, expected in use")]
    NotInUse { id: ObjectId, state: EntryState },

    /// A free was attempted while a flush of the same object is in progress.
    #[error("object {0} is being flushed and cannot be mutated")]
    ConcurrentMutation(ObjectId),

    /// The reserved object number 0 cannot be used for objects.
    #[error("object number 0 is reserved")]
    Reserved,

    /// No object numbers are left.
    #[error("object number space exhausted")]
    Exhausted,
}

/// Result alias for table operations.
pub type TableResult<T> = Result<T, TableError>;
