//! Indirect reference table for quire.
//!
//! The table assigns stable `(number, generation)` identities to objects
//! that must be referenced non-locally and tracks each slot through its
//! lifecycle:
//!
//! ```text
//! allocate ──► InUse ──► Flushed / FlushedToObjectStream
//!                │                 │
//!                └──── free ───────┴──► Free ──► (reuse, generation + 1)
//! ```
//!
//! # Design Rules
//!
//! 1. `InUse -> Flushed` happens at most once per identity.
//! 2. Flushing releases the payload; the table never re-materializes it.
//! 3. Numbers are handed out in ascending order and a `(number, generation)`
//!    pair is never issued twice.
//! 4. Every number ever issued stays enumerable until the table is dropped.
//! 5. A pinned (mid-flush) entry cannot be freed.

pub mod entry;
pub mod error;
pub mod table;

pub use entry::{EntryState, IndirectEntry, Location};
pub use error::{TableError, TableResult};
pub use table::IndirectTable;
