//! Object model for quire.
//!
//! This crate provides the value types that make up a document's object
//! graph. Every other quire crate depends on `quire-types`.
//!
//! # Key Types
//!
//! - [`Value`] — Tagged variant over null, boolean, number, string, name,
//!   array, dictionary, stream, and reference
//! - [`Dictionary`] / [`Stream`] — Composite values with sorted keys
//! - [`ObjectId`] — `(number, generation)` identity of an indirect object
//! - [`DocumentId`] — Identity of the document that owns a reference table
//! - [`TypeError`] — Accessor misuse, reported instead of panicking

pub mod dictionary;
pub mod error;
pub mod object;
pub mod value;

pub use dictionary::{Dictionary, Stream};
pub use error::TypeError;
pub use object::{DocumentId, ObjectId};
pub use value::{Name, PdfString, StringFormat, Value};
