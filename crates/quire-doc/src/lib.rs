//! Document API for quire.
//!
//! A [`Document`] owns the indirect-object graph of one output file, the
//! conformance gate that decides when objects may be written, and the sink
//! the bytes go to. Objects are written incrementally with
//! [`Document::flush`]; [`Document::close`] writes whatever is left plus the
//! cross-reference section and trailer.
//!
//! # Key Types
//!
//! - [`Document`] — Object graph, flush engine, and close
//! - [`DocumentConfig`] — Conformance level, gate behaviour, close policy,
//!   object streams, compression; loadable from TOML
//! - [`FlushOutcome`] — `Flushed`, `Deferred` by the gate, or `AlreadyFlushed`
//! - [`CloseReport`] — The sink plus the cross-reference, trailer, warnings,
//!   and dropped objects
//! - [`OutputIntent`] / [`ImageXObject`] / [`FontFace`] — Builders for the
//!   objects archival documents need
//!
//! # Quick Start
//!
//! ```
//! use quire_doc::{Document, FlushOutcome, Value};
//!
//! let mut doc = Document::new(Vec::new())?;
//! let page = doc.add_new_page()?;
//! doc.append_page_content(page, b"0 0 m 100 100 l S\n")?;
//! assert_eq!(doc.flush(page, true)?, FlushOutcome::Flushed);
//!
//! let note = doc.make_indirect(Value::string("unused"))?;
//! assert!(!doc.is_flushed(note));
//!
//! let report = doc.close()?;
//! assert_eq!(report.object_count, 6);
//! assert!(report.output.ends_with(b"%%EOF\n"));
//! # Ok::<(), quire_doc::DocumentError>(())
//! ```

pub mod close;
pub mod config;
pub mod document;
pub mod error;
pub mod flush;
pub mod fonts;
pub mod intent;
pub mod page;
pub mod xobject;

pub use close::CloseReport;
pub use config::{ClosePolicy, DocumentConfig, PageSize};
pub use document::Document;
pub use error::{DocumentError, DocumentResult, DocumentWarning};
pub use flush::FlushOutcome;
pub use fonts::{FontFace, FontFaceSrc, FontFormat, FontProvider, NoResources, ResourceResolver};
pub use intent::{icc_components, OutputIntent};
pub use xobject::ImageXObject;

// Re-export key types
pub use quire_gate::{ConformanceLevel, GateConfig, Violation};
pub use quire_types::{Dictionary, ObjectId, PdfString, Stream, Value};
pub use quire_writer::{CrossReference, Trailer, XrefEntry};
