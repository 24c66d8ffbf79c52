//! Conformance gate for quire.
//!
//! Before an indirect object is written, the document asks the gate whether
//! the object may leave memory. Without a conformance level every answer is
//! yes. With a level, objects of regulated kinds (pages, images, fonts, and
//! colour spaces) are held back until a batch check has evaluated them with
//! the context of the subgraph they belong to.
//!
//! # Key Types
//!
//! - [`ConformanceGate`] — State machine answering `Passed` or `Deferred`
//! - [`RuleTable`] — Which [`ConformanceRule`]s apply to which [`ObjectKind`]
//! - [`FlushGateRecord`] — Per-object check state and recorded violations
//! - [`ConformanceLevel`] — PDF/A part and its structural limits
//!
//! # Quick Start
//!
//! ```rust
//! use quire_gate::{CheckSubject, ConformanceGate, ConformanceLevel, DocumentFacts, GateConfig};
//! use quire_table::IndirectTable;
//! use quire_types::{DocumentId, ObjectId, Value};
//!
//! let table = IndirectTable::new(DocumentId::new());
//! let facts = DocumentFacts { output_intent: None, has_metadata: false, resolver: &table };
//! let mut gate = ConformanceGate::new(Some(ConformanceLevel::PdfA2B), GateConfig::default());
//!
//! let number = Value::Integer(3);
//! let verdict = gate.check(&CheckSubject::new(ObjectId::new(1, 0), &number), &facts).unwrap();
//! assert!(verdict.is_passed());
//! ```

pub mod config;
pub mod error;
pub mod gate;
pub mod kind;
pub mod level;
pub mod profile;
pub mod record;
pub mod rule;
pub mod rules;

pub use config::GateConfig;
pub use error::{GateError, Violation};
pub use gate::{BatchReport, ConformanceGate, GateVerdict};
pub use kind::ObjectKind;
pub use level::ConformanceLevel;
pub use profile::RuleTable;
pub use record::{CheckState, FlushGateRecord};
pub use rule::{
    CheckSubject, ConformanceRule, DocumentFacts, ObjectResolver, OutputIntentInfo, RuleDecision,
    ValidationContext,
};
pub use rules::{ColorSpaceRule, FontRule, ImageRule, PageRule};
