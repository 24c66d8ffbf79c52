use std::collections::HashSet;
use std::io::Write;

use quire_table::EntryState;
use quire_types::{ObjectId, Value};
use quire_writer::{CrossReference, Trailer};
use tracing::{info, warn};

use crate::config::ClosePolicy;
use crate::document::Document;
use crate::error::{DocumentError, DocumentResult, DocumentWarning};

/// What [`Document::close`] produced.
#[derive(Debug)]
pub struct CloseReport<W> {
    /// The sink, handed back after the final flush.
    pub output: W,
    pub xref: CrossReference,
    pub trailer: Trailer,
    pub warnings: Vec<DocumentWarning>,
    /// Live objects written as free under [`ClosePolicy::WriteAsFree`].
    pub dropped: Vec<ObjectId>,
    pub bytes_written: u64,
    /// Object numbers ever allocated, entry 0 excluded.
    pub object_count: usize,
}

impl<W> CloseReport<W> {
    /// Hex form of the trailer `/ID`.
    pub fn file_id_hex(&self) -> String {
        self.trailer.file_id_hex()
    }
}

impl<W: Write> Document<W> {
    /// Finish the document: gate every live object, write them, then the
    /// cross-reference section and trailer.
    ///
    /// On a conformance violation nothing further is written and the
    /// violations are returned in the error.
    pub fn close(mut self) -> DocumentResult<CloseReport<W>> {
        self.ensure_usable()?;
        self.promote_all()?;

        let dropped = match self.config.close_policy {
            ClosePolicy::ForceFlush => Vec::new(),
            ClosePolicy::WriteAsFree => self.drop_unreachable()?,
        };

        let live = self.live_ids();
        self.batch_check(&live)?;
        self.check_document();
        let violations = self.gate.violations();
        if !violations.is_empty() {
            warn!(
                document = %self.id,
                violations = violations.len(),
                "close refused by conformance gate"
            );
            return Err(DocumentError::ConformanceViolation { violations });
        }

        for id in live {
            self.write_object_now(id)?;
        }
        if let Some((stream_id, builder)) = self.object_stream.take() {
            if builder.is_empty() {
                self.table.free(stream_id)?;
            } else {
                self.write_object_stream(stream_id, builder)?;
            }
        }

        if let Some((&target, &from)) = self
            .written_refs
            .iter()
            .find(|(target, _)| !self.table.is_flushed(**target))
        {
            return Err(DocumentError::DanglingReference { from, target });
        }

        let (xref, trailer) = self.write_cross_reference()?;
        self.sink.flush()?;

        let bytes_written = self.sink.position();
        let object_count = self.table.len();
        info!(
            document = %self.id,
            objects = object_count,
            bytes = bytes_written,
            dropped = dropped.len(),
            "document closed"
        );
        Ok(CloseReport {
            output: self.sink.into_inner(),
            xref,
            trailer,
            warnings: self.warnings,
            dropped,
            bytes_written,
            object_count,
        })
    }

    /// Emit the xref section. A cross-reference stream is used when any
    /// object went into an object stream, a classic table otherwise.
    fn write_cross_reference(&mut self) -> DocumentResult<(CrossReference, Trailer)> {
        self.ensure_header()?;
        let file_id = Trailer::file_id_from_digest(&self.sink.digest());
        let compressed = self
            .table
            .entries()
            .any(|e| e.state() == EntryState::FlushedToObjectStream);

        if compressed {
            let xref_id = self.table.allocate_fresh(Value::Null)?;
            let offset = self.sink.position();
            self.table.mark_flushed(xref_id, offset)?;
            let xref = CrossReference::build(&self.table)?;
            let trailer = self.trailer(&xref, file_id);
            self.sink
                .write_xref_stream(xref_id, &xref, &trailer, &self.options)?;
            Ok((xref, trailer))
        } else {
            let xref = CrossReference::build(&self.table)?;
            let trailer = self.trailer(&xref, file_id);
            self.sink.write_xref_table(&xref, &trailer)?;
            Ok((xref, trailer))
        }
    }

    fn trailer(&self, xref: &CrossReference, file_id: [u8; 16]) -> Trailer {
        Trailer {
            size: xref.size(),
            root: self.catalog,
            info: Some(self.info),
            file_id,
        }
    }

    /// Free live objects no root reaches. Roots are the catalog, the info
    /// dictionary and every target of an already-written reference.
    fn drop_unreachable(&mut self) -> DocumentResult<Vec<ObjectId>> {
        let mut reachable = HashSet::new();
        let mut stack = vec![self.catalog, self.info];
        stack.extend(self.written_refs.keys().copied());
        while let Some(id) = stack.pop() {
            if !reachable.insert(id) {
                continue;
            }
            if let Some(value) = self.table.resolve(id) {
                value.visit_references(&[], &mut |child| stack.push(child));
            }
        }

        let mut dropped = Vec::new();
        for id in self.live_ids() {
            if reachable.contains(&id) {
                continue;
            }
            self.table.free(id)?;
            self.gate.forget(id);
            warn!(%id, "unreachable object written as free");
            self.warnings.push(DocumentWarning::ObjectDropped(id));
            dropped.push(id);
        }
        Ok(dropped)
    }
}
