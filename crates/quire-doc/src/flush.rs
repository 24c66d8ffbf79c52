use std::collections::HashSet;
use std::io::Write;

use quire_gate::{BatchReport, CheckSubject, DocumentFacts, GateVerdict, OutputIntentInfo, Violation};
use quire_table::{EntryState, IndirectTable};
use quire_types::{ObjectId, Value};
use quire_writer::ObjectStreamBuilder;
use tracing::{debug, error, trace, warn};

use crate::document::Document;
use crate::error::{DocumentError, DocumentResult};

/// Keys that point back up the graph and are not followed by a cascade.
const BACK_EDGES: &[&str] = &["Parent", "P"];

/// Result of a flush request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FlushOutcome {
    /// The object (and, for a cascade, its subgraph) was written.
    Flushed,
    /// The gate held the object back; it stays in memory.
    Deferred { reason: String },
    /// Nothing was written; the object had been flushed before.
    AlreadyFlushed,
}

impl FlushOutcome {
    pub fn is_flushed(&self) -> bool {
        matches!(self, Self::Flushed | Self::AlreadyFlushed)
    }

    pub fn is_deferred(&self) -> bool {
        matches!(self, Self::Deferred { .. })
    }
}

fn facts(
    table: &IndirectTable,
    output_intent: Option<OutputIntentInfo>,
    has_metadata: bool,
) -> DocumentFacts<'_> {
    DocumentFacts {
        output_intent,
        has_metadata,
        resolver: table,
    }
}

impl<W: Write> Document<W> {
    /// Write `id` to the output.
    ///
    /// Without `cascade` only `id` itself is checked and written; objects it
    /// references stay in memory. With `cascade` the live subgraph below
    /// `id` is checked as a whole and written children first, or not at all.
    pub fn flush(&mut self, id: ObjectId, cascade: bool) -> DocumentResult<FlushOutcome> {
        self.ensure_usable()?;
        match self.table.state(id)? {
            EntryState::Flushed | EntryState::FlushedToObjectStream => {
                trace!(%id, "already flushed");
                return Ok(FlushOutcome::AlreadyFlushed);
            }
            EntryState::Free => return Err(DocumentError::UnknownObject(id)),
            EntryState::InUse => {}
        }
        if self.object_stream.as_ref().is_some_and(|(open, _)| *open == id) {
            return Err(DocumentError::InvalidOperation(format!(
                "object {id} is reserved for an object stream"
            )));
        }

        if cascade {
            self.flush_cascade(id)
        } else {
            self.flush_single(id)
        }
    }

    /// Run every rule over all live objects plus the document-level checks.
    ///
    /// Objects that pass can afterwards be flushed one at a time without
    /// being deferred. Returns every violation recorded so far.
    pub fn validate(&mut self) -> DocumentResult<Vec<Violation>> {
        self.ensure_usable()?;
        self.promote_all()?;
        let live = self.live_ids();
        self.batch_check(&live)?;
        self.check_document();
        Ok(self.gate.violations())
    }

    fn flush_single(&mut self, id: ObjectId) -> DocumentResult<FlushOutcome> {
        let verdict = {
            let facts = facts(&self.table, self.intent_info(), self.metadata.is_some());
            let value = self
                .table
                .resolve(id)
                .ok_or(DocumentError::UnknownObject(id))?;
            self.gate.check(&CheckSubject::new(id, value), &facts)?
        };
        if let GateVerdict::Deferred { reason } = verdict {
            debug!(%id, %reason, "flush deferred");
            return Ok(FlushOutcome::Deferred { reason });
        }

        let promoted = self.promote_streams(id)?;
        self.write_object_now(id)?;
        for child in promoted {
            // Promoted children follow their parent on a best-effort basis;
            // a deferred child is written later.
            self.flush_single(child)?;
        }
        Ok(FlushOutcome::Flushed)
    }

    fn flush_cascade(&mut self, root: ObjectId) -> DocumentResult<FlushOutcome> {
        let order = self.collect_subgraph(root)?;
        let report = self.batch_check(&order)?;
        if !report.is_clean() {
            if self.gate.config().fail_fast {
                return Err(DocumentError::ConformanceViolation {
                    violations: report.violations,
                });
            }
            let reason = report.violations.first().map_or_else(
                || "subgraph failed its conformance check".to_string(),
                |v| format!("{} violation(s), first: {v}", report.violations.len()),
            );
            debug!(%root, %reason, "cascade deferred");
            return Ok(FlushOutcome::Deferred { reason });
        }

        for id in &order {
            self.write_object_now(*id)?;
        }
        debug!(%root, objects = order.len(), "cascade flushed");
        Ok(FlushOutcome::Flushed)
    }

    /// Live objects reachable from `root`, children before parents.
    fn collect_subgraph(&mut self, root: ObjectId) -> DocumentResult<Vec<ObjectId>> {
        let mut order = Vec::new();
        let mut visited = HashSet::new();
        let mut stack = vec![(root, false)];

        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                order.push(id);
                continue;
            }
            if self.table.is_flushed(id) || !visited.insert(id) {
                continue;
            }
            self.promote_streams(id)?;
            stack.push((id, true));

            let mut children = Vec::new();
            if let Some(value) = self.table.resolve(id) {
                value.visit_references(BACK_EDGES, &mut |child| children.push(child));
            }
            for child in children.into_iter().rev() {
                if visited.contains(&child) {
                    continue;
                }
                if !self.table.contains(child) {
                    return Err(DocumentError::DanglingReference { from: id, target: child });
                }
                stack.push((child, false));
            }
        }
        Ok(order)
    }

    pub(crate) fn batch_check(&mut self, ids: &[ObjectId]) -> DocumentResult<BatchReport> {
        let facts = facts(&self.table, self.intent_info(), self.metadata.is_some());
        let subjects: Vec<CheckSubject<'_>> = ids
            .iter()
            .filter_map(|id| self.table.resolve(*id).map(|value| CheckSubject::new(*id, value)))
            .collect();
        Ok(self.gate.check_batch(&subjects, &facts)?)
    }

    pub(crate) fn check_document(&mut self) -> Vec<Violation> {
        let facts = facts(&self.table, self.intent_info(), self.metadata.is_some());
        self.gate.check_document(&facts)
    }

    // ---- Stream promotion ----

    /// Move streams nested in the payload of `id` into objects of their own.
    /// Returns the new ids.
    pub(crate) fn promote_streams(&mut self, id: ObjectId) -> DocumentResult<Vec<ObjectId>> {
        if !self.table.resolve(id).is_some_and(has_nested_stream) {
            return Ok(Vec::new());
        }
        let mut payload = self.table.take_payload(id)?;
        let mut promoted = Vec::new();
        let mut failure = None;
        let table = &mut self.table;
        payload.promote_nested_streams(&mut |stream| match table.allocate(Value::Stream(stream)) {
            Ok(child) => {
                promoted.push(child);
                child
            }
            Err(err) => {
                failure.get_or_insert(err);
                ObjectId::free_head()
            }
        });
        self.table.restore_payload(id, payload)?;
        if let Some(err) = failure {
            return Err(err.into());
        }
        trace!(%id, promoted = promoted.len(), "nested streams promoted");
        Ok(promoted)
    }

    /// Promote nested streams everywhere, including inside promoted streams.
    pub(crate) fn promote_all(&mut self) -> DocumentResult<()> {
        let mut pending = self.live_ids();
        while let Some(id) = pending.pop() {
            pending.extend(self.promote_streams(id)?);
        }
        Ok(())
    }

    // ---- Writing ----

    pub(crate) fn ensure_header(&mut self) -> DocumentResult<()> {
        if self.header_written {
            return Ok(());
        }
        let version = self.header_version();
        if let Err(err) = self.sink.write_header(version) {
            self.poison(&err.to_string());
            return Err(err.into());
        }
        self.header_written = true;
        Ok(())
    }

    /// Serialize one live object at the cursor, bypassing the gate.
    pub(crate) fn write_object_now(&mut self, id: ObjectId) -> DocumentResult<()> {
        self.ensure_header()?;
        self.table.begin_flush(id)?;
        let payload = match self.table.take_payload(id) {
            Ok(payload) => payload,
            Err(err) => {
                self.table.end_flush(id);
                return Err(err.into());
            }
        };

        match self.emit(id, &payload) {
            Ok(()) => Ok(()),
            Err(err) => {
                if let Err(restore) = self.table.restore_payload(id, payload) {
                    warn!(%id, error = %restore, "payload could not be restored");
                }
                self.table.end_flush(id);
                if err.is_io() {
                    self.poison(&err.to_string());
                }
                Err(err)
            }
        }
    }

    fn emit(&mut self, id: ObjectId, payload: &Value) -> DocumentResult<()> {
        let mut targets = Vec::new();
        payload.visit_references(&[], &mut |target| targets.push(target));
        if let Some(target) = targets.iter().find(|t| !self.table.contains(**t)) {
            return Err(DocumentError::DanglingReference {
                from: id,
                target: *target,
            });
        }

        if self.object_streams_enabled() && ObjectStreamBuilder::accepts(id, payload) {
            self.write_to_object_stream(id, payload)?;
        } else {
            let offset = self.sink.write_object(id, payload, &self.options)?;
            self.table.mark_flushed(id, offset)?;
            self.spans.insert(id, offset..self.sink.position());
            debug!(%id, offset, "object flushed");
        }

        for target in targets {
            self.written_refs.entry(target).or_insert(id);
        }
        self.flushed_any = true;
        Ok(())
    }

    fn write_to_object_stream(&mut self, id: ObjectId, payload: &Value) -> DocumentResult<()> {
        let (stream_id, mut builder) = match self.object_stream.take() {
            Some(open) => open,
            None => {
                let reserved = self.table.allocate_fresh(Value::Null)?;
                let builder =
                    ObjectStreamBuilder::new(reserved.number(), self.config.object_stream_capacity);
                (reserved, builder)
            }
        };
        let index = match builder.push(id, payload) {
            Ok(index) => index,
            Err(err) => {
                self.object_stream = Some((stream_id, builder));
                return Err(err.into());
            }
        };
        self.table
            .mark_flushed_to_object_stream(id, stream_id.number(), index)?;
        debug!(%id, stream = %stream_id, index, "object packed");

        if builder.is_full() {
            self.write_object_stream(stream_id, builder)?;
        } else {
            self.object_stream = Some((stream_id, builder));
        }
        Ok(())
    }

    pub(crate) fn write_object_stream(
        &mut self,
        stream_id: ObjectId,
        builder: ObjectStreamBuilder,
    ) -> DocumentResult<()> {
        let members = builder.len();
        let stream = Value::Stream(builder.finish());
        let offset = self.sink.write_object(stream_id, &stream, &self.options)?;
        self.table.mark_flushed(stream_id, offset)?;
        debug!(id = %stream_id, offset, members, "object stream written");
        Ok(())
    }

    pub(crate) fn poison(&mut self, cause: &str) {
        error!(document = %self.id, %cause, "output failed, document poisoned");
        self.poisoned = true;
    }
}

fn has_nested_stream(value: &Value) -> bool {
    fn nested(value: &Value) -> bool {
        match value {
            Value::Stream(_) => true,
            Value::Array(items) => items.iter().any(nested),
            Value::Dictionary(dict) => dict.iter().any(|(_, v)| nested(v)),
            _ => false,
        }
    }
    match value {
        Value::Array(items) => items.iter().any(nested),
        Value::Dictionary(dict) => dict.iter().any(|(_, v)| nested(v)),
        Value::Stream(stream) => stream.dict.iter().any(|(_, v)| nested(v)),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    use quire_gate::{ConformanceLevel, GateConfig};
    use quire_table::TableError;
    use quire_types::{Dictionary, Stream};

    use crate::config::DocumentConfig;
    use crate::intent::{test_profile, OutputIntent};
    use crate::xobject::ImageXObject;

    fn archival(config: DocumentConfig) -> Document<Vec<u8>> {
        let mut doc = Document::with_config(
            Vec::new(),
            DocumentConfig {
                conformance: Some(ConformanceLevel::PdfA1B),
                ..config
            },
        )
        .unwrap();
        doc.set_output_intent(OutputIntent::new("sRGB", test_profile(b"RGB ", 2)))
            .unwrap();
        doc.set_xmp_metadata(b"<x:xmpmeta/>".to_vec()).unwrap();
        doc
    }

    fn page_with_image(doc: &mut Document<Vec<u8>>, image: ImageXObject) -> (ObjectId, ObjectId) {
        let page = doc.add_new_page().unwrap();
        let image = doc.add_image(image).unwrap();
        doc.add_page_resource(page, "XObject", "Im1", image).unwrap();
        (page, image)
    }

    #[test]
    fn single_flush_of_regulated_object_is_deferred() {
        let mut doc = archival(DocumentConfig::default());
        let (page, image) = page_with_image(&mut doc, ImageXObject::rgb8(1, 1, vec![0; 3]));

        assert!(doc.flush(image, false).unwrap().is_deferred());
        assert!(doc.flush(page, false).unwrap().is_deferred());
        assert!(!doc.is_flushed(image));
        assert_eq!(doc.bytes_written(), 0);
    }

    #[test]
    fn cascade_flushes_page_subgraph() {
        let mut doc = archival(DocumentConfig::default());
        let (page, image) = page_with_image(&mut doc, ImageXObject::rgb8(1, 1, vec![0; 3]));

        assert_eq!(doc.flush(page, true).unwrap(), FlushOutcome::Flushed);
        assert!(doc.is_flushed(page));
        assert!(doc.is_flushed(image));
        // The back edge to the page tree is not followed.
        assert!(!doc.is_flushed(doc.page_tree()));
    }

    #[test]
    fn reflush_writes_nothing() {
        let mut doc = Document::new(Vec::new()).unwrap();
        let id = doc.make_indirect(Value::Integer(5)).unwrap();
        assert_eq!(doc.flush(id, false).unwrap(), FlushOutcome::Flushed);
        let written = doc.bytes_written();
        assert_eq!(doc.flush(id, false).unwrap(), FlushOutcome::AlreadyFlushed);
        assert_eq!(doc.flush(id, true).unwrap(), FlushOutcome::AlreadyFlushed);
        assert_eq!(doc.bytes_written(), written);
        assert_eq!(doc.read_back(id), Some(&b"4 0 obj\n5\nendobj\n"[..]));
    }

    #[test]
    fn cascade_terminates_on_cycles() {
        let mut doc = Document::new(Vec::new()).unwrap();
        let a = doc.make_indirect(Value::Dictionary(Dictionary::new())).unwrap();
        let mut dict = Dictionary::new();
        dict.insert("Next", a);
        let b = doc.make_indirect(Value::Dictionary(dict)).unwrap();
        doc.resolve_mut(a)
            .unwrap()
            .as_dict_mut()
            .unwrap()
            .insert("Next", b);

        assert_eq!(doc.flush(a, true).unwrap(), FlushOutcome::Flushed);
        assert!(doc.is_flushed(a));
        assert!(doc.is_flushed(b));
        let written = doc.read_back(a).unwrap();
        assert!(written.starts_with(format!("{} 0 obj", a.number()).as_bytes()));
        let written = doc.read_back(b).unwrap();
        assert!(written.starts_with(format!("{} 0 obj", b.number()).as_bytes()));

        let report = doc.close().unwrap();
        assert!(report.xref.get(a.number()).is_some());
    }

    #[test]
    fn no_profile_never_defers() {
        let mut doc = Document::new(Vec::new()).unwrap();
        let page = doc.add_new_page().unwrap();
        let image = doc
            .add_image(ImageXObject::new(1, 1, Value::name("DeviceCMYK"), vec![0; 4]))
            .unwrap();
        assert_eq!(doc.flush(image, false).unwrap(), FlushOutcome::Flushed);
        assert_eq!(doc.flush(page, false).unwrap(), FlushOutcome::Flushed);
    }

    #[test]
    fn violation_in_cascade_writes_nothing() {
        let mut doc = archival(DocumentConfig::default());
        let cmyk = ImageXObject::new(1, 1, Value::name("DeviceCMYK"), vec![0; 4]);
        let (page, image) = page_with_image(&mut doc, cmyk);

        let outcome = doc.flush(page, true).unwrap();
        assert!(outcome.is_deferred());
        assert!(!doc.is_flushed(page));
        assert!(!doc.is_flushed(image));
        assert_eq!(doc.bytes_written(), 0);
        assert_eq!(doc.violations().len(), 1);
        assert_eq!(doc.violations()[0].rule, "image");
    }

    #[test]
    fn fail_fast_reports_immediately() {
        let config = DocumentConfig {
            gate: GateConfig {
                fail_fast: true,
                ..Default::default()
            },
            ..Default::default()
        };
        let mut doc = archival(config);
        let cmyk = ImageXObject::new(1, 1, Value::name("DeviceCMYK"), vec![0; 4]);
        let (page, _) = page_with_image(&mut doc, cmyk);

        match doc.flush(page, true) {
            Err(DocumentError::ConformanceViolation { violations }) => {
                assert_eq!(violations.len(), 1)
            }
            other => panic!("expected a violation, got {other:?}"),
        }
    }

    #[test]
    fn validate_unblocks_single_flushes() {
        let mut doc = archival(DocumentConfig::default());
        let (_, image) = page_with_image(&mut doc, ImageXObject::rgb8(1, 1, vec![0; 3]));

        assert!(doc.validate().unwrap().is_empty());
        assert_eq!(doc.flush(image, false).unwrap(), FlushOutcome::Flushed);
    }

    #[test]
    fn mutation_after_validation_needs_another_check() {
        let mut doc = archival(DocumentConfig::default());
        let (_, image) = page_with_image(&mut doc, ImageXObject::rgb8(1, 1, vec![0; 3]));
        doc.validate().unwrap();

        doc.resolve_mut(image)
            .unwrap()
            .insert("Interpolate", true)
            .unwrap();
        assert!(doc.flush(image, false).unwrap().is_deferred());
    }

    #[test]
    fn nested_streams_are_promoted() {
        let mut doc = Document::new(Vec::new()).unwrap();
        let array = doc
            .make_indirect(Value::Array(vec![
                Value::Integer(1),
                Value::Stream(Stream::from_bytes(b"abc".to_vec())),
            ]))
            .unwrap();
        let before = doc.table().len();

        assert_eq!(doc.flush(array, false).unwrap(), FlushOutcome::Flushed);
        assert_eq!(doc.table().len(), before + 1);
        let child = doc.table().entries().last().unwrap().id();
        assert!(doc.is_flushed(child));
    }

    #[test]
    fn dangling_reference_keeps_object_live() {
        let mut doc = Document::new(Vec::new()).unwrap();
        let target = doc.make_indirect(Value::Integer(1)).unwrap();
        let mut dict = Dictionary::new();
        dict.insert("Target", target);
        let holder = doc.make_indirect(Value::Dictionary(dict)).unwrap();
        doc.free(target).unwrap();

        let err = doc.flush(holder, false).unwrap_err();
        assert!(matches!(err, DocumentError::DanglingReference { from, .. } if from == holder));
        assert!(doc.resolve(holder).is_some());
        assert!(!doc.is_poisoned());
    }

    #[test]
    fn freeing_a_pinned_object_is_refused() {
        let mut doc = Document::new(Vec::new()).unwrap();
        let id = doc.make_indirect(Value::Integer(1)).unwrap();
        doc.table.begin_flush(id).unwrap();
        assert!(matches!(
            doc.free(id),
            Err(DocumentError::Table(TableError::ConcurrentMutation(_)))
        ));
        doc.table.end_flush(id);
        doc.free(id).unwrap();
    }

    /// Accepts a fixed number of writes, then fails.
    struct FailAfter {
        remaining: usize,
    }

    impl Write for FailAfter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.remaining == 0 {
                return Err(io::Error::new(io::ErrorKind::Other, "disk full"));
            }
            self.remaining -= 1;
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn io_failure_poisons_and_restores_payload() {
        // Two writes for the header, then the object write fails.
        let mut doc = Document::new(FailAfter { remaining: 2 }).unwrap();
        let id = doc.make_indirect(Value::Integer(9)).unwrap();

        let err = doc.flush(id, false).unwrap_err();
        assert!(err.is_io());
        assert!(doc.is_poisoned());
        assert_eq!(doc.resolve(id), Some(&Value::Integer(9)));
        assert!(!doc.is_flushed(id));
        assert!(matches!(doc.flush(id, false), Err(DocumentError::Poisoned)));
    }

    #[test]
    fn object_streams_pack_small_objects() {
        let config = DocumentConfig {
            object_streams: true,
            ..Default::default()
        };
        let mut doc = Document::with_config(Vec::new(), config).unwrap();
        let dict = doc.make_indirect(Value::Dictionary(Dictionary::new())).unwrap();
        let stream = doc
            .make_indirect(Value::Stream(Stream::from_bytes(b"q Q".to_vec())))
            .unwrap();

        doc.flush(dict, false).unwrap();
        doc.flush(stream, false).unwrap();
        assert_eq!(
            doc.table().state(dict).unwrap(),
            EntryState::FlushedToObjectStream
        );
        assert_eq!(doc.table().state(stream).unwrap(), EntryState::Flushed);
        assert!(doc.read_back(dict).is_none());
        assert!(doc.read_back(stream).is_some());
    }
}
