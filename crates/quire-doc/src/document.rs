use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::io::Write;
use std::ops::Range;

use quire_gate::{ConformanceGate, ConformanceLevel, OutputIntentInfo, Violation};
use quire_table::IndirectTable;
use quire_types::{Dictionary, DocumentId, ObjectId, Stream, Value};
use quire_writer::{ObjectStreamBuilder, OutputSink, SerializeOptions};
use tracing::{debug, warn};

use crate::config::DocumentConfig;
use crate::error::{DocumentError, DocumentResult, DocumentWarning};
use crate::intent::OutputIntent;

/// Where the output intent of a document lives.
#[derive(Clone, Copy, Debug)]
pub(crate) struct IntentRecord {
    pub id: ObjectId,
    pub profile: ObjectId,
    pub components: u8,
}

/// A document under construction.
///
/// Owns the reference table, the conformance gate and the output sink.
/// Objects are registered with [`Document::make_indirect`], written with
/// [`Document::flush`], and the cross-reference section is emitted by
/// [`Document::close`]. All mutation goes through `&mut self`; separate
/// documents share nothing and can be built on separate threads.
pub struct Document<W: Write> {
    pub(crate) id: DocumentId,
    pub(crate) config: DocumentConfig,
    pub(crate) table: IndirectTable,
    pub(crate) gate: ConformanceGate,
    pub(crate) sink: OutputSink<W>,
    pub(crate) options: SerializeOptions,
    pub(crate) catalog: ObjectId,
    pub(crate) page_tree: ObjectId,
    pub(crate) info: ObjectId,
    pub(crate) pages: Vec<ObjectId>,
    pub(crate) output_intent: Option<IntentRecord>,
    pub(crate) metadata: Option<ObjectId>,
    /// The object stream being filled and the number reserved for it.
    pub(crate) object_stream: Option<(ObjectId, ObjectStreamBuilder)>,
    /// Every reference target written so far, with the first object that
    /// referenced it.
    pub(crate) written_refs: BTreeMap<ObjectId, ObjectId>,
    /// Byte ranges of objects written at an offset.
    pub(crate) spans: HashMap<ObjectId, Range<u64>>,
    /// Embedded fonts by family, for reuse within this document.
    pub(crate) fonts: HashMap<String, ObjectId>,
    pub(crate) warnings: Vec<DocumentWarning>,
    pub(crate) header_written: bool,
    pub(crate) flushed_any: bool,
    pub(crate) poisoned: bool,
}

impl<W: Write> Document<W> {
    /// A document with the default configuration.
    pub fn new(writer: W) -> DocumentResult<Self> {
        Self::with_config(writer, DocumentConfig::default())
    }

    pub fn with_config(writer: W, config: DocumentConfig) -> DocumentResult<Self> {
        config.validate()?;
        let id = DocumentId::new();
        let mut table = IndirectTable::with_reuse(id, config.reuse_free_numbers);

        let catalog = table.allocate(Value::Null)?;
        let mut tree = Dictionary::with_type("Pages");
        tree.insert("Kids", Vec::<Value>::new());
        tree.insert("Count", 0);
        let page_tree = table.allocate(Value::Dictionary(tree))?;
        let mut root = Dictionary::with_type("Catalog");
        root.insert("Pages", page_tree);
        if let Some(slot) = table.resolve_mut(catalog) {
            *slot = Value::Dictionary(root);
        }
        let mut info = Dictionary::new();
        info.insert(
            "Producer",
            quire_types::PdfString::literal(config.producer.as_bytes()),
        );
        let info = table.allocate(Value::Dictionary(info))?;

        let gate = ConformanceGate::new(config.conformance, config.gate.clone());
        let options = SerializeOptions {
            compress_streams: config.compress_streams,
            compression_level: config.compression_level,
        };

        let mut doc = Self {
            id,
            config,
            table,
            gate,
            sink: OutputSink::new(writer),
            options,
            catalog,
            page_tree,
            info,
            pages: Vec::new(),
            output_intent: None,
            metadata: None,
            object_stream: None,
            written_refs: BTreeMap::new(),
            spans: HashMap::new(),
            fonts: HashMap::new(),
            warnings: Vec::new(),
            header_written: false,
            flushed_any: false,
            poisoned: false,
        };
        doc.note_object_stream_support();
        debug!(document = %doc.id, level = ?doc.config.conformance, "document created");
        Ok(doc)
    }

    // ---- Accessors ----

    pub fn id(&self) -> DocumentId {
        self.id
    }

    pub fn config(&self) -> &DocumentConfig {
        &self.config
    }

    pub fn conformance_level(&self) -> Option<ConformanceLevel> {
        self.gate.level()
    }

    pub fn catalog(&self) -> ObjectId {
        self.catalog
    }

    pub fn info(&self) -> ObjectId {
        self.info
    }

    /// Root of the page tree.
    pub fn page_tree(&self) -> ObjectId {
        self.page_tree
    }

    pub fn table(&self) -> &IndirectTable {
        &self.table
    }

    pub fn gate(&self) -> &ConformanceGate {
        &self.gate
    }

    pub fn warnings(&self) -> &[DocumentWarning] {
        &self.warnings
    }

    /// Violations recorded by the gate so far.
    pub fn violations(&self) -> Vec<Violation> {
        self.gate.violations()
    }

    pub fn bytes_written(&self) -> u64 {
        self.sink.position()
    }

    /// Returns `true` after an I/O failure; the output must be discarded.
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    // ---- Conformance ----

    /// Attach a conformance level. Only allowed before any byte was written.
    pub fn set_conformance_level(&mut self, level: ConformanceLevel) -> DocumentResult<()> {
        self.ensure_usable()?;
        if self.header_written || self.flushed_any {
            return Err(DocumentError::ConformanceLevelLocked);
        }
        self.config.conformance = Some(level);
        self.gate = ConformanceGate::new(Some(level), self.config.gate.clone());
        if let Some(intent) = self.output_intent {
            let dict = self.live_dict_mut(intent.id)?;
            dict.insert("S", Value::name(level.output_intent_subtype()));
        }
        self.note_object_stream_support();
        debug!(document = %self.id, %level, "conformance level attached");
        Ok(())
    }

    /// Register the output intent and hook it into the catalog.
    pub fn set_output_intent(&mut self, intent: OutputIntent) -> DocumentResult<ObjectId> {
        self.ensure_usable()?;
        if self.output_intent.is_some() {
            return Err(DocumentError::InvalidOperation(
                "output intent is already set".into(),
            ));
        }
        let components = intent.components()?;
        // Fail before allocating anything if the catalog is gone.
        self.catalog_mut()?;

        let profile = self
            .table
            .allocate(Value::Stream(intent.profile_stream(components)))?;
        let dict = intent.to_dictionary(self.conformance_level(), profile);
        let id = self.table.allocate(Value::Dictionary(dict))?;
        self.catalog_mut()?
            .insert("OutputIntents", vec![Value::Reference(id)]);
        self.output_intent = Some(IntentRecord {
            id,
            profile,
            components,
        });
        debug!(%id, %profile, components, "output intent set");
        Ok(id)
    }

    /// Register caller-built XMP bytes as the document metadata stream.
    pub fn set_xmp_metadata(&mut self, xmp: Vec<u8>) -> DocumentResult<ObjectId> {
        self.ensure_usable()?;
        if self.metadata.is_some() {
            return Err(DocumentError::InvalidOperation(
                "XMP metadata is already set".into(),
            ));
        }
        self.catalog_mut()?;
        let mut dict = Dictionary::with_type("Metadata");
        dict.insert("Subtype", Value::name("XML"));
        let id = self.table.allocate(Value::Stream(Stream::new(dict, xmp)))?;
        self.catalog_mut()?.insert("Metadata", id);
        self.metadata = Some(id);
        Ok(id)
    }

    // ---- Object graph ----

    /// Register `value` as an indirect object. A reference converts to the
    /// id it already names.
    pub fn make_indirect(&mut self, value: Value) -> DocumentResult<ObjectId> {
        if let Value::Reference(id) = value {
            if self.table.contains(id) {
                return Ok(id);
            }
            return Err(DocumentError::UnknownObject(id));
        }
        Ok(self.table.allocate(value)?)
    }

    /// The live payload of `id`; `None` once flushed or freed.
    pub fn resolve(&self, id: ObjectId) -> Option<&Value> {
        self.table.resolve(id)
    }

    /// Mutable access to a live payload. Any earlier gate verdict for `id`
    /// is dropped, so the object is checked again before it is written.
    pub fn resolve_mut(&mut self, id: ObjectId) -> Option<&mut Value> {
        self.gate.forget(id);
        self.table.resolve_mut(id)
    }

    pub fn is_flushed(&self, id: ObjectId) -> bool {
        self.table.is_flushed(id)
    }

    /// Release `id`. Its number may be reused with a higher generation.
    pub fn free(&mut self, id: ObjectId) -> DocumentResult<()> {
        if [self.catalog, self.page_tree, self.info].contains(&id) || self.pages.contains(&id) {
            return Err(DocumentError::InvalidOperation(format!(
                "object {id} is part of the document structure"
            )));
        }
        self.table.free(id)?;
        self.gate.forget(id);
        self.spans.remove(&id);
        if self.metadata == Some(id) {
            self.metadata = None;
        }
        self.fonts.retain(|_, font| *font != id);
        Ok(())
    }

    // ---- Internal helpers ----

    pub(crate) fn ensure_usable(&self) -> DocumentResult<()> {
        if self.poisoned {
            return Err(DocumentError::Poisoned);
        }
        Ok(())
    }

    pub(crate) fn intent_info(&self) -> Option<OutputIntentInfo> {
        self.output_intent.map(|i| OutputIntentInfo {
            components: i.components,
        })
    }

    pub(crate) fn object_streams_enabled(&self) -> bool {
        self.config.object_streams
            && self
                .conformance_level()
                .map_or(true, |level| level.allows_object_streams())
    }

    pub(crate) fn header_version(&self) -> &'static str {
        self.conformance_level()
            .map_or("1.7", |level| level.header_version())
    }

    fn note_object_stream_support(&mut self) {
        if let Some(level) = self.conformance_level() {
            if self.config.object_streams && !level.allows_object_streams() {
                warn!(%level, "object streams disabled by conformance level");
                self.warnings
                    .push(DocumentWarning::ObjectStreamsDisabled(level));
            }
        }
    }

    /// Payload of a live object, distinguishing flushed from unknown ids.
    pub(crate) fn live_value_mut(&mut self, id: ObjectId) -> DocumentResult<&mut Value> {
        if self.table.is_flushed(id) {
            return Err(DocumentError::ObjectFlushed(id));
        }
        self.table
            .resolve_mut(id)
            .ok_or(DocumentError::UnknownObject(id))
    }

    pub(crate) fn live_dict_mut(&mut self, id: ObjectId) -> DocumentResult<&mut Dictionary> {
        Ok(self.live_value_mut(id)?.as_dict_mut()?)
    }

    /// Ids of live objects, ascending, without the open object stream.
    pub(crate) fn live_ids(&self) -> Vec<ObjectId> {
        let open = self.object_stream.as_ref().map(|(id, _)| *id);
        self.table
            .live_ids()
            .into_iter()
            .filter(|id| Some(*id) != open)
            .collect()
    }

    pub(crate) fn catalog_mut(&mut self) -> DocumentResult<&mut Dictionary> {
        let catalog = self.catalog;
        self.live_dict_mut(catalog)
    }
}

impl<W: Write + AsRef<[u8]>> Document<W> {
    /// The bytes already written for `id`, when the sink keeps them in
    /// memory. `None` for objects not written at an offset of their own.
    pub fn read_back(&self, id: ObjectId) -> Option<&[u8]> {
        if !self.table.is_flushed(id) {
            return None;
        }
        let span = self.spans.get(&id)?;
        let start = usize::try_from(span.start).ok()?;
        let end = usize::try_from(span.end).ok()?;
        self.sink.get_ref().as_ref().get(start..end)
    }
}

impl<W: Write> fmt::Debug for Document<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("id", &self.id)
            .field("level", &self.conformance_level())
            .field("objects", &self.table.len())
            .field("pages", &self.pages.len())
            .field("bytes_written", &self.sink.position())
            .field("poisoned", &self.poisoned)
            .finish_non_exhaustive()
    }
}
