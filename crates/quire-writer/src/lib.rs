//! Byte-level output for quire documents.
//!
//! Turns values into object syntax and keeps the accounting needed for the
//! cross-reference section.
//!
//! # Architecture
//!
//! - **OutputSink**: append-only writer with a byte cursor and BLAKE3 digest
//! - **serialize**: value encoding, object framing, Flate compression
//! - **ObjectStreamBuilder**: packs small objects into `/Type /ObjStm`
//! - **CrossReference**: one entry per object number, built from the table,
//!   written as a classic table or a cross-reference stream
//! - **XrefReader**: parses a classic table and trailer back

pub mod entry;
pub mod error;
pub mod objstm;
pub mod reader;
pub mod serialize;
pub mod writer;
pub mod xref;

pub use entry::XrefEntry;
pub use error::{WriterError, WriterResult};
pub use objstm::ObjectStreamBuilder;
pub use reader::{parse_indirect_object, Parser, XrefReader};
pub use serialize::{deflate, encode_object, inflate, SerializeOptions};
pub use writer::OutputSink;
pub use xref::{CrossReference, Trailer};

#[cfg(test)]
mod tests {
    use super::*;
    use quire_table::IndirectTable;
    use quire_types::{Dictionary, DocumentId, ObjectId, Stream, Value};

    /// Write every live object of `table` to `sink` and finish with a
    /// classic cross-reference section.
    fn write_all<W: std::io::Write>(table: &mut IndirectTable, sink: &mut OutputSink<W>, root: ObjectId) {
        let options = SerializeOptions::default();
        for id in table.live_ids() {
            let value = table.take_payload(id).unwrap();
            let offset = sink.write_object(id, &value, &options).unwrap();
            table.mark_flushed(id, offset).unwrap();
        }
        let xref = CrossReference::build(table).unwrap();
        let trailer = Trailer {
            size: xref.size(),
            root,
            info: None,
            file_id: Trailer::file_id_from_digest(&sink.digest()),
        };
        sink.write_xref_table(&xref, &trailer).unwrap();
    }

    fn small_table() -> (IndirectTable, ObjectId) {
        let mut table = IndirectTable::with_reuse(DocumentId::new(), false);
        let pages = table.allocate(Value::Null).unwrap();
        let mut catalog = Dictionary::with_type("Catalog");
        catalog.insert("Pages", pages);
        let root = table.allocate(Value::Dictionary(catalog)).unwrap();
        *table.resolve_mut(pages).unwrap() = Value::Dictionary(Dictionary::with_type("Pages"));
        let scratch = table.allocate(Value::Integer(1)).unwrap();
        table.free(scratch).unwrap();
        let content = Stream::from_bytes(b"0 0 m 10 10 l S".to_vec());
        table.allocate(Value::Stream(content)).unwrap();
        (table, root)
    }

    #[test]
    fn written_document_reads_back() {
        let (mut table, root) = small_table();
        let mut sink = OutputSink::new(Vec::new());
        sink.write_header("1.7").unwrap();
        write_all(&mut table, &mut sink, root);
        let bytes = sink.into_inner();

        let reader = XrefReader::parse(&bytes).unwrap();
        assert_eq!(reader.size(), Some(5));
        assert_eq!(reader.root(), Some(root));
        assert_eq!(reader.xref().free_chain(), vec![3]);

        let (id, catalog) = reader.read_object(&bytes, root.number()).unwrap().unwrap();
        assert_eq!(id, root);
        assert_eq!(catalog.as_dict().unwrap().type_name().unwrap(), "Catalog");

        let (_, content) = reader.read_object(&bytes, 4).unwrap().unwrap();
        assert_eq!(content.as_stream().unwrap().data, b"0 0 m 10 10 l S");
        assert!(reader.read_object(&bytes, 3).unwrap().is_none());
    }

    #[test]
    fn file_id_comes_from_content_digest() {
        let (mut first, root) = small_table();
        let mut sink = OutputSink::new(Vec::new());
        sink.write_header("1.7").unwrap();
        write_all(&mut first, &mut sink, root);
        let bytes = sink.into_inner();
        let reader = XrefReader::parse(&bytes).unwrap();
        let id = reader.file_id().unwrap();
        assert_eq!(id.len(), 16);

        let xref_start = reader.startxref() as usize;
        let digest = blake3::hash(&bytes[..xref_start]);
        assert_eq!(id, &digest.as_bytes()[..16]);
    }

    #[test]
    fn writes_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.pdf");
        let (mut table, root) = small_table();
        let mut sink = OutputSink::new(std::fs::File::create(&path).unwrap());
        sink.write_header("1.4").unwrap();
        write_all(&mut table, &mut sink, root);
        sink.flush().unwrap();
        let written = sink.position();
        drop(sink);

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(bytes.len() as u64, written);
        assert!(bytes.ends_with(b"%%EOF\n"));
        assert!(XrefReader::parse(&bytes).is_ok());
    }
}
