use std::fmt;
use std::io::Write;

use quire_types::{ObjectId, Value};
use tracing::trace;

use crate::error::WriterResult;
use crate::serialize::{encode_object, encode_value, SerializeOptions};
use crate::xref::{CrossReference, Trailer};

/// Binary comment after the header line so transports treat the file as
/// binary.
const BINARY_MARKER: &[u8] = b"%\xE2\xE3\xCF\xD3\n";

/// Append-only output with a running byte offset and content digest.
///
/// Every byte goes through [`OutputSink::write_bytes`], which returns the
/// offset the bytes landed at. Offsets recorded in the reference table come
/// from here.
pub struct OutputSink<W: Write> {
    inner: W,
    position: u64,
    hasher: blake3::Hasher,
}

impl<W: Write> OutputSink<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            position: 0,
            hasher: blake3::Hasher::new(),
        }
    }

    /// Current write cursor, i.e. total bytes accepted so far.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Write raw bytes and return the offset they start at.
    ///
    /// On error the cursor is left where it was; the caller must treat the
    /// output as unusable since the sink may have taken part of the buffer.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> WriterResult<u64> {
        let offset = self.position;
        self.inner.write_all(bytes)?;
        self.hasher.update(bytes);
        self.position += bytes.len() as u64;
        Ok(offset)
    }

    /// `%PDF-x.y` plus the binary marker comment.
    pub fn write_header(&mut self, version: &str) -> WriterResult<u64> {
        let offset = self.write_bytes(format!("%PDF-{version}\n").as_bytes())?;
        self.write_bytes(BINARY_MARKER)?;
        Ok(offset)
    }

    /// Serialize and write one indirect object; returns its offset.
    pub fn write_object(
        &mut self,
        id: ObjectId,
        value: &Value,
        options: &SerializeOptions,
    ) -> WriterResult<u64> {
        let bytes = encode_object(id, value, options)?;
        let offset = self.write_bytes(&bytes)?;
        trace!(%id, offset, len = bytes.len(), "object written");
        Ok(offset)
    }

    /// Classic `xref` table, trailer, `startxref` and `%%EOF`.
    /// Returns the offset of the `xref` keyword.
    pub fn write_xref_table(&mut self, xref: &CrossReference, trailer: &Trailer) -> WriterResult<u64> {
        let start = self.write_bytes(&xref.to_classic_bytes()?)?;
        let mut tail = b"trailer\n".to_vec();
        encode_value(&mut tail, &Value::Dictionary(trailer.to_dictionary()), trailer.root)?;
        tail.extend_from_slice(format!("\nstartxref\n{start}\n%%EOF\n").as_bytes());
        self.write_bytes(&tail)?;
        Ok(start)
    }

    /// Cross-reference stream written as object `id`, then `startxref` and
    /// `%%EOF`. `id` must already be recorded as flushed at the current
    /// position so the stream lists itself.
    pub fn write_xref_stream(
        &mut self,
        id: ObjectId,
        xref: &CrossReference,
        trailer: &Trailer,
        options: &SerializeOptions,
    ) -> WriterResult<u64> {
        let stream = Value::Stream(xref.to_stream(trailer));
        let start = self.write_object(id, &stream, options)?;
        self.write_bytes(format!("startxref\n{start}\n%%EOF\n").as_bytes())?;
        Ok(start)
    }

    pub fn flush(&mut self) -> WriterResult<()> {
        self.inner.flush()?;
        Ok(())
    }

    /// BLAKE3 digest of everything written so far.
    pub fn digest(&self) -> [u8; 32] {
        *self.hasher.finalize().as_bytes()
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> fmt::Debug for OutputSink<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputSink")
            .field("position", &self.position)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    struct FailingWriter;

    impl Write for FailingWriter {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "disk full"))
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn offsets_track_written_bytes() {
        let mut sink = OutputSink::new(Vec::new());
        assert_eq!(sink.write_header("1.7").unwrap(), 0);
        let at = sink.position();
        let offset = sink
            .write_object(ObjectId::new(1, 0), &Value::Integer(5), &SerializeOptions::default())
            .unwrap();
        assert_eq!(offset, at);
        let bytes = sink.into_inner();
        assert!(bytes.starts_with(b"%PDF-1.7\n"));
        assert_eq!(&bytes[offset as usize..], b"1 0 obj\n5\nendobj\n");
    }

    #[test]
    fn digest_matches_content() {
        let mut sink = OutputSink::new(Vec::new());
        sink.write_bytes(b"hello").unwrap();
        assert_eq!(sink.digest(), *blake3::hash(b"hello").as_bytes());
    }

    #[test]
    fn failed_write_leaves_cursor() {
        let mut sink = OutputSink::new(FailingWriter);
        assert!(sink.write_bytes(b"abc").is_err());
        assert_eq!(sink.position(), 0);
    }

    #[test]
    fn xref_table_ends_with_startxref() {
        let mut sink = OutputSink::new(Vec::new());
        sink.write_header("1.4").unwrap();
        let xref = CrossReference::from_entries(vec![crate::XrefEntry::free_head(0)]);
        let trailer = Trailer {
            size: 1,
            root: ObjectId::new(1, 0),
            info: None,
            file_id: [0; 16],
        };
        let start = sink.write_xref_table(&xref, &trailer).unwrap();
        let text = String::from_utf8_lossy(sink.get_ref()).into_owned();
        assert!(text.ends_with(&format!("startxref\n{start}\n%%EOF\n")));
        assert!(text.contains("trailer\n<< /ID [<"));
    }
}
