use std::borrow::Cow;
use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use quire_types::{Dictionary, ObjectId, PdfString, Stream, StringFormat, Value};

use crate::error::{WriterError, WriterResult};

/// Knobs for object serialization.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SerializeOptions {
    /// Flate-compress streams that carry no `/Filter` yet.
    pub compress_streams: bool,
    /// zlib level, 0-9.
    pub compression_level: u32,
}

impl Default for SerializeOptions {
    fn default() -> Self {
        Self {
            compress_streams: false,
            compression_level: 6,
        }
    }
}

/// Serialize a framed indirect object: `n g obj ... endobj`.
///
/// A top-level stream gets its `/Length` filled in. Streams nested anywhere
/// below the top level are rejected; the flush engine promotes them first.
pub fn encode_object(id: ObjectId, value: &Value, options: &SerializeOptions) -> WriterResult<Vec<u8>> {
    let mut buf = format!("{} {} obj\n", id.number(), id.generation()).into_bytes();
    match value {
        Value::Stream(stream) => encode_stream(&mut buf, id, stream, options)?,
        other => encode_value(&mut buf, other, id)?,
    }
    buf.extend_from_slice(b"\nendobj\n");
    Ok(buf)
}

/// Serialize a direct value. `owner` is only used for error reporting.
pub fn encode_value(buf: &mut Vec<u8>, value: &Value, owner: ObjectId) -> WriterResult<()> {
    match value {
        Value::Null => buf.extend_from_slice(b"null"),
        Value::Bool(true) => buf.extend_from_slice(b"true"),
        Value::Bool(false) => buf.extend_from_slice(b"false"),
        Value::Integer(i) => buf.extend_from_slice(i.to_string().as_bytes()),
        Value::Real(r) => buf.extend_from_slice(format_real(*r).as_bytes()),
        Value::String(s) => encode_string(buf, s),
        Value::Name(n) => encode_name(buf, n.as_str()),
        Value::Array(items) => {
            buf.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    buf.push(b' ');
                }
                encode_value(buf, item, owner)?;
            }
            buf.push(b']');
        }
        Value::Dictionary(dict) => encode_dict(buf, dict, owner)?,
        Value::Stream(_) => return Err(WriterError::NestedStream(owner)),
        Value::Reference(id) => {
            buf.extend_from_slice(format!("{} {} R", id.number(), id.generation()).as_bytes())
        }
    }
    Ok(())
}

/// Serialize a direct value to a fresh buffer.
pub fn to_bytes(value: &Value) -> WriterResult<Vec<u8>> {
    let mut buf = Vec::new();
    encode_value(&mut buf, value, ObjectId::free_head())?;
    Ok(buf)
}

fn encode_dict(buf: &mut Vec<u8>, dict: &Dictionary, owner: ObjectId) -> WriterResult<()> {
    buf.extend_from_slice(b"<<");
    for (key, value) in dict {
        buf.push(b' ');
        encode_name(buf, key.as_str());
        buf.push(b' ');
        encode_value(buf, value, owner)?;
    }
    buf.extend_from_slice(b" >>");
    Ok(())
}

fn encode_stream(
    buf: &mut Vec<u8>,
    owner: ObjectId,
    stream: &Stream,
    options: &SerializeOptions,
) -> WriterResult<()> {
    let prepared = prepare_stream(stream, options)?;
    let mut dict = prepared.dict.clone();
    dict.insert("Length", prepared.data.len());
    encode_dict(buf, &dict, owner)?;
    buf.extend_from_slice(b"\nstream\n");
    buf.extend_from_slice(&prepared.data);
    buf.extend_from_slice(b"\nendstream");
    Ok(())
}

/// Apply compression to a stream if the options ask for it.
///
/// Streams that already declare a `/Filter`, empty streams, and XMP metadata
/// streams are passed through untouched.
pub fn prepare_stream<'a>(stream: &'a Stream, options: &SerializeOptions) -> WriterResult<Cow<'a, Stream>> {
    let is_metadata = stream.dict.type_name().is_some_and(|t| t == "Metadata");
    if !options.compress_streams || stream.is_encoded() || is_metadata || stream.data.is_empty() {
        return Ok(Cow::Borrowed(stream));
    }
    let compressed = deflate(&stream.data, options.compression_level)?;
    let mut dict = stream.dict.clone();
    dict.insert("Filter", Value::name("FlateDecode"));
    Ok(Cow::Owned(Stream::new(dict, compressed)))
}

/// zlib-compress `data` (the `/FlateDecode` encoding).
pub fn deflate(data: &[u8], level: u32) -> WriterResult<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(level.min(9)));
    encoder
        .write_all(data)
        .map_err(|e| WriterError::CompressionFailed(e.to_string()))?;
    encoder
        .finish()
        .map_err(|e| WriterError::CompressionFailed(e.to_string()))
}

/// Inverse of [`deflate`].
pub fn inflate(data: &[u8]) -> WriterResult<Vec<u8>> {
    let mut out = Vec::new();
    ZlibDecoder::new(data)
        .read_to_end(&mut out)
        .map_err(|e| WriterError::CompressionFailed(e.to_string()))?;
    Ok(out)
}

fn is_regular(b: u8) -> bool {
    (b'!'..=b'~').contains(&b) && !b"()<>[]{}/%#".contains(&b)
}

fn encode_name(buf: &mut Vec<u8>, name: &str) {
    buf.push(b'/');
    for &b in name.as_bytes() {
        if is_regular(b) {
            buf.push(b);
        } else {
            buf.extend_from_slice(format!("#{b:02X}").as_bytes());
        }
    }
}

fn encode_string(buf: &mut Vec<u8>, s: &PdfString) {
    match s.format {
        StringFormat::Hex => {
            buf.push(b'<');
            buf.extend_from_slice(hex::encode_upper(&s.bytes).as_bytes());
            buf.push(b'>');
        }
        StringFormat::Literal => {
            buf.push(b'(');
            for &b in &s.bytes {
                match b {
                    b'(' | b')' | b'\\' => buf.extend_from_slice(&[b'\\', b]),
                    b'\n' => buf.extend_from_slice(b"\\n"),
                    b'\r' => buf.extend_from_slice(b"\\r"),
                    _ => buf.push(b),
                }
            }
            buf.push(b')');
        }
    }
}

/// Format a real without exponent notation, trimming trailing zeros.
/// Non-finite values are written as `0`.
pub fn format_real(r: f64) -> String {
    if !r.is_finite() {
        return "0".to_string();
    }
    let mut s = format!("{r:.6}");
    if s.contains('.') {
        while s.ends_with('0') {
            s.pop();
        }
        if s.ends_with('.') {
            s.pop();
        }
    }
    if s == "-0" {
        s = "0".to_string();
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(value: &Value) -> String {
        String::from_utf8(to_bytes(value).unwrap()).unwrap()
    }

    #[test]
    fn scalars() {
        assert_eq!(text(&Value::Null), "null");
        assert_eq!(text(&Value::Bool(true)), "true");
        assert_eq!(text(&Value::Integer(-42)), "-42");
        assert_eq!(text(&Value::Reference(ObjectId::new(12, 3))), "12 3 R");
    }

    #[test]
    fn reals_avoid_exponents() {
        assert_eq!(format_real(0.5), "0.5");
        assert_eq!(format_real(612.0), "612");
        assert_eq!(format_real(1e-9), "0");
        assert_eq!(format_real(-0.0), "0");
        assert_eq!(format_real(1.0e10), "10000000000");
        assert_eq!(format_real(f64::NAN), "0");
    }

    #[test]
    fn names_escape_delimiters_and_whitespace() {
        assert_eq!(text(&Value::name("Type")), "/Type");
        assert_eq!(text(&Value::name("A B")), "/A#20B");
        assert_eq!(text(&Value::name("x#y/z")), "/x#23y#2Fz");
    }

    #[test]
    fn strings() {
        assert_eq!(text(&Value::string("a(b)c\\")), "(a\\(b\\)c\\\\)");
        assert_eq!(text(&Value::string("l1\nl2")), "(l1\\nl2)");
        assert_eq!(text(&Value::String(PdfString::hex(vec![0xde, 0xad]))), "<DEAD>");
    }

    #[test]
    fn composites() {
        let mut d = Dictionary::with_type("Page");
        d.insert(
            "MediaBox",
            vec![Value::from(0), Value::from(0), Value::from(612), Value::from(792)],
        );
        assert_eq!(
            text(&Value::Dictionary(d)),
            "<< /MediaBox [0 0 612 792] /Type /Page >>"
        );
        assert_eq!(text(&Value::Dictionary(Dictionary::new())), "<< >>");
        assert_eq!(text(&Value::Array(vec![])), "[]");
    }

    #[test]
    fn nested_stream_is_rejected() {
        let owner = ObjectId::new(4, 0);
        let value = Value::Array(vec![Value::Stream(Stream::from_bytes(b"x".to_vec()))]);
        let err = encode_object(owner, &value, &SerializeOptions::default()).unwrap_err();
        assert!(matches!(err, WriterError::NestedStream(id) if id == owner));
    }

    #[test]
    fn framed_stream_gets_length() {
        let stream = Value::Stream(Stream::from_bytes(b"BT ET".to_vec()));
        let bytes = encode_object(ObjectId::new(7, 0), &stream, &SerializeOptions::default()).unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            "7 0 obj\n<< /Length 5 >>\nstream\nBT ET\nendstream\nendobj\n"
        );
    }

    #[test]
    fn compression_skips_metadata_and_encoded_streams() {
        let options = SerializeOptions {
            compress_streams: true,
            ..Default::default()
        };
        let plain = Stream::from_bytes(vec![b'q'; 200]);
        let prepared = prepare_stream(&plain, &options).unwrap();
        assert!(prepared.is_encoded());
        assert_eq!(inflate(&prepared.data).unwrap(), plain.data);

        let meta = Stream::new(Dictionary::with_type("Metadata"), b"<x:xmpmeta/>".to_vec());
        assert!(matches!(prepare_stream(&meta, &options).unwrap(), Cow::Borrowed(_)));

        let mut dict = Dictionary::new();
        dict.insert("Filter", Value::name("DCTDecode"));
        let jpeg = Stream::new(dict, vec![0xff, 0xd8]);
        assert!(matches!(prepare_stream(&jpeg, &options).unwrap(), Cow::Borrowed(_)));
    }
}
