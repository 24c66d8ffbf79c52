use quire_types::{Dictionary, Name, ObjectId, PdfString, Stream, Value};

use crate::entry::XrefEntry;
use crate::error::{WriterError, WriterResult};
use crate::xref::CrossReference;

const XREF_LINE_LEN: usize = 20;

fn is_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\r' | b'\n' | b'\x0c' | b'\0')
}

fn is_delimiter(b: u8) -> bool {
    b"()<>[]{}/%".contains(&b)
}

/// Minimal parser for the object syntax this crate writes.
///
/// Covers every value kind plus framed indirect objects with a direct
/// `/Length`. Encryption, indirect lengths and cross-reference streams are
/// out of reach.
#[derive(Debug)]
pub struct Parser<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self::at(data, 0)
    }

    pub fn at(data: &'a [u8], pos: usize) -> Self {
        Self { data, pos }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    fn peek(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while let Some(b) = self.peek() {
            if is_whitespace(b) {
                self.pos += 1;
            } else if b == b'%' {
                while let Some(c) = self.peek() {
                    self.pos += 1;
                    if c == b'\n' || c == b'\r' {
                        break;
                    }
                }
            } else {
                break;
            }
        }
    }

    /// Next run of regular characters.
    fn token(&mut self) -> &'a [u8] {
        self.skip_whitespace();
        let start = self.pos;
        while let Some(b) = self.peek() {
            if is_whitespace(b) || is_delimiter(b) {
                break;
            }
            self.pos += 1;
        }
        &self.data[start..self.pos]
    }

    pub fn expect_keyword(&mut self, keyword: &[u8]) -> WriterResult<()> {
        let at = self.pos;
        if self.token() != keyword {
            return Err(WriterError::parse(
                at,
                format!("expected '{}'", String::from_utf8_lossy(keyword)),
            ));
        }
        Ok(())
    }

    pub fn read_unsigned(&mut self) -> WriterResult<u64> {
        let at = self.pos;
        std::str::from_utf8(self.token())
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| WriterError::parse(at, "expected an unsigned integer"))
    }

    pub fn parse_value(&mut self) -> WriterResult<Value> {
        self.skip_whitespace();
        let at = self.pos;
        match self.peek() {
            None => Err(WriterError::parse(at, "unexpected end of input")),
            Some(b'/') => {
                self.pos += 1;
                Ok(Value::Name(self.parse_name_body()?))
            }
            Some(b'(') => {
                self.pos += 1;
                self.parse_literal().map(|bytes| Value::String(PdfString::literal(bytes)))
            }
            Some(b'<') if self.data.get(self.pos + 1) == Some(&b'<') => {
                self.pos += 2;
                self.parse_dict_body().map(Value::Dictionary)
            }
            Some(b'<') => {
                self.pos += 1;
                self.parse_hex().map(|bytes| Value::String(PdfString::hex(bytes)))
            }
            Some(b'[') => {
                self.pos += 1;
                let mut items = Vec::new();
                loop {
                    self.skip_whitespace();
                    if self.peek() == Some(b']') {
                        self.pos += 1;
                        return Ok(Value::Array(items));
                    }
                    items.push(self.parse_value()?);
                }
            }
            Some(b) if b.is_ascii_digit() || matches!(b, b'+' | b'-' | b'.') => {
                self.parse_number_or_reference()
            }
            Some(_) => match self.token() {
                b"true" => Ok(Value::Bool(true)),
                b"false" => Ok(Value::Bool(false)),
                b"null" => Ok(Value::Null),
                other => Err(WriterError::parse(
                    at,
                    format!("unexpected token '{}'", String::from_utf8_lossy(other)),
                )),
            },
        }
    }

    fn parse_number_or_reference(&mut self) -> WriterResult<Value> {
        let at = self.pos;
        let text = std::str::from_utf8(self.token())
            .map_err(|_| WriterError::parse(at, "number is not ASCII"))?;
        if text.contains('.') {
            return text
                .parse::<f64>()
                .map(Value::Real)
                .map_err(|_| WriterError::parse(at, format!("bad real '{text}'")));
        }
        let number = text
            .parse::<i64>()
            .map_err(|_| WriterError::parse(at, format!("bad integer '{text}'")))?;

        // `n g R` looks like two integers until the `R`.
        let save = self.pos;
        if let (Ok(num), Some(generation)) = (u32::try_from(number), self.try_generation()) {
            if self.token() == b"R" {
                return Ok(Value::Reference(ObjectId::new(num, generation)));
            }
        }
        self.pos = save;
        Ok(Value::Integer(number))
    }

    fn try_generation(&mut self) -> Option<u16> {
        let token = self.token();
        if token.is_empty() || !token.iter().all(u8::is_ascii_digit) {
            return None;
        }
        std::str::from_utf8(token).ok()?.parse().ok()
    }

    fn parse_name_body(&mut self) -> WriterResult<Name> {
        let start = self.pos;
        let mut bytes = Vec::new();
        while let Some(b) = self.peek() {
            if is_whitespace(b) || is_delimiter(b) {
                break;
            }
            if b == b'#' {
                let digits = self
                    .data
                    .get(self.pos + 1..self.pos + 3)
                    .ok_or_else(|| WriterError::parse(self.pos, "truncated #xx escape in name"))?;
                let decoded = hex::decode(digits)
                    .map_err(|_| WriterError::parse(self.pos, "bad #xx escape in name"))?;
                bytes.extend_from_slice(&decoded);
                self.pos += 3;
            } else {
                bytes.push(b);
                self.pos += 1;
            }
        }
        String::from_utf8(bytes)
            .map(Name::new)
            .map_err(|_| WriterError::parse(start, "name is not UTF-8"))
    }

    fn parse_literal(&mut self) -> WriterResult<Vec<u8>> {
        let start = self.pos;
        let mut out = Vec::new();
        let mut depth = 1usize;
        loop {
            let b = self
                .peek()
                .ok_or_else(|| WriterError::parse(start, "unterminated string"))?;
            self.pos += 1;
            match b {
                b'(' => {
                    depth += 1;
                    out.push(b);
                }
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(out);
                    }
                    out.push(b);
                }
                b'\\' => {
                    let esc = self
                        .peek()
                        .ok_or_else(|| WriterError::parse(start, "unterminated string"))?;
                    self.pos += 1;
                    match esc {
                        b'n' => out.push(b'\n'),
                        b'r' => out.push(b'\r'),
                        b't' => out.push(b'\t'),
                        b'b' => out.push(0x08),
                        b'f' => out.push(0x0c),
                        b'0'..=b'7' => {
                            let mut value = u32::from(esc - b'0');
                            for _ in 0..2 {
                                match self.peek() {
                                    Some(d @ b'0'..=b'7') => {
                                        value = value * 8 + u32::from(d - b'0');
                                        self.pos += 1;
                                    }
                                    _ => break,
                                }
                            }
                            out.push((value & 0xff) as u8);
                        }
                        b'\r' => {
                            if self.peek() == Some(b'\n') {
                                self.pos += 1;
                            }
                        }
                        b'\n' => {}
                        other => out.push(other),
                    }
                }
                other => out.push(other),
            }
        }
    }

    fn parse_hex(&mut self) -> WriterResult<Vec<u8>> {
        let start = self.pos;
        let mut digits = Vec::new();
        loop {
            let b = self
                .peek()
                .ok_or_else(|| WriterError::parse(start, "unterminated hex string"))?;
            self.pos += 1;
            match b {
                b'>' => break,
                b if is_whitespace(b) => {}
                b => digits.push(b),
            }
        }
        if digits.len() % 2 == 1 {
            digits.push(b'0');
        }
        hex::decode(&digits).map_err(|_| WriterError::parse(start, "bad hex string"))
    }

    fn parse_dict_body(&mut self) -> WriterResult<Dictionary> {
        let mut dict = Dictionary::new();
        loop {
            self.skip_whitespace();
            let at = self.pos;
            match self.peek() {
                Some(b'>') if self.data.get(self.pos + 1) == Some(&b'>') => {
                    self.pos += 2;
                    return Ok(dict);
                }
                Some(b'/') => {
                    self.pos += 1;
                    let key = self.parse_name_body()?;
                    let value = self.parse_value()?;
                    dict.insert(key, value);
                }
                _ => return Err(WriterError::parse(at, "expected a name key or '>>'")),
            }
        }
    }
}

/// Parse the framed indirect object starting at `offset`.
pub fn parse_indirect_object(data: &[u8], offset: usize) -> WriterResult<(ObjectId, Value)> {
    let mut p = Parser::at(data, offset);
    let number = u32::try_from(p.read_unsigned()?)
        .map_err(|_| WriterError::parse(offset, "object number out of range"))?;
    let generation = u16::try_from(p.read_unsigned()?)
        .map_err(|_| WriterError::parse(offset, "generation out of range"))?;
    p.expect_keyword(b"obj")?;
    let id = ObjectId::new(number, generation);

    let mut value = p.parse_value()?;
    let save = p.pos;
    if p.token() == b"stream" {
        let Value::Dictionary(dict) = value else {
            return Err(WriterError::parse(save, "stream keyword after a non-dictionary"));
        };
        if p.peek() == Some(b'\r') {
            p.pos += 1;
        }
        if p.peek() == Some(b'\n') {
            p.pos += 1;
        }
        let length = dict
            .get("Length")
            .and_then(|l| l.as_i64().ok())
            .and_then(|l| usize::try_from(l).ok())
            .ok_or_else(|| WriterError::parse(save, "stream needs a direct /Length"))?;
        let end = p.pos + length;
        let bytes = data
            .get(p.pos..end)
            .ok_or_else(|| WriterError::parse(p.pos, "stream data runs past the end"))?;
        p.pos = end;
        p.expect_keyword(b"endstream")?;
        value = Value::Stream(Stream::new(dict, bytes.to_vec()));
    } else {
        p.pos = save;
    }
    p.expect_keyword(b"endobj")?;
    Ok((id, value))
}

fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).rposition(|w| w == needle)
}

/// Reads a classic cross-reference table and trailer back from bytes.
#[derive(Clone, Debug)]
pub struct XrefReader {
    xref: CrossReference,
    trailer: Dictionary,
    startxref: u64,
}

impl XrefReader {
    pub fn parse(data: &[u8]) -> WriterResult<Self> {
        let marker = rfind(data, b"startxref")
            .ok_or_else(|| WriterError::XrefCorrupted("no startxref marker".into()))?;
        let mut p = Parser::at(data, marker + b"startxref".len());
        let startxref = p.read_unsigned()?;
        let start = usize::try_from(startxref)
            .ok()
            .filter(|s| *s < data.len())
            .ok_or_else(|| WriterError::XrefCorrupted(format!("startxref {startxref} is out of range")))?;

        let mut p = Parser::at(data, start);
        if p.token() != b"xref" {
            return Err(WriterError::XrefCorrupted(format!(
                "no classic xref table at offset {start}"
            )));
        }

        let mut slots: Vec<Option<XrefEntry>> = Vec::new();
        loop {
            let save = p.pos;
            if p.token() == b"trailer" {
                break;
            }
            p.pos = save;
            let at = p.pos;
            let first = p.read_unsigned()? as usize;
            let count = p.read_unsigned()? as usize;
            // Each entry occupies a 20-byte line.
            first
                .checked_add(count)
                .filter(|end| *end <= data.len() / XREF_LINE_LEN)
                .ok_or_else(|| {
                    WriterError::parse(at, format!("subsection {first} {count} exceeds the input"))
                })?;
            for i in 0..count {
                let field = p.read_unsigned()?;
                let at = p.pos;
                let generation = u16::try_from(p.read_unsigned()?)
                    .map_err(|_| WriterError::parse(at, "generation out of range"))?;
                let entry = match p.token() {
                    b"n" => XrefEntry::InUse {
                        offset: field,
                        generation,
                    },
                    b"f" => XrefEntry::Free {
                        next: u32::try_from(field)
                            .map_err(|_| WriterError::parse(at, "free link out of range"))?,
                        generation,
                    },
                    _ => return Err(WriterError::parse(at, "xref entry must end in 'n' or 'f'")),
                };
                let number = first + i;
                if slots.len() <= number {
                    slots.resize(number + 1, None);
                }
                slots[number] = Some(entry);
            }
        }

        let trailer = match p.parse_value()? {
            Value::Dictionary(dict) => dict,
            other => {
                return Err(WriterError::XrefCorrupted(format!(
                    "trailer is a {}, not a dictionary",
                    other.kind_name()
                )))
            }
        };
        let entries = slots
            .into_iter()
            .enumerate()
            .map(|(n, e)| e.ok_or_else(|| WriterError::XrefCorrupted(format!("no entry for object {n}"))))
            .collect::<WriterResult<Vec<_>>>()?;

        Ok(Self {
            xref: CrossReference::from_entries(entries),
            trailer,
            startxref,
        })
    }

    pub fn xref(&self) -> &CrossReference {
        &self.xref
    }

    pub fn trailer(&self) -> &Dictionary {
        &self.trailer
    }

    pub fn startxref(&self) -> u64 {
        self.startxref
    }

    /// The trailer's `/Size`.
    pub fn size(&self) -> Option<u32> {
        self.trailer
            .get("Size")
            .and_then(|v| v.as_i64().ok())
            .and_then(|v| u32::try_from(v).ok())
    }

    pub fn root(&self) -> Option<ObjectId> {
        self.trailer.get("Root").and_then(|v| v.as_reference().ok())
    }

    pub fn info(&self) -> Option<ObjectId> {
        self.trailer.get("Info").and_then(|v| v.as_reference().ok())
    }

    /// First element of `/ID`.
    pub fn file_id(&self) -> Option<&[u8]> {
        let ids = self.trailer.get("ID")?.as_array().ok()?;
        Some(ids.first()?.as_string().ok()?.bytes.as_slice())
    }

    /// Parse the in-use object with `number` out of `data`.
    pub fn read_object(&self, data: &[u8], number: u32) -> WriterResult<Option<(ObjectId, Value)>> {
        match self.xref.get(number) {
            Some(XrefEntry::InUse { offset, .. }) => {
                let offset = usize::try_from(*offset)
                    .map_err(|_| WriterError::XrefCorrupted(format!("offset {offset} out of range")))?;
                parse_indirect_object(data, offset).map(Some)
            }
            _ => Ok(None),
        }
    }
}
