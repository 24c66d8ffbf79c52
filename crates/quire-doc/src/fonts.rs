use std::fmt;
use std::io::Write;

use quire_types::{Dictionary, Name, ObjectId, Stream, Value};
use tracing::{debug, trace, warn};

use crate::document::Document;
use crate::error::{DocumentResult, DocumentWarning};

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

/// Fetches the bytes behind a URI. Absence is `None`, never an error.
pub trait ResourceResolver {
    fn retrieve_resource_bytes(&self, uri: &str) -> Option<Vec<u8>>;
}

/// Looks up installed font programs by local name.
pub trait FontProvider {
    fn get_font_program(&self, name: &str) -> Option<Vec<u8>>;
}

/// Resolves nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoResources;

impl ResourceResolver for NoResources {
    fn retrieve_resource_bytes(&self, _uri: &str) -> Option<Vec<u8>> {
        None
    }
}

impl FontProvider for NoResources {
    fn get_font_program(&self, _name: &str) -> Option<Vec<u8>> {
        None
    }
}

// ---------------------------------------------------------------------------
// FontFace
// ---------------------------------------------------------------------------

/// Format hint of a `url(...) format(...)` source.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FontFormat {
    /// No hint given.
    None,
    TrueType,
    OpenType,
    Woff,
    Woff2,
    EmbeddedOpenType,
    Svg,
}

impl FontFormat {
    /// Map a `format()` hint; unknown hints are treated as absent.
    pub fn from_hint(hint: &str) -> Self {
        match hint.trim().to_ascii_lowercase().as_str() {
            "truetype" => Self::TrueType,
            "opentype" => Self::OpenType,
            "woff" => Self::Woff,
            "woff2" => Self::Woff2,
            "embedded-opentype" => Self::EmbeddedOpenType,
            "svg" => Self::Svg,
            _ => Self::None,
        }
    }

    /// Formats worth fetching. EOT and SVG fonts are never tried.
    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::EmbeddedOpenType | Self::Svg)
    }
}

/// One entry of a face's source list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FontFaceSrc {
    /// `local("Name")`: a font known to the [`FontProvider`].
    Local(String),
    /// `url(...)`, fetched through the [`ResourceResolver`].
    Url { uri: String, format: FontFormat },
}

impl FontFaceSrc {
    pub fn format(&self) -> FontFormat {
        match self {
            Self::Local(_) => FontFormat::None,
            Self::Url { format, .. } => *format,
        }
    }
}

impl fmt::Display for FontFaceSrc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local(name) => write!(f, "local({name})"),
            Self::Url { uri, .. } => write!(f, "url({uri})"),
        }
    }
}

/// A font family with its ordered candidate sources.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FontFace {
    pub family: String,
    pub sources: Vec<FontFaceSrc>,
}

impl FontFace {
    pub fn new(family: impl Into<String>, sources: Vec<FontFaceSrc>) -> Self {
        Self {
            family: family.into(),
            sources,
        }
    }

    /// Parse a `src` descriptor such as
    /// `local("Foo"), url(foo.woff2) format("woff2"), url(foo.ttf)`.
    /// Entries that are neither `local()` nor `url()` are skipped.
    pub fn from_src(family: impl Into<String>, src: &str) -> Self {
        let sources = split_top_level(src)
            .into_iter()
            .filter_map(parse_source)
            .collect();
        Self::new(family, sources)
    }
}

fn split_top_level(src: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote = None;
    let mut start = 0;
    for (i, c) in src.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '(') => depth += 1,
            (None, ')') => depth = depth.saturating_sub(1),
            (None, ',') if depth == 0 => {
                parts.push(src[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(src[start..].trim());
    parts.retain(|p| !p.is_empty());
    parts
}

/// The argument of `func(...)` at the start of `input`, unquoted, plus the rest.
fn function_arg<'a>(input: &'a str, func: &str) -> Option<(&'a str, &'a str)> {
    let head = input.get(..func.len())?;
    if !head.eq_ignore_ascii_case(func) {
        return None;
    }
    let rest = input[func.len()..].trim_start().strip_prefix('(')?;
    let close = rest.find(')')?;
    let arg = rest[..close].trim().trim_matches(|c| c == '"' || c == '\'');
    Some((arg, rest[close + 1..].trim()))
}

fn parse_source(entry: &str) -> Option<FontFaceSrc> {
    if let Some((name, _)) = function_arg(entry, "local") {
        return Some(FontFaceSrc::Local(name.to_string()));
    }
    let (uri, rest) = function_arg(entry, "url")?;
    let format = function_arg(rest, "format")
        .map_or(FontFormat::None, |(hint, _)| FontFormat::from_hint(hint));
    Some(FontFaceSrc::Url {
        uri: uri.to_string(),
        format,
    })
}

// ---------------------------------------------------------------------------
// Embedding
// ---------------------------------------------------------------------------

/// Outline flavour of an sfnt font program.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Outlines {
    TrueType,
    Cff,
}

fn sniff_outlines(program: &[u8]) -> Option<Outlines> {
    match program.get(..4)? {
        [0x00, 0x01, 0x00, 0x00] | b"true" => Some(Outlines::TrueType),
        b"OTTO" => Some(Outlines::Cff),
        _ => None,
    }
}

/// PostScript-safe base font name for a family.
fn base_font_name(family: &str) -> Name {
    let name: String = family
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect();
    if name.is_empty() {
        Name::new("Embedded")
    } else {
        Name::new(name)
    }
}

impl<W: Write> Document<W> {
    /// Embed the first usable program among the face's sources and return
    /// the font dictionary.
    ///
    /// Sources are tried in order. Unsupported formats are skipped, a
    /// source that yields nothing just moves on to the next one. If every
    /// source fails the face is reported as a warning and `Ok(None)` is
    /// returned. A family embedded once is reused.
    pub fn embed_font_face(
        &mut self,
        face: &FontFace,
        fonts: &dyn FontProvider,
        resources: &dyn ResourceResolver,
    ) -> DocumentResult<Option<ObjectId>> {
        self.ensure_usable()?;
        if let Some(&font) = self.fonts.get(&face.family) {
            return Ok(Some(font));
        }

        for src in &face.sources {
            if !src.format().is_supported() {
                trace!(family = %face.family, %src, "unsupported font format skipped");
                continue;
            }
            let program = match src {
                FontFaceSrc::Local(name) => fonts.get_font_program(name),
                FontFaceSrc::Url { uri, .. } => resources.retrieve_resource_bytes(uri),
            };
            let Some(program) = program.filter(|p| !p.is_empty()) else {
                trace!(family = %face.family, %src, "font source yielded nothing");
                continue;
            };
            let Some(outlines) = sniff_outlines(&program) else {
                trace!(family = %face.family, %src, "font source is not an sfnt program");
                continue;
            };
            let font = self.embed_program(&face.family, program, outlines)?;
            self.fonts.insert(face.family.clone(), font);
            debug!(family = %face.family, %src, %font, "font embedded");
            return Ok(Some(font));
        }

        warn!(
            family = %face.family,
            sources = face.sources.len(),
            "unable to retrieve font"
        );
        self.warnings.push(DocumentWarning::FontUnavailable {
            family: face.family.clone(),
            sources: face.sources.len(),
        });
        Ok(None)
    }

    fn embed_program(
        &mut self,
        family: &str,
        program: Vec<u8>,
        outlines: Outlines,
    ) -> DocumentResult<ObjectId> {
        let base_font = base_font_name(family);

        let mut file_dict = Dictionary::new();
        let file_key = match outlines {
            Outlines::TrueType => {
                file_dict.insert("Length1", program.len());
                "FontFile2"
            }
            Outlines::Cff => {
                file_dict.insert("Subtype", Value::name("OpenType"));
                "FontFile3"
            }
        };
        let file = self
            .table
            .allocate(Value::Stream(Stream::new(file_dict, program)))?;

        let mut descriptor = Dictionary::with_type("FontDescriptor");
        descriptor.insert("FontName", base_font.clone());
        descriptor.insert("Flags", 32);
        descriptor.insert(
            "FontBBox",
            vec![
                Value::Integer(0),
                Value::Integer(-200),
                Value::Integer(1000),
                Value::Integer(800),
            ],
        );
        descriptor.insert("ItalicAngle", 0);
        descriptor.insert("Ascent", 800);
        descriptor.insert("Descent", -200);
        descriptor.insert("CapHeight", 700);
        descriptor.insert("StemV", 80);
        descriptor.insert(file_key, file);
        let descriptor = self.table.allocate(Value::Dictionary(descriptor))?;

        let mut font = Dictionary::with_type("Font");
        font.insert("Subtype", Value::name("TrueType"));
        font.insert("BaseFont", base_font);
        font.insert("Encoding", Value::name("WinAnsiEncoding"));
        font.insert("FontDescriptor", descriptor);
        Ok(self.table.allocate(Value::Dictionary(font))?)
    }
}
