use quire_types::{Dictionary, Name, ObjectId, Stream, Value};

/// An image XObject ready to become an indirect stream.
///
/// Sample data is passed through as given; `filter` names the encoding the
/// bytes are already in (e.g. `DCTDecode` for JPEG).
#[derive(Clone, Debug, PartialEq)]
pub struct ImageXObject {
    pub width: u32,
    pub height: u32,
    pub bits_per_component: u8,
    pub color_space: Value,
    pub data: Vec<u8>,
    pub filter: Option<Name>,
    pub interpolate: bool,
    pub soft_mask: Option<ObjectId>,
}

impl ImageXObject {
    /// Uncompressed 8-bit samples in `DeviceRGB`.
    pub fn rgb8(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self::new(width, height, Value::name("DeviceRGB"), data)
    }

    pub fn new(width: u32, height: u32, color_space: Value, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            bits_per_component: 8,
            color_space,
            data,
            filter: None,
            interpolate: false,
            soft_mask: None,
        }
    }

    pub fn with_filter(mut self, filter: impl Into<Name>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn with_soft_mask(mut self, mask: ObjectId) -> Self {
        self.soft_mask = Some(mask);
        self
    }

    pub fn into_stream(self) -> Stream {
        let mut dict = Dictionary::with_type("XObject");
        dict.insert("Subtype", Value::name("Image"));
        dict.insert("Width", self.width);
        dict.insert("Height", self.height);
        dict.insert("BitsPerComponent", self.bits_per_component as i64);
        dict.insert("ColorSpace", self.color_space);
        if let Some(filter) = self.filter {
            dict.insert("Filter", filter);
        }
        if self.interpolate {
            dict.insert("Interpolate", true);
        }
        if let Some(mask) = self.soft_mask {
            dict.insert("SMask", mask);
        }
        Stream::new(dict, self.data)
    }
}

impl From<ImageXObject> for Value {
    fn from(image: ImageXObject) -> Self {
        Value::Stream(image.into_stream())
    }
}
