//! Built-in conformance rules.

pub mod colorspace;
pub mod font;
pub mod image;
pub mod page;

pub use colorspace::ColorSpaceRule;
pub use font::FontRule;
pub use image::ImageRule;
pub use page::PageRule;
