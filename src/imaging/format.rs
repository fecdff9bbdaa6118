//! Output format names and their encoders.
//!
//! Format names are what integrators pass to `convert`: case-insensitive,
//! normalized to lowercase, and reused verbatim as the output file
//! extension (`convert("JPEG")` writes `photo.jpeg`).

use image::ImageFormat;
use std::fmt;

/// Formats this crate can encode on flush.
const ENCODABLE: &[ImageFormat] = &[
    ImageFormat::Jpeg,
    ImageFormat::Png,
    ImageFormat::Tiff,
    ImageFormat::WebP,
    ImageFormat::Avif,
];

/// Target format recorded by a `convert` operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingFormat {
    name: String,
    format: ImageFormat,
}

impl PendingFormat {
    /// Resolve a format name. Returns `None` for names that do not map to an
    /// encodable format.
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim().to_ascii_lowercase();
        let format = ImageFormat::from_extension(&name)?;
        is_encodable(format).then_some(Self { name, format })
    }

    /// Lowercase name, used as the output extension.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }
}

impl fmt::Display for PendingFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

pub fn is_encodable(format: ImageFormat) -> bool {
    ENCODABLE.contains(&format)
}

/// Names accepted by `convert`, for error messages.
pub fn supported_names() -> &'static str {
    "jpg, jpeg, png, tif, tiff, webp, avif"
}
