//! Image processing in pure Rust, built on the `image` crate.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode** | `ImageReader::into_decoder` (format sniffed from bytes) |
//! | **Orientation / ICC** | `ImageDecoder::orientation`, `ImageDecoder::icc_profile` |
//! | **Other metadata** | container reader (JPEG segments, PNG chunks, WebP RIFF) |
//! | **Resize** | `resize_exact` with a configurable filter (default Lanczos3) |
//! | **Encode** | JPEG, PNG, TIFF, WebP (lossless), AVIF (rav1e) |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Data structures describing resampling and encoding
//! - **Format**: Output format names accepted by `convert`
//! - **Metadata**: Raw metadata blocks and the EXIF orientation tag
//! - **Handle**: [`ImageHandle`], the owned image every operation mutates

mod calculations;
mod format;
mod handle;
pub mod metadata;
mod params;

pub use calculations::{
    calculate_fill_crop, calculate_fit_dimensions, calculate_limit_dimensions, gravity_offset,
};
pub use format::{PendingFormat, is_encodable, supported_names};
pub use handle::{Dimensions, ImageHandle, ImagingError};
pub use metadata::Metadata;
pub use params::{EncodeParams, Quality, ResizeFilter};
