//! The owned, decoded image a pipeline mutates.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, TIFF, WebP) | `ImageReader::into_decoder` + `DynamicImage::from_decoder` |
//! | Orientation, ICC profile | `ImageDecoder::orientation` / `icc_profile` |
//! | Other metadata | [`metadata`](super::metadata) container reader |
//! | Resize | `DynamicImage::resize_exact` (Lanczos3 unless configured) |
//! | Fill crop | `DynamicImage::crop_imm` at source scale, then `resize_exact` |
//! | Auto-orient | `DynamicImage::apply_orientation` |
//! | Encode | `image::codecs::{jpeg, png, tiff, webp, avif}` encoders |

use super::calculations::{
    calculate_fill_crop, calculate_fit_dimensions, calculate_limit_dimensions, gravity_offset,
};
use super::format::{PendingFormat, supported_names};
use super::metadata::{Metadata, read_metadata};
use super::params::{EncodeParams, ResizeFilter};
use crate::operation::{Gravity, Operation};
use image::error::{ImageFormatHint, UnsupportedError, UnsupportedErrorKind};
use image::imageops::FilterType;
use image::metadata::Orientation;
use image::{DynamicImage, ImageDecoder, ImageEncoder, ImageError, ImageFormat, ImageReader};
use std::borrow::Cow;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ImagingError {
    #[error("failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: ImageError,
    },
    #[error("{operation} failed: {reason}")]
    Operation {
        operation: &'static str,
        reason: String,
    },
    #[error("failed to encode {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: ImageError,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ImagingError {
    fn operation(operation: &'static str, reason: impl Into<String>) -> Self {
        Self::Operation {
            operation,
            reason: reason.into(),
        }
    }
}

/// Result of an identify operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Exclusive owner of one decoded image and its metadata.
///
/// Transform methods mutate in place. The handle is consumed by
/// [`writer::flush`](crate::writer::flush), so a flushed handle cannot be
/// touched again.
pub struct ImageHandle {
    image: DynamicImage,
    metadata: Metadata,
    source_path: PathBuf,
    source_format: ImageFormat,
    pending_format: Option<PendingFormat>,
    orientation: Orientation,
    filter: FilterType,
    mutations: usize,
}

impl std::fmt::Debug for ImageHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageHandle")
            .field("source_path", &self.source_path)
            .field("source_format", &self.source_format)
            .field("dimensions", &self.dimensions())
            .field("pending_format", &self.pending_format)
            .field("orientation", &self.orientation)
            .field("metadata_entries", &self.metadata.entry_count())
            .field("mutations", &self.mutations)
            .finish()
    }
}

impl ImageHandle {
    /// Decode the file at `path`, sniffing the format from its contents.
    pub fn open(path: &Path) -> Result<Self, ImagingError> {
        let decode_err = |source: ImageError| ImagingError::Decode {
            path: path.to_path_buf(),
            source,
        };

        let bytes = std::fs::read(path).map_err(|e| decode_err(ImageError::IoError(e)))?;
        let format = image::guess_format(&bytes).map_err(decode_err)?;
        let mut decoder = ImageReader::with_format(Cursor::new(bytes.as_slice()), format)
            .into_decoder()
            .map_err(decode_err)?;

        // Unreadable metadata never fails the decode
        let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);
        let mut metadata = read_metadata(&bytes, format);
        if metadata.icc_profile.is_none() {
            metadata.icc_profile = decoder.icc_profile().ok().flatten();
        }
        let image = DynamicImage::from_decoder(decoder).map_err(decode_err)?;

        debug!(
            path = %path.display(),
            ?format,
            ?orientation,
            width = image.width(),
            height = image.height(),
            metadata_entries = metadata.entry_count(),
            "decoded image"
        );

        let mut handle = Self::from_parts(image, metadata, path, format);
        handle.orientation = orientation;
        Ok(handle)
    }

    /// Wrap an already-decoded image. The orientation is read from the EXIF
    /// block in `metadata`, if it has one.
    pub fn from_parts(
        image: DynamicImage,
        metadata: Metadata,
        source_path: &Path,
        source_format: ImageFormat,
    ) -> Self {
        let orientation = metadata.orientation().unwrap_or(Orientation::NoTransforms);
        Self {
            image,
            metadata,
            source_path: source_path.to_path_buf(),
            source_format,
            pending_format: None,
            orientation,
            filter: ResizeFilter::default().into(),
            mutations: 0,
        }
    }

    pub fn with_filter(mut self, filter: ResizeFilter) -> Self {
        self.filter = filter.into();
        self
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    /// Direct pixel access for hooks doing custom work.
    pub fn image_mut(&mut self) -> &mut DynamicImage {
        &mut self.image
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.metadata
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> Dimensions {
        Dimensions {
            width: self.image.width(),
            height: self.image.height(),
        }
    }

    /// Orientation still to be applied by [`auto_orient`](Self::auto_orient).
    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn source_format(&self) -> ImageFormat {
        self.source_format
    }

    pub fn pending_format(&self) -> Option<&PendingFormat> {
        self.pending_format.as_ref()
    }

    /// Format the handle will be encoded as on flush.
    pub fn output_format(&self) -> ImageFormat {
        self.pending_format
            .as_ref()
            .map_or(self.source_format, PendingFormat::format)
    }

    /// Number of operations applied through [`apply`](Self::apply).
    pub fn mutations(&self) -> usize {
        self.mutations
    }

    /// Apply one declarative operation and count it as a mutation.
    pub fn apply(&mut self, operation: &Operation) -> Result<(), ImagingError> {
        match operation {
            Operation::Convert { format } => self.convert(format)?,
            Operation::ResizeToLimit { width, height } => self.resize_to_limit(*width, *height)?,
            Operation::ResizeToFit { width, height } => self.resize_to_fit(*width, *height)?,
            Operation::ResizeToFill {
                width,
                height,
                gravity,
            } => self.resize_to_fill(*width, *height, *gravity)?,
            Operation::AutoOrient => self.auto_orient(),
            Operation::Strip => self.strip(),
        }
        self.mutations += 1;
        Ok(())
    }

    /// Record the output format. Pixels are untouched until flush.
    pub fn convert(&mut self, format: &str) -> Result<(), ImagingError> {
        let pending = PendingFormat::parse(format).ok_or_else(|| {
            ImagingError::operation(
                "convert",
                format!(
                    "unsupported format '{format}' (expected one of: {})",
                    supported_names()
                ),
            )
        })?;
        self.pending_format = Some(pending);
        Ok(())
    }

    /// Shrink to fit within `width` x `height`. Never enlarges.
    pub fn resize_to_limit(&mut self, width: u32, height: u32) -> Result<(), ImagingError> {
        check_target("resize_to_limit", width, height)?;
        if let Some((w, h)) = calculate_limit_dimensions(self.size(), (width, height)) {
            self.image = self.image.resize_exact(w, h, self.filter);
        }
        Ok(())
    }

    /// Scale up or down to fit within `width` x `height`.
    pub fn resize_to_fit(&mut self, width: u32, height: u32) -> Result<(), ImagingError> {
        check_target("resize_to_fit", width, height)?;
        let (w, h) = calculate_fit_dimensions(self.size(), (width, height));
        if (w, h) != self.size() {
            self.image = self.image.resize_exact(w, h, self.filter);
        }
        Ok(())
    }

    /// Cover `width` x `height` exactly, cropping the overflow at `gravity`.
    ///
    /// The crop window is cut at source scale before resampling, so only
    /// the kept region is ever resized.
    pub fn resize_to_fill(
        &mut self,
        width: u32,
        height: u32,
        gravity: Gravity,
    ) -> Result<(), ImagingError> {
        check_target("resize_to_fill", width, height)?;
        let crop = calculate_fill_crop(self.size(), (width, height));
        if crop != self.size() {
            let (x, y) = gravity_offset(self.size(), crop, gravity);
            self.image = self.image.crop_imm(x, y, crop.0, crop.1);
        }
        if crop != (width, height) {
            self.image = self.image.resize_exact(width, height, self.filter);
        }
        Ok(())
    }

    /// Rotate/flip pixels upright per the embedded orientation, then reset
    /// the EXIF tag to 1. Upright images are left alone.
    pub fn auto_orient(&mut self) {
        let orientation = std::mem::replace(&mut self.orientation, Orientation::NoTransforms);
        if orientation != Orientation::NoTransforms {
            debug!(?orientation, "applied orientation");
            self.image.apply_orientation(orientation);
        }
        self.metadata.clear_orientation();
    }

    /// Drop every metadata block, orientation included. Pixels are untouched.
    pub fn strip(&mut self) {
        self.metadata = Metadata::default();
        self.orientation = Orientation::NoTransforms;
    }

    /// Encode the pixels as `format`.
    ///
    /// Non-JPEG output carries the ICC profile when the encoder supports
    /// one. JPEG gets its profile with the other segments on flush.
    pub fn encode(
        &self,
        format: ImageFormat,
        params: &EncodeParams,
    ) -> Result<Vec<u8>, ImageError> {
        let pixels = encodable_pixels(&self.image, format);
        let quality = params.quality.value() as u8;
        let icc = match format {
            ImageFormat::Jpeg => None,
            _ => self.metadata.icc_profile.as_deref(),
        };

        let mut out = Vec::new();
        match format {
            ImageFormat::Jpeg => write_pixels(
                image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, quality),
                &pixels,
                icc,
            )?,
            ImageFormat::Png => {
                write_pixels(image::codecs::png::PngEncoder::new(&mut out), &pixels, icc)?
            }
            ImageFormat::Tiff => write_pixels(
                image::codecs::tiff::TiffEncoder::new(Cursor::new(&mut out)),
                &pixels,
                icc,
            )?,
            ImageFormat::WebP => write_pixels(
                image::codecs::webp::WebPEncoder::new_lossless(&mut out),
                &pixels,
                icc,
            )?,
            ImageFormat::Avif => write_pixels(
                image::codecs::avif::AvifEncoder::new_with_speed_quality(
                    &mut out,
                    params.avif_speed,
                    quality,
                ),
                &pixels,
                icc,
            )?,
            other => {
                return Err(ImageError::Unsupported(
                    UnsupportedError::from_format_and_kind(
                        ImageFormatHint::Exact(other),
                        UnsupportedErrorKind::Format(ImageFormatHint::Exact(other)),
                    ),
                ));
            }
        }
        Ok(out)
    }

    fn size(&self) -> (u32, u32) {
        (self.image.width(), self.image.height())
    }
}

fn write_pixels(
    mut encoder: impl ImageEncoder,
    pixels: &DynamicImage,
    icc: Option<&[u8]>,
) -> Result<(), ImageError> {
    if let Some(icc) = icc {
        if let Err(err) = encoder.set_icc_profile(icc.to_vec()) {
            debug!(%err, "encoder cannot embed ICC profile, dropped");
        }
    }
    encoder.write_image(
        pixels.as_bytes(),
        pixels.width(),
        pixels.height(),
        pixels.color().into(),
    )
}

fn check_target(operation: &'static str, width: u32, height: u32) -> Result<(), ImagingError> {
    if width == 0 || height == 0 {
        return Err(ImagingError::operation(
            operation,
            format!("target dimensions must be positive, got {width}x{height}"),
        ));
    }
    Ok(())
}

/// Convert pixels into a layout the target encoder accepts.
fn encodable_pixels(image: &DynamicImage, format: ImageFormat) -> Cow<'_, DynamicImage> {
    use DynamicImage::*;

    let native = match format {
        // No alpha channel in JPEG
        ImageFormat::Jpeg => matches!(image, ImageLuma8(_) | ImageRgb8(_)),
        ImageFormat::Png => !matches!(image, ImageRgb32F(_) | ImageRgba32F(_)),
        ImageFormat::Tiff => matches!(
            image,
            ImageLuma8(_)
                | ImageLuma16(_)
                | ImageRgb8(_)
                | ImageRgba8(_)
                | ImageRgb16(_)
                | ImageRgba16(_)
        ),
        ImageFormat::WebP => matches!(
            image,
            ImageLuma8(_) | ImageLumaA8(_) | ImageRgb8(_) | ImageRgba8(_)
        ),
        _ => matches!(image, ImageRgb8(_) | ImageRgba8(_)),
    };

    if native {
        Cow::Borrowed(image)
    } else if image.color().has_alpha() && format != ImageFormat::Jpeg {
        Cow::Owned(ImageRgba8(image.to_rgba8()))
    } else {
        Cow::Owned(ImageRgb8(image.to_rgb8()))
    }
}
