//! Shared test utilities: synthetic fixtures generated in code.
//!
//! Every fixture is a deterministic gradient so pixel comparisons are
//! meaningful, and metadata is added with the same segment writer the
//! crate uses for real output.

use crate::imaging::metadata::{Metadata, embed_in_jpeg};
use image::{DynamicImage, ImageEncoder, ImageFormat, RgbImage, RgbaImage};
use std::path::Path;

// =========================================================================
// Pixel sources
// =========================================================================

/// RGB gradient with a distinct value per coordinate (mod 256).
pub fn gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    })
}

/// RGBA gradient, fully opaque.
pub fn gradient_rgba(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        image::Rgba([(x % 256) as u8, (y % 256) as u8, 64, 255])
    })
}

// =========================================================================
// EXIF
// =========================================================================

/// Minimal TIFF-structured EXIF block holding only an orientation tag.
pub fn exif_with_orientation(value: u16, big_endian: bool) -> Vec<u8> {
    let u16_bytes = |v: u16| {
        if big_endian {
            v.to_be_bytes()
        } else {
            v.to_le_bytes()
        }
    };
    let u32_bytes = |v: u32| {
        if big_endian {
            v.to_be_bytes()
        } else {
            v.to_le_bytes()
        }
    };

    let mut exif = Vec::new();
    exif.extend_from_slice(if big_endian { b"MM" } else { b"II" });
    exif.extend_from_slice(&u16_bytes(42));
    exif.extend_from_slice(&u32_bytes(8)); // IFD0 offset
    exif.extend_from_slice(&u16_bytes(1)); // entry count
    exif.extend_from_slice(&u16_bytes(0x0112)); // Orientation
    exif.extend_from_slice(&u16_bytes(3)); // SHORT
    exif.extend_from_slice(&u32_bytes(1)); // count
    exif.extend_from_slice(&u16_bytes(value));
    exif.extend_from_slice(&[0, 0]); // value field padding
    exif.extend_from_slice(&u32_bytes(0)); // no next IFD
    exif
}

// =========================================================================
// Encoded fixtures
// =========================================================================

/// Encode a gradient as JPEG in memory.
pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = gradient(width, height);
    let mut out = Vec::new();
    image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, 95)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
    out
}

/// Create a small valid JPEG file with the given dimensions.
pub fn create_test_jpeg(path: &Path, width: u32, height: u32) {
    std::fs::write(path, jpeg_bytes(width, height)).unwrap();
}

/// Create a JPEG carrying an EXIF block with the given orientation.
pub fn create_test_jpeg_with_orientation(path: &Path, width: u32, height: u32, orientation: u16) {
    let meta = Metadata {
        exif: Some(exif_with_orientation(orientation, true)),
        ..Metadata::default()
    };
    let (tagged, _) = embed_in_jpeg(&jpeg_bytes(width, height), &meta);
    std::fs::write(path, tagged).unwrap();
}

/// Create an uncompressed RGB TIFF whose IFD0 carries an orientation tag.
pub fn create_test_tiff_with_orientation(path: &Path, width: u32, height: u32, orientation: u16) {
    let mut out = std::io::Cursor::new(Vec::new());
    {
        let mut encoder = tiff::encoder::TiffEncoder::new(&mut out).unwrap();
        let mut image = encoder
            .new_image::<tiff::encoder::colortype::RGB8>(width, height)
            .unwrap();
        image
            .encoder()
            .write_tag(tiff::tags::Tag::Orientation, orientation)
            .unwrap();
        image.write_data(gradient(width, height).as_raw()).unwrap();
    }
    std::fs::write(path, out.into_inner()).unwrap();
}

/// Create a JPEG carrying an ICC profile.
pub fn create_test_jpeg_with_icc(path: &Path, width: u32, height: u32, icc: &[u8]) {
    let meta = Metadata {
        icc_profile: Some(icc.to_vec()),
        ..Metadata::default()
    };
    let (tagged, _) = embed_in_jpeg(&jpeg_bytes(width, height), &meta);
    std::fs::write(path, tagged).unwrap();
}

/// Create a lossless PNG file from an RGBA gradient.
pub fn create_test_png(path: &Path, width: u32, height: u32) {
    DynamicImage::ImageRgba8(gradient_rgba(width, height))
        .save_with_format(path, ImageFormat::Png)
        .unwrap();
}
