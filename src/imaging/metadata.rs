//! Minimal container metadata reader/writer.
//!
//! Collects the metadata blocks that ride along with the pixels:
//! - **JPEG**: APP1 EXIF, APP1 XMP, APP2 ICC profile (chunked), APP13 IPTC, COM
//! - **PNG**: `eXIf`, `tEXt` / `zTXt` / `iTXt` (XMP packets are recognized)
//! - **WebP**: `EXIF`, `ICCP`, `XMP ` RIFF chunks
//!
//! Blocks the decoder does not expose (PNG `iCCP`, TIFF profiles) are filled
//! in by [`ImageHandle::open`](super::ImageHandle::open) from `ImageDecoder`.
//!
//! The EXIF orientation tag is reset in place with
//! `Orientation::remove_from_exif_chunk` so a re-embedded block does not ask
//! viewers to rotate an upright image again. Blocks are otherwise kept as
//! raw bytes.

use image::ImageFormat;
use image::metadata::Orientation;

/// Metadata blocks carried by a decoded image.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    /// TIFF-structured EXIF payload (no `Exif\0\0` prefix).
    pub exif: Option<Vec<u8>>,
    /// Reassembled ICC profile.
    pub icc_profile: Option<Vec<u8>>,
    /// Photoshop APP13 resource block (IPTC lives inside).
    pub iptc: Option<Vec<u8>>,
    /// XMP packet.
    pub xmp: Option<Vec<u8>>,
    /// Free-form comments and text chunks.
    pub comments: Vec<Vec<u8>>,
}

impl Metadata {
    /// Number of metadata entries present.
    pub fn entry_count(&self) -> usize {
        [&self.exif, &self.icc_profile, &self.iptc, &self.xmp]
            .iter()
            .filter(|block| block.is_some())
            .count()
            + self.comments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entry_count() == 0
    }

    /// Orientation recorded in the EXIF block, if it carries a valid one.
    pub fn orientation(&self) -> Option<Orientation> {
        self.exif
            .as_deref()
            .and_then(|exif| Orientation::from_exif_chunk(strip_exif_header(exif)))
    }

    /// Reset the EXIF orientation tag to top-left. Returns whether a tag was
    /// found and rewritten.
    pub fn clear_orientation(&mut self) -> bool {
        let Some(exif) = self.exif.as_mut() else {
            return false;
        };
        let start = exif.len() - strip_exif_header(exif.as_slice()).len();
        Orientation::remove_from_exif_chunk(&mut exif[start..]).is_some()
    }
}

/// Read metadata from encoded file bytes, dispatching on container format.
/// Unknown formats and malformed containers yield empty metadata.
pub fn read_metadata(data: &[u8], format: ImageFormat) -> Metadata {
    match format {
        ImageFormat::Jpeg => read_jpeg(data),
        ImageFormat::Png => read_png(data),
        ImageFormat::WebP => read_webp(data),
        _ => Metadata::default(),
    }
}

// ---------------------------------------------------------------------------
// JPEG
// ---------------------------------------------------------------------------

const EXIF_HEADER: &[u8] = b"Exif\0\0";
const XMP_HEADER: &[u8] = b"http://ns.adobe.com/xap/1.0/\0";
const ICC_HEADER: &[u8] = b"ICC_PROFILE\0";
const PHOTOSHOP_HEADER: &[u8] = b"Photoshop 3.0\0";

const APP0: u8 = 0xE0;
const APP1: u8 = 0xE1;
const APP2: u8 = 0xE2;
const APP13: u8 = 0xED;
const COM: u8 = 0xFE;

/// Largest payload a single JPEG segment can hold (length field includes itself).
const MAX_SEGMENT_PAYLOAD: usize = u16::MAX as usize - 2;

/// Walk JPEG marker segments up to start-of-scan, yielding `(marker, payload)`.
fn jpeg_segments(data: &[u8]) -> Vec<(u8, &[u8])> {
    let mut segments = Vec::new();
    if !data.starts_with(&[0xFF, 0xD8]) {
        return segments;
    }

    let mut pos = 2;
    while pos + 4 <= data.len() {
        if data[pos] != 0xFF {
            break;
        }
        let marker = data[pos + 1];
        // Fill bytes
        if marker == 0xFF {
            pos += 1;
            continue;
        }
        // SOS (0xDA) means image data starts; stop scanning
        if marker == 0xDA || marker == 0xD9 {
            break;
        }
        // Markers without length field
        if (0xD0..=0xD7).contains(&marker) || marker == 0x01 {
            pos += 2;
            continue;
        }

        let seg_len = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
        if seg_len < 2 || pos + 2 + seg_len > data.len() {
            break;
        }
        segments.push((marker, &data[pos + 4..pos + 2 + seg_len]));
        pos += 2 + seg_len;
    }
    segments
}

fn read_jpeg(data: &[u8]) -> Metadata {
    let mut meta = Metadata::default();
    // ICC chunks: (sequence number, bytes)
    let mut icc_chunks: Vec<(u8, &[u8])> = Vec::new();

    for (marker, payload) in jpeg_segments(data) {
        match marker {
            APP1 if payload.starts_with(EXIF_HEADER) => {
                meta.exif = Some(payload[EXIF_HEADER.len()..].to_vec());
            }
            APP1 if payload.starts_with(XMP_HEADER) => {
                meta.xmp = Some(payload[XMP_HEADER.len()..].to_vec());
            }
            APP2 if payload.starts_with(ICC_HEADER) && payload.len() >= ICC_HEADER.len() + 2 => {
                let seq = payload[ICC_HEADER.len()];
                icc_chunks.push((seq, &payload[ICC_HEADER.len() + 2..]));
            }
            APP13 if payload.starts_with(PHOTOSHOP_HEADER) => {
                meta.iptc = Some(payload.to_vec());
            }
            COM => meta.comments.push(payload.to_vec()),
            _ => {}
        }
    }

    if !icc_chunks.is_empty() {
        icc_chunks.sort_by_key(|(seq, _)| *seq);
        meta.icc_profile = Some(icc_chunks.iter().flat_map(|(_, c)| c.iter().copied()).collect());
    }
    meta
}

fn push_segment(out: &mut Vec<u8>, marker: u8, parts: &[&[u8]]) {
    let len: usize = parts.iter().map(|p| p.len()).sum::<usize>() + 2;
    out.extend_from_slice(&[0xFF, marker]);
    out.extend_from_slice(&(len as u16).to_be_bytes());
    for part in parts {
        out.extend_from_slice(part);
    }
}

/// Insert metadata segments into an encoded JPEG stream.
///
/// Segments go right after SOI and the JFIF APP0 header, where readers
/// expect them. Blocks too large for one segment are skipped (ICC profiles
/// are chunked instead) and reported by name in the returned list.
pub fn embed_in_jpeg(jpeg: &[u8], meta: &Metadata) -> (Vec<u8>, Vec<&'static str>) {
    let mut skipped = Vec::new();
    if meta.is_empty() || !jpeg.starts_with(&[0xFF, 0xD8]) {
        return (jpeg.to_vec(), skipped);
    }

    // Insertion point: after SOI, and after APP0 if the encoder wrote one
    let mut insert_at = 2;
    if jpeg.len() >= 6 && jpeg[2] == 0xFF && jpeg[3] == APP0 {
        let len = u16::from_be_bytes([jpeg[4], jpeg[5]]) as usize;
        insert_at = (4 + len).min(jpeg.len());
    }

    let mut segments = Vec::new();
    if let Some(exif) = &meta.exif {
        if exif.len() + EXIF_HEADER.len() <= MAX_SEGMENT_PAYLOAD {
            push_segment(&mut segments, APP1, &[EXIF_HEADER, exif.as_slice()]);
        } else {
            skipped.push("exif");
        }
    }
    if let Some(xmp) = &meta.xmp {
        if xmp.len() + XMP_HEADER.len() <= MAX_SEGMENT_PAYLOAD {
            push_segment(&mut segments, APP1, &[XMP_HEADER, xmp.as_slice()]);
        } else {
            skipped.push("xmp");
        }
    }
    if let Some(icc) = &meta.icc_profile {
        let chunk_size = MAX_SEGMENT_PAYLOAD - ICC_HEADER.len() - 2;
        let chunks: Vec<&[u8]> = icc.chunks(chunk_size).collect();
        if chunks.len() <= u8::MAX as usize {
            let total = chunks.len() as u8;
            for (i, chunk) in chunks.iter().enumerate() {
                let sequence = [i as u8 + 1, total];
                push_segment(&mut segments, APP2, &[ICC_HEADER, &sequence, chunk]);
            }
        } else {
            skipped.push("icc_profile");
        }
    }
    if let Some(iptc) = &meta.iptc {
        if iptc.len() <= MAX_SEGMENT_PAYLOAD {
            push_segment(&mut segments, APP13, &[iptc.as_slice()]);
        } else {
            skipped.push("iptc");
        }
    }
    for comment in &meta.comments {
        if comment.len() <= MAX_SEGMENT_PAYLOAD {
            push_segment(&mut segments, COM, &[comment.as_slice()]);
        } else {
            skipped.push("comment");
        }
    }

    let mut out = Vec::with_capacity(jpeg.len() + segments.len());
    out.extend_from_slice(&jpeg[..insert_at]);
    out.extend_from_slice(&segments);
    out.extend_from_slice(&jpeg[insert_at..]);
    (out, skipped)
}

// ---------------------------------------------------------------------------
// PNG
// ---------------------------------------------------------------------------

const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";
const XMP_KEYWORD: &[u8] = b"XML:com.adobe.xmp";

fn read_png(data: &[u8]) -> Metadata {
    let mut meta = Metadata::default();
    if !data.starts_with(PNG_SIGNATURE) {
        return meta;
    }

    // Each chunk: length (4, BE) + type (4) + data + CRC (4)
    let mut pos = PNG_SIGNATURE.len();
    while pos + 12 <= data.len() {
        let len = u32::from_be_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]])
            as usize;
        let kind = &data[pos + 4..pos + 8];
        let start = pos + 8;
        if start + len + 4 > data.len() {
            break;
        }
        let body = &data[start..start + len];

        match kind {
            b"eXIf" => meta.exif = Some(strip_exif_header(body).to_vec()),
            b"iTXt" if body.starts_with(XMP_KEYWORD) => meta.xmp = Some(body.to_vec()),
            b"tEXt" | b"zTXt" | b"iTXt" => meta.comments.push(body.to_vec()),
            b"IEND" => break,
            _ => {}
        }
        pos = start + len + 4;
    }
    meta
}

// ---------------------------------------------------------------------------
// WebP
// ---------------------------------------------------------------------------

fn read_webp(data: &[u8]) -> Metadata {
    let mut meta = Metadata::default();
    if data.len() < 12 || &data[0..4] != b"RIFF" || &data[8..12] != b"WEBP" {
        return meta;
    }

    // Each chunk: FourCC (4) + size (4, LE) + payload padded to even
    let mut pos = 12;
    while pos + 8 <= data.len() {
        let kind = &data[pos..pos + 4];
        let len = u32::from_le_bytes([data[pos + 4], data[pos + 5], data[pos + 6], data[pos + 7]])
            as usize;
        let start = pos + 8;
        if start + len > data.len() {
            break;
        }
        let body = &data[start..start + len];

        match kind {
            b"EXIF" => meta.exif = Some(strip_exif_header(body).to_vec()),
            b"ICCP" => meta.icc_profile = Some(body.to_vec()),
            b"XMP " => meta.xmp = Some(body.to_vec()),
            _ => {}
        }
        pos = start + len + (len % 2);
    }
    meta
}

/// Some writers keep the JPEG-style `Exif\0\0` prefix in non-JPEG containers.
fn strip_exif_header(data: &[u8]) -> &[u8] {
    data.strip_prefix(EXIF_HEADER).unwrap_or(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{exif_with_orientation, jpeg_bytes};

    #[test]
    fn orientation_big_endian() {
        let meta = Metadata {
            exif: Some(exif_with_orientation(6, true)),
            ..Metadata::default()
        };
        assert_eq!(meta.orientation(), Some(Orientation::Rotate90));
    }

    #[test]
    fn orientation_little_endian_with_exif_prefix() {
        let mut exif = EXIF_HEADER.to_vec();
        exif.extend(exif_with_orientation(8, false));
        let meta = Metadata {
            exif: Some(exif),
            ..Metadata::default()
        };
        assert_eq!(meta.orientation(), Some(Orientation::Rotate270));
    }

    #[test]
    fn orientation_out_of_range_is_ignored() {
        let meta = Metadata {
            exif: Some(exif_with_orientation(42, true)),
            ..Metadata::default()
        };
        assert_eq!(meta.orientation(), None);
    }

    #[test]
    fn clear_orientation_resets_tag() {
        let mut meta = Metadata {
            exif: Some(exif_with_orientation(6, false)),
            ..Metadata::default()
        };
        assert!(meta.clear_orientation());
        assert_eq!(meta.orientation(), Some(Orientation::NoTransforms));
    }

    #[test]
    fn clear_orientation_keeps_exif_prefix() {
        let mut exif = EXIF_HEADER.to_vec();
        exif.extend(exif_with_orientation(3, true));
        let mut meta = Metadata {
            exif: Some(exif),
            ..Metadata::default()
        };
        assert!(meta.clear_orientation());
        assert!(meta.exif.as_deref().unwrap().starts_with(EXIF_HEADER));
        assert_eq!(meta.orientation(), Some(Orientation::NoTransforms));
    }

    #[test]
    fn clear_orientation_without_exif_is_false() {
        let mut meta = Metadata::default();
        assert!(!meta.clear_orientation());
        meta.exif = Some(b"not exif at all".to_vec());
        assert!(!meta.clear_orientation());
    }

    #[test]
    fn entry_count_counts_every_block() {
        let meta = Metadata {
            exif: Some(vec![1]),
            icc_profile: Some(vec![2]),
            iptc: None,
            xmp: Some(vec![3]),
            comments: vec![b"a".to_vec(), b"b".to_vec()],
        };
        assert_eq!(meta.entry_count(), 5);
        assert!(Metadata::default().is_empty());
    }

    #[test]
    fn jpeg_roundtrip_through_embed_and_read() {
        let plain = jpeg_bytes(16, 8);
        assert!(read_metadata(&plain, ImageFormat::Jpeg).is_empty());

        let meta = Metadata {
            exif: Some(exif_with_orientation(6, true)),
            icc_profile: Some(vec![7; 300]),
            iptc: Some([PHOTOSHOP_HEADER, b"8BIM".as_slice()].concat()),
            xmp: Some(b"<x:xmpmeta/>".to_vec()),
            comments: vec![b"hello".to_vec()],
        };
        let (tagged, skipped) = embed_in_jpeg(&plain, &meta);
        assert!(skipped.is_empty());
        assert_eq!(read_metadata(&tagged, ImageFormat::Jpeg), meta);

        // Still a decodable JPEG
        let decoded = image::load_from_memory_with_format(&tagged, ImageFormat::Jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (16, 8));
    }

    #[test]
    fn icc_profile_spans_multiple_segments() {
        let plain = jpeg_bytes(4, 4);
        let icc: Vec<u8> = (0..150_000u32).map(|i| (i % 251) as u8).collect();
        let meta = Metadata {
            icc_profile: Some(icc.clone()),
            ..Metadata::default()
        };
        let (tagged, _) = embed_in_jpeg(&plain, &meta);
        assert_eq!(read_metadata(&tagged, ImageFormat::Jpeg).icc_profile, Some(icc));
    }

    #[test]
    fn embed_empty_metadata_is_identity() {
        let plain = jpeg_bytes(4, 4);
        let (out, _) = embed_in_jpeg(&plain, &Metadata::default());
        assert_eq!(out, plain);
    }

    #[test]
    fn read_png_exif_and_text() {
        let exif = exif_with_orientation(6, true);
        let chunks: [(&[u8], &[u8]); 4] = [
            (b"IHDR", &[0u8; 13]),
            (b"eXIf", &exif),
            (b"tEXt", b"Comment\0hi"),
            (b"IEND", b""),
        ];
        let mut png = PNG_SIGNATURE.to_vec();
        for (kind, body) in chunks {
            png.extend_from_slice(&(body.len() as u32).to_be_bytes());
            png.extend_from_slice(kind);
            png.extend_from_slice(body);
            png.extend_from_slice(&[0, 0, 0, 0]); // CRC is not checked
        }

        let meta = read_metadata(&png, ImageFormat::Png);
        assert_eq!(meta.orientation(), Some(Orientation::Rotate90));
        assert_eq!(meta.comments, vec![b"Comment\0hi".to_vec()]);
    }

    #[test]
    fn read_webp_chunks() {
        let exif = exif_with_orientation(2, false);
        let chunks: [(&[u8], &[u8]); 3] = [
            (b"VP8X", &[0u8; 10]),
            (b"ICCP", b"icc"),
            (b"EXIF", &exif),
        ];
        let mut body = b"WEBP".to_vec();
        for (kind, payload) in chunks {
            body.extend_from_slice(kind);
            body.extend_from_slice(&(payload.len() as u32).to_le_bytes());
            body.extend_from_slice(payload);
            if payload.len() % 2 == 1 {
                body.push(0);
            }
        }
        let mut webp = b"RIFF".to_vec();
        webp.extend_from_slice(&(body.len() as u32).to_le_bytes());
        webp.extend(body);

        let meta = read_metadata(&webp, ImageFormat::WebP);
        assert_eq!(meta.icc_profile, Some(b"icc".to_vec()));
        assert_eq!(meta.orientation(), Some(Orientation::FlipHorizontal));
    }

    #[test]
    fn unknown_format_has_no_metadata() {
        assert!(read_metadata(b"II*\0", ImageFormat::Tiff).is_empty());
    }
}
