//! Flushing a handle back to disk.
//!
//! The output path is the source path with its extension replaced by the
//! pending format name, if a `convert` ran. Bytes are encoded in memory,
//! written to a temporary file in the destination directory, and renamed
//! into place, so a failed flush never leaves a partial file behind.
//!
//! JPEG output gets every metadata block back. Other formats keep only the
//! ICC profile, embedded by their encoder, so colours render the same.

use crate::imaging::metadata::embed_in_jpeg;
use crate::imaging::{EncodeParams, ImageHandle, ImagingError};
use image::ImageFormat;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// What a flush wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flushed {
    pub path: PathBuf,
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
    /// Operations applied before the flush.
    pub operations: usize,
}

/// Path the handle will be written to.
///
/// ```
/// # use std::path::Path;
/// # use upload_imaging::imaging::PendingFormat;
/// # use upload_imaging::writer::output_path;
/// let webp = PendingFormat::parse("WebP");
/// assert_eq!(output_path(Path::new("up/a.jpg"), webp.as_ref()), Path::new("up/a.webp"));
/// assert_eq!(output_path(Path::new("up/a.jpg"), None), Path::new("up/a.jpg"));
/// ```
pub fn output_path(source: &Path, pending: Option<&crate::imaging::PendingFormat>) -> PathBuf {
    match pending {
        Some(format) => source.with_extension(format.name()),
        None => source.to_path_buf(),
    }
}

/// Encode and atomically write the handle, consuming it.
pub fn flush(handle: ImageHandle, params: &EncodeParams) -> Result<Flushed, ImagingError> {
    let path = output_path(handle.source_path(), handle.pending_format());
    let format = handle.output_format();

    let mut bytes = handle
        .encode(format, params)
        .map_err(|source| ImagingError::Encode {
            path: path.clone(),
            source,
        })?;

    let metadata = handle.metadata();
    if format == ImageFormat::Jpeg {
        if !metadata.is_empty() {
            let (embedded, skipped) = embed_in_jpeg(&bytes, metadata);
            for block in skipped {
                warn!(path = %path.display(), block, "metadata block too large for JPEG, dropped");
            }
            bytes = embedded;
        }
    } else {
        let dropped = metadata.entry_count() - usize::from(metadata.icc_profile.is_some());
        if dropped > 0 {
            debug!(
                path = %path.display(),
                ?format,
                dropped,
                "metadata other than the ICC profile not carried into non-JPEG output"
            );
        }
    }

    write_atomic(&path, &bytes).map_err(|source| ImagingError::Write {
        path: path.clone(),
        source,
    })?;

    debug!(path = %path.display(), ?format, bytes = bytes.len(), "flushed image");

    Ok(Flushed {
        path,
        format,
        width: handle.width(),
        height: handle.height(),
        operations: handle.mutations(),
    })
}

/// Write via a sibling temp file and rename over `path`.
fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = tempfile::Builder::new()
        .prefix(".upload-imaging-")
        .tempfile_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;

    // Keep the permissions of the file being replaced
    if let Ok(existing) = std::fs::metadata(path) {
        tmp.as_file().set_permissions(existing.permissions())?;
    }

    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
