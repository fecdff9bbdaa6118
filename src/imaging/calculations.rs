//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

use crate::operation::Gravity;

/// Calculate dimensions that fit inside a target box (resize-to-fit).
///
/// Preserves the source aspect ratio. The limiting axis matches the target
/// exactly; the other axis is rounded and clamped to `1..=target`.
///
/// # Examples
/// ```
/// # use upload_imaging::imaging::calculate_fit_dimensions;
/// // 800x600 into 400x400 → width limits: 400x300
/// assert_eq!(calculate_fit_dimensions((800, 600), (400, 400)), (400, 300));
///
/// // 100x50 into 400x400 → upscales: 400x200
/// assert_eq!(calculate_fit_dimensions((100, 50), (400, 400)), (400, 200));
/// ```
pub fn calculate_fit_dimensions(source: (u32, u32), target: (u32, u32)) -> (u32, u32) {
    let (src_w, src_h) = source;
    let (tgt_w, tgt_h) = target;

    // Compare tgt_w/src_w against tgt_h/src_h without dividing
    if tgt_w as u64 * src_h as u64 <= tgt_h as u64 * src_w as u64 {
        // Width is the limiting axis
        let h = (src_h as f64 * tgt_w as f64 / src_w as f64).round() as u32;
        (tgt_w, h.clamp(1, tgt_h))
    } else {
        // Height is the limiting axis
        let w = (src_w as f64 * tgt_h as f64 / src_h as f64).round() as u32;
        (w.clamp(1, tgt_w), tgt_h)
    }
}

/// Calculate dimensions for a shrink-only resize (resize-to-limit).
///
/// Returns `None` when the source already fits inside the target, meaning
/// no resize is needed.
pub fn calculate_limit_dimensions(source: (u32, u32), target: (u32, u32)) -> Option<(u32, u32)> {
    let (src_w, src_h) = source;
    let (tgt_w, tgt_h) = target;

    if src_w <= tgt_w && src_h <= tgt_h {
        return None;
    }
    Some(calculate_fit_dimensions(source, target))
}

/// Calculate the crop window for a fill resize, at source scale.
///
/// Returns the largest region of the source with the target's aspect ratio.
/// Cropping to it and then resizing to the target covers the target exactly
/// without ever resampling pixels that get cut away.
///
/// # Arguments
/// * `source` - Original image dimensions (width, height)
/// * `target` - Target area dimensions (width, height)
///
/// # Returns
/// * `(width, height)` - Crop window (at least one axis matches the source)
pub fn calculate_fill_crop(source: (u32, u32), target: (u32, u32)) -> (u32, u32) {
    let (src_w, src_h) = source;
    let (tgt_w, tgt_h) = target;

    if src_w as u64 * tgt_h as u64 > tgt_w as u64 * src_h as u64 {
        // Source is wider: keep full height, trim width
        let w = (src_h as f64 * tgt_w as f64 / tgt_h as f64).round() as u32;
        (w.clamp(1, src_w), src_h)
    } else {
        // Source is taller: keep full width, trim height
        let h = (src_w as f64 * tgt_h as f64 / tgt_w as f64).round() as u32;
        (src_w, h.clamp(1, src_h))
    }
}

/// Offset of a `inner`-sized span inside an `outer`-sized span along one axis.
///
/// `anchor` is 0 for the leading edge (west/north), 1 for the middle and
/// 2 for the trailing edge (east/south). Returns 0 when `inner >= outer`.
fn axis_offset(outer: u32, inner: u32, anchor: u8) -> u32 {
    let slack = outer.saturating_sub(inner);
    match anchor {
        0 => 0,
        1 => slack / 2,
        _ => slack,
    }
}

/// Top-left position of an `inner` rectangle placed inside `outer` at `gravity`.
///
/// Picks the fill crop window inside the source image.
pub fn gravity_offset(outer: (u32, u32), inner: (u32, u32), gravity: Gravity) -> (u32, u32) {
    let (col, row) = gravity.anchor();
    (
        axis_offset(outer.0, inner.0, col),
        axis_offset(outer.1, inner.1, row),
    )
}
