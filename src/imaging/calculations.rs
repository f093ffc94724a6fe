//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.
//! Dimensions are always the *orientation-corrected* source dimensions; the
//! backend applies EXIF orientation before consulting this module.

use super::params::{Gravity, ResizeMode};

/// Largest region of `source` that has the aspect ratio of `target`.
///
/// Cover crops this region out of the source and then resamples it to the
/// target, so the intermediate image is never larger than the source. One
/// side always matches the source; the other is rounded and kept within
/// `1..=source`.
///
/// # Arguments
/// * `source` - Original image dimensions (width, height)
/// * `target` - Target area dimensions (width, height)
pub fn cover_region(source: (u32, u32), target: (u32, u32)) -> (u32, u32) {
    let (src_w, src_h) = source;
    let (tgt_w, tgt_h) = target;

    let src_aspect = src_w as f64 / src_h as f64;
    let tgt_aspect = tgt_w as f64 / tgt_h as f64;

    if src_aspect > tgt_aspect {
        // Source is wider: keep full height, trim width
        let w = ((src_h as f64 * tgt_aspect).round() as u32).clamp(1, src_w);
        (w, src_h)
    } else {
        // Source is taller: keep full width, trim height
        let h = ((src_w as f64 / tgt_aspect).round() as u32).clamp(1, src_h);
        (src_w, h)
    }
}

/// Calculate dimensions that fit entirely inside a target box.
///
/// Aspect ratio is preserved; the limiting side matches the box exactly and
/// the other side is rounded, never below 1px. Unless `enlarge` is set, a
/// source that already fits is returned unchanged.
pub fn contain_dimensions(source: (u32, u32), target: (u32, u32), enlarge: bool) -> (u32, u32) {
    let (src_w, src_h) = source;
    let (tgt_w, tgt_h) = target;

    if !enlarge && src_w <= tgt_w && src_h <= tgt_h {
        return source;
    }

    let scale = (tgt_w as f64 / src_w as f64).min(tgt_h as f64 / src_h as f64);
    let w = ((src_w as f64 * scale).round() as u32).clamp(1, tgt_w);
    let h = ((src_h as f64 * scale).round() as u32).clamp(1, tgt_h);
    (w, h)
}

/// Top-left corner of a `crop` window inside `outer`, anchored by `gravity`.
pub fn crop_offset(outer: (u32, u32), crop: (u32, u32), gravity: Gravity) -> (u32, u32) {
    let spare_x = outer.0.saturating_sub(crop.0);
    let spare_y = outer.1.saturating_sub(crop.1);

    let x = match gravity {
        Gravity::NorthWest | Gravity::West | Gravity::SouthWest => 0,
        Gravity::North | Gravity::Center | Gravity::South => spare_x / 2,
        Gravity::NorthEast | Gravity::East | Gravity::SouthEast => spare_x,
    };
    let y = match gravity {
        Gravity::NorthWest | Gravity::North | Gravity::NorthEast => 0,
        Gravity::West | Gravity::Center | Gravity::East => spare_y / 2,
        Gravity::SouthWest | Gravity::South | Gravity::SouthEast => spare_y,
    };
    (x, y)
}

/// Concrete geometry steps for one variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Geometry {
    /// Leave pixels as decoded.
    Keep,
    /// Resample to exactly `(width, height)`.
    Scale { width: u32, height: u32 },
    /// Crop `region` at `offset` from the source, then resample it to `size`.
    CropScale {
        offset: (u32, u32),
        region: (u32, u32),
        size: (u32, u32),
    },
}

impl Geometry {
    /// Output dimensions after applying this geometry to `source`.
    pub fn output_dimensions(&self, source: (u32, u32)) -> (u32, u32) {
        match *self {
            Geometry::Keep => source,
            Geometry::Scale { width, height } => (width, height),
            Geometry::CropScale { size, .. } => size,
        }
    }
}

/// Decide what the backend must do to turn `source` into a variant.
pub fn plan_geometry(
    source: (u32, u32),
    mode: ResizeMode,
    target: (u32, u32),
    gravity: Gravity,
    enlarge: bool,
) -> Geometry {
    match mode {
        ResizeMode::None => Geometry::Keep,
        ResizeMode::Contain => {
            let dims = contain_dimensions(source, target, enlarge);
            if dims == source {
                Geometry::Keep
            } else {
                Geometry::Scale {
                    width: dims.0,
                    height: dims.1,
                }
            }
        }
        ResizeMode::Cover => {
            let region = cover_region(source, target);
            Geometry::CropScale {
                offset: crop_offset(source, region, gravity),
                region,
                size: target,
            }
        }
    }
}
