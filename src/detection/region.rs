use image::DynamicImage;
use tracing::debug;

use crate::error::{ExtractError, Result};
use crate::models::{BoundingBox, RegionSpec};

/// Pixel rectangle that `spec` keeps from a `width` x `height` image.
///
/// Each edge is trimmed by `floor(fraction * dimension)` pixels.
pub fn pixel_bounds(spec: &RegionSpec, width: u32, height: u32) -> Result<BoundingBox> {
    let invalid = || ExtractError::InvalidRegion {
        top: spec.top,
        bottom: spec.bottom,
        left: spec.left,
        right: spec.right,
        width,
        height,
    };
    let fractions = [spec.top, spec.bottom, spec.left, spec.right];
    if fractions.iter().any(|f| !(0.0..1.0).contains(f)) {
        return Err(invalid());
    }

    let trim = |fraction: f64, extent: u32| (fraction * extent as f64).floor() as i64;
    let top_px = trim(spec.top, height);
    let bottom_px = height as i64 - trim(spec.bottom, height);
    let left_px = trim(spec.left, width);
    let right_px = width as i64 - trim(spec.right, width);

    if bottom_px <= top_px || right_px <= left_px {
        return Err(invalid());
    }
    Ok(BoundingBox {
        x: left_px as u32,
        y: top_px as u32,
        width: (right_px - left_px) as u32,
        height: (bottom_px - top_px) as u32,
    })
}

/// Crop the region of interest described by `spec`.
pub fn extract_region(image: &DynamicImage, spec: &RegionSpec) -> Result<DynamicImage> {
    let rect = pixel_bounds(spec, image.width(), image.height())?;
    debug!(region = %spec, x = rect.x, y = rect.y, width = rect.width, height = rect.height, "Cropping region");
    Ok(image.crop_imm(rect.x, rect.y, rect.width, rect.height))
}

/// Apply each spec independently; a bad spec fails only its own entry.
pub fn extract_regions(image: &DynamicImage, specs: &[RegionSpec]) -> Vec<Result<DynamicImage>> {
    specs.iter().map(|spec| extract_region(image, spec)).collect()
}
