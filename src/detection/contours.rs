use image::GrayImage;
use imageproc::contours::{BorderType, Contour, find_contours};
use imageproc::point::Point;

use crate::config::SegmentConfig;
use crate::detection::geometry::polygon_area;
use crate::models::BoundingBox;

/// Outer border of one connected foreground component.
#[derive(Debug, Clone, PartialEq)]
pub struct GlyphContour {
    /// Position in detection order, used as the last sort key.
    pub index: usize,
    pub bbox: BoundingBox,
    /// Area enclosed by the traced border.
    pub area: f64,
}

/// Trace the outermost borders of a foreground mask (non-zero pixels).
///
/// The mask is traced inside a one pixel background frame, so components
/// touching the image edge still get an outer border. Points are in the
/// coordinates of `mask`.
pub fn trace_outer_borders(mask: &GrayImage) -> Vec<Contour<i32>> {
    let mut framed = GrayImage::new(mask.width() + 2, mask.height() + 2);
    image::imageops::replace(&mut framed, mask, 1, 1);

    find_contours::<i32>(&framed)
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .map(|mut c| {
            for p in &mut c.points {
                *p = Point::new(p.x - 1, p.y - 1);
            }
            c
        })
        .collect()
}

/// Find the external contours of a foreground mask (non-zero pixels).
///
/// Borders nested inside another component are ignored.
pub fn find_external_contours(mask: &GrayImage) -> Vec<GlyphContour> {
    trace_outer_borders(mask)
        .into_iter()
        .enumerate()
        .filter_map(|(index, c)| {
            let min_x = c.points.iter().map(|p| p.x).min()?;
            let max_x = c.points.iter().map(|p| p.x).max()?;
            let min_y = c.points.iter().map(|p| p.y).min()?;
            let max_y = c.points.iter().map(|p| p.y).max()?;
            Some(GlyphContour {
                index,
                bbox: BoundingBox {
                    x: min_x as u32,
                    y: min_y as u32,
                    width: (max_x - min_x + 1) as u32,
                    height: (max_y - min_y + 1) as u32,
                },
                area: polygon_area(&c.points),
            })
        })
        .collect()
}

/// Size and shape test separating glyphs from speckle and border artifacts.
pub fn is_glyph_candidate(contour: &GlyphContour, image_area: f64, config: &SegmentConfig) -> bool {
    if contour.bbox.height == 0 {
        return false;
    }
    let aspect = contour.bbox.aspect_ratio();
    contour.area > config.min_area_fraction * image_area
        && contour.area < config.max_area_fraction * image_area
        && aspect > config.min_aspect
        && aspect < config.max_aspect
}

/// Keep candidates and put them in reading order: left edge, then top edge,
/// then detection order.
pub fn filter_and_order(
    contours: Vec<GlyphContour>,
    image_area: f64,
    config: &SegmentConfig,
) -> Vec<GlyphContour> {
    let mut kept: Vec<GlyphContour> = contours
        .into_iter()
        .filter(|c| is_glyph_candidate(c, image_area, config))
        .collect();
    kept.sort_by_key(|c| (c.bbox.x, c.bbox.y, c.index));
    if config.expected_glyph_count > 0 {
        kept.truncate(config.expected_glyph_count);
    }
    kept
}

/// Grow the shorter side of `bbox` to a square, centred on the original box
/// and shrunk where it would leave the image.
pub fn square_box(bbox: &BoundingBox, image_width: u32, image_height: u32) -> BoundingBox {
    let size = bbox.width.max(bbox.height);
    let x = bbox.x.saturating_sub((size - bbox.width) / 2);
    let y = bbox.y.saturating_sub((size - bbox.height) / 2);
    let size = size
        .min(image_width.saturating_sub(x))
        .min(image_height.saturating_sub(y));
    BoundingBox {
        x,
        y,
        width: size,
        height: size,
    }
}
