use image::{DynamicImage, GrayImage};
use tracing::{debug, info, instrument};

use crate::config::{SegmentConfig, TileSource};
use crate::detection::{contours, preprocessing};
use crate::models::{BoundingBox, GlyphTile, Polarity};

/// Everything segmentation produced for one region.
#[derive(Debug, Clone)]
pub struct Segmentation {
    /// Foreground mask: print is white.
    pub mask: GrayImage,
    /// Number of external contours before filtering.
    pub candidates: usize,
    /// Accepted glyphs in reading order.
    pub tiles: Vec<GlyphTile>,
}

impl Segmentation {
    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }
}

/// Split a region into square glyph tiles ordered left to right.
///
/// Finding nothing is not an error; the tile list is simply empty.
#[instrument(skip_all, fields(width = region.width(), height = region.height()))]
pub fn segment_glyphs(region: &DynamicImage, config: &SegmentConfig) -> Segmentation {
    let gray = preprocessing::to_grayscale(region);
    let blurred = preprocessing::apply_blur(&gray, config.blur_kernel_size);
    let mask = preprocessing::binarize(&blurred, config.binary_threshold, true);

    let found = contours::find_external_contours(&mask);
    let candidates = found.len();
    let image_area = region.width() as f64 * region.height() as f64;
    let accepted = contours::filter_and_order(found, image_area, config);
    debug!(candidates, accepted = accepted.len(), "Filtered glyph contours");

    let tiles: Vec<GlyphTile> = accepted
        .iter()
        .enumerate()
        .map(|(rank, contour)| cut_tile(region, &mask, contour.bbox, rank, config))
        .collect();

    if tiles.is_empty() {
        info!(candidates, "No glyphs found in region");
    } else {
        info!(glyphs = tiles.len(), "Segmented glyphs");
    }
    Segmentation {
        mask,
        candidates,
        tiles,
    }
}

fn cut_tile(
    region: &DynamicImage,
    mask: &GrayImage,
    bbox: BoundingBox,
    rank: usize,
    config: &SegmentConfig,
) -> GlyphTile {
    let sq = contours::square_box(&bbox, region.width(), region.height());
    let mut image = match config.tile_source {
        TileSource::Mask => DynamicImage::ImageLuma8(
            image::imageops::crop_imm(mask, sq.x, sq.y, sq.width, sq.height).to_image(),
        ),
        TileSource::Original => region.crop_imm(sq.x, sq.y, sq.width, sq.height),
    };
    if config.invert {
        image.invert();
    }
    let (polarity, ink_level) = tile_polarity(config);
    GlyphTile::new(image, bbox, sq, rank, polarity, ink_level)
}

/// How ink shows up in a tile cut under `config`.
pub fn tile_polarity(config: &SegmentConfig) -> (Polarity, u8) {
    let t = config.binary_threshold;
    match (config.tile_source, config.invert) {
        (TileSource::Mask, false) => (Polarity::LightOnDark, t),
        (TileSource::Mask, true) => (Polarity::DarkOnLight, t),
        (TileSource::Original, false) => (Polarity::DarkOnLight, t),
        (TileSource::Original, true) => (Polarity::LightOnDark, 254 - t.min(254)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn strip_with_blocks(blocks: &[(u32, u32, u32, u32)]) -> DynamicImage {
        let mut img = RgbImage::from_pixel(200, 60, Rgb([245, 245, 245]));
        for &(x0, y0, w, h) in blocks {
            for y in y0..y0 + h {
                for x in x0..x0 + w {
                    img.put_pixel(x, y, Rgb([10, 10, 10]));
                }
            }
        }
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn blank_region_yields_no_tiles() {
        let seg = segment_glyphs(&strip_with_blocks(&[]), &SegmentConfig::default());
        assert!(seg.is_empty());
        assert_eq!(seg.candidates, 0);
    }

    #[test]
    fn mask_tiles_count_same_ink_inverted_or_not() {
        let region = strip_with_blocks(&[(50, 10, 12, 30)]);
        let plain = segment_glyphs(&region, &SegmentConfig::default());
        let inverted = segment_glyphs(
            &region,
            &SegmentConfig { invert: true, ..SegmentConfig::default() },
        );
        assert_eq!(plain.tiles.len(), 1);
        assert_eq!(inverted.tiles.len(), 1);
        assert_eq!(plain.tiles[0].ink_area(), inverted.tiles[0].ink_area());
        assert!(plain.tiles[0].ink_area() > 200);
    }

    #[test]
    fn original_tiles_keep_colour_and_ink() {
        let region = strip_with_blocks(&[(50, 10, 12, 30)]);
        let config = SegmentConfig { tile_source: TileSource::Original, ..SegmentConfig::default() };
        let seg = segment_glyphs(&region, &config);
        assert_eq!(seg.tiles.len(), 1);
        let tile = &seg.tiles[0];
        assert_eq!(tile.polarity(), Polarity::DarkOnLight);
        assert!(tile.image().as_rgb8().is_some());
        assert!(tile.ink_area() > 200);

        let inv = SegmentConfig { invert: true, ..config };
        let seg_inv = segment_glyphs(&region, &inv);
        assert_eq!(seg_inv.tiles[0].ink_area(), tile.ink_area());
    }
}
