use std::fmt;
use std::str::FromStr;

use image::DynamicImage;
use imageproc::point::Point;
use serde::{Deserialize, Serialize};

use crate::error::{ExtractError, Result};

/// Axis-aligned box in pixel coordinates of the image it was measured on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    pub fn aspect_ratio(&self) -> f32 {
        if self.height == 0 {
            return 0.0;
        }
        self.width as f32 / self.height as f32
    }

    pub fn is_square(&self) -> bool {
        self.width == self.height
    }

    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.right() <= width && self.bottom() <= height
    }
}

/// Four card corners in canonical order.
///
/// Only built through [`crate::detection::geometry::order_corners`], which
/// guarantees the top-left, top-right, bottom-right, bottom-left ordering.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quadrilateral {
    pub top_left: Point<f32>,
    pub top_right: Point<f32>,
    pub bottom_right: Point<f32>,
    pub bottom_left: Point<f32>,
}

impl Quadrilateral {
    pub fn corners(&self) -> [Point<f32>; 4] {
        [
            self.top_left,
            self.top_right,
            self.bottom_right,
            self.bottom_left,
        ]
    }

    /// Multiply every corner by `ratio` (maps working-scale points to full resolution).
    pub fn scaled(&self, ratio: f32) -> Self {
        let s = |p: Point<f32>| Point::new(p.x * ratio, p.y * ratio);
        Self {
            top_left: s(self.top_left),
            top_right: s(self.top_right),
            bottom_right: s(self.bottom_right),
            bottom_left: s(self.bottom_left),
        }
    }

    /// Clamp every corner into `[0, width-1] x [0, height-1]`.
    pub fn clamped(&self, width: u32, height: u32) -> Self {
        let max_x = width.saturating_sub(1) as f32;
        let max_y = height.saturating_sub(1) as f32;
        let c = |p: Point<f32>| Point::new(p.x.clamp(0.0, max_x), p.y.clamp(0.0, max_y));
        Self {
            top_left: c(self.top_left),
            top_right: c(self.top_right),
            bottom_right: c(self.bottom_right),
            bottom_left: c(self.bottom_left),
        }
    }
}

/// Edge fractions to trim from a rectified card to reach a region of interest.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegionSpec {
    pub top: f64,
    pub bottom: f64,
    pub left: f64,
    pub right: f64,
}

impl RegionSpec {
    pub const fn new(top: f64, bottom: f64, left: f64, right: f64) -> Self {
        Self {
            top,
            bottom,
            left,
            right,
        }
    }

    /// The printed-number strip along the bottom right of an ID card.
    pub const fn id_number_strip() -> Self {
        Self::new(0.75, 0.14, 0.40, 0.0)
    }

    /// Whether the fractions can produce a non-empty crop on some image.
    pub fn is_well_formed(&self) -> bool {
        let in_range = |f: f64| (0.0..1.0).contains(&f);
        in_range(self.top)
            && in_range(self.bottom)
            && in_range(self.left)
            && in_range(self.right)
            && self.top + self.bottom < 1.0
            && self.left + self.right < 1.0
    }
}

impl fmt::Display for RegionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.top, self.bottom, self.left, self.right)
    }
}

impl FromStr for RegionSpec {
    type Err = ExtractError;

    /// Parses `top,bottom,left,right`.
    fn from_str(s: &str) -> Result<Self> {
        let parts = s
            .split(',')
            .map(|p| p.trim().parse::<f64>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| ExtractError::Config(format!("bad region {s:?}: {e}")))?;
        match parts.as_slice() {
            [top, bottom, left, right] => Ok(Self::new(*top, *bottom, *left, *right)),
            _ => Err(ExtractError::Config(format!(
                "region {s:?} needs exactly four fractions: top,bottom,left,right"
            ))),
        }
    }
}

/// Which way round ink and paper are in a glyph tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    /// Ink is bright (a foreground mask).
    LightOnDark,
    /// Ink is dark (printed text on paper).
    DarkOnLight,
}

/// One segmented glyph, normalized to a square tile.
#[derive(Debug, Clone)]
pub struct GlyphTile {
    image: DynamicImage,
    bbox: BoundingBox,
    square: BoundingBox,
    rank: usize,
    polarity: Polarity,
    ink_level: u8,
}

impl GlyphTile {
    /// `ink_level` is the luma cut separating ink from paper under `polarity`.
    pub fn new(
        image: DynamicImage,
        bbox: BoundingBox,
        square: BoundingBox,
        rank: usize,
        polarity: Polarity,
        ink_level: u8,
    ) -> Self {
        Self {
            image,
            bbox,
            square,
            rank,
            polarity,
            ink_level,
        }
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    /// Bounding box of the contour that produced this tile.
    pub fn bbox(&self) -> BoundingBox {
        self.bbox
    }

    /// The square actually cut out of the region.
    pub fn square(&self) -> BoundingBox {
        self.square
    }

    /// Left-to-right position within the region, starting at 0.
    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn polarity(&self) -> Polarity {
        self.polarity
    }

    pub fn is_ink(&self, luma: u8) -> bool {
        match self.polarity {
            Polarity::LightOnDark => luma > self.ink_level,
            Polarity::DarkOnLight => luma <= self.ink_level,
        }
    }

    /// Number of ink pixels in the tile.
    pub fn ink_area(&self) -> u32 {
        self.image
            .to_luma8()
            .pixels()
            .filter(|p| self.is_ink(p.0[0]))
            .count() as u32
    }
}

/// How one glyph was decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum DigitResult {
    /// Too little ink relative to the rest of the batch; taken to be a zero.
    ZeroByHeuristic,
    Recognized(char),
    Unresolved,
}

impl DigitResult {
    pub const UNRESOLVED_MARK: char = '?';

    pub fn as_char(&self) -> char {
        match self {
            DigitResult::ZeroByHeuristic => '0',
            DigitResult::Recognized(c) => *c,
            DigitResult::Unresolved => Self::UNRESOLVED_MARK,
        }
    }

    pub fn is_resolved(&self) -> bool {
        !matches!(self, DigitResult::Unresolved)
    }
}

/// Render a classified sequence as a string of `0`-`9` and `?`.
pub fn digit_string(results: &[DigitResult]) -> String {
    results.iter().map(DigitResult::as_char).collect()
}
