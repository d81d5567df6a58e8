#![allow(dead_code)]

use std::sync::Mutex;

use cardigits::detection::CharacterRecognizer;
use cardigits::{BoundingBox, GlyphTile, Polarity, RecognitionError};
use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};
use imageproc::drawing::draw_polygon_mut;
use imageproc::point::Point;
use tempfile::NamedTempFile;

/// Fill an axis-aligned rectangle in place.
pub fn fill_rect(img: &mut RgbImage, x: u32, y: u32, width: u32, height: u32, color: Rgb<u8>) {
    for yy in y..y + height {
        for xx in x..x + width {
            img.put_pixel(xx, yy, color);
        }
    }
}

/// A flat-lit card lying straight in the frame.
///
/// `card` is `(x, y, width, height)`; `marks` are dark blocks in image coordinates.
pub fn upright_card(
    size: (u32, u32),
    background: u8,
    card: (u32, u32, u32, u32),
    card_level: u8,
    marks: &[(u32, u32, u32, u32)],
) -> DynamicImage {
    let mut img = RgbImage::from_pixel(size.0, size.1, Rgb([background; 3]));
    fill_rect(&mut img, card.0, card.1, card.2, card.3, Rgb([card_level; 3]));
    for &(x, y, w, h) in marks {
        fill_rect(&mut img, x, y, w, h, Rgb([20; 3]));
    }
    DynamicImage::ImageRgb8(img)
}

/// A card photographed at an angle: a filled quadrilateral with corners in the
/// order top-left, top-right, bottom-right, bottom-left.
pub fn skewed_card(size: (u32, u32), background: u8, corners: [(i32, i32); 4], card_level: u8) -> DynamicImage {
    let mut img = RgbImage::from_pixel(size.0, size.1, Rgb([background; 3]));
    let poly = corners.map(|(x, y)| Point::new(x, y));
    draw_polygon_mut(&mut img, &poly, Rgb([card_level; 3]));
    DynamicImage::ImageRgb8(img)
}

/// White strip with black rectangles standing in for printed digits.
pub fn region_with_blocks(width: u32, height: u32, blocks: &[(u32, u32, u32, u32)]) -> DynamicImage {
    let mut img = RgbImage::from_pixel(width, height, Rgb([250; 3]));
    for &(x, y, w, h) in blocks {
        fill_rect(&mut img, x, y, w, h, Rgb([0; 3]));
    }
    DynamicImage::ImageRgb8(img)
}

/// A mask tile (white ink on black) with exactly `ink` lit pixels.
pub fn tile_with_ink(rank: usize, ink: u32) -> GlyphTile {
    let side = 20u32;
    let mut img = GrayImage::new(side, side);
    for i in 0..ink.min(side * side) {
        img.put_pixel(i % side, i / side, Luma([255]));
    }
    let b = BoundingBox {
        x: rank as u32 * side,
        y: 0,
        width: side,
        height: side,
    };
    GlyphTile::new(DynamicImage::ImageLuma8(img), b, b, rank, Polarity::LightOnDark, 64)
}

/// Saves `img` as a PNG temp file that is removed when dropped.
pub fn save_temp_png(img: &DynamicImage) -> NamedTempFile {
    let file = tempfile::Builder::new()
        .suffix(".png")
        .tempfile()
        .expect("Failed to create temp image file");
    img.save_with_format(file.path(), image::ImageFormat::Png)
        .expect("Failed to save test image");
    file
}

/// Answers from a fixed script keyed by tile rank and records every call.
pub struct ScriptedRecognizer {
    answers: Vec<Result<char, RecognitionError>>,
    calls: Mutex<Vec<usize>>,
    whole_region: Option<String>,
}

impl ScriptedRecognizer {
    pub fn new(answers: Vec<Result<char, RecognitionError>>) -> Self {
        Self {
            answers,
            calls: Mutex::new(Vec::new()),
            whole_region: None,
        }
    }

    pub fn with_whole_region(mut self, text: &str) -> Self {
        self.whole_region = Some(text.to_string());
        self
    }

    /// Ranks of the tiles that were sent for recognition, sorted.
    pub fn calls(&self) -> Vec<usize> {
        let mut calls = self.calls.lock().unwrap().clone();
        calls.sort_unstable();
        calls
    }
}

impl CharacterRecognizer for ScriptedRecognizer {
    fn recognize_single_character(&self, tile: &GlyphTile) -> Result<char, RecognitionError> {
        self.calls.lock().unwrap().push(tile.rank());
        self.answers
            .get(tile.rank())
            .cloned()
            .unwrap_or(Err(RecognitionError::NoText))
    }

    fn recognize_digit_string(&self, _region: &DynamicImage) -> Result<String, RecognitionError> {
        self.whole_region.clone().ok_or(RecognitionError::Disabled)
    }
}

/// Fails every call with an engine error.
pub struct AlwaysFail;

impl CharacterRecognizer for AlwaysFail {
    fn recognize_single_character(&self, _tile: &GlyphTile) -> Result<char, RecognitionError> {
        Err(RecognitionError::Engine("model crashed".to_string()))
    }
}
