use std::path::{Path, PathBuf};

use image::{DynamicImage, GrayImage, Luma};
use ocrs::{ImageSource, OcrEngine, OcrEngineParams};
use rten::Model;
use tracing::{debug, info, instrument};

use crate::error::{ExtractError, RecognitionError, Result};
use crate::models::GlyphTile;

/// Something that can read a single glyph, and optionally a whole strip of them.
///
/// Implementations must be shareable across threads so tiles can be
/// recognized in parallel.
pub trait CharacterRecognizer: Send + Sync {
    fn recognize_single_character(
        &self,
        tile: &GlyphTile,
    ) -> std::result::Result<char, RecognitionError>;

    /// Read every digit in a region; used only as a cross-check.
    fn recognize_digit_string(
        &self,
        _region: &DynamicImage,
    ) -> std::result::Result<String, RecognitionError> {
        Err(RecognitionError::Disabled)
    }
}

/// Recognizer that never recognizes anything; every delegated tile becomes `?`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledRecognizer;

impl CharacterRecognizer for DisabledRecognizer {
    fn recognize_single_character(
        &self,
        _tile: &GlyphTile,
    ) -> std::result::Result<char, RecognitionError> {
        Err(RecognitionError::Disabled)
    }
}

const DETECTION_MODEL_FILENAME: &str = "text-detection.rten";
const RECOGNITION_MODEL_FILENAME: &str = "text-recognition.rten";

/// Side of the white canvas a glyph is centred on before recognition.
const GLYPH_CANVAS: u32 = 100;
/// Margin kept around the glyph on that canvas.
const GLYPH_BORDER: u32 = 10;

/// Locations of the `ocrs` model files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcrConfig {
    pub detection_model_path: PathBuf,
    pub recognition_model_path: PathBuf,
}

impl Default for OcrConfig {
    /// `$XDG_CACHE_HOME/ocrs`, else `~/.cache/ocrs`, where `ocrs-cli` stores models.
    fn default() -> Self {
        let dir = if let Ok(xdg) = std::env::var("XDG_CACHE_HOME") {
            PathBuf::from(xdg).join("ocrs")
        } else if let Ok(home) = std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE")) {
            PathBuf::from(home).join(".cache").join("ocrs")
        } else {
            PathBuf::from("ocrs-models")
        };
        Self::from_dir(dir)
    }
}

impl OcrConfig {
    pub fn from_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            detection_model_path: dir.join(DETECTION_MODEL_FILENAME),
            recognition_model_path: dir.join(RECOGNITION_MODEL_FILENAME),
        }
    }

    pub fn validate(&self) -> Result<()> {
        for path in [&self.detection_model_path, &self.recognition_model_path] {
            if !path.exists() {
                return Err(ExtractError::Ocr(format!(
                    "model not found at {}; run `ocrs-cli` once to download models",
                    path.display()
                )));
            }
        }
        Ok(())
    }
}

/// Load both models and build an `ocrs` engine.
#[instrument(skip_all, fields(
    detection = %config.detection_model_path.display(),
    recognition = %config.recognition_model_path.display(),
))]
pub fn init_ocr_engine(config: &OcrConfig) -> Result<OcrEngine> {
    config.validate()?;

    let load = |path: &Path| {
        Model::load_file(path).map_err(|e| {
            ExtractError::Ocr(format!("failed to load model {}: {}", path.display(), e))
        })
    };
    let detection_model = load(config.detection_model_path.as_path())?;
    let recognition_model = load(config.recognition_model_path.as_path())?;

    let engine = OcrEngine::new(OcrEngineParams {
        detection_model: Some(detection_model),
        recognition_model: Some(recognition_model),
        ..Default::default()
    })
    .map_err(|e| ExtractError::Ocr(format!("failed to initialise OCR engine: {}", e)))?;

    info!("OCR engine initialized");
    Ok(engine)
}

/// [`CharacterRecognizer`] backed by the `ocrs` neural engine.
pub struct OcrsRecognizer {
    engine: OcrEngine,
}

impl OcrsRecognizer {
    pub fn new(config: &OcrConfig) -> Result<Self> {
        Ok(Self {
            engine: init_ocr_engine(config)?,
        })
    }

    fn read_text(&self, image: &DynamicImage) -> std::result::Result<String, RecognitionError> {
        let rgb = image.to_rgb8();
        let source = ImageSource::from_bytes(rgb.as_raw(), rgb.dimensions())
            .map_err(|e| RecognitionError::Engine(e.to_string()))?;
        let input = self
            .engine
            .prepare_input(source)
            .map_err(|e| RecognitionError::Engine(e.to_string()))?;
        let text = self
            .engine
            .get_text(&input)
            .map_err(|e| RecognitionError::Engine(e.to_string()))?;
        Ok(text.trim().to_string())
    }
}

impl CharacterRecognizer for OcrsRecognizer {
    #[instrument(skip_all, fields(rank = tile.rank()))]
    fn recognize_single_character(
        &self,
        tile: &GlyphTile,
    ) -> std::result::Result<char, RecognitionError> {
        let text = self.read_text(&prepare_glyph(tile))?;
        debug!(text = %text, "Glyph OCR output");
        first_digit(&text)
    }

    fn recognize_digit_string(
        &self,
        region: &DynamicImage,
    ) -> std::result::Result<String, RecognitionError> {
        let text = self.read_text(region)?;
        if text.is_empty() {
            return Err(RecognitionError::NoText);
        }
        let digits: String = text.chars().filter(char::is_ascii_digit).collect();
        if digits.is_empty() {
            return Err(RecognitionError::NotADigit(text));
        }
        Ok(digits)
    }
}

/// Pick the first ASCII digit out of recognizer output.
pub fn first_digit(text: &str) -> std::result::Result<char, RecognitionError> {
    if text.trim().is_empty() {
        return Err(RecognitionError::NoText);
    }
    text.chars()
        .find(char::is_ascii_digit)
        .ok_or_else(|| RecognitionError::NotADigit(text.to_string()))
}

/// Render a tile as dark ink on white, scaled into the centre of a square canvas.
///
/// The text detector in `ocrs` expects print on paper with some margin around it.
pub fn prepare_glyph(tile: &GlyphTile) -> DynamicImage {
    let gray = tile.image().to_luma8();
    let ink = GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        if tile.is_ink(gray.get_pixel(x, y).0[0]) {
            Luma([0u8])
        } else {
            Luma([255u8])
        }
    });

    let inner = GLYPH_CANVAS - 2 * GLYPH_BORDER;
    let (width, height) = ink.dimensions();
    let scale = (inner as f32 / width.max(1) as f32).min(inner as f32 / height.max(1) as f32);
    let scaled_w = ((width as f32 * scale) as u32).clamp(1, inner);
    let scaled_h = ((height as f32 * scale) as u32).clamp(1, inner);
    let scaled = image::imageops::resize(
        &ink,
        scaled_w,
        scaled_h,
        image::imageops::FilterType::CatmullRom,
    );

    let mut canvas = GrayImage::from_pixel(GLYPH_CANVAS, GLYPH_CANVAS, Luma([255u8]));
    let offset_x = (GLYPH_CANVAS - scaled_w) / 2;
    let offset_y = (GLYPH_CANVAS - scaled_h) / 2;
    image::imageops::overlay(&mut canvas, &scaled, offset_x.into(), offset_y.into());

    DynamicImage::ImageLuma8(canvas)
}
