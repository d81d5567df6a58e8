use std::path::{Path, PathBuf};

use image::{DynamicImage, GrayImage, Rgb};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::config::PipelineConfig;
use crate::detection::ocr::CharacterRecognizer;
use crate::detection::{classify, rectify, region, segment};
use crate::error::{ExtractError, Result};
use crate::models::{BoundingBox, DigitResult, GlyphTile, Quadrilateral, RegionSpec, digit_string};

/// Debug configuration for pipeline execution
#[derive(Clone, Debug)]
pub struct DebugConfig {
    /// Root directory for debug outputs
    pub output_dir: PathBuf,
}

/// How a region came out, beyond its digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RegionStatus {
    Complete,
    NoGlyphsFound,
    Unresolved { count: usize },
}

/// Result of one region of interest.
#[derive(Debug, Clone)]
pub struct RegionOutput {
    pub index: usize,
    pub spec: RegionSpec,
    pub image: DynamicImage,
    pub mask: GrayImage,
    pub tiles: Vec<GlyphTile>,
    /// One entry per tile, same order.
    pub results: Vec<DigitResult>,
    /// Whole-region reading from the recognizer, if it offered one.
    pub cross_check: Option<String>,
}

impl RegionOutput {
    pub fn digits(&self) -> String {
        digit_string(&self.results)
    }

    pub fn status(&self) -> RegionStatus {
        if self.tiles.is_empty() {
            return RegionStatus::NoGlyphsFound;
        }
        let count = self.results.iter().filter(|r| !r.is_resolved()).count();
        if count > 0 {
            RegionStatus::Unresolved { count }
        } else {
            RegionStatus::Complete
        }
    }
}

/// Everything one pipeline run produced.
#[derive(Debug)]
pub struct PipelineOutput {
    pub rectified: DynamicImage,
    /// False when the card outline was not found and the fallback kicked in.
    pub was_rectified: bool,
    pub quad: Option<Quadrilateral>,
    /// One entry per configured region; a bad region fails alone.
    pub regions: Vec<Result<RegionOutput>>,
}

impl PipelineOutput {
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            rectified: self.was_rectified,
            regions: self
                .regions
                .iter()
                .enumerate()
                .map(|(index, region)| match region {
                    Ok(out) => RegionSummary {
                        index,
                        digits: Some(out.digits()),
                        status: Some(out.status()),
                        glyphs: out
                            .tiles
                            .iter()
                            .zip(&out.results)
                            .map(|(tile, result)| GlyphSummary {
                                rank: tile.rank(),
                                bbox: tile.bbox(),
                                result: *result,
                            })
                            .collect(),
                        cross_check: out.cross_check.clone(),
                        error: None,
                    },
                    Err(err) => RegionSummary {
                        index,
                        digits: None,
                        status: None,
                        glyphs: Vec::new(),
                        cross_check: None,
                        error: Some(err.to_string()),
                    },
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub rectified: bool,
    pub regions: Vec<RegionSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegionSummary {
    pub index: usize,
    pub digits: Option<String>,
    pub status: Option<RegionStatus>,
    pub glyphs: Vec<GlyphSummary>,
    pub cross_check: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GlyphSummary {
    pub rank: usize,
    pub bbox: BoundingBox,
    pub result: DigitResult,
}

/// Photo-to-digits pipeline: rectify, crop each region, segment, classify.
///
/// Holds only configuration, so one instance can serve many images and
/// several instances with different tuning can run side by side.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    config: PipelineConfig,
    debug: Option<DebugConfig>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config, debug: None }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Enable debug mode with output directory
    /// The directory must be empty or non-existent
    pub fn with_debug(mut self, output_dir: PathBuf) -> Result<Self> {
        if output_dir.exists() {
            let entries = std::fs::read_dir(&output_dir)?;
            if entries.count() > 0 {
                return Err(ExtractError::Config(format!(
                    "debug directory is not empty: {}",
                    output_dir.display()
                )));
            }
        } else {
            std::fs::create_dir_all(&output_dir)?;
        }

        self.debug = Some(DebugConfig { output_dir });
        Ok(self)
    }

    /// Run every stage on one photo.
    ///
    /// Fails when the configuration is invalid or the card outline cannot be
    /// found (and the fallback is off); region-level problems are reported
    /// per region.
    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    pub fn run<R>(&self, image: &DynamicImage, recognizer: &R) -> Result<PipelineOutput>
    where
        R: CharacterRecognizer + ?Sized,
    {
        self.config.validate()?;
        self.save_debug("00_input.png", image)?;

        let (rectified, quad) = match rectify::rectify(image, &self.config.rectify) {
            Ok(r) => (r.image, Some(r.quad)),
            Err(ExtractError::BoundaryNotFound { attempts })
                if self.config.rectify.fallback_to_full_image =>
            {
                warn!(attempts, "Card outline not found; using the full image");
                (image.clone(), None)
            }
            Err(err) => return Err(err),
        };
        self.save_debug("01_rectified.png", &rectified)?;

        let mut regions = Vec::with_capacity(self.config.regions.len());
        for (index, spec) in self.config.regions.iter().enumerate() {
            let outcome = self.process_region(&rectified, index, spec, recognizer);
            if let Err(err) = &outcome {
                warn!(index, error = %err, "Region failed");
            }
            regions.push(outcome);
        }

        info!(
            regions = regions.len(),
            rectified = quad.is_some(),
            "Pipeline finished"
        );
        Ok(PipelineOutput {
            rectified,
            was_rectified: quad.is_some(),
            quad,
            regions,
        })
    }

    /// Crop, segment and classify a single region of an already rectified card.
    pub fn process_region<R>(
        &self,
        rectified: &DynamicImage,
        index: usize,
        spec: &RegionSpec,
        recognizer: &R,
    ) -> Result<RegionOutput>
    where
        R: CharacterRecognizer + ?Sized,
    {
        let image = region::extract_region(rectified, spec)?;
        self.save_debug(&format!("02_region_{index}.png"), &image)?;

        let segmentation = segment::segment_glyphs(&image, &self.config.segment);
        self.save_segmentation_debug(index, &image, &segmentation)?;

        let results = classify::classify_tiles(&segmentation.tiles, recognizer, &self.config.classify);

        let cross_check = match recognizer.recognize_digit_string(&image) {
            Ok(text) => Some(text),
            Err(err) => {
                debug!(index, error = %err, "No whole-region reading");
                None
            }
        };

        let output = RegionOutput {
            index,
            spec: *spec,
            image,
            mask: segmentation.mask,
            tiles: segmentation.tiles,
            results,
            cross_check,
        };
        info!(index, digits = %output.digits(), status = ?output.status(), "Region done");
        Ok(output)
    }

    fn debug_dir(&self) -> Option<&Path> {
        self.debug.as_ref().map(|d| d.output_dir.as_path())
    }

    fn save_debug(&self, name: &str, image: &DynamicImage) -> Result<()> {
        if let Some(dir) = self.debug_dir() {
            let path = dir.join(name);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            image.save(&path)?;
            debug!(path = %path.display(), "Saved debug image");
        }
        Ok(())
    }

    fn save_segmentation_debug(
        &self,
        index: usize,
        region: &DynamicImage,
        segmentation: &segment::Segmentation,
    ) -> Result<()> {
        if self.debug_dir().is_none() {
            return Ok(());
        }
        self.save_debug(
            &format!("03_threshold_{index}.png"),
            &DynamicImage::ImageLuma8(segmentation.mask.clone()),
        )?;

        let mut overlay = region.to_rgb8();
        for tile in &segmentation.tiles {
            let b = tile.bbox();
            let rect = Rect::at(b.x as i32, b.y as i32).of_size(b.width, b.height);
            draw_hollow_rect_mut(&mut overlay, rect, Rgb([0u8, 255, 0]));
        }
        self.save_debug(&format!("04_contours_{index}.png"), &DynamicImage::ImageRgb8(overlay))?;

        for tile in &segmentation.tiles {
            self.save_debug(&format!("05_glyphs_{index}/{}.png", tile.rank()), tile.image())?;
        }
        Ok(())
    }
}
