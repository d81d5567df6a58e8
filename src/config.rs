use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ExtractError, Result};
use crate::models::RegionSpec;

/// Tuning for boundary detection and rectification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RectifyConfig {
    /// Height the photo is downscaled to before looking for the card outline.
    pub working_height: u32,
    pub blur_kernel_size: u32,
    /// Median filter radius applied before edge detection; wipes out card print.
    pub median_radius: u32,
    pub canny_low: f32,
    pub canny_high: f32,
    /// Minimum card area as a fraction of the working image.
    pub min_quad_area_ratio: f64,
    /// Maximum spread between the largest and smallest interior angle, in degrees.
    pub max_quad_angle_range: f64,
    /// First polygon tolerance, as a fraction of the contour perimeter.
    pub epsilon_start: f64,
    pub epsilon_step: f64,
    pub max_attempts: usize,
    pub sharpen_sigma: f32,
    /// Weight of the warped image in the unsharp mask; the blur gets `1 - amount`.
    pub sharpen_amount: f32,
    /// Use the whole photo as the card when no outline is found.
    pub fallback_to_full_image: bool,
}

impl Default for RectifyConfig {
    fn default() -> Self {
        Self {
            working_height: 500,
            blur_kernel_size: 7,
            median_radius: 4,
            canny_low: 10.0,
            canny_high: 84.0,
            min_quad_area_ratio: 0.25,
            max_quad_angle_range: 40.0,
            epsilon_start: 0.01,
            epsilon_step: 0.01,
            max_attempts: 10,
            sharpen_sigma: 3.0,
            sharpen_amount: 1.5,
            fallback_to_full_image: false,
        }
    }
}

/// Where glyph tiles take their pixels from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TileSource {
    /// The binarized foreground mask.
    Mask,
    /// The region as it was cropped from the rectified card.
    Original,
}

/// Tuning for glyph segmentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentConfig {
    pub blur_kernel_size: u32,
    /// Pixels at or below this luma become foreground.
    pub binary_threshold: u8,
    /// Keep at most this many glyphs, leftmost first; 0 keeps all.
    pub expected_glyph_count: usize,
    pub min_area_fraction: f64,
    pub max_area_fraction: f64,
    pub min_aspect: f32,
    pub max_aspect: f32,
    pub tile_source: TileSource,
    pub invert: bool,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            blur_kernel_size: 3,
            binary_threshold: 64,
            expected_glyph_count: 15,
            min_area_fraction: 1.0 / 1000.0,
            max_area_fraction: 1.0 / 8.0,
            min_aspect: 0.1,
            max_aspect: 4.0,
            tile_source: TileSource::Mask,
            invert: false,
        }
    }
}

/// Tuning for the ink-area heuristic and recognition fan-out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifyConfig {
    /// Tiles with less ink than this fraction of the densest tile are zeros.
    pub zero_area_ratio: f64,
    /// Run recognition calls on scoped threads, one per tile.
    pub parallel: bool,
}

impl Default for ClassifyConfig {
    fn default() -> Self {
        Self {
            zero_area_ratio: 0.30,
            parallel: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub rectify: RectifyConfig,
    pub regions: Vec<RegionSpec>,
    pub segment: SegmentConfig,
    pub classify: ClassifyConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            rectify: RectifyConfig::default(),
            regions: vec![RegionSpec::id_number_strip()],
            segment: SegmentConfig::default(),
            classify: ClassifyConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load a JSON config; missing fields fall back to defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        let r = &self.rectify;
        check_kernel("rectify.blur_kernel_size", r.blur_kernel_size)?;
        if r.working_height == 0 {
            return Err(invalid("rectify.working_height must be positive"));
        }
        if !(r.canny_low >= 0.0 && r.canny_low <= r.canny_high) {
            return Err(invalid("rectify.canny_low must be in [0, canny_high]"));
        }
        if !(r.epsilon_start > 0.0 && r.epsilon_step > 0.0) {
            return Err(invalid("rectify epsilon start and step must be positive"));
        }
        if r.max_attempts == 0 {
            return Err(invalid("rectify.max_attempts must be at least 1"));
        }
        if r.sharpen_sigma <= 0.0 {
            return Err(invalid("rectify.sharpen_sigma must be positive"));
        }

        let s = &self.segment;
        check_kernel("segment.blur_kernel_size", s.blur_kernel_size)?;
        if !(s.min_area_fraction >= 0.0 && s.min_area_fraction < s.max_area_fraction) {
            return Err(invalid("segment area fractions must satisfy 0 <= min < max"));
        }
        if !(s.min_aspect >= 0.0 && s.min_aspect < s.max_aspect) {
            return Err(invalid("segment aspect bounds must satisfy 0 <= min < max"));
        }

        if !(0.0..=1.0).contains(&self.classify.zero_area_ratio) {
            return Err(invalid("classify.zero_area_ratio must be in [0, 1]"));
        }

        for (i, region) in self.regions.iter().enumerate() {
            if !region.is_well_formed() {
                return Err(invalid(&format!("region {i} ({region}) trims the whole image")));
            }
        }
        Ok(())
    }
}

fn check_kernel(name: &str, size: u32) -> Result<()> {
    if size == 0 || size % 2 == 0 {
        return Err(invalid(&format!("{name} must be odd and at least 1, got {size}")));
    }
    Ok(())
}

fn invalid(msg: &str) -> ExtractError {
    ExtractError::Config(msg.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        PipelineConfig::default().validate().unwrap();
    }

    #[test]
    fn even_kernel_is_rejected() {
        let mut config = PipelineConfig::default();
        config.segment.blur_kernel_size = 4;
        assert!(matches!(config.validate(), Err(ExtractError::Config(_))));
    }

    #[test]
    fn degenerate_region_is_rejected() {
        let mut config = PipelineConfig::default();
        config.regions.push(RegionSpec::new(0.5, 0.5, 0.0, 0.0));
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{ "segment": { "binary_threshold": 90 } }"#).unwrap();
        assert_eq!(config.segment.binary_threshold, 90);
        assert_eq!(config.segment.expected_glyph_count, 15);
        assert_eq!(config.regions, vec![RegionSpec::id_number_strip()]);
        assert_eq!(config.rectify, RectifyConfig::default());
    }
}
