use rayon::prelude::*;
use tracing::{debug, info, instrument, warn};

use crate::config::ClassifyConfig;
use crate::detection::ocr::CharacterRecognizer;
use crate::models::{DigitResult, GlyphTile};

/// Ink area below which a tile counts as a zero.
pub fn area_threshold(max_area: u32, zero_area_ratio: f64) -> f64 {
    zero_area_ratio * max_area as f64
}

/// Whether a tile with `area` ink pixels is decided by the heuristic alone.
pub fn is_heuristic_zero(area: u32, threshold: f64) -> bool {
    (area as f64) < threshold
}

/// Decide every tile, returning results in the same order as `tiles`.
///
/// Sparse tiles become [`DigitResult::ZeroByHeuristic`] without consulting the
/// recognizer. A failed or non-digit recognition becomes
/// [`DigitResult::Unresolved`] and never stops the rest of the batch.
#[instrument(skip_all, fields(tiles = tiles.len()))]
pub fn classify_tiles<R>(tiles: &[GlyphTile], recognizer: &R, config: &ClassifyConfig) -> Vec<DigitResult>
where
    R: CharacterRecognizer + ?Sized,
{
    let areas: Vec<u32> = tiles.iter().map(GlyphTile::ink_area).collect();
    let max_area = areas.iter().copied().max().unwrap_or(0);
    let threshold = area_threshold(max_area, config.zero_area_ratio);
    debug!(max_area, threshold, "Ink areas measured");

    let results: Vec<DigitResult> = if config.parallel && tiles.len() > 1 {
        tiles
            .par_iter()
            .zip(areas.par_iter())
            .map(|(tile, &area)| decide(tile, area, threshold, recognizer))
            .collect()
    } else {
        tiles
            .iter()
            .zip(&areas)
            .map(|(tile, &area)| decide(tile, area, threshold, recognizer))
            .collect()
    };

    let zeros = results.iter().filter(|r| **r == DigitResult::ZeroByHeuristic).count();
    let unresolved = results.iter().filter(|r| !r.is_resolved()).count();
    info!(zeros, unresolved, "Classified glyphs");
    results
}

fn decide<R>(tile: &GlyphTile, area: u32, threshold: f64, recognizer: &R) -> DigitResult
where
    R: CharacterRecognizer + ?Sized,
{
    if is_heuristic_zero(area, threshold) {
        debug!(rank = tile.rank(), area, "Sparse glyph taken as zero");
        return DigitResult::ZeroByHeuristic;
    }
    match recognizer.recognize_single_character(tile) {
        Ok(c) if c.is_ascii_digit() => DigitResult::Recognized(c),
        Ok(c) => {
            warn!(rank = tile.rank(), found = %c, "Recognizer returned a non-digit");
            DigitResult::Unresolved
        }
        Err(err) => {
            debug!(rank = tile.rank(), error = %err, "Glyph left unresolved");
            DigitResult::Unresolved
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_scales_with_max_area() {
        assert!((area_threshold(100, 0.3) - 30.0).abs() < 1e-9);
        assert_eq!(area_threshold(0, 0.3), 0.0);
        for k in [2u32, 3, 7, 40] {
            let t1 = area_threshold(100, 0.3);
            let tk = area_threshold(100 * k, 0.3);
            assert!((tk - t1 * k as f64).abs() < 1e-9);
            for area in [0u32, 10, 29, 30, 31, 100] {
                assert_eq!(is_heuristic_zero(area, t1), is_heuristic_zero(area * k, tk));
            }
        }
    }

    #[test]
    fn boundary_area_is_delegated() {
        let t = area_threshold(100, 0.3);
        assert!(is_heuristic_zero(29, t));
        assert!(!is_heuristic_zero(30, t));
    }
}
