use image::imageops::FilterType;
use image::{DynamicImage, GrayImage};
use imageproc::geometry::{approximate_polygon_dp, arc_length};
use imageproc::point::Point;
use tracing::{debug, info, instrument, warn};

use crate::config::RectifyConfig;
use crate::detection::{contours, geometry, preprocessing};
use crate::error::{ExtractError, Result};
use crate::models::Quadrilateral;

/// A card flattened onto an axis-aligned rectangle.
#[derive(Debug, Clone)]
pub struct Rectified {
    pub image: DynamicImage,
    /// Card corners in full-resolution source coordinates.
    pub quad: Quadrilateral,
}

/// Find the card in `image`, warp it flat and sharpen it.
///
/// The input is never modified.
#[instrument(skip_all, fields(width = image.width(), height = image.height()))]
pub fn rectify(image: &DynamicImage, config: &RectifyConfig) -> Result<Rectified> {
    let (width, height) = (image.width(), image.height());
    if width == 0 || height == 0 {
        return Err(ExtractError::EmptyImage);
    }

    let ratio = height as f32 / config.working_height as f32;
    let working_width = ((width as f32 / ratio).round() as u32).max(1);
    let working = image::imageops::resize(
        &preprocessing::to_grayscale(image),
        working_width,
        config.working_height,
        FilterType::Triangle,
    );
    debug!(working_width, working_height = config.working_height, ratio, "Downscaled for boundary search");

    let quad = detect_boundary(&working, config)?.scaled(ratio);
    let (target_width, target_height) = geometry::compute_target_rectangle(&quad);
    debug!(
        top_left = ?quad.top_left,
        top_right = ?quad.top_right,
        bottom_right = ?quad.bottom_right,
        bottom_left = ?quad.bottom_left,
        target_width,
        target_height,
        "Card corners mapped to full resolution"
    );

    let warped = geometry::perspective_transform(image, &quad, target_width, target_height)?;
    let sharpened =
        preprocessing::unsharp_mask(&warped, config.sharpen_sigma, config.sharpen_amount);

    info!(target_width, target_height, "Card rectified");
    Ok(Rectified {
        image: DynamicImage::ImageRgb8(sharpened),
        quad,
    })
}

/// Locate the largest plausible four-cornered outline in a grayscale image.
///
/// Contours are tried largest first. Each is simplified with a tolerance that
/// grows from `epsilon_start` by `epsilon_step` (as fractions of its perimeter)
/// until it has exactly four vertices, drops below four, or `max_attempts` runs out.
#[instrument(skip_all, fields(width = gray.width(), height = gray.height()))]
pub fn detect_boundary(gray: &GrayImage, config: &RectifyConfig) -> Result<Quadrilateral> {
    let blurred = preprocessing::apply_blur(gray, config.blur_kernel_size);
    let cleaned = preprocessing::suppress_detail(&blurred, config.median_radius);
    let edges = preprocessing::detect_edges(&cleaned, config.canny_low, config.canny_high);

    let image_area = gray.width() as f64 * gray.height() as f64;
    let min_area = image_area * config.min_quad_area_ratio;

    let mut candidates: Vec<(f64, Vec<Point<i32>>)> = contours::trace_outer_borders(&edges)
        .into_iter()
        .map(|c| {
            let mut points = c.points;
            if points.len() > 1 && points.first() == points.last() {
                points.pop();
            }
            points
        })
        .filter(|points| points.len() >= 4)
        .map(|points| (geometry::polygon_area(&points), points))
        .filter(|(area, _)| *area >= min_area)
        .collect();
    candidates.sort_by(|a, b| b.0.total_cmp(&a.0));
    debug!(candidates = candidates.len(), min_area, "Outline candidates");

    let mut attempts = 0;
    for (area, points) in &candidates {
        let perimeter = arc_length(points, true);
        for step in 0..config.max_attempts {
            attempts += 1;
            let epsilon = perimeter * (config.epsilon_start + config.epsilon_step * step as f64);
            let approx = approximate_polygon_dp(points, epsilon, true);
            if approx.len() < 4 {
                break;
            }
            if approx.len() > 4 {
                continue;
            }

            let corners = [approx[0], approx[1], approx[2], approx[3]]
                .map(|p| Point::new(p.x as f32, p.y as f32));
            let quad = snap_to_contour(&geometry::order_corners(corners), points);
            if is_plausible(&quad, image_area, config) {
                debug!(contour_area = area, epsilon, attempts, "Accepted card outline");
                return Ok(quad);
            }
            debug!(contour_area = area, epsilon, "Four-cornered outline rejected");
            break;
        }
    }

    warn!(attempts, "No card outline found");
    Err(ExtractError::BoundaryNotFound { attempts })
}

/// Move each approximate corner to the contour point lying farthest out in
/// that corner's direction from the centre.
///
/// The simplified polygon may keep a vertex somewhere along an edge near a
/// rounded corner; the extreme contour point is the corner itself.
pub fn snap_to_contour(quad: &Quadrilateral, points: &[Point<i32>]) -> Quadrilateral {
    let corners = quad.corners();
    let cx = corners.iter().map(|p| p.x).sum::<f32>() / 4.0;
    let cy = corners.iter().map(|p| p.y).sum::<f32>() / 4.0;

    let snapped = corners.map(|corner| {
        let (dx, dy) = (corner.x - cx, corner.y - cy);
        let reach = |p: &Point<i32>| (p.x as f32 - cx) * dx + (p.y as f32 - cy) * dy;
        points
            .iter()
            .fold(None::<&Point<i32>>, |best, p| match best {
                Some(b) if reach(p) <= reach(b) => Some(b),
                _ => Some(p),
            })
            .map_or(corner, |p| Point::new(p.x as f32, p.y as f32))
    });
    geometry::order_corners(snapped)
}

/// Large enough and close enough to a rectangle to be the card.
pub fn is_plausible(quad: &Quadrilateral, image_area: f64, config: &RectifyConfig) -> bool {
    let area = geometry::polygon_area(&quad.corners());
    area >= image_area * config.min_quad_area_ratio
        && geometry::angle_range(quad) <= config.max_quad_angle_range
}
