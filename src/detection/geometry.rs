//! Corner ordering, polygon measures and the perspective warp.

use image::{DynamicImage, Rgb, RgbImage};
use imageproc::geometric_transformations::{Interpolation, Projection, warp_into};
use imageproc::point::Point;

use crate::error::{ExtractError, Result};
use crate::models::Quadrilateral;

/// Assign corner roles to four unordered points.
///
/// Smallest `x + y` is top-left and largest is bottom-right. Of the other two,
/// the one with the smaller `y - x` is top-right. Exact ties go to the point
/// seen first.
pub fn order_corners(points: [Point<f32>; 4]) -> Quadrilateral {
    let sum = |p: &Point<f32>| p.x + p.y;
    let diff = |p: &Point<f32>| p.y - p.x;

    let tl = first_extreme(&points, &[], |a, b| sum(a) < sum(b));
    let br = first_extreme(&points, &[tl], |a, b| sum(a) > sum(b));
    let tr = first_extreme(&points, &[tl, br], |a, b| diff(a) < diff(b));
    let bl = (0..4)
        .find(|i| ![tl, br, tr].contains(i))
        .unwrap_or(3);

    Quadrilateral {
        top_left: points[tl],
        top_right: points[tr],
        bottom_right: points[br],
        bottom_left: points[bl],
    }
}

/// Index of the first point, skipping `taken`, that no later point beats.
fn first_extreme<F>(points: &[Point<f32>; 4], taken: &[usize], better: F) -> usize
where
    F: Fn(&Point<f32>, &Point<f32>) -> bool,
{
    let mut best: Option<usize> = None;
    for (i, p) in points.iter().enumerate() {
        if taken.contains(&i) {
            continue;
        }
        match best {
            Some(b) if !better(p, &points[b]) => {}
            _ => best = Some(i),
        }
    }
    best.unwrap_or(0)
}

pub fn distance(a: Point<f32>, b: Point<f32>) -> f32 {
    ((a.x - b.x).powi(2) + (a.y - b.y).powi(2)).sqrt()
}

/// Output size of the rectified card: the longer of each pair of opposite edges.
pub fn compute_target_rectangle(quad: &Quadrilateral) -> (u32, u32) {
    let width = distance(quad.top_left, quad.top_right)
        .max(distance(quad.bottom_left, quad.bottom_right));
    let height = distance(quad.top_left, quad.bottom_left)
        .max(distance(quad.top_right, quad.bottom_right));
    (
        (width.round() as u32).max(1),
        (height.round() as u32).max(1),
    )
}

/// Warp the quadrilateral onto a `target_width` x `target_height` rectangle.
///
/// Corners are clamped to the source bounds first so no sample is taken from
/// outside the image.
pub fn perspective_transform(
    image: &DynamicImage,
    quad: &Quadrilateral,
    target_width: u32,
    target_height: u32,
) -> Result<RgbImage> {
    if image.width() == 0 || image.height() == 0 {
        return Err(ExtractError::EmptyImage);
    }
    let quad = quad.clamped(image.width(), image.height());
    let (w, h) = (target_width as f32, target_height as f32);

    let src = quad.corners().map(|p| (p.x, p.y));
    let dest = [(0.0, 0.0), (w, 0.0), (w, h), (0.0, h)];
    let projection =
        Projection::from_control_points(src, dest).ok_or(ExtractError::DegenerateQuadrilateral)?;

    let rgb = image.to_rgb8();
    let mut output = RgbImage::new(target_width, target_height);
    warp_into(
        &rgb,
        &projection,
        Interpolation::Bilinear,
        Rgb([255u8, 255, 255]),
        &mut output,
    );
    Ok(output)
}

/// Polygon area by the shoelace formula; vertex order may be either direction.
pub fn polygon_area<T>(points: &[Point<T>]) -> f64
where
    T: Copy + Into<f64>,
{
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    let mut twice = 0.0f64;
    for i in 0..n {
        let j = (i + 1) % n;
        let (xi, yi): (f64, f64) = (points[i].x.into(), points[i].y.into());
        let (xj, yj): (f64, f64) = (points[j].x.into(), points[j].y.into());
        twice += xi * yj - xj * yi;
    }
    twice.abs() / 2.0
}

/// Interior angles in degrees, one per vertex of an ordered quadrilateral.
pub fn interior_angles(quad: &Quadrilateral) -> [f64; 4] {
    let c = quad.corners();
    let mut angles = [0.0f64; 4];
    for i in 0..4 {
        let prev = c[(i + 3) % 4];
        let cur = c[i];
        let next = c[(i + 1) % 4];
        let (ax, ay) = ((prev.x - cur.x) as f64, (prev.y - cur.y) as f64);
        let (bx, by) = ((next.x - cur.x) as f64, (next.y - cur.y) as f64);
        let norm = (ax.hypot(ay) * bx.hypot(by)).max(f64::EPSILON);
        let cos = ((ax * bx + ay * by) / norm).clamp(-1.0, 1.0);
        angles[i] = cos.acos().to_degrees();
    }
    angles
}

/// Spread between the largest and smallest interior angle.
pub fn angle_range(quad: &Quadrilateral) -> f64 {
    let angles = interior_angles(quad);
    let max = angles.iter().cloned().fold(f64::MIN, f64::max);
    let min = angles.iter().cloned().fold(f64::MAX, f64::min);
    max - min
}
