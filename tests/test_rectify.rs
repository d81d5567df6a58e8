mod common;

use cardigits::detection::rectify;
use cardigits::{ExtractError, RectifyConfig};
use common::*;
use imageproc::point::Point;

fn near(p: Point<f32>, x: f32, y: f32, tol: f32) -> bool {
    (p.x - x).abs() <= tol && (p.y - y).abs() <= tol
}

#[test]
fn straight_card_is_cropped_to_its_outline() -> anyhow::Result<()> {
    let photo = upright_card((800, 500), 40, (100, 80, 600, 340), 220, &[]);
    let out = rectify(&photo, &RectifyConfig::default())?;

    let q = out.quad;
    assert!(near(q.top_left, 100.0, 80.0, 6.0), "top_left {:?}", q.top_left);
    assert!(near(q.top_right, 700.0, 80.0, 6.0), "top_right {:?}", q.top_right);
    assert!(near(q.bottom_right, 700.0, 420.0, 6.0), "bottom_right {:?}", q.bottom_right);
    assert!(near(q.bottom_left, 100.0, 420.0, 6.0), "bottom_left {:?}", q.bottom_left);

    let (w, h) = (out.image.width(), out.image.height());
    assert!((590..=612).contains(&w), "width {w}");
    assert!((330..=352).contains(&h), "height {h}");

    let rgb = out.image.to_rgb8();
    for (x, y) in [(w / 2, h / 2), (w / 4, h / 3), (3 * w / 4, 2 * h / 3)] {
        assert!(rgb.get_pixel(x, y).0[0] > 190, "card interior at ({x},{y})");
    }
    Ok(())
}

#[test]
fn skewed_card_is_flattened() -> anyhow::Result<()> {
    let corners = [(180, 120), (820, 160), (790, 500), (150, 450)];
    let photo = skewed_card((1000, 600), 250, corners, 20);
    let out = rectify(&photo, &RectifyConfig::default())?;

    let q = out.quad;
    for (found, (x, y)) in q.corners().iter().zip(corners) {
        assert!(near(*found, x as f32, y as f32, 12.0), "{found:?} vs ({x},{y})");
    }

    let rgb = out.image.to_rgb8();
    let (w, h) = rgb.dimensions();
    assert!(w > 600 && h > 300, "{w}x{h}");
    assert!(rgb.get_pixel(w / 2, h / 2).0[0] < 80);
    Ok(())
}

#[test]
fn corner_order_does_not_depend_on_photo_orientation() -> anyhow::Result<()> {
    // Same card mirrored left to right: the corner roles still follow the frame.
    let corners = [(150, 160), (790, 120), (820, 450), (180, 500)];
    let photo = skewed_card((1000, 600), 250, corners, 20);
    let q = rectify(&photo, &RectifyConfig::default())?.quad;
    assert!(q.top_left.x < q.top_right.x);
    assert!(q.bottom_left.x < q.bottom_right.x);
    assert!(q.top_left.y < q.bottom_left.y);
    assert!(q.top_right.y < q.bottom_right.y);
    Ok(())
}

#[test]
fn blank_photo_reports_missing_boundary() {
    let photo = upright_card((640, 480), 128, (0, 0, 0, 0), 128, &[]);
    match rectify(&photo, &RectifyConfig::default()) {
        Err(ExtractError::BoundaryNotFound { .. }) => {}
        other => panic!("expected BoundaryNotFound, got {other:?}"),
    }
}

#[test]
fn small_outline_is_not_taken_for_the_card() {
    let photo = upright_card((800, 500), 40, (350, 200, 80, 50), 220, &[]);
    assert!(matches!(
        rectify(&photo, &RectifyConfig::default()),
        Err(ExtractError::BoundaryNotFound { .. })
    ));
}

#[test]
fn rectify_is_deterministic() -> anyhow::Result<()> {
    let photo = upright_card((800, 500), 40, (100, 80, 600, 340), 220, &[(300, 300, 40, 20)]);
    let config = RectifyConfig::default();
    let a = rectify(&photo, &config)?;
    let b = rectify(&photo, &config)?;
    assert_eq!(a.quad, b.quad);
    assert_eq!(a.image.to_rgb8(), b.image.to_rgb8());
    Ok(())
}
