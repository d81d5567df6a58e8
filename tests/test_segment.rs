mod common;

use cardigits::TileSource;
use cardigits::detection::segment_glyphs;
use common::*;

const THREE_GLYPHS: &[(u32, u32, u32, u32)] = &[(30, 20, 20, 60), (120, 25, 30, 50), (220, 15, 25, 70)];

#[test]
fn glyphs_come_out_left_to_right_as_squares() {
    let region = region_with_blocks(300, 100, THREE_GLYPHS);
    let seg = segment_glyphs(&region, &SegmentConfig::default());

    assert_eq!(seg.tiles.len(), 3);
    for (rank, (tile, &(x, _, w, _))) in seg.tiles.iter().zip(THREE_GLYPHS).enumerate() {
        assert_eq!(tile.rank(), rank);
        let sq = tile.square();
        assert!(sq.fits_within(300, 100), "{sq:?}");
        assert!(sq.is_square(), "{sq:?}");
        assert_eq!(tile.image().width(), tile.image().height());
        assert_eq!((tile.image().width(), tile.image().height()), (sq.width, sq.height));

        let b = tile.bbox();
        assert!(b.x.abs_diff(x) <= 2 && b.width.abs_diff(w) <= 4, "{b:?}");
    }
}

#[test]
fn expected_count_keeps_the_leftmost_glyphs() {
    let region = region_with_blocks(300, 100, THREE_GLYPHS);
    let config = SegmentConfig {
        expected_glyph_count: 2,
        ..SegmentConfig::default()
    };
    let seg = segment_glyphs(&region, &config);
    assert_eq!(seg.tiles.len(), 2);
    assert!(seg.tiles[0].bbox().x < 60);
    assert!(seg.tiles[1].bbox().x > 100 && seg.tiles[1].bbox().x < 160);
}

#[test]
fn specks_and_bars_are_filtered_out() {
    // A 2x2 speck is below the area floor; a 280x4 rule is far too wide.
    let region = region_with_blocks(300, 100, &[(10, 10, 2, 2), (10, 90, 280, 4), (140, 20, 20, 50)]);
    let seg = segment_glyphs(&region, &SegmentConfig::default());
    assert_eq!(seg.tiles.len(), 1);
    assert!(seg.candidates >= 2);
    assert!(seg.tiles[0].bbox().x.abs_diff(140) <= 2);
}

#[test]
fn empty_region_is_not_an_error() {
    let seg = segment_glyphs(&region_with_blocks(300, 100, &[]), &SegmentConfig::default());
    assert!(seg.is_empty());
    assert_eq!(seg.mask.dimensions(), (300, 100));
}

#[test]
fn glyph_touching_the_edge_gets_a_clipped_square() {
    let region = region_with_blocks(300, 100, &[(0, 10, 20, 80)]);
    let seg = segment_glyphs(&region, &SegmentConfig::default());
    assert_eq!(seg.tiles.len(), 1);
    let sq = seg.tiles[0].square();
    assert_eq!(sq.x, 0);
    assert!(sq.is_square(), "{sq:?}");
    assert!(sq.fits_within(300, 100));
    assert!(seg.tiles[0].bbox().x == 0);
}

#[test]
fn glyphs_on_every_edge_are_kept() {
    // Left, top, bottom and right edges each carry one glyph.
    let blocks = [(0, 30, 16, 40), (80, 0, 16, 40), (160, 60, 16, 40), (284, 30, 16, 40)];
    let region = region_with_blocks(300, 100, &blocks);
    let seg = segment_glyphs(&region, &SegmentConfig::default());

    assert_eq!(seg.tiles.len(), 4);
    for (tile, &(x, ..)) in seg.tiles.iter().zip(&blocks) {
        assert!(tile.bbox().x.abs_diff(x) <= 2, "{:?}", tile.bbox());
        assert!(tile.square().is_square());
        assert!(tile.square().fits_within(300, 100));
    }
}

#[test]
fn tile_source_controls_what_is_cut() {
    let region = region_with_blocks(300, 100, THREE_GLYPHS);
    let from_mask = segment_glyphs(&region, &SegmentConfig::default());
    let from_photo = segment_glyphs(
        &region,
        &SegmentConfig {
            tile_source: TileSource::Original,
            ..SegmentConfig::default()
        },
    );

    assert_eq!(from_mask.tiles.len(), from_photo.tiles.len());
    for (m, p) in from_mask.tiles.iter().zip(&from_photo.tiles) {
        assert_eq!(m.square(), p.square());
        assert!(m.image().as_luma8().is_some());
        assert!(p.image().as_rgb8().is_some());
        assert_eq!(m.polarity(), Polarity::LightOnDark);
        assert_eq!(p.polarity(), Polarity::DarkOnLight);
    }
}
