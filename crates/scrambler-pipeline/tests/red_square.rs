//! Integration test: scramble small synthetic images end to end through
//! PNG bytes and check the canvas pixel by pixel.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use scrambler_pipeline::codec;
use scrambler_pipeline::composite::BACKGROUND;
use scrambler_pipeline::{
    CollisionPolicy, OffsetRounding, RgbaImage, ScrambleConfig, displace, hsv,
};

fn png(img: &RgbaImage) -> Vec<u8> {
    codec::encode_png(img).expect("encode fixture")
}

#[test]
fn red_square_shifts_right_by_one() {
    let source = RgbaImage::from_pixel(4, 4, image::Rgba([255, 0, 0, 255]));
    let config = ScrambleConfig {
        hue_bins: 8,
        displace_magnitude: Some(1.0),
        ..ScrambleConfig::default()
    };

    let result = scrambler_pipeline::process(png(&source), &config).unwrap();
    assert_eq!(result.params.band(), 3);
    assert_eq!(result.canvas.dimensions(), (10, 10));

    let mut red = 0;
    for (x, y, px) in result.canvas.enumerate_pixels() {
        if (4..8).contains(&x) && (3..7).contains(&y) {
            assert_eq!(px.0, [255, 0, 0, 255], "destination ({x}, {y})");
            red += 1;
        } else {
            assert_eq!(px.0, BACKGROUND, "background ({x}, {y})");
        }
    }
    assert_eq!(red, 16);

    // The canvas survives the PNG round trip unchanged.
    let reread = codec::decode(&codec::encode_png(&result.canvas).unwrap()).unwrap();
    assert_eq!(reread.as_raw(), result.canvas.as_raw());
}

/// A 16x12 gradient that walks the whole hue wheel with varying alpha.
fn rainbow() -> RgbaImage {
    RgbaImage::from_fn(16, 12, |x, y| {
        let r = (x * 16) as u8;
        let g = (y * 21) as u8;
        let b = 255 - ((x + y) * 9) as u8;
        image::Rgba([r, g, b, (40 + x * 10) as u8])
    })
}

#[test]
fn identical_runs_are_byte_identical() {
    let bytes = png(&rainbow());
    for collision in [
        CollisionPolicy::LastWriteWins,
        CollisionPolicy::FirstWriteWins,
        CollisionPolicy::Average,
    ] {
        let config = ScrambleConfig {
            displace_magnitude: Some(3.7),
            collision,
            ..ScrambleConfig::default()
        };
        let a = scrambler_pipeline::process(bytes.clone(), &config).unwrap();
        let b = scrambler_pipeline::process(bytes.clone(), &config).unwrap();
        assert_eq!(a.canvas.as_raw(), b.canvas.as_raw(), "{collision}");
        assert_eq!(
            codec::encode_png(&a.canvas).unwrap(),
            codec::encode_png(&b.canvas).unwrap(),
        );
    }
}

#[test]
fn uncollided_pixels_keep_their_alpha_at_destination() {
    let source = rainbow();
    for rounding in [
        OffsetRounding::Floor,
        OffsetRounding::TowardZero,
        OffsetRounding::Nearest,
    ] {
        let config = ScrambleConfig {
            hue_bins: 6,
            displace_magnitude: Some(2.0),
            rounding,
            ..ScrambleConfig::default()
        };
        let staged = scrambler_pipeline::process_staged(png(&source), &config).unwrap();

        // Destinations written exactly once, computed independently.
        let mut hits = std::collections::HashMap::new();
        for (x, y, px) in source.enumerate_pixels() {
            let hue = hsv::rgba_to_hsva(px.0)[0];
            let dest = displace::destination(x, y, hue, &staged.params);
            hits.entry(dest).or_insert_with(Vec::new).push(px.0);
        }
        for ((dx, dy), writers) in &hits {
            let at = staged
                .canvas
                .get_pixel(u32::try_from(*dx).unwrap(), u32::try_from(*dy).unwrap());
            // Last writer wins; with one writer this is the source pixel itself.
            assert_eq!(at.0, *writers.last().unwrap(), "{rounding} ({dx}, {dy})");
        }
        let expected_uncovered = staged.canvas.pixels().count() - hits.len();
        assert_eq!(staged.stats.uncovered as usize, expected_uncovered);
    }
}

#[test]
fn derived_magnitude_scales_with_longer_side() {
    let source = RgbaImage::from_pixel(100, 60, image::Rgba([0, 0, 255, 255]));
    let result = scrambler_pipeline::process(png(&source), &ScrambleConfig::default()).unwrap();
    // 0.05 * 100 = 5.0 -> band 7.
    assert_eq!(result.params.band(), 7);
    assert_eq!(result.canvas.dimensions(), (114, 74));
    assert_eq!(result.stats.writes, 6000);
    assert_eq!(result.stats.collisions, 0);
}
