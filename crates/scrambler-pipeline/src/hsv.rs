//! Integer RGB to HSV conversion.
//!
//! All three output channels are quantized to `0..=255`. Hue uses the
//! 43/85/171 sextant layout: red at 0, green at 85, blue at 171.
//!
//! The arithmetic is signed with truncating division, and the hue is
//! narrowed to 8 bits by wrapping. A red-dominant pixel with `g < b`
//! therefore produces a hue just below 256 (e.g. `-43` wraps to `213`)
//! rather than a floored angle. Those wrapped values are part of the
//! output and are kept byte for byte.

use crate::types::{HsvImage, PipelineError, RgbaImage};

/// Convert one RGB triple to quantized `[h, s, v]`.
///
/// Black yields `[0, 0, 0]`; any achromatic gray yields `[0, 0, v]`.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub const fn rgb_to_hsv([r, g, b]: [u8; 3]) -> [u8; 3] {
    let max = max3(r, g, b);
    if max == 0 {
        return [0, 0, 0];
    }

    let min = min3(r, g, b);
    let delta = max as i32 - min as i32;
    // delta <= max, so the quotient is within 0..=255.
    let saturation = (255 * delta / max as i32) as u8;
    if saturation == 0 {
        return [0, 0, max];
    }

    let (r, g, b) = (r as i32, g as i32, b as i32);
    let hue = if max as i32 == r {
        43 * (g - b) / delta
    } else if max as i32 == g {
        85 + 43 * (b - r) / delta
    } else {
        171 + 43 * (r - g) / delta
    };

    // Wrapping narrow: negative red-sextant hues land near 255.
    [hue as u8, saturation, max]
}

/// Convert one RGBA pixel to `[h, s, v, a]`, passing alpha through.
#[must_use]
pub const fn rgba_to_hsva([r, g, b, a]: [u8; 4]) -> [u8; 4] {
    let [h, s, v] = rgb_to_hsv([r, g, b]);
    [h, s, v, a]
}

/// Build the HSV image parallel to `image`.
///
/// # Errors
///
/// Only fails if the source buffer and its declared dimensions disagree,
/// which `RgbaImage` already rules out; the error is surfaced rather than
/// unwrapped.
pub fn to_hsv(image: &RgbaImage) -> Result<HsvImage, PipelineError> {
    let data: Vec<u8> = image
        .pixels()
        .flat_map(|px| rgba_to_hsva(px.0))
        .collect();
    HsvImage::from_raw(image.width(), image.height(), data)
}

const fn max3(a: u8, b: u8, c: u8) -> u8 {
    let ab = if a > b { a } else { b };
    if ab > c { ab } else { c }
}

const fn min3(a: u8, b: u8, c: u8) -> u8 {
    let ab = if a < b { a } else { b };
    if ab < c { ab } else { c }
}
