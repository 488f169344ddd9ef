//! scrambler-pipeline: Pure hue-displacement pipeline (sans-IO).
//!
//! Scrambles a raster image by moving every pixel along its hue angle:
//! decode -> RGB to HSV -> displacement planning -> scatter composition.
//!
//! This crate has **no filesystem dependencies** -- it operates on
//! in-memory byte slices and images and returns structured data. Reading
//! and writing files lives in the `scrambler` binary.

pub mod codec;
pub mod composite;
pub mod diagnostics;
pub mod displace;
pub mod hsv;
pub mod pipeline;
pub mod types;

pub use composite::{CollisionPolicy, CompositeStats, Compositor};
pub use displace::{DisplacementParams, OffsetRounding};
pub use pipeline::Pipeline;
pub use types::{
    Dimensions, HsvImage, PipelineError, RgbaImage, ScrambleConfig, ScrambleResult, StagedResult,
};

/// Run the full scramble pipeline on encoded image bytes.
///
/// Takes raw image bytes (PNG, JPEG, BMP, WebP) and a configuration,
/// then produces a [`ScrambleResult`] holding the enlarged canvas, the
/// resolved displacement parameters, and scatter statistics. Encoding the
/// canvas is left to the caller (see [`codec::encode_png`]).
///
/// # Pipeline steps
///
/// 1. Validate the config and decode the image to RGBA
/// 2. Convert every pixel to quantized HSV
/// 3. Resolve displacement parameters for the image size
/// 4. Scatter source pixels onto a white canvas grown by `band` per side
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] if the config is invalid or
/// the canvas would be too large.
/// Returns [`PipelineError::EmptyInput`] if `image_bytes` is empty.
/// Returns [`PipelineError::ImageDecode`] if the image format is unrecognized.
pub fn process(
    image_bytes: impl Into<Vec<u8>>,
    config: &ScrambleConfig,
) -> Result<ScrambleResult, PipelineError> {
    process_staged(image_bytes, config).map(ScrambleResult::from)
}

/// Run the full pipeline, keeping every intermediate and the diagnostics.
///
/// # Errors
///
/// Same as [`process`].
pub fn process_staged(
    image_bytes: impl Into<Vec<u8>>,
    config: &ScrambleConfig,
) -> Result<StagedResult, PipelineError> {
    Ok(Pipeline::new(image_bytes.into(), *config)
        .decode()?
        .convert()?
        .composite()?
        .into_result())
}

/// Scramble an already-decoded image.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] if the config is invalid or
/// the canvas would be too large.
pub fn scramble(
    image: RgbaImage,
    config: &ScrambleConfig,
) -> Result<ScrambleResult, PipelineError> {
    Ok(Pipeline::from_image(image, *config)?
        .convert()?
        .composite()?
        .into_result()
        .into())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn png_of(img: &RgbaImage) -> Vec<u8> {
        codec::encode_png(img).unwrap()
    }

    #[test]
    fn process_empty_input() {
        let result = process(Vec::<u8>::new(), &ScrambleConfig::default());
        assert!(matches!(result, Err(PipelineError::EmptyInput)));
    }

    #[test]
    fn process_corrupt_input() {
        let result = process(&[0xFF, 0x00][..], &ScrambleConfig::default());
        assert!(matches!(result, Err(PipelineError::ImageDecode(_))));
    }

    #[test]
    fn process_reports_source_dimensions() {
        let img = RgbaImage::from_pixel(40, 20, image::Rgba([0, 255, 0, 255]));
        let result = process(png_of(&img), &ScrambleConfig::default()).unwrap();
        assert_eq!(
            result.dimensions,
            Dimensions {
                width: 40,
                height: 20
            }
        );
        // 0.05 * 40 = 2.0 -> band 4.
        assert_eq!(result.params.band(), 4);
        assert_eq!(result.canvas.dimensions(), (48, 28));
    }

    #[test]
    fn process_and_scramble_agree() {
        let img = RgbaImage::from_fn(9, 7, |x, y| {
            image::Rgba([(x * 28) as u8, (y * 36) as u8, 128, 255])
        });
        let config = ScrambleConfig {
            displace_magnitude: Some(2.5),
            ..ScrambleConfig::default()
        };
        let from_bytes = process(png_of(&img), &config).unwrap();
        let from_image = scramble(img, &config).unwrap();
        assert_eq!(from_bytes.canvas.as_raw(), from_image.canvas.as_raw());
        assert_eq!(from_bytes.stats, from_image.stats);
    }

    #[test]
    fn scramble_rejects_invalid_config() {
        let config = ScrambleConfig {
            hue_bins: 0,
            ..ScrambleConfig::default()
        };
        let result = scramble(RgbaImage::new(3, 3), &config);
        assert!(matches!(result, Err(PipelineError::InvalidConfig(_))));
    }
}
