//! Incremental pipeline: advance stage-by-stage, inspecting each
//! intermediate result before continuing.
//!
//! Unlike [`crate::process_staged`] which runs the entire pipeline in one
//! call, [`Pipeline`] lets the caller drive execution one step at a time:
//!
//! ```rust
//! # use scrambler_pipeline::{Pipeline, ScrambleConfig, PipelineError};
//! # fn run(png: Vec<u8>) -> Result<(), PipelineError> {
//! let staged = Pipeline::new(png, ScrambleConfig::default())
//!     .decode()?
//!     .convert()?
//!     .composite()?
//!     .into_result();
//! # Ok(())
//! # }
//! ```
//!
//! Each stage method consumes `self` and returns the next pipeline state,
//! carrying all previously computed intermediates and the diagnostics
//! gathered so far. Decoding is the only stage that touches encoded
//! bytes; a failure there aborts the run before any pixel work.

use crate::codec;
use crate::composite::{CompositeStats, Compositor};
use crate::diagnostics::{
    self, Clock, PipelineDiagnostics, PipelineSummary, StageDiagnostics, StageMetrics,
};
use crate::displace::DisplacementParams;
use crate::hsv;
use crate::types::{Dimensions, HsvImage, PipelineError, RgbaImage, ScrambleConfig, StagedResult};

// ───────────────────────── Stage 0: Pending ──────────────────────────

/// Pipeline state before any processing has occurred.
///
/// Call [`decode`](Self::decode) to advance to the next stage.
#[must_use = "pipeline stages are consumed by advancing; call .decode() to continue"]
pub struct Pending {
    config: ScrambleConfig,
    source: Vec<u8>,
}

impl Pending {
    /// The raw source image bytes.
    #[must_use]
    pub fn source(&self) -> &[u8] {
        &self.source
    }

    /// Decode the source image and advance to the [`Decoded`] stage.
    ///
    /// The config is validated first so a bad config never pays for a
    /// decode.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if the config is invalid,
    /// [`PipelineError::EmptyInput`] if the source bytes are empty, and
    /// [`PipelineError::ImageDecode`] if the image format is
    /// unrecognized or the data is corrupt.
    pub fn decode(self) -> Result<Decoded, PipelineError> {
        self.config.validate()?;
        let started = Clock::start();
        let original = codec::decode(&self.source)?;
        let dimensions = Dimensions::of(&original);
        tracing::debug!(
            bytes = self.source.len(),
            width = dimensions.width,
            height = dimensions.height,
            "decoded source image"
        );
        Ok(Decoded {
            decode: StageDiagnostics {
                duration: started.elapsed(),
                metrics: StageMetrics::Decode {
                    input_bytes: self.source.len(),
                    width: dimensions.width,
                    height: dimensions.height,
                    pixel_count: dimensions.pixel_count(),
                },
            },
            config: self.config,
            original,
            dimensions,
            started,
        })
    }
}

// ───────────────────────── Stage 1: Decoded ──────────────────────────

/// Pipeline state after decoding the source image.
///
/// Call [`convert`](Self::convert) to advance to the next stage.
#[must_use = "pipeline stages are consumed by advancing; call .convert() to continue"]
pub struct Decoded {
    config: ScrambleConfig,
    original: RgbaImage,
    dimensions: Dimensions,
    started: Clock,
    decode: StageDiagnostics,
}

impl Decoded {
    /// The decoded RGBA image.
    #[must_use]
    pub const fn original(&self) -> &RgbaImage {
        &self.original
    }

    /// Source image dimensions.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// Convert every pixel to HSV and advance to the [`Converted`] stage.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::DimensionMismatch`] if the decoded buffer
    /// disagrees with its dimensions.
    pub fn convert(self) -> Result<Converted, PipelineError> {
        let clock = Clock::start();
        let hsv = hsv::to_hsv(&self.original)?;
        let achromatic_pixels = diagnostics::count_achromatic(&hsv);
        let hue_histogram = diagnostics::hue_histogram(&hsv, self.config.hue_bins);
        tracing::debug!(
            achromatic = achromatic_pixels,
            sectors = hue_histogram.len(),
            "converted to hsv"
        );
        Ok(Converted {
            convert: StageDiagnostics {
                duration: clock.elapsed(),
                metrics: StageMetrics::Convert {
                    achromatic_pixels,
                    hue_histogram,
                },
            },
            config: self.config,
            original: self.original,
            dimensions: self.dimensions,
            started: self.started,
            decode: self.decode,
            hsv,
        })
    }
}

// ───────────────────────── Stage 2: Converted ────────────────────────

/// Pipeline state after HSV conversion.
///
/// Call [`composite`](Self::composite) to advance to the final stage.
#[must_use = "pipeline stages are consumed by advancing; call .composite() to continue"]
pub struct Converted {
    config: ScrambleConfig,
    original: RgbaImage,
    dimensions: Dimensions,
    started: Clock,
    decode: StageDiagnostics,
    convert: StageDiagnostics,
    hsv: HsvImage,
}

impl Converted {
    /// The per-pixel HSV image.
    #[must_use]
    pub const fn hsv(&self) -> &HsvImage {
        &self.hsv
    }

    /// Resolve displacement parameters, scatter every pixel onto the
    /// canvas, and advance to the [`Composited`] stage.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if the resolved canvas is
    /// too large, or any error from the configured [`Compositor`].
    pub fn composite(self) -> Result<Composited, PipelineError> {
        let clock = Clock::start();
        let params = DisplacementParams::resolve(&self.config, self.dimensions)?;
        let out = self
            .config
            .collision
            .composite(&self.original, &self.hsv, &params)?;
        let canvas_dims = Dimensions::of(&out.canvas);
        tracing::debug!(
            magnitude = params.magnitude,
            band = params.band(),
            canvas_width = canvas_dims.width,
            canvas_height = canvas_dims.height,
            collisions = out.stats.collisions,
            "scattered pixels onto canvas"
        );
        let composite = StageDiagnostics {
            duration: clock.elapsed(),
            metrics: StageMetrics::Composite {
                hue_bins: params.hue_bins,
                magnitude: params.magnitude,
                band: params.band(),
                rounding: params.rounding.to_string(),
                collision: self.config.collision.to_string(),
                canvas_width: canvas_dims.width,
                canvas_height: canvas_dims.height,
                covered: out.stats.covered,
                collisions: out.stats.collisions,
                uncovered: out.stats.uncovered,
            },
        };
        let diagnostics = PipelineDiagnostics {
            decode: self.decode,
            convert: self.convert,
            composite,
            total_duration: self.started.elapsed(),
            summary: PipelineSummary {
                image_width: self.dimensions.width,
                image_height: self.dimensions.height,
                pixel_count: self.dimensions.pixel_count(),
                canvas_width: canvas_dims.width,
                canvas_height: canvas_dims.height,
                collisions: out.stats.collisions,
            },
        };
        Ok(Composited {
            original: self.original,
            hsv: self.hsv,
            canvas: out.canvas,
            params,
            stats: out.stats,
            dimensions: self.dimensions,
            diagnostics,
        })
    }
}

// ───────────────────────── Stage 3: Composited ───────────────────────

/// Pipeline state after scatter composition: the final stage.
///
/// Call [`into_result`](Self::into_result) to extract the
/// [`StagedResult`] containing all intermediates.
#[must_use = "call .into_result() to extract the StagedResult"]
pub struct Composited {
    original: RgbaImage,
    hsv: HsvImage,
    canvas: RgbaImage,
    params: DisplacementParams,
    stats: CompositeStats,
    dimensions: Dimensions,
    diagnostics: PipelineDiagnostics,
}

impl Composited {
    /// The scattered output canvas.
    #[must_use]
    pub const fn canvas(&self) -> &RgbaImage {
        &self.canvas
    }

    /// The displacement parameters resolved for this image.
    #[must_use]
    pub const fn params(&self) -> &DisplacementParams {
        &self.params
    }

    /// Write and coverage counts from the scatter pass.
    #[must_use]
    pub const fn stats(&self) -> CompositeStats {
        self.stats
    }

    /// Diagnostics for the whole run.
    #[must_use]
    pub const fn diagnostics(&self) -> &PipelineDiagnostics {
        &self.diagnostics
    }

    /// Consume the pipeline and return the full [`StagedResult`].
    #[must_use]
    pub fn into_result(self) -> StagedResult {
        StagedResult {
            original: self.original,
            hsv: self.hsv,
            canvas: self.canvas,
            params: self.params,
            stats: self.stats,
            dimensions: self.dimensions,
            diagnostics: self.diagnostics,
        }
    }
}

// ───────────────────── Pipeline entry point ──────────────────────────

/// Incremental scramble pipeline.
///
/// Created via [`Pipeline::new`] from encoded bytes, or
/// [`Pipeline::from_image`] from an already-decoded image. Each stage
/// method consumes the current state and returns the next, making it a
/// compile-time error to skip stages or call them out of order.
pub struct Pipeline;

impl Pipeline {
    /// Create a new pipeline from source image bytes and config.
    ///
    /// No processing is performed; the bytes and config are simply
    /// stored. Call [`.decode()`](Pending::decode) to begin.
    #[allow(clippy::new_ret_no_self)]
    pub const fn new(image_bytes: Vec<u8>, config: ScrambleConfig) -> Pending {
        Pending {
            config,
            source: image_bytes,
        }
    }

    /// Start from an image that is already decoded, skipping the codec.
    ///
    /// The decode stage is recorded with zero input bytes and zero
    /// duration.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if the config is invalid.
    pub fn from_image(
        original: RgbaImage,
        config: ScrambleConfig,
    ) -> Result<Decoded, PipelineError> {
        config.validate()?;
        let dimensions = Dimensions::of(&original);
        Ok(Decoded {
            decode: StageDiagnostics {
                duration: std::time::Duration::ZERO,
                metrics: StageMetrics::Decode {
                    input_bytes: 0,
                    width: dimensions.width,
                    height: dimensions.height,
                    pixel_count: dimensions.pixel_count(),
                },
            },
            config,
            original,
            dimensions,
            started: Clock::start(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::composite::{BACKGROUND, CollisionPolicy};

    fn encode(img: &RgbaImage) -> Vec<u8> {
        codec::encode_png(img).unwrap()
    }

    fn red_png(width: u32, height: u32) -> Vec<u8> {
        encode(&RgbaImage::from_pixel(
            width,
            height,
            image::Rgba([255, 0, 0, 255]),
        ))
    }

    #[test]
    fn pending_exposes_source_bytes() {
        let png = red_png(4, 4);
        let expected_len = png.len();
        let pending = Pipeline::new(png, ScrambleConfig::default());
        assert_eq!(pending.source().len(), expected_len);
    }

    #[test]
    fn decode_empty_input_returns_error() {
        let result = Pipeline::new(vec![], ScrambleConfig::default()).decode();
        assert!(matches!(result, Err(PipelineError::EmptyInput)));
    }

    #[test]
    fn decode_corrupt_input_returns_error() {
        let result = Pipeline::new(vec![0xFF, 0x00], ScrambleConfig::default()).decode();
        assert!(matches!(result, Err(PipelineError::ImageDecode(_))));
    }

    #[test]
    fn invalid_config_fails_before_decoding() {
        let config = ScrambleConfig {
            hue_bins: 0,
            ..ScrambleConfig::default()
        };
        // Corrupt bytes would be a decode error; the config check wins.
        let result = Pipeline::new(vec![0xFF], config).decode();
        assert!(matches!(result, Err(PipelineError::InvalidConfig(_))));
    }

    #[test]
    fn stages_expose_intermediates() {
        let decoded = Pipeline::new(red_png(6, 3), ScrambleConfig::default())
            .decode()
            .unwrap();
        assert_eq!(decoded.original().dimensions(), (6, 3));
        assert_eq!(
            decoded.dimensions(),
            Dimensions {
                width: 6,
                height: 3
            }
        );

        let converted = decoded.convert().unwrap();
        assert_eq!(converted.hsv().get(5, 2), Some([0, 255, 255, 255]));

        let composited = converted.composite().unwrap();
        // Default magnitude: 0.05 * 6 = 0.3 -> band 2.
        assert_eq!(composited.params().band(), 2);
        assert_eq!(composited.canvas().dimensions(), (10, 7));
        assert_eq!(composited.stats().writes, 18);
    }

    #[test]
    fn diagnostics_cover_every_stage() {
        let png = red_png(8, 8);
        let input_len = png.len();
        let staged = Pipeline::new(png, ScrambleConfig::default())
            .decode()
            .unwrap()
            .convert()
            .unwrap()
            .composite()
            .unwrap()
            .into_result();

        let diag = &staged.diagnostics;
        assert!(matches!(
            diag.decode.metrics,
            StageMetrics::Decode { input_bytes, width: 8, height: 8, pixel_count: 64 }
                if input_bytes == input_len
        ));
        match &diag.convert.metrics {
            StageMetrics::Convert {
                achromatic_pixels,
                hue_histogram,
            } => {
                assert_eq!(*achromatic_pixels, 0);
                assert_eq!(hue_histogram.get(&0), Some(&64));
            }
            other => panic!("unexpected convert metrics: {other:?}"),
        }
        assert!(matches!(
            diag.composite.metrics,
            StageMetrics::Composite { collisions: 0, .. }
        ));
        assert_eq!(diag.summary.canvas_width, staged.canvas.width());
        assert!(diag.total_duration >= diag.composite.duration);
    }

    #[test]
    fn from_image_skips_codec() {
        let img = RgbaImage::from_pixel(4, 4, image::Rgba([0, 0, 255, 255]));
        let config = ScrambleConfig {
            displace_magnitude: Some(0.0),
            collision: CollisionPolicy::FirstWriteWins,
            ..ScrambleConfig::default()
        };
        let staged = Pipeline::from_image(img, config)
            .unwrap()
            .convert()
            .unwrap()
            .composite()
            .unwrap()
            .into_result();
        assert_eq!(staged.canvas.dimensions(), (8, 8));
        assert_eq!(staged.canvas.get_pixel(0, 0).0, BACKGROUND);
        assert_eq!(staged.canvas.get_pixel(2, 2).0, [0, 0, 255, 255]);
        assert!(matches!(
            staged.diagnostics.decode.metrics,
            StageMetrics::Decode { input_bytes: 0, .. }
        ));
    }

    #[test]
    fn from_image_rejects_invalid_config() {
        let config = ScrambleConfig {
            displace_magnitude: Some(-3.0),
            ..ScrambleConfig::default()
        };
        let result = Pipeline::from_image(RgbaImage::new(2, 2), config);
        assert!(matches!(result, Err(PipelineError::InvalidConfig(_))));
    }
}
