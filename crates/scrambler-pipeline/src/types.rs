//! Shared types for the scrambler pipeline.

use serde::{Deserialize, Serialize};

use crate::composite::{CollisionPolicy, CompositeStats};
use crate::diagnostics::PipelineDiagnostics;
use crate::displace::{DisplacementParams, OffsetRounding};

/// Re-export `RgbaImage` so downstream crates can reference the
/// decoded source and the output canvas without depending on `image`
/// directly.
pub use image::RgbaImage;

/// Number of interleaved channels per pixel in every buffer the
/// pipeline touches (RGBA or HSVA).
pub const CHANNELS: usize = 4;

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Dimensions of an existing RGBA image.
    #[must_use]
    pub fn of(image: &RgbaImage) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
        }
    }

    /// Total pixel count (`width * height`).
    #[must_use]
    pub fn pixel_count(self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Length of an interleaved 4-channel buffer with these dimensions,
    /// or `None` if it exceeds the `isize::MAX` bytes a `Vec` can hold.
    #[must_use]
    pub fn buffer_len(self) -> Option<usize> {
        let len = usize::try_from(self.pixel_count())
            .ok()?
            .checked_mul(CHANNELS)?;
        isize::try_from(len).ok()?;
        Some(len)
    }

    /// Flat buffer offset of pixel `(x, y)` in row-major order.
    ///
    /// The caller guarantees `x < width` and `y < height`.
    #[must_use]
    pub fn offset(self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * CHANNELS
    }
}

/// A decoded image re-expressed as quantized HSV.
///
/// Same dimensions as the RGBA image it was derived from. Each pixel is
/// `[h, s, v, a]` where `h`, `s` and `v` are in `0..=255` and `a` is the
/// untouched source alpha. Built once by [`crate::hsv::to_hsv`] and
/// read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HsvImage {
    dimensions: Dimensions,
    data: Vec<u8>,
}

impl HsvImage {
    /// Wrap a raw interleaved HSVA buffer.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::ImageTooLarge`] if no buffer of these
    /// dimensions can be addressed, and
    /// [`PipelineError::DimensionMismatch`] if `data.len()` is not
    /// `width * height * 4`.
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Result<Self, PipelineError> {
        let dimensions = Dimensions { width, height };
        let expected = dimensions
            .buffer_len()
            .ok_or(PipelineError::ImageTooLarge { width, height })?;
        if data.len() != expected {
            return Err(PipelineError::DimensionMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { dimensions, data })
    }

    /// Width in pixels.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.dimensions.width
    }

    /// Height in pixels.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.dimensions.height
    }

    /// Width and height together.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// The `[h, s, v, a]` value at `(x, y)`, or `None` when out of range.
    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.dimensions.width || y >= self.dimensions.height {
            return None;
        }
        let i = self.dimensions.offset(x, y);
        let px = self.data.get(i..i + CHANNELS)?;
        Some([px[0], px[1], px[2], px[3]])
    }

    /// Iterate over every `[h, s, v, a]` pixel in row-major order.
    pub fn pixels(&self) -> impl Iterator<Item = [u8; 4]> + '_ {
        self.data
            .chunks_exact(CHANNELS)
            .map(|px| [px[0], px[1], px[2], px[3]])
    }

    /// The raw interleaved buffer.
    #[must_use]
    pub fn as_raw(&self) -> &[u8] {
        &self.data
    }
}

/// Configuration for one scramble run.
///
/// Every field has a default, so an empty JSON object deserializes to [`ScrambleConfig::default`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrambleConfig {
    /// Number of contiguous sectors the hue wheel is quantized into.
    /// Each sector maps to one displacement direction. Must be positive.
    pub hue_bins: u32,

    /// Displacement distance in pixels.
    ///
    /// `None` derives it from the decoded image as
    /// [`DEFAULT_DISPLACE_FRACTION`](Self::DEFAULT_DISPLACE_FRACTION)
    /// times the longer side.
    pub displace_magnitude: Option<f64>,

    /// How fractional offsets are reduced to whole pixels.
    pub rounding: OffsetRounding,

    /// How multiple source pixels landing on one destination are resolved.
    pub collision: CollisionPolicy,
}

impl ScrambleConfig {
    /// Default number of hue bins.
    pub const DEFAULT_HUE_BINS: u32 = 8;

    /// Default displacement as a fraction of `max(width, height)`.
    pub const DEFAULT_DISPLACE_FRACTION: f64 = 0.05;

    /// Check the configuration without reference to any image.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if `hue_bins` is zero or
    /// an explicit `displace_magnitude` is negative or not finite.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.hue_bins == 0 {
            return Err(PipelineError::InvalidConfig(
                "hue_bins must be at least 1".to_string(),
            ));
        }
        if let Some(magnitude) = self.displace_magnitude
            && (!magnitude.is_finite() || magnitude < 0.0)
        {
            return Err(PipelineError::InvalidConfig(format!(
                "displace_magnitude must be finite and non-negative, got {magnitude}"
            )));
        }
        Ok(())
    }
}

impl Default for ScrambleConfig {
    fn default() -> Self {
        Self {
            hue_bins: Self::DEFAULT_HUE_BINS,
            displace_magnitude: None,
            rounding: OffsetRounding::default(),
            collision: CollisionPolicy::default(),
        }
    }
}

/// Result of a complete scramble run.
#[derive(Debug, Clone)]
pub struct ScrambleResult {
    /// The enlarged output canvas.
    pub canvas: RgbaImage,

    /// Dimensions of the source image in pixels.
    pub dimensions: Dimensions,

    /// The displacement parameters resolved for this image.
    pub params: DisplacementParams,

    /// Write and coverage counts from the scatter pass.
    pub stats: CompositeStats,
}

/// Result of running the pipeline with every intermediate preserved.
///
/// Note: does not derive `PartialEq` because `RgbaImage` comparison
/// walks the full pixel buffers; compare fields explicitly instead.
#[derive(Debug, Clone)]
pub struct StagedResult {
    /// Stage 1: decoded source image.
    pub original: RgbaImage,
    /// Stage 2: per-pixel quantized HSV of the source.
    pub hsv: HsvImage,
    /// Stage 3: scattered output canvas.
    pub canvas: RgbaImage,
    /// The displacement parameters resolved for this image.
    pub params: DisplacementParams,
    /// Write and coverage counts from the scatter pass.
    pub stats: CompositeStats,
    /// Source image dimensions in pixels.
    pub dimensions: Dimensions,
    /// Per-stage timing and metrics.
    pub diagnostics: PipelineDiagnostics,
}

impl From<StagedResult> for ScrambleResult {
    fn from(staged: StagedResult) -> Self {
        Self {
            canvas: staged.canvas,
            dimensions: staged.dimensions,
            params: staged.params,
            stats: staged.stats,
        }
    }
}

/// Errors that can occur during pipeline processing.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Failed to decode the input image.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[source] image::ImageError),

    /// Failed to encode the output canvas.
    #[error("failed to encode image: {0}")]
    ImageEncode(#[source] image::ImageError),

    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// Pipeline configuration is invalid.
    #[error("invalid pipeline configuration: {0}")]
    InvalidConfig(String),

    /// A raw pixel buffer did not match its declared dimensions.
    #[error("pixel buffer has {actual} bytes, expected {expected}")]
    DimensionMismatch {
        /// Byte length implied by the dimensions.
        expected: usize,
        /// Byte length actually supplied.
        actual: usize,
    },

    /// An image is too large for its pixel buffer to be addressed.
    #[error("{width}x{height} image is too large to hold in memory")]
    ImageTooLarge {
        /// Width in pixels.
        width: u32,
        /// Height in pixels.
        height: u32,
    },

    /// A planned destination fell outside the canvas.
    #[error("destination ({x}, {y}) lies outside the {width}x{height} canvas")]
    DestinationOutOfBounds {
        /// Planned destination column.
        x: i64,
        /// Planned destination row.
        y: i64,
        /// Canvas width.
        width: u32,
        /// Canvas height.
        height: u32,
    },
}
