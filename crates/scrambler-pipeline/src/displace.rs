//! Hue-driven displacement planning.
//!
//! Each pixel moves `magnitude` pixels in the direction of its binned hue
//! angle. The hue wheel (`0..=255`) is cut into `hue_bins` equal sectors;
//! every hue in a sector shares one direction, so similar colors travel
//! together.
//!
//! Nothing here checks bounds. [`DisplacementParams::band`] sizes the
//! canvas border so that every planned destination lands inside it.

use std::f64::consts::TAU;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{Dimensions, PipelineError, ScrambleConfig};

/// How a fractional displacement becomes a whole-pixel destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OffsetRounding {
    /// Floor the offset: `x + band + floor(magnitude * cos)`.
    ///
    /// Same as flooring the whole destination in exact arithmetic, or
    /// narrowing it to an unsigned integer since it is never negative.
    /// Negative fractional offsets move one pixel further than their
    /// magnitude suggests.
    #[default]
    Floor,

    /// Truncate the offset itself toward zero before adding it.
    TowardZero,

    /// Round the offset to the nearest pixel, halves away from zero.
    Nearest,
}

impl fmt::Display for OffsetRounding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Floor => write!(f, "floor"),
            Self::TowardZero => write!(f, "toward-zero"),
            Self::Nearest => write!(f, "nearest"),
        }
    }
}

/// Displacement settings resolved for one image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DisplacementParams {
    /// Number of hue sectors. Always positive.
    pub hue_bins: u32,
    /// Displacement distance in pixels. Finite and non-negative.
    pub magnitude: f64,
    /// Offset rounding mode.
    pub rounding: OffsetRounding,
}

impl DisplacementParams {
    /// Largest canvas, in pixels, that compositing will allocate.
    pub const MAX_CANVAS_PIXELS: u64 = 1 << 30;

    /// Build validated displacement parameters.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if `hue_bins` is zero or
    /// `magnitude` is negative or not finite.
    pub fn new(
        hue_bins: u32,
        magnitude: f64,
        rounding: OffsetRounding,
    ) -> Result<Self, PipelineError> {
        ScrambleConfig {
            hue_bins,
            displace_magnitude: Some(magnitude),
            rounding,
            ..ScrambleConfig::default()
        }
        .validate()?;
        Ok(Self {
            hue_bins,
            magnitude,
            rounding,
        })
    }

    /// Resolve a config against the decoded image, filling in the
    /// default magnitude when the config leaves it unset.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if the config is invalid.
    pub fn resolve(config: &ScrambleConfig, source: Dimensions) -> Result<Self, PipelineError> {
        let magnitude = config
            .displace_magnitude
            .unwrap_or_else(|| default_magnitude(source));
        Self::new(config.hue_bins, magnitude, config.rounding)
    }

    /// Border width added to every side of the canvas:
    /// `floor(magnitude) + 2`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn band(&self) -> u32 {
        // Float-to-int `as` saturates; oversized bands are caught by
        // `canvas_dimensions`.
        (self.magnitude.floor() as u32).saturating_add(2)
    }

    /// Canvas size for a source image: the source plus `band` on each side.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if the canvas would not
    /// fit in `u32` dimensions or addressable memory, or would exceed
    /// [`MAX_CANVAS_PIXELS`](Self::MAX_CANVAS_PIXELS).
    pub fn canvas_dimensions(&self, source: Dimensions) -> Result<Dimensions, PipelineError> {
        let border = self.band().checked_mul(2);
        let grow = |side: u32| border.and_then(|b| side.checked_add(b));
        let (Some(width), Some(height)) = (grow(source.width), grow(source.height)) else {
            return Err(self.too_large(source));
        };
        let canvas = Dimensions { width, height };
        if canvas.pixel_count() > Self::MAX_CANVAS_PIXELS || canvas.buffer_len().is_none() {
            return Err(self.too_large(source));
        }
        Ok(canvas)
    }

    fn too_large(&self, source: Dimensions) -> PipelineError {
        PipelineError::InvalidConfig(format!(
            "displacement of {} px needs a canvas too large for a {}x{} image",
            self.magnitude, source.width, source.height,
        ))
    }
}

/// Default displacement for an image: 5% of its longer side.
#[must_use]
pub fn default_magnitude(source: Dimensions) -> f64 {
    ScrambleConfig::DEFAULT_DISPLACE_FRACTION * f64::from(source.width.max(source.height))
}

/// Sector index of `hue`: `floor(hue_bins * hue / 255)`.
///
/// Only `hue == 255` reaches `hue_bins` itself, which points the same
/// way as sector 0.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn hue_bin(hue: u8, hue_bins: u32) -> u32 {
    // Result is at most hue_bins, so it fits back into u32.
    (u64::from(hue_bins) * u64::from(hue) / 255) as u32
}

/// Direction in radians for `hue`: `(bin / hue_bins) * 2π`.
///
/// Sector `hue_bins` is folded onto sector 0 so that a full turn comes
/// out as exactly `0.0` instead of an approximate `2π`, whose sine is a
/// tiny negative number.
#[must_use]
pub fn hue_angle(hue: u8, hue_bins: u32) -> f64 {
    let bin = hue_bin(hue, hue_bins) % hue_bins.max(1);
    f64::from(bin) / f64::from(hue_bins.max(1)) * TAU
}

/// Distance below which a float offset is treated as the nearest whole
/// pixel. Absorbs trig residue such as `cos(3π/2) ≈ -1.8e-16`.
const SNAP_EPSILON: f64 = 1e-9;

/// Un-rounded `(dx, dy)` for `hue`.
///
/// Depends only on the hue and the parameters. Components within
/// `1e-9` of a whole number are snapped to it, so cardinal
/// directions are exact.
#[must_use]
pub fn offset(hue: u8, params: &DisplacementParams) -> (f64, f64) {
    let (sin, cos) = hue_angle(hue, params.hue_bins).sin_cos();
    (snap(params.magnitude * cos), snap(params.magnitude * sin))
}

fn snap(delta: f64) -> f64 {
    let whole = delta.round();
    if (delta - whole).abs() < SNAP_EPSILON {
        whole
    } else {
        delta
    }
}

/// Canvas coordinate for the source pixel `(x, y)` with hue `hue`:
/// `(x + band + dx, y + band + dy)` after rounding.
#[must_use]
pub fn destination(x: u32, y: u32, hue: u8, params: &DisplacementParams) -> (i64, i64) {
    let band = params.band();
    let (dx, dy) = offset(hue, params);
    (
        place(x, band, dx, params.rounding),
        place(y, band, dy, params.rounding),
    )
}

#[allow(clippy::cast_possible_truncation)]
fn place(coord: u32, band: u32, delta: f64, rounding: OffsetRounding) -> i64 {
    // Deltas are bounded by the validated magnitude, and `canvas_dimensions`
    // has already confirmed the canvas fits in u32, so these casts cannot
    // saturate for any magnitude that reaches this point.
    let step = match rounding {
        OffsetRounding::Floor => delta.floor(),
        OffsetRounding::TowardZero => delta.trunc(),
        OffsetRounding::Nearest => delta.round(),
    };
    i64::from(coord) + i64::from(band) + step as i64
}
