//! Scatter-write composition onto an enlarged canvas.
//!
//! The canvas is the source grown by [`DisplacementParams::band`] on every
//! side and pre-filled with opaque white. Each source pixel is copied,
//! channels untouched, to the destination its hue plans. Canvas pixels
//! that no source pixel lands on stay white, which is what gives the
//! output its sparse, shattered look.
//!
//! Writes go straight into a flat RGBA buffer addressed by
//! `(y * width + x) * 4`. This module defines the [`Compositor`] trait
//! and the [`CollisionPolicy`] enum that selects what happens when two
//! source pixels share a destination.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::displace::{self, DisplacementParams};
use crate::types::{CHANNELS, Dimensions, HsvImage, PipelineError, RgbaImage};

/// Canvas background: opaque white.
pub const BACKGROUND: [u8; 4] = [255, 255, 255, 255];

/// Resolution strategy when several source pixels land on one destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CollisionPolicy {
    /// Plain overwrite: the pixel visited last in row-major order stays.
    ///
    /// Nothing is detected or accumulated; earlier writes are lost.
    #[default]
    LastWriteWins,

    /// The pixel visited first in row-major order stays.
    FirstWriteWins,

    /// Per-channel mean of every pixel that landed there, rounded to
    /// nearest. Alpha is averaged like the color channels.
    Average,
}

impl fmt::Display for CollisionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LastWriteWins => write!(f, "last-write-wins"),
            Self::FirstWriteWins => write!(f, "first-write-wins"),
            Self::Average => write!(f, "average"),
        }
    }
}

/// Write and coverage counts from one scatter pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CompositeStats {
    /// Source pixels scattered (one per source pixel).
    pub writes: u64,
    /// Distinct canvas pixels written at least once.
    pub covered: u64,
    /// Canvas pixels written more than once.
    pub collisions: u64,
    /// Canvas pixels left as background.
    pub uncovered: u64,
}

/// Output of a scatter pass.
#[derive(Debug, Clone)]
pub struct Composite {
    /// The filled canvas.
    pub canvas: RgbaImage,
    /// Write and coverage counts.
    pub stats: CompositeStats,
}

/// Trait for scatter composition strategies.
///
/// Input: the source image, its parallel HSV image, and resolved
/// displacement parameters. Output: the canvas and its statistics.
pub trait Compositor {
    /// Scatter every source pixel onto a fresh canvas.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::DimensionMismatch`] if `source` and `hsv`
    /// differ in size, [`PipelineError::InvalidConfig`] if the canvas
    /// would be too large, and [`PipelineError::DestinationOutOfBounds`]
    /// if a planned destination misses the canvas.
    fn composite(
        &self,
        source: &RgbaImage,
        hsv: &HsvImage,
        params: &DisplacementParams,
    ) -> Result<Composite, PipelineError>;
}

impl Compositor for CollisionPolicy {
    fn composite(
        &self,
        source: &RgbaImage,
        hsv: &HsvImage,
        params: &DisplacementParams,
    ) -> Result<Composite, PipelineError> {
        scatter(source, hsv, params, *self)
    }
}

#[allow(clippy::cast_possible_truncation)]
fn scatter(
    source: &RgbaImage,
    hsv: &HsvImage,
    params: &DisplacementParams,
    policy: CollisionPolicy,
) -> Result<Composite, PipelineError> {
    let src_dims = Dimensions::of(source);
    if hsv.dimensions() != src_dims {
        return Err(PipelineError::DimensionMismatch {
            expected: source.as_raw().len(),
            actual: hsv.as_raw().len(),
        });
    }

    let canvas_dims = params.canvas_dimensions(src_dims)?;
    // canvas_dimensions has confirmed the buffer length fits in usize.
    let pixel_count = canvas_dims.pixel_count() as usize;
    let mut out = BACKGROUND.repeat(pixel_count);
    let mut hits = vec![0_u32; pixel_count];
    let mut sums = if policy == CollisionPolicy::Average {
        vec![[0_u32; CHANNELS]; pixel_count]
    } else {
        Vec::new()
    };

    let src = source.as_raw();
    let hues = hsv.as_raw();

    for y in 0..src_dims.height {
        for x in 0..src_dims.width {
            let src_at = src_dims.offset(x, y);
            let (dest_x, dest_y) = displace::destination(x, y, hues[src_at], params);
            let pixel = canvas_pixel(dest_x, dest_y, canvas_dims)?;
            let px = &src[src_at..src_at + CHANNELS];

            hits[pixel] = hits[pixel].saturating_add(1);
            let dest_at = pixel * CHANNELS;
            match policy {
                CollisionPolicy::LastWriteWins => {
                    out[dest_at..dest_at + CHANNELS].copy_from_slice(px);
                }
                CollisionPolicy::FirstWriteWins => {
                    if hits[pixel] == 1 {
                        out[dest_at..dest_at + CHANNELS].copy_from_slice(px);
                    }
                }
                CollisionPolicy::Average => {
                    for (sum, &channel) in sums[pixel].iter_mut().zip(px) {
                        *sum = sum.saturating_add(u32::from(channel));
                    }
                }
            }
        }
    }

    if policy == CollisionPolicy::Average {
        for (pixel, (&count, sum)) in hits.iter().zip(&sums).enumerate() {
            if count == 0 {
                continue;
            }
            let dest_at = pixel * CHANNELS;
            for (slot, &total) in out[dest_at..dest_at + CHANNELS].iter_mut().zip(sum) {
                // Mean of u8 values stays within u8.
                *slot = ((total + count / 2) / count) as u8;
            }
        }
    }

    let stats = tally(&hits, src_dims.pixel_count());
    let canvas = into_canvas(canvas_dims, out)?;

    Ok(Composite { canvas, stats })
}

/// Wrap a filled RGBA buffer as the output canvas.
fn into_canvas(dims: Dimensions, buf: Vec<u8>) -> Result<RgbaImage, PipelineError> {
    let actual = buf.len();
    RgbaImage::from_raw(dims.width, dims.height, buf).ok_or(PipelineError::DimensionMismatch {
        expected: dims.buffer_len().unwrap_or(usize::MAX),
        actual,
    })
}

/// Pixel index of `(x, y)` on the canvas.
fn canvas_pixel(x: i64, y: i64, canvas: Dimensions) -> Result<usize, PipelineError> {
    let out_of_bounds = || PipelineError::DestinationOutOfBounds {
        x,
        y,
        width: canvas.width,
        height: canvas.height,
    };
    let col = u32::try_from(x).map_err(|_| out_of_bounds())?;
    let row = u32::try_from(y).map_err(|_| out_of_bounds())?;
    if col >= canvas.width || row >= canvas.height {
        return Err(out_of_bounds());
    }
    Ok(canvas.offset(col, row) / CHANNELS)
}

fn tally(hits: &[u32], writes: u64) -> CompositeStats {
    let mut stats = CompositeStats {
        writes,
        ..CompositeStats::default()
    };
    for &count in hits {
        match count {
            0 => stats.uncovered += 1,
            1 => stats.covered += 1,
            _ => {
                stats.covered += 1;
                stats.collisions += 1;
            }
        }
    }
    stats
}
