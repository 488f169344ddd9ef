//! Pipeline diagnostics: timing, counts, and other metrics for each stage.
//!
//! Every run through [`Pipeline`](crate::pipeline::Pipeline) collects
//! diagnostics alongside the pipeline results. Timestamps come from the
//! `web-time` crate, which uses `performance.now()` on WASM and
//! `std::time::Instant` on native.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::displace;
use crate::types::HsvImage;

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Wall-clock stopwatch for one stage.
#[derive(Debug, Clone, Copy)]
pub struct Clock(web_time::Instant);

impl Clock {
    /// Start timing now.
    #[must_use]
    pub fn start() -> Self {
        Self(web_time::Instant::now())
    }

    /// Time since [`start`](Self::start).
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.0.elapsed()
    }
}

/// Diagnostics collected from a single pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDiagnostics {
    /// Stage 1: image decoding.
    pub decode: StageDiagnostics,
    /// Stage 2: RGB to HSV conversion.
    pub convert: StageDiagnostics,
    /// Stage 3: displacement planning and scatter composition.
    pub composite: StageDiagnostics,
    /// Total wall-clock duration of the entire pipeline (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary counts across all stages.
    pub summary: PipelineSummary,
}

/// Diagnostics for a single pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics.
    pub metrics: StageMetrics,
}

/// Stage-specific metrics that vary by pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Image decoding metrics.
    Decode {
        /// Size of the input image bytes.
        input_bytes: usize,
        /// Decoded image width in pixels.
        width: u32,
        /// Decoded image height in pixels.
        height: u32,
        /// Total pixel count (`width * height`).
        pixel_count: u64,
    },
    /// HSV conversion metrics.
    Convert {
        /// Pixels with zero saturation (black, white, grays). These all
        /// share hue 0 and therefore move in the same direction.
        achromatic_pixels: u64,
        /// Pixel count per hue sector, keyed by sector index. Sectors
        /// with no pixels are omitted.
        hue_histogram: BTreeMap<u32, u64>,
    },
    /// Scatter composition metrics.
    Composite {
        /// Number of hue sectors.
        hue_bins: u32,
        /// Displacement distance in pixels.
        magnitude: f64,
        /// Canvas border on each side in pixels.
        band: u32,
        /// Offset rounding mode.
        rounding: String,
        /// Collision policy.
        collision: String,
        /// Canvas width in pixels.
        canvas_width: u32,
        /// Canvas height in pixels.
        canvas_height: u32,
        /// Distinct canvas pixels written.
        covered: u64,
        /// Canvas pixels written more than once.
        collisions: u64,
        /// Canvas pixels left as background.
        uncovered: u64,
    },
}

/// High-level summary counts for the entire pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSummary {
    /// Source image width in pixels.
    pub image_width: u32,
    /// Source image height in pixels.
    pub image_height: u32,
    /// Source pixel count.
    pub pixel_count: u64,
    /// Output canvas width in pixels.
    pub canvas_width: u32,
    /// Output canvas height in pixels.
    pub canvas_height: u32,
    /// Canvas pixels written more than once.
    pub collisions: u64,
}

impl PipelineDiagnostics {
    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Pipeline Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Image: {}x{} ({} pixels) -> canvas {}x{}",
            self.summary.image_width,
            self.summary.image_height,
            self.summary.pixel_count,
            self.summary.canvas_width,
            self.summary.canvas_height,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<24} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);
        let stages = [
            ("Decode", &self.decode),
            ("Convert", &self.convert),
            ("Composite", &self.composite),
        ];
        for (name, diag) in stages {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{name:<24} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.push(String::new());
        lines.push(format!("Collisions: {}", self.summary.collisions));

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Decode {
            input_bytes,
            width,
            height,
            ..
        } => format!("{input_bytes} bytes -> {width}x{height}"),
        StageMetrics::Convert {
            achromatic_pixels,
            hue_histogram,
        } => {
            let bins = hue_histogram
                .iter()
                .map(|(bin, count)| format!("{bin}:{count}"))
                .collect::<Vec<_>>()
                .join(" ");
            format!("achromatic={achromatic_pixels} sectors=[{bins}]")
        }
        StageMetrics::Composite {
            hue_bins,
            magnitude,
            band,
            rounding,
            collision,
            canvas_width,
            canvas_height,
            covered,
            collisions,
            uncovered,
        } => {
            #[allow(clippy::cast_precision_loss)]
            let coverage = {
                let total = covered + uncovered;
                if total > 0 {
                    *covered as f64 / total as f64 * 100.0
                } else {
                    0.0
                }
            };
            format!(
                "bins={hue_bins} d={magnitude:.2} band={band} {rounding}/{collision} \
                 {canvas_width}x{canvas_height} covered={covered} ({coverage:.1}%) \
                 collisions={collisions}",
            )
        }
    }
}

/// Count of achromatic pixels (saturation zero) in an HSV image.
pub(crate) fn count_achromatic(hsv: &HsvImage) -> u64 {
    hsv.pixels().map(|px| u64::from(px[1] == 0)).sum()
}

/// Pixel count per hue sector. The full-turn sector `hue_bins` is folded
/// onto sector 0, matching the direction it moves in.
pub(crate) fn hue_histogram(hsv: &HsvImage, hue_bins: u32) -> BTreeMap<u32, u64> {
    let mut histogram = BTreeMap::new();
    for px in hsv.pixels() {
        let bin = displace::hue_bin(px[0], hue_bins) % hue_bins.max(1);
        *histogram.entry(bin).or_insert(0) += 1;
    }
    histogram
}
