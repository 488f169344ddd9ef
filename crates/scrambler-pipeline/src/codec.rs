//! In-memory image decoding and PNG encoding.
//!
//! Accepts raw image bytes (PNG, JPEG, BMP, WebP) and produces an
//! `RgbaImage`; encodes a canvas back to PNG bytes. No filesystem access
//! happens here: callers own reading and writing files.

use image::{ExtendedColorType, ImageEncoder, codecs::png::PngEncoder};

use crate::types::{PipelineError, RgbaImage};

/// Decode raw image bytes into 8-bit RGBA.
///
/// Whatever the source color type, the result has four channels; sources
/// without alpha come back fully opaque.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if `bytes` is empty.
/// Returns [`PipelineError::ImageDecode`] if the image format is
/// unrecognized or the data is corrupt.
pub fn decode(bytes: &[u8]) -> Result<RgbaImage, PipelineError> {
    if bytes.is_empty() {
        return Err(PipelineError::EmptyInput);
    }

    let img = image::load_from_memory(bytes).map_err(PipelineError::ImageDecode)?;
    Ok(img.to_rgba8())
}

/// Encode an RGBA image as PNG bytes.
///
/// # Errors
///
/// Returns [`PipelineError::ImageEncode`] if the PNG encoder fails.
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, PipelineError> {
    let mut buf = Vec::new();
    PngEncoder::new(&mut buf)
        .write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            ExtendedColorType::Rgba8,
        )
        .map_err(PipelineError::ImageEncode)?;
    Ok(buf)
}
