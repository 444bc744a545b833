//! Pre-processing: scale a source image down to the model's input bound.
//!
//! Removal models have a practical input size; oversized uploads are scaled
//! so the longest side fits the bound, preserving aspect ratio. Images
//! already within the bound pass through untouched. Scaling only ever goes
//! down, never up.

use image::imageops::FilterType;

use crate::error::Result;
use crate::types::{encode_image, ResizedImage, SourceImage};

/// Default long-side bound for model input.
pub const DEFAULT_MAX_SIZE: u32 = 2048;

/// Fit `(width, height)` within `max_size` on the longest side.
///
/// Returns the dimensions unchanged when both already fit. The scaled short
/// side is rounded to the nearest pixel and never drops below 1.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn fit_dimensions(width: u32, height: u32, max_size: u32) -> (u32, u32) {
    if width >= height && width > max_size {
        let scaled = (f64::from(height) * f64::from(max_size) / f64::from(width)).round() as u32;
        (max_size, scaled.max(1))
    } else if height > max_size {
        let scaled = (f64::from(width) * f64::from(max_size) / f64::from(height)).round() as u32;
        (scaled.max(1), max_size)
    } else {
        (width, height)
    }
}

/// Scale a source image down so its longest side fits `max_size`.
///
/// The result keeps the source's name and format. Sources already within the
/// bound are passed through without re-encoding. When scaling is needed the
/// image is resampled with a Catmull-Rom filter and re-encoded in the source
/// format; if that re-encode fails, the original bytes are returned unscaled
/// rather than failing the run.
///
/// # Errors
///
/// Returns [`Error::Decode`](crate::error::Error::Decode) if the source
/// bytes cannot be decoded.
pub fn resize_source(source: &SourceImage, max_size: u32) -> Result<ResizedImage> {
    let decoded = source.to_image()?;
    let (width, height) = (decoded.width(), decoded.height());
    let (target_w, target_h) = fit_dimensions(width, height, max_size);

    if (target_w, target_h) == (width, height) {
        log::debug!("resize: {width}x{height} already within {max_size}, passing through");
        return Ok(ResizedImage {
            name: source.name.clone(),
            format: source.format,
            width,
            height,
            bytes: source.bytes.clone(),
        });
    }

    let scaled = decoded.resize_exact(target_w, target_h, FilterType::CatmullRom);
    match encode_image(&scaled, source.format) {
        Ok(bytes) => {
            log::debug!("resize: {width}x{height} -> {target_w}x{target_h} (max {max_size})");
            Ok(ResizedImage {
                name: source.name.clone(),
                format: source.format,
                width: target_w,
                height: target_h,
                bytes,
            })
        }
        Err(e) => {
            log::warn!("resize: re-encode failed ({e}), keeping original {width}x{height}");
            Ok(ResizedImage {
                name: source.name.clone(),
                format: source.format,
                width,
                height,
                bytes: source.bytes.clone(),
            })
        }
    }
}
