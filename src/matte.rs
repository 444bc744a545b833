//! Cutout post-processing: edge softening and cosmetic color tuning.
//!
//! Removal models leave slightly hard mattes. The post-processor runs an
//! optional gaussian blur and saturation boost over the cutout, then
//! attenuates every semi-transparent pixel's alpha to soften the cut edge,
//! and encodes the final PNG.

use image::{DynamicImage, ImageFormat, RgbaImage};

use crate::error::Result;
use crate::types::{encode_image, CutoutImage, FinalImage};

/// Alpha attenuation applied to semi-transparent pixels.
pub const EDGE_SOFTEN_FACTOR: f32 = 0.9;

/// Default gaussian blur sigma for the cosmetic pass.
pub const DEFAULT_BLUR_SIGMA: f32 = 1.0;

/// Default saturation boost for the cosmetic pass.
pub const DEFAULT_SATURATION: f32 = 1.1;

/// Attenuate the alpha of every semi-transparent pixel.
///
/// Fully opaque pixels (alpha 255) are left untouched; every other alpha
/// becomes `round(alpha * factor)`. One pass over the buffer; applying it
/// again compounds the attenuation.
pub fn soften_alpha(image: &mut RgbaImage, factor: f32) {
    for px in image.pixels_mut() {
        let alpha = px[3];
        if alpha < 255 {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            {
                px[3] = (f32::from(alpha) * factor).round().clamp(0.0, 255.0) as u8;
            }
        }
    }
}

/// Scale chroma around Rec.601 luma, leaving alpha untouched.
///
/// `saturation` 1.0 is a no-op; 1.1 gives the subtle boost the pipeline
/// applies by default. Values below 1.0 desaturate.
pub fn boost_saturation(image: &mut RgbaImage, saturation: f32) {
    if (saturation - 1.0).abs() < f32::EPSILON {
        return;
    }

    for px in image.pixels_mut() {
        let r = f32::from(px[0]);
        let g = f32::from(px[1]);
        let b = f32::from(px[2]);
        let luma = 0.299 * r + 0.587 * g + 0.114 * b;
        for ch in 0..3 {
            let value = luma + (f32::from(px[ch]) - luma) * saturation;
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            {
                px[ch] = value.round().clamp(0.0, 255.0) as u8;
            }
        }
    }
}

/// Composite a cutout into the final PNG artifact.
///
/// Decodes the cutout, runs the cosmetic pass (`blur_sigma` 0 and
/// `saturation` 1.0 disable it; the blur covers all four channels, feathering
/// the matte along with the colors), softens the matte with
/// [`EDGE_SOFTEN_FACTOR`] and encodes the result as a PNG named
/// `output_name`.
///
/// # Errors
///
/// Returns [`Error::Decode`](crate::error::Error::Decode) if the cutout
/// bytes cannot be decoded and [`Error::Encode`](crate::error::Error::Encode)
/// if the final PNG cannot be produced. Both are terminal: no final artifact
/// exists.
pub fn post_process(
    cutout: &CutoutImage,
    output_name: String,
    blur_sigma: f32,
    saturation: f32,
) -> Result<FinalImage> {
    let mut rgba = cutout.to_rgba()?;

    if blur_sigma > 0.0 {
        rgba = image::imageops::blur(&rgba, blur_sigma);
    }
    boost_saturation(&mut rgba, saturation);
    soften_alpha(&mut rgba, EDGE_SOFTEN_FACTOR);

    let (width, height) = rgba.dimensions();
    let bytes = encode_image(&DynamicImage::ImageRgba8(rgba), ImageFormat::Png)?;

    log::debug!("post-process: {width}x{height} matte softened into {output_name}");

    Ok(FinalImage {
        name: output_name,
        width,
        height,
        bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn soften_leaves_opaque_pixels_alone() {
        let mut img = RgbaImage::from_pixel(4, 4, Rgba([10, 20, 30, 255]));
        soften_alpha(&mut img, EDGE_SOFTEN_FACTOR);
        for px in img.pixels() {
            assert_eq!(px[3], 255);
        }
    }

    #[test]
    fn soften_attenuates_semi_transparent_pixels() {
        let mut img = RgbaImage::new(3, 1);
        img.put_pixel(0, 0, Rgba([0, 0, 0, 200]));
        img.put_pixel(1, 0, Rgba([0, 0, 0, 100]));
        img.put_pixel(2, 0, Rgba([0, 0, 0, 0]));

        soften_alpha(&mut img, EDGE_SOFTEN_FACTOR);

        assert_eq!(img.get_pixel(0, 0)[3], 180);
        assert_eq!(img.get_pixel(1, 0)[3], 90);
        assert_eq!(img.get_pixel(2, 0)[3], 0);
    }

    #[test]
    fn soften_never_raises_alpha() {
        for a in 0..=254u8 {
            let mut img = RgbaImage::from_pixel(1, 1, Rgba([0, 0, 0, a]));
            soften_alpha(&mut img, EDGE_SOFTEN_FACTOR);
            let softened = img.get_pixel(0, 0)[3];
            assert!(softened <= a);
            if a >= 6 {
                assert!(softened < a);
            }
        }
    }

    #[test]
    fn soften_applied_twice_compounds() {
        let mut once = RgbaImage::from_pixel(1, 1, Rgba([0, 0, 0, 200]));
        soften_alpha(&mut once, EDGE_SOFTEN_FACTOR);
        let mut twice = once.clone();
        soften_alpha(&mut twice, EDGE_SOFTEN_FACTOR);

        assert_eq!(once.get_pixel(0, 0)[3], 180);
        assert_eq!(twice.get_pixel(0, 0)[3], 162);
    }

    #[test]
    fn saturation_noop_at_one() {
        let mut img = RgbaImage::from_pixel(2, 2, Rgba([120, 80, 40, 255]));
        let before = img.clone();
        boost_saturation(&mut img, 1.0);
        assert_eq!(img, before);
    }

    #[test]
    fn saturation_leaves_gray_and_alpha_alone() {
        let mut img = RgbaImage::from_pixel(1, 1, Rgba([128, 128, 128, 77]));
        boost_saturation(&mut img, 1.5);

        let px = img.get_pixel(0, 0);
        assert_eq!((px[0], px[1], px[2], px[3]), (128, 128, 128, 77));
    }

    #[test]
    fn saturation_boost_spreads_channels() {
        let mut img = RgbaImage::from_pixel(1, 1, Rgba([200, 100, 50, 255]));
        boost_saturation(&mut img, 1.1);

        let px = img.get_pixel(0, 0);
        assert!(px[0] > 200);
        assert!(px[2] < 50);
    }

    #[test]
    fn post_process_produces_png_at_cutout_dimensions() {
        let mut rgba = RgbaImage::from_pixel(6, 4, Rgba([50, 90, 130, 255]));
        rgba.put_pixel(0, 0, Rgba([50, 90, 130, 200]));
        let cutout = CutoutImage::from_rgba(rgba).unwrap();

        let final_image = post_process(&cutout, "photo.png".to_string(), 0.0, 1.0).unwrap();
        assert_eq!(final_image.dimensions(), (6, 4));
        assert_eq!(final_image.name, "photo.png");

        let decoded = image::load_from_memory(&final_image.bytes).unwrap();
        assert_eq!(decoded.color(), image::ColorType::Rgba8);
        let px = decoded.to_rgba8();
        assert_eq!(px.get_pixel(0, 0)[3], 180);
        assert_eq!(px.get_pixel(1, 0)[3], 255);
    }

    #[test]
    fn blur_feathers_hard_matte_edges() {
        // left half opaque, right half transparent
        let mut rgba = RgbaImage::new(8, 8);
        for y in 0..8 {
            for x in 0..8 {
                let a = if x < 4 { 255 } else { 0 };
                rgba.put_pixel(x, y, Rgba([255, 255, 255, a]));
            }
        }
        let cutout = CutoutImage::from_rgba(rgba).unwrap();

        let final_image = post_process(&cutout, "m.png".to_string(), 1.0, 1.0).unwrap();
        let px = image::load_from_memory(&final_image.bytes)
            .unwrap()
            .to_rgba8();

        let edge = px.get_pixel(3, 4)[3];
        assert!(edge > 0 && edge < 255);
    }

    #[test]
    fn post_process_rejects_undecodable_cutout() {
        let cutout = CutoutImage::new(vec![0xde, 0xad]);
        assert!(post_process(&cutout, "x.png".to_string(), 0.0, 1.0).is_err());
    }
}
