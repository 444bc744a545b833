//! Image artifacts passed between pipeline stages.
//!
//! Each stage consumes one artifact and produces the next: a [`SourceImage`]
//! becomes a [`ResizedImage`], the removal model turns that into a
//! [`CutoutImage`], and post-processing yields the [`FinalImage`]. Artifacts
//! are plain encoded bytes plus the metadata the next stage needs; nothing
//! here mutates its input.

use std::io::Cursor;
use std::path::Path;

use image::{DynamicImage, ImageFormat, RgbaImage};

use crate::error::{Error, Result};

/// JPEG quality for re-encoded pipeline artifacts.
const JPEG_QUALITY: u8 = 90;

/// An input image as submitted: raw bytes, format, and filename.
#[derive(Debug, Clone)]
pub struct SourceImage {
    /// Original filename, used for output naming and model selection.
    pub name: String,
    /// Container format of `bytes`.
    pub format: ImageFormat,
    /// Encoded image data.
    pub bytes: Vec<u8>,
}

impl SourceImage {
    /// Create a source image from already-known parts.
    pub fn new(name: impl Into<String>, format: ImageFormat, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            format,
            bytes,
        }
    }

    /// Create a source image by sniffing the format from the byte signature.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedFormat`] if the signature does not match a
    /// known image format.
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Result<Self> {
        let format =
            image::guess_format(&bytes).map_err(|e| Error::UnsupportedFormat(e.to_string()))?;
        Ok(Self {
            name: name.into(),
            format,
            bytes,
        })
    }

    /// Read a source image from disk, inferring the format from the extension.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedFormat`] if the extension is not a known
    /// image format and [`Error::Io`] if the file cannot be read.
    pub fn from_path(path: &Path) -> Result<Self> {
        let format =
            ImageFormat::from_path(path).map_err(|e| Error::UnsupportedFormat(e.to_string()))?;
        let name = path.file_name().map_or_else(
            || path.display().to_string(),
            |f| f.to_string_lossy().into_owned(),
        );
        let bytes = std::fs::read(path)?;
        Ok(Self {
            name,
            format,
            bytes,
        })
    }

    /// MIME type of the encoded bytes, e.g. `image/jpeg`.
    #[must_use]
    pub fn mime_type(&self) -> &'static str {
        self.format.to_mime_type()
    }

    /// Decode the bytes into a pixel buffer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if the bytes are not a valid image in the
    /// recorded format.
    pub fn to_image(&self) -> Result<DynamicImage> {
        image::load_from_memory_with_format(&self.bytes, self.format).map_err(Error::Decode)
    }
}

/// A source image scaled to fit the removal model's input bound.
///
/// Keeps the source's name and format. For the bound it was produced with,
/// `max(width, height)` never exceeds it and the aspect ratio matches the
/// source within integer rounding.
#[derive(Debug, Clone)]
pub struct ResizedImage {
    /// Filename inherited from the source image.
    pub name: String,
    /// Container format of `bytes`, same as the source.
    pub format: ImageFormat,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Encoded image data.
    pub bytes: Vec<u8>,
}

impl ResizedImage {
    /// Width and height in pixels.
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// MIME type of the encoded bytes.
    #[must_use]
    pub fn mime_type(&self) -> &'static str {
        self.format.to_mime_type()
    }

    /// Decode the bytes into a pixel buffer, for model implementations.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if the bytes are not a valid image in the
    /// recorded format.
    pub fn to_image(&self) -> Result<DynamicImage> {
        image::load_from_memory_with_format(&self.bytes, self.format).map_err(Error::Decode)
    }
}

/// The artifact a background removal model returns.
///
/// Encoded image data expected to carry a full alpha channel (0 background,
/// 255 foreground) at the resized dimensions. The pipeline treats the model
/// as opaque and only requires that these bytes decode.
#[derive(Debug, Clone)]
pub struct CutoutImage {
    /// Encoded image data with alpha.
    pub bytes: Vec<u8>,
}

impl CutoutImage {
    /// Wrap already-encoded cutout bytes.
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// PNG-encode an RGBA buffer, for model implementations and tests.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encode`] if PNG encoding fails.
    pub fn from_rgba(image: RgbaImage) -> Result<Self> {
        let bytes = encode_image(&DynamicImage::ImageRgba8(image), ImageFormat::Png)?;
        Ok(Self { bytes })
    }

    /// Decode the cutout into an RGBA buffer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if the bytes are not a valid image.
    pub fn to_rgba(&self) -> Result<RgbaImage> {
        Ok(image::load_from_memory(&self.bytes)
            .map_err(Error::Decode)?
            .to_rgba8())
    }
}

/// The finished cutout: a PNG with a softened alpha matte.
#[derive(Debug, Clone)]
pub struct FinalImage {
    /// Output filename, the source stem with a `.png` extension.
    pub name: String,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// PNG-encoded image data.
    pub bytes: Vec<u8>,
}

impl FinalImage {
    /// Width and height in pixels.
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Write the PNG bytes to disk.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, &self.bytes)?;
        Ok(())
    }
}

/// Encode a pixel buffer in memory with format-specific settings.
///
/// JPEG drops any alpha channel and encodes at quality 90; PNG and WebP keep
/// the full alpha channel.
///
/// # Errors
///
/// Returns [`Error::Encode`] if the codec rejects the buffer and
/// [`Error::UnsupportedFormat`] for formats outside JPEG/PNG/WebP.
pub fn encode_image(image: &DynamicImage, format: ImageFormat) -> Result<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());

    match format {
        ImageFormat::Jpeg => {
            let mut encoder =
                image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY);
            encoder
                .encode_image(&image.to_rgb8())
                .map_err(Error::Encode)?;
        }
        ImageFormat::Png | ImageFormat::WebP => {
            image.write_to(&mut buf, format).map_err(Error::Encode)?;
        }
        _ => {
            return Err(Error::UnsupportedFormat(format!("{format:?}")));
        }
    }

    Ok(buf.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn source_from_bytes_sniffs_png() {
        let img = DynamicImage::ImageRgba8(RgbaImage::new(4, 4));
        let bytes = encode_image(&img, ImageFormat::Png).unwrap();

        let source = SourceImage::from_bytes("tiny.png", bytes).unwrap();
        assert_eq!(source.format, ImageFormat::Png);
        assert_eq!(source.mime_type(), "image/png");
    }

    #[test]
    fn source_from_bytes_rejects_garbage() {
        let err = SourceImage::from_bytes("nope.bin", vec![0, 1, 2, 3]).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat(_)));
    }

    #[test]
    fn encode_image_jpeg_drops_alpha() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(3, 3, Rgba([10, 20, 30, 128])));
        let bytes = encode_image(&img, ImageFormat::Jpeg).unwrap();

        let decoded = image::load_from_memory_with_format(&bytes, ImageFormat::Jpeg).unwrap();
        assert!(!decoded.color().has_alpha());
    }

    #[test]
    fn encode_image_rejects_exotic_formats() {
        let img = DynamicImage::ImageRgba8(RgbaImage::new(2, 2));
        let err = encode_image(&img, ImageFormat::Gif).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat(_)));
    }

    #[test]
    fn cutout_keeps_alpha_through_png() {
        let mut img = RgbaImage::new(2, 2);
        img.put_pixel(0, 0, Rgba([255, 0, 0, 200]));

        let cutout = CutoutImage::from_rgba(img).unwrap();
        let back = cutout.to_rgba().unwrap();
        assert_eq!(back.get_pixel(0, 0)[3], 200);
    }
}
