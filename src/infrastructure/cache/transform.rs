//! Decode and downscale stage for fetched images.

use std::io::Cursor;

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat};
use tracing::debug;

use crate::domain::errors::{CacheError, CacheResult};

/// Default bound on either pixel dimension of a persisted image.
pub const DEFAULT_MAX_DIMENSION: u32 = 1024;

/// Default JPEG quality used when re-encoding downscaled images.
pub const DEFAULT_JPEG_QUALITY: u8 = 85;

/// Output of [`ImageTransform::prepare`].
#[derive(Debug, Clone)]
pub struct Prepared {
    /// The image exactly as decoded from the network.
    pub original: DynamicImage,
    /// Bytes to persist: the downloaded bytes, or a re-encoded downscale.
    pub persisted: Bytes,
    /// True if `persisted` holds a downscaled copy.
    pub downscaled: bool,
}

/// Bounds the on-disk footprint of cached images.
///
/// Oversized images are resized to fit within `max_dimension` on both axes,
/// keeping their aspect ratio, and re-encoded. Images with an alpha channel
/// become PNG, everything else JPEG. Images already within bounds are
/// persisted byte-for-byte.
#[derive(Debug, Clone, Copy)]
pub struct ImageTransform {
    max_dimension: u32,
    jpeg_quality: u8,
}

impl ImageTransform {
    /// Creates a transform. A zero dimension is treated as 1 and quality is
    /// clamped to `1..=100`.
    #[must_use]
    pub fn new(max_dimension: u32, jpeg_quality: u8) -> Self {
        Self {
            max_dimension: max_dimension.max(1),
            jpeg_quality: jpeg_quality.clamp(1, 100),
        }
    }

    /// Returns the dimension bound.
    #[must_use]
    pub const fn max_dimension(&self) -> u32 {
        self.max_dimension
    }

    /// Returns true if an image of this size is persisted unchanged.
    #[must_use]
    pub const fn fits(&self, width: u32, height: u32) -> bool {
        width <= self.max_dimension && height <= self.max_dimension
    }

    /// Decodes image bytes, guessing the format from content.
    ///
    /// # Errors
    /// Returns [`CacheError::DecodeFailure`] if the bytes are not an image.
    pub fn decode(bytes: &[u8]) -> CacheResult<DynamicImage> {
        image::load_from_memory(bytes)
            .map_err(|e| CacheError::decode(format!("Failed to decode image: {e}")))
    }

    /// Decodes downloaded bytes and works out what to persist.
    ///
    /// CPU-bound; run it on a blocking thread.
    ///
    /// # Errors
    /// Returns [`CacheError::DecodeFailure`] if decoding or re-encoding fails.
    pub fn prepare(&self, bytes: Bytes) -> CacheResult<Prepared> {
        let original = Self::decode(&bytes)?;
        let (width, height) = original.dimensions();

        if self.fits(width, height) {
            return Ok(Prepared {
                original,
                persisted: bytes,
                downscaled: false,
            });
        }

        let resized = original.resize(self.max_dimension, self.max_dimension, FilterType::Lanczos3);
        debug!(
            from_width = width,
            from_height = height,
            to_width = resized.width(),
            to_height = resized.height(),
            "Downscaled oversized image"
        );

        let persisted = self.encode(&resized)?;
        Ok(Prepared {
            original,
            persisted: Bytes::from(persisted),
            downscaled: true,
        })
    }

    fn encode(&self, img: &DynamicImage) -> CacheResult<Vec<u8>> {
        let mut buf = Vec::new();
        if img.color().has_alpha() {
            img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
                .map_err(|e| CacheError::decode(format!("Failed to encode PNG: {e}")))?;
        } else {
            let mut encoder = JpegEncoder::new_with_quality(&mut buf, self.jpeg_quality);
            encoder
                .encode_image(&img.to_rgb8())
                .map_err(|e| CacheError::decode(format!("Failed to encode JPEG: {e}")))?;
        }
        Ok(buf)
    }
}

impl Default for ImageTransform {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DIMENSION, DEFAULT_JPEG_QUALITY)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Encodes a solid image of the given size as PNG.
    pub(crate) fn png_bytes(width: u32, height: u32, alpha: bool) -> Bytes {
        let img = if alpha {
            DynamicImage::new_rgba8(width, height)
        } else {
            DynamicImage::new_rgb8(width, height)
        };
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        Bytes::from(buf)
    }

    #[test]
    fn test_small_image_persisted_verbatim() {
        let transform = ImageTransform::new(64, 85);
        let bytes = png_bytes(32, 16, false);

        let prepared = transform.prepare(bytes.clone()).unwrap();

        assert!(!prepared.downscaled);
        assert_eq!(prepared.persisted, bytes);
        assert_eq!(prepared.original.dimensions(), (32, 16));
    }

    #[test]
    fn test_boundary_size_not_downscaled() {
        let transform = ImageTransform::new(64, 85);
        let prepared = transform.prepare(png_bytes(64, 64, false)).unwrap();
        assert!(!prepared.downscaled);
    }

    #[test]
    fn test_wide_image_downscaled_preserving_aspect() {
        let transform = ImageTransform::new(64, 85);

        let prepared = transform.prepare(png_bytes(300, 100, false)).unwrap();

        assert!(prepared.downscaled);
        assert_eq!(prepared.original.dimensions(), (300, 100));

        let stored = ImageTransform::decode(&prepared.persisted).unwrap();
        let (w, h) = stored.dimensions();
        assert!(w <= 64 && h <= 64);
        assert_eq!(w, 64);
        let ratio = f64::from(w) / f64::from(h);
        assert!((ratio - 3.0).abs() < 0.1, "ratio {ratio}");
        assert_eq!(
            image::guess_format(&prepared.persisted).unwrap(),
            ImageFormat::Jpeg
        );
    }

    #[test]
    fn test_tall_image_downscaled() {
        let transform = ImageTransform::new(64, 85);

        let prepared = transform.prepare(png_bytes(50, 200, false)).unwrap();
        let stored = ImageTransform::decode(&prepared.persisted).unwrap();

        assert_eq!(stored.height(), 64);
        assert!(stored.width() <= 64);
        let ratio = f64::from(stored.width()) / f64::from(stored.height());
        assert!((ratio - 0.25).abs() < 0.05, "ratio {ratio}");
    }

    #[test]
    fn test_alpha_image_reencoded_as_png() {
        let transform = ImageTransform::new(32, 85);

        let prepared = transform.prepare(png_bytes(128, 128, true)).unwrap();

        assert_eq!(
            image::guess_format(&prepared.persisted).unwrap(),
            ImageFormat::Png
        );
        let stored = ImageTransform::decode(&prepared.persisted).unwrap();
        assert_eq!(stored.dimensions(), (32, 32));
    }

    #[test]
    fn test_garbage_is_decode_failure() {
        let err = ImageTransform::default()
            .prepare(Bytes::from_static(b"<html>not an image</html>"))
            .unwrap_err();
        assert!(matches!(err, CacheError::DecodeFailure(_)));
    }
}
