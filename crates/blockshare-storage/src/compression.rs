//! Image compression before pinning.
//!
//! Large images are downscaled and re-encoded as JPEG on a blocking worker.
//! Failure is reported; callers never fall back to the original bytes.

use std::io::Cursor;

use async_trait::async_trait;
use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageReader};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

use blockshare_core::DriveError;

pub const JPEG_MIME: &str = "image/jpeg";

/// Errors raised while compressing
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompressionError {
    #[error("could not decode image: {0}")]
    Decode(String),

    #[error("could not encode image: {0}")]
    Encode(String),

    #[error("compression worker failed: {0}")]
    Worker(String),
}

impl From<CompressionError> for DriveError {
    fn from(e: CompressionError) -> Self {
        DriveError::Unknown(format!("Compression failed: {e}"))
    }
}

/// When and how hard to compress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionPolicy {
    /// Files at or below this size are pinned unchanged.
    pub threshold_bytes: u64,
    /// Longest edge after downscaling.
    pub max_dimension: u32,
    /// Size the re-encode aims for.
    pub target_bytes: u64,
    pub initial_quality: u8,
    pub min_quality: u8,
    pub quality_step: u8,
}

impl Default for CompressionPolicy {
    fn default() -> Self {
        Self {
            threshold_bytes: 1024 * 1024,
            max_dimension: 1920,
            target_bytes: 1024 * 1024,
            initial_quality: 85,
            min_quality: 40,
            quality_step: 10,
        }
    }
}

impl CompressionPolicy {
    /// Compression applies to `image/*` files above the threshold.
    pub fn applies_to(&self, size: u64, mime: &str) -> bool {
        size > self.threshold_bytes && mime.starts_with("image/")
    }
}

/// Compressed output.
#[derive(Debug, Clone)]
pub struct Compressed {
    pub bytes: Bytes,
    pub mime: String,
    pub width: u32,
    pub height: u32,
    pub quality: u8,
}

/// Something that can shrink a file before upload.
#[async_trait]
pub trait Compressor: Send + Sync {
    fn policy(&self) -> &CompressionPolicy;

    async fn compress(&self, input: Bytes) -> Result<Compressed, CompressionError>;
}

/// JPEG re-encoder backed by the `image` crate.
#[derive(Debug, Clone, Default)]
pub struct ImageCompressor {
    policy: CompressionPolicy,
}

impl ImageCompressor {
    pub fn new(policy: CompressionPolicy) -> Self {
        Self { policy }
    }
}

#[async_trait]
impl Compressor for ImageCompressor {
    fn policy(&self) -> &CompressionPolicy {
        &self.policy
    }

    #[instrument(skip(self, input), fields(size = input.len()))]
    async fn compress(&self, input: Bytes) -> Result<Compressed, CompressionError> {
        let policy = self.policy;
        tokio::task::spawn_blocking(move || compress_blocking(&input, &policy))
            .await
            .map_err(|e| CompressionError::Worker(e.to_string()))?
    }
}

fn compress_blocking(input: &[u8], policy: &CompressionPolicy) -> Result<Compressed, CompressionError> {
    let image = ImageReader::new(Cursor::new(input))
        .with_guessed_format()
        .map_err(|e| CompressionError::Decode(e.to_string()))?
        .decode()
        .map_err(|e| CompressionError::Decode(e.to_string()))?;

    let (width, height) = image.dimensions();
    let image = if width.max(height) > policy.max_dimension {
        image.resize(policy.max_dimension, policy.max_dimension, FilterType::Triangle)
    } else {
        image
    };
    let rgb = DynamicImage::ImageRgb8(image.to_rgb8());
    let (width, height) = rgb.dimensions();

    let mut quality = policy.initial_quality.clamp(1, 100);
    loop {
        let encoded = encode_jpeg(&rgb, quality)?;
        let done = encoded.len() as u64 <= policy.target_bytes
            || quality <= policy.min_quality
            || policy.quality_step == 0;
        if done {
            debug!(
                original = input.len(),
                compressed = encoded.len(),
                quality,
                width,
                height,
                "Image compressed"
            );
            return Ok(Compressed {
                bytes: Bytes::from(encoded),
                mime: JPEG_MIME.to_string(),
                width,
                height,
                quality,
            });
        }
        quality = quality
            .saturating_sub(policy.quality_step)
            .max(policy.min_quality);
    }
}

fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<Vec<u8>, CompressionError> {
    let mut buf = Vec::new();
    image
        .write_with_encoder(JpegEncoder::new_with_quality(&mut buf, quality))
        .map_err(|e| CompressionError::Encode(e.to_string()))?;
    Ok(buf)
}

/// Swap a file name's extension for `.jpg` after re-encoding.
pub fn jpeg_file_name(name: &str) -> String {
    match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => format!("{stem}.jpg"),
        _ => format!("{name}.jpg"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, RgbImage};

    fn noisy_png(width: u32, height: u32) -> Bytes {
        let mut seed = 0x2545_f491_u32;
        let img = RgbImage::from_fn(width, height, |_, _| {
            seed ^= seed << 13;
            seed ^= seed >> 17;
            seed ^= seed << 5;
            let [r, g, b, _] = seed.to_le_bytes();
            image::Rgb([r, g, b])
        });
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        Bytes::from(out.into_inner())
    }

    #[test]
    fn test_policy_applies_to_large_images_only() {
        let policy = CompressionPolicy::default();
        assert!(policy.applies_to(2 * 1024 * 1024, "image/png"));
        assert!(!policy.applies_to(1024 * 1024, "image/png"));
        assert!(!policy.applies_to(2 * 1024 * 1024, "application/pdf"));
    }

    #[test]
    fn test_jpeg_file_name() {
        assert_eq!(jpeg_file_name("photo.png"), "photo.jpg");
        assert_eq!(jpeg_file_name("archive.tar.gz"), "archive.tar.jpg");
        assert_eq!(jpeg_file_name("noext"), "noext.jpg");
        assert_eq!(jpeg_file_name(".hidden"), ".hidden.jpg");
    }

    #[tokio::test]
    async fn test_large_image_is_downscaled() {
        let input = noisy_png(2400, 1200);
        assert!(input.len() as u64 > CompressionPolicy::default().threshold_bytes);

        let out = ImageCompressor::default().compress(input.clone()).await.unwrap();
        assert_eq!(out.mime, JPEG_MIME);
        assert_eq!((out.width, out.height), (1920, 960));
        assert!(out.bytes.len() < input.len());
    }

    #[tokio::test]
    async fn test_undecodable_input_fails() {
        let err = ImageCompressor::default()
            .compress(Bytes::from_static(b"definitely not an image"))
            .await
            .unwrap_err();
        assert!(matches!(err, CompressionError::Decode(_)));
    }
}
