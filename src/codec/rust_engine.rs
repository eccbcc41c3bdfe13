//! Pure Rust compression engine — zero external dependencies.
//!
//! Everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, WebP) | `image` crate (pure Rust decoders) |
//! | Decode (AVIF) | `avif-parse` + `rav1d` via [`super::avif`] |
//! | Resize | `image::DynamicImage::resize` with `Lanczos3` |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` (quality 1–100) |
//! | Encode → PNG | `image::codecs::png::PngEncoder` (lossless) |
//! | Encode → WebP | `image::codecs::webp::WebPEncoder` (lossless) |
//! | Encode → AVIF | `image::codecs::avif::AvifEncoder` (rav1e, speed 6) |
//!
//! The `image` crate ships no lossy WebP encoder, so the quality setting
//! applies to JPEG and AVIF output only; PNG and WebP are lossless.

use super::avif;
use super::engine::{CompressError, CompressedImage, Compressor, SourceImage};
use super::params::{CompressOptions, Quality};
use crate::formats::ImageFormat;
use image::DynamicImage;
use image::imageops::FilterType;
use std::io::Cursor;

/// Quality floor for the target-size search. Below this the output is
/// visibly broken, so the search stops and returns whatever it has.
const TARGET_SIZE_QUALITY_FLOOR: f32 = 0.05;

/// Pure Rust engine using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustCompressor;

impl RustCompressor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustCompressor {
    fn default() -> Self {
        Self::new()
    }
}

fn decoder_format(format: ImageFormat) -> image::ImageFormat {
    match format {
        ImageFormat::Jpeg => image::ImageFormat::Jpeg,
        ImageFormat::Png => image::ImageFormat::Png,
        ImageFormat::Webp => image::ImageFormat::WebP,
        ImageFormat::Avif => image::ImageFormat::Avif,
    }
}

/// Decode a source image from its in-memory bytes.
fn decode(source: &SourceImage) -> Result<DynamicImage, CompressError> {
    let format = ImageFormat::from_mime(&source.mime)
        .ok_or_else(|| CompressError::UnsupportedInput(source.mime.clone()))?;

    if format == ImageFormat::Avif {
        return avif::decode(&source.bytes)
            .map_err(|e| CompressError::Decode(source.name.clone(), e));
    }
    image::load_from_memory_with_format(&source.bytes, decoder_format(format))
        .map_err(|e| CompressError::Decode(source.name.clone(), e.to_string()))
}

/// Downscale to fit within the configured bounds, aspect ratio preserved.
/// Images already inside the bounds pass through untouched — no upscaling.
fn bound(img: DynamicImage, options: &CompressOptions) -> DynamicImage {
    let max_w = options.max_width.unwrap_or(u32::MAX);
    let max_h = options.max_height.unwrap_or(u32::MAX);
    if img.width() <= max_w && img.height() <= max_h {
        return img;
    }
    img.resize(max_w, max_h, FilterType::Lanczos3)
}

/// Encode at one specific quality.
fn encode(
    img: &DynamicImage,
    format: ImageFormat,
    quality: Quality,
) -> Result<Vec<u8>, CompressError> {
    let mut out = Vec::new();
    let writer = Cursor::new(&mut out);
    let encode_err = |e: image::ImageError| CompressError::Encode(format, e.to_string());

    match format {
        ImageFormat::Jpeg => {
            // JPEG has no alpha channel; flatten before encoding.
            let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
            let encoder =
                image::codecs::jpeg::JpegEncoder::new_with_quality(writer, quality.as_percent());
            rgb.write_with_encoder(encoder).map_err(encode_err)?;
        }
        ImageFormat::Png => {
            let encoder = image::codecs::png::PngEncoder::new(writer);
            img.write_with_encoder(encoder).map_err(encode_err)?;
        }
        ImageFormat::Webp => {
            let encoder = image::codecs::webp::WebPEncoder::new_lossless(writer);
            img.write_with_encoder(encoder).map_err(encode_err)?;
        }
        ImageFormat::Avif => {
            let encoder = image::codecs::avif::AvifEncoder::new_with_speed_quality(
                writer,
                6,
                quality.as_percent(),
            );
            img.write_with_encoder(encoder).map_err(encode_err)?;
        }
    }
    Ok(out)
}

/// Encode, stepping quality down until the payload fits `target_size_kb`
/// or the quality floor is reached. Lossless targets encode exactly once —
/// quality cannot shrink them.
fn encode_to_target(
    img: &DynamicImage,
    options: &CompressOptions,
) -> Result<Vec<u8>, CompressError> {
    let mut bytes = encode(img, options.format, options.quality)?;

    let Some(target_kb) = options.target_size_kb else {
        return Ok(bytes);
    };
    if matches!(options.format, ImageFormat::Png | ImageFormat::Webp) {
        return Ok(bytes);
    }

    let target = target_kb as usize * 1024;
    let mut quality = options.quality.value();
    while bytes.len() > target && quality > TARGET_SIZE_QUALITY_FLOOR {
        quality = (quality * 0.7).max(TARGET_SIZE_QUALITY_FLOOR);
        bytes = encode(img, options.format, Quality::new(quality))?;
    }
    Ok(bytes)
}

/// Output filename suggested for a compressed payload: source stem plus the
/// target format's canonical extension.
fn suggest_filename(source_name: &str, format: ImageFormat) -> String {
    let stem = match source_name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ if !source_name.is_empty() => source_name,
        _ => "image",
    };
    format!("{}.{}", stem, format.extension())
}

impl Compressor for RustCompressor {
    fn compress(
        &self,
        source: &SourceImage,
        options: &CompressOptions,
    ) -> Result<CompressedImage, CompressError> {
        let img = bound(decode(source)?, options);
        let bytes = encode_to_target(&img, options)?;

        Ok(CompressedImage {
            width: img.width(),
            height: img.height(),
            bytes,
            format: options.format,
            filename: suggest_filename(&source.name, options.format),
        })
    }
}
