use std::io::Cursor;
use std::time::Instant;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilterType, PngEncoder};
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::metadata::Orientation;
use image::{DynamicImage, GenericImageView, ImageDecoder, ImageError, ImageReader};
use thiserror::Error;
use tracing::{debug, warn};

use super::{AssetClassPolicy, ImageKind};

/// Size constraints for a re-encode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompressionTarget {
    /// Longest edge in pixels.
    pub max_dimension: u32,
    /// Encoder quality in `(0, 1]`. Only JPEG is lossy; PNG and WebP ignore it.
    pub quality: f32,
}

impl CompressionTarget {
    fn jpeg_quality(&self) -> u8 {
        (self.quality.clamp(0.01, 1.0) * 100.0).round().clamp(1.0, 100.0) as u8
    }
}

#[derive(Debug, Error)]
pub enum CompressError {
    #[error("failed to decode image: {0}")]
    Decode(#[source] ImageError),

    #[error("failed to encode image: {0}")]
    Encode(#[source] ImageError),

    #[error("{0} images are stored as uploaded")]
    Unsupported(ImageKind),
}

/// Re-encoded image data.
#[derive(Debug, Clone)]
pub struct Compressed {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Result of the conditional compression step. Every variant carries the
/// bytes that should be stored.
#[derive(Debug, Clone)]
pub enum CompressionOutcome {
    /// Input was at or below the threshold.
    Skipped { bytes: Vec<u8> },
    /// Input was re-encoded to a smaller payload.
    Compressed {
        bytes: Vec<u8>,
        width: u32,
        height: u32,
        original_size: u64,
    },
    /// Re-encode produced a payload at least as large as the input.
    NotSmaller { bytes: Vec<u8> },
    /// Re-encode failed; original bytes kept.
    Failed { bytes: Vec<u8>, reason: String },
}

impl CompressionOutcome {
    pub fn bytes(&self) -> &[u8] {
        match self {
            Self::Skipped { bytes }
            | Self::Compressed { bytes, .. }
            | Self::NotSmaller { bytes }
            | Self::Failed { bytes, .. } => bytes,
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Self::Skipped { bytes }
            | Self::Compressed { bytes, .. }
            | Self::NotSmaller { bytes }
            | Self::Failed { bytes, .. } => bytes,
        }
    }

    /// Output dimensions, known only when the image was re-encoded.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        match self {
            Self::Compressed { width, height, .. } => Some((*width, *height)),
            _ => None,
        }
    }

    pub fn was_compressed(&self) -> bool {
        matches!(self, Self::Compressed { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Skipped { .. } => "skipped",
            Self::Compressed { .. } => "compressed",
            Self::NotSmaller { .. } => "not_smaller",
            Self::Failed { .. } => "failed",
        }
    }
}

/// Decode, downsize if the longer edge exceeds the target, and re-encode in
/// the source format. Aspect ratio is preserved.
///
/// The EXIF orientation is applied to the pixels first, since the re-encoded
/// output carries no metadata.
pub fn compress_image(
    bytes: &[u8],
    kind: ImageKind,
    target: CompressionTarget,
) -> Result<Compressed, CompressError> {
    if kind == ImageKind::Gif {
        return Err(CompressError::Unsupported(kind));
    }

    let decoded = decode_upright(bytes, kind).map_err(CompressError::Decode)?;

    let img = if decoded.width().max(decoded.height()) > target.max_dimension {
        decoded.resize(target.max_dimension, target.max_dimension, FilterType::Lanczos3)
    } else {
        decoded
    };

    let mut out = Vec::with_capacity(bytes.len() / 2);
    match kind {
        ImageKind::Jpeg => DynamicImage::ImageRgb8(img.to_rgb8())
            .write_with_encoder(JpegEncoder::new_with_quality(&mut out, target.jpeg_quality())),
        ImageKind::Png => img.write_with_encoder(PngEncoder::new_with_quality(
            &mut out,
            CompressionType::Best,
            PngFilterType::Adaptive,
        )),
        ImageKind::Webp => DynamicImage::ImageRgba8(img.to_rgba8())
            .write_with_encoder(WebPEncoder::new_lossless(&mut out)),
        ImageKind::Gif => return Err(CompressError::Unsupported(kind)),
    }
    .map_err(CompressError::Encode)?;

    Ok(Compressed {
        bytes: out,
        width: img.width(),
        height: img.height(),
    })
}

fn decode_upright(bytes: &[u8], kind: ImageKind) -> Result<DynamicImage, ImageError> {
    let mut decoder = ImageReader::with_format(Cursor::new(bytes), kind.image_format()).into_decoder()?;
    let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);
    let mut img = DynamicImage::from_decoder(decoder)?;
    img.apply_orientation(orientation);
    Ok(img)
}

fn swaps_axes(orientation: Orientation) -> bool {
    matches!(
        orientation,
        Orientation::Rotate90
            | Orientation::Rotate270
            | Orientation::Rotate90FlipH
            | Orientation::Rotate270FlipH
    )
}

/// Displayed width and height, read from the image header without decoding
/// pixels. Quarter-turn EXIF orientations swap the stored axes.
pub fn read_dimensions(bytes: &[u8], kind: ImageKind) -> Option<(u32, u32)> {
    let mut decoder = ImageReader::with_format(Cursor::new(bytes), kind.image_format())
        .into_decoder()
        .ok()?;
    let (width, height) = decoder.dimensions();
    let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);
    Some(if swaps_axes(orientation) {
        (height, width)
    } else {
        (width, height)
    })
}

/// Compress only when the input exceeds the policy threshold.
///
/// Never fails: any problem falls back to the original bytes, and so does an
/// output that is not strictly smaller than the input.
pub fn maybe_compress(bytes: Vec<u8>, kind: ImageKind, policy: &AssetClassPolicy) -> CompressionOutcome {
    let original_size = bytes.len() as u64;
    if original_size <= policy.compress_threshold_bytes {
        return CompressionOutcome::Skipped { bytes };
    }

    let started = Instant::now();
    match compress_image(&bytes, kind, policy.target()) {
        Ok(compressed) if (compressed.bytes.len() as u64) < original_size => {
            debug!(
                original_size,
                compressed_size = compressed.bytes.len(),
                width = compressed.width,
                height = compressed.height,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Compressed image"
            );
            CompressionOutcome::Compressed {
                bytes: compressed.bytes,
                width: compressed.width,
                height: compressed.height,
                original_size,
            }
        }
        Ok(compressed) => {
            debug!(
                original_size,
                compressed_size = compressed.bytes.len(),
                "Re-encoded image was not smaller, keeping original"
            );
            CompressionOutcome::NotSmaller { bytes }
        }
        Err(e) => {
            warn!(error = %e, %kind, original_size, "Image compression failed, keeping original");
            CompressionOutcome::Failed {
                bytes,
                reason: e.to_string(),
            }
        }
    }
}
