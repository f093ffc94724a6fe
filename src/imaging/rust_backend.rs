//! Pure Rust image transform backend. No system libraries.
//!
//! Everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, TIFF, WebP) | `image::ImageReader` with content sniffing |
//! | Orientation | `ImageDecoder::orientation` + `DynamicImage::apply_orientation` |
//! | Cover crop | `DynamicImage::crop_imm` of the target-aspect region at the gravity offset |
//! | Resize | `DynamicImage::resize_exact` with `Lanczos3` |
//! | Encode → JPEG / AVIF | `JpegEncoder` / `AvifEncoder` (rav1e, speed 6) at the variant quality |
//! | Encode → PNG / WebP / TIFF | lossless encoders |
//! | ICC profile | read from the decoder, re-attached only when `strip = false` |
//!
//! Encoders write straight into the caller's writer. TIFF is the exception:
//! its encoder needs `Seek`, so TIFF output is assembled in memory first.
//!
//! EXIF is never copied to the output: re-encoding from pixels drops it, and
//! orientation is baked into the pixels before encoding.

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::calculations::{Geometry, plan_geometry};
use super::params::{OutputFormat, Quality, VariantSpec};
use image::codecs::avif::AvifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::tiff::TiffEncoder;
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::metadata::Orientation;
use image::{DynamicImage, ImageDecoder, ImageEncoder, ImageError, ImageReader};
use std::io::{Cursor, Write};

/// AVIF encoder speed (1 = slowest/best, 10 = fastest).
const AVIF_SPEED: u8 = 6;

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Decoded, orientation-corrected pixels plus the profile to carry over.
struct Decoded {
    image: DynamicImage,
    icc_profile: Option<Vec<u8>>,
}

fn decode_error(e: ImageError) -> BackendError {
    match e {
        ImageError::IoError(io) => BackendError::Io(io),
        other => BackendError::Decode(other.to_string()),
    }
}

fn open_decoder(input: &[u8]) -> Result<impl ImageDecoder + '_, BackendError> {
    let reader = ImageReader::new(Cursor::new(input)).with_guessed_format()?;
    if reader.format().is_none() {
        return Err(BackendError::Decode("unrecognized image format".into()));
    }
    reader.into_decoder().map_err(decode_error)
}

/// Decode `input` and bake its EXIF orientation into the pixels.
fn load_image(input: &[u8], keep_icc: bool) -> Result<Decoded, BackendError> {
    let mut decoder = open_decoder(input)?;
    let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);
    let icc_profile = if keep_icc {
        decoder.icc_profile().ok().flatten()
    } else {
        None
    };

    let mut image = DynamicImage::from_decoder(decoder).map_err(decode_error)?;
    image.apply_orientation(orientation);

    Ok(Decoded { image, icc_profile })
}

/// Whether an orientation swaps the width and height axes.
fn swaps_axes(orientation: Orientation) -> bool {
    matches!(
        orientation,
        Orientation::Rotate90
            | Orientation::Rotate270
            | Orientation::Rotate90FlipH
            | Orientation::Rotate270FlipH
    )
}

fn oriented_dimensions((width, height): (u32, u32), orientation: Orientation) -> Dimensions {
    if swaps_axes(orientation) {
        Dimensions {
            width: height,
            height: width,
        }
    } else {
        Dimensions { width, height }
    }
}

fn apply_geometry(image: DynamicImage, geometry: Geometry) -> DynamicImage {
    match geometry {
        Geometry::Keep => image,
        Geometry::Scale { width, height } => {
            image.resize_exact(width, height, FilterType::Lanczos3)
        }
        Geometry::CropScale {
            offset,
            region,
            size,
        } => image
            .crop_imm(offset.0, offset.1, region.0, region.1)
            .resize_exact(size.0, size.1, FilterType::Lanczos3),
    }
}

/// Convert pixels into a layout the target encoder accepts.
fn prepare_pixels(image: DynamicImage, format: OutputFormat) -> DynamicImage {
    match format {
        // JPEG has no alpha channel and no 16-bit mode
        OutputFormat::Jpeg => DynamicImage::ImageRgb8(image.to_rgb8()),
        OutputFormat::WebP | OutputFormat::Avif => {
            if image.color().has_alpha() {
                DynamicImage::ImageRgba8(image.to_rgba8())
            } else {
                DynamicImage::ImageRgb8(image.to_rgb8())
            }
        }
        OutputFormat::Png | OutputFormat::Tiff => {
            if matches!(
                image,
                DynamicImage::ImageRgb32F(_) | DynamicImage::ImageRgba32F(_)
            ) {
                DynamicImage::ImageRgba16(image.to_rgba16())
            } else {
                image
            }
        }
    }
}

fn encode_error(format: OutputFormat, e: ImageError) -> BackendError {
    match e {
        ImageError::IoError(io) => BackendError::Io(io),
        other => BackendError::Encode {
            format: format.media_type(),
            message: other.to_string(),
        },
    }
}

fn encode_with(
    image: &DynamicImage,
    mut encoder: impl ImageEncoder,
    icc_profile: Option<Vec<u8>>,
    format: OutputFormat,
) -> Result<(), BackendError> {
    if let Some(profile) = icc_profile
        && encoder.set_icc_profile(profile).is_err()
    {
        tracing::debug!(%format, "encoder cannot embed ICC profiles, dropping");
    }
    image
        .write_with_encoder(encoder)
        .map_err(|e| encode_error(format, e))
}

/// Whether the variant asks for a quality its format's encoder cannot honour.
fn quality_ignored(spec: &VariantSpec) -> bool {
    spec.format == OutputFormat::WebP && spec.quality != Quality::default()
}

/// Encode `image` as the variant's format into `output`.
fn save_image(
    image: &DynamicImage,
    spec: &VariantSpec,
    icc_profile: Option<Vec<u8>>,
    output: &mut dyn Write,
) -> Result<(), BackendError> {
    let format = spec.format;
    let quality = spec.quality.encoder_value();
    match format {
        OutputFormat::Jpeg => encode_with(
            image,
            JpegEncoder::new_with_quality(output, quality),
            icc_profile,
            format,
        ),
        OutputFormat::Png => encode_with(image, PngEncoder::new(output), icc_profile, format),
        OutputFormat::WebP => {
            if quality_ignored(spec) {
                tracing::debug!(
                    variant = %spec.name,
                    quality = spec.quality.value(),
                    "WebP output is lossless, ignoring quality"
                );
            }
            encode_with(
                image,
                WebPEncoder::new_lossless(output),
                icc_profile,
                format,
            )
        }
        OutputFormat::Avif => encode_with(
            image,
            AvifEncoder::new_with_speed_quality(output, AVIF_SPEED, quality),
            icc_profile,
            format,
        ),
        OutputFormat::Tiff => {
            let mut buffer = Cursor::new(Vec::new());
            encode_with(image, TiffEncoder::new(&mut buffer), icc_profile, format)?;
            output.write_all(buffer.get_ref())?;
            Ok(())
        }
    }
}

impl ImageBackend for RustBackend {
    fn identify(&self, input: &[u8]) -> Result<Dimensions, BackendError> {
        let mut decoder = open_decoder(input)?;
        let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);
        Ok(oriented_dimensions(decoder.dimensions(), orientation))
    }

    fn transform(
        &self,
        input: &[u8],
        spec: &VariantSpec,
        output: &mut dyn Write,
    ) -> Result<Dimensions, BackendError> {
        let Decoded { image, icc_profile } = load_image(input, !spec.strip)?;

        let geometry = plan_geometry(
            (image.width(), image.height()),
            spec.resize,
            (spec.width, spec.height),
            spec.gravity,
            spec.enlarge,
        );
        let image = prepare_pixels(apply_geometry(image, geometry), spec.format);

        save_image(&image, spec, icc_profile, output)?;
        output.flush()?;

        Ok(Dimensions {
            width: image.width(),
            height: image.height(),
        })
    }
}
