//! Conversion of raw uploads into self-contained `data:` references.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use std::io::Cursor;
use tracing::debug;

use crate::error::{ImageError, ImageResult};
use crate::formats::ImageFormat;

/// Encode bytes as a `data:<mime>;base64,` reference.
pub fn to_data_url(bytes: &[u8], format: ImageFormat) -> String {
    format!("data:{};base64,{}", format.mime(), STANDARD.encode(bytes))
}

/// Split a base64 `data:` reference back into content type and bytes.
pub fn decode_data_url(url: &str) -> Option<(String, Vec<u8>)> {
    let rest = url.strip_prefix("data:")?;
    let (header, data) = rest.split_once(',')?;
    let mime = header.strip_suffix(";base64")?;
    let bytes = STANDARD.decode(data).ok()?;
    Some((mime.to_string(), bytes))
}

/// Downscale an image so that neither edge exceeds `max_dimension`,
/// preserving aspect ratio and format. Returns `None` when it already fits.
pub fn downscale(bytes: &[u8], format: ImageFormat, max_dimension: u32) -> ImageResult<Option<Vec<u8>>> {
    let img = image::load_from_memory_with_format(bytes, format.codec())
        .map_err(|e| ImageError::Encoding(format!("Failed to decode image: {}", e)))?;
    let (width, height) = img.dimensions();
    if width <= max_dimension && height <= max_dimension {
        return Ok(None);
    }

    let resized = img.resize(max_dimension, max_dimension, FilterType::Triangle);
    // The JPEG encoder rejects alpha channels
    let resized = match format {
        ImageFormat::Jpeg => DynamicImage::ImageRgb8(resized.to_rgb8()),
        _ => resized,
    };

    let mut out = Cursor::new(Vec::new());
    resized
        .write_to(&mut out, format.codec())
        .map_err(|e| ImageError::Encoding(format!("Failed to re-encode image: {}", e)))?;

    debug!(
        from = ?(width, height),
        to = ?resized.dimensions(),
        "Downscaled image before storage"
    );
    Ok(Some(out.into_inner()))
}

/// Produce the self-contained representation off the async executor so that
/// other tasks keep running while a large payload is encoded.
pub async fn encode_payload(
    bytes: Vec<u8>,
    format: ImageFormat,
    max_dimension: Option<u32>,
) -> ImageResult<String> {
    tokio::task::spawn_blocking(move || {
        let bytes = match max_dimension {
            Some(max) => downscale(&bytes, format, max)?.unwrap_or(bytes),
            None => bytes,
        };
        Ok(to_data_url(&bytes, format))
    })
    .await
    .map_err(|e| ImageError::Encoding(format!("Encoding task failed: {}", e)))?
}
