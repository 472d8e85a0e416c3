use std::io::ErrorKind;
use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use vl_contracts::{ImageMetadata, VisionError};

pub const MAX_DIMENSION: u32 = 2048;
pub const JPEG_QUALITY: u8 = 90;
pub const CANONICAL_MIME: &str = "image/jpeg";

/// The bounded JPEG that is sent to the vision model.
#[derive(Debug, Clone)]
pub struct CanonicalImage {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Describes the source image, not the re-encoded payload (apart from
    /// `file_size`).
    pub metadata: ImageMetadata,
}

impl CanonicalImage {
    pub fn base64(&self) -> String {
        BASE64.encode(&self.bytes)
    }

    pub fn data_url(&self) -> String {
        format!("data:{CANONICAL_MIME};base64,{}", self.base64())
    }
}

pub fn normalize_file(path: &Path) -> Result<CanonicalImage, VisionError> {
    let bytes = std::fs::read(path).map_err(|err| match err.kind() {
        ErrorKind::NotFound => {
            VisionError::FileSystem(format!("file does not exist: {}", path.display()))
        }
        _ => VisionError::FileSystem(format!("failed reading {}: {err}", path.display())),
    })?;
    normalize(&bytes)
}

/// Decodes any supported image, shrinks it to fit `MAX_DIMENSION` square
/// (never enlarging) and re-encodes it as JPEG.
pub fn normalize(bytes: &[u8]) -> Result<CanonicalImage, VisionError> {
    let format = image::guess_format(bytes)
        .map_err(|err| VisionError::InvalidImage(format!("unrecognised image data: {err}")))?;
    let decoded = image::load_from_memory_with_format(bytes, format)
        .map_err(|err| VisionError::InvalidImage(format!("failed to decode image: {err}")))?;
    let (width, height) = (decoded.width(), decoded.height());

    let flattened = flatten_alpha(&decoded);
    let bounded = if width > MAX_DIMENSION || height > MAX_DIMENSION {
        flattened.resize(MAX_DIMENSION, MAX_DIMENSION, FilterType::Triangle)
    } else {
        flattened
    };
    let rgb = bounded.to_rgb8();

    let mut encoded = Vec::new();
    JpegEncoder::new_with_quality(&mut encoded, JPEG_QUALITY)
        .encode_image(&rgb)
        .map_err(|err| VisionError::InvalidImage(format!("failed to encode JPEG: {err}")))?;

    log::debug!(
        "normalized {} {}x{} -> {}x{} jpeg ({} bytes)",
        format_name(format),
        width,
        height,
        rgb.width(),
        rgb.height(),
        encoded.len()
    );

    Ok(CanonicalImage {
        width: rgb.width(),
        height: rgb.height(),
        metadata: ImageMetadata {
            format: format_name(format),
            width,
            height,
            file_size: human_size(encoded.len()),
        },
        bytes: encoded,
    })
}

pub fn format_name(format: ImageFormat) -> String {
    match format {
        ImageFormat::Png => "png".to_string(),
        ImageFormat::Jpeg => "jpeg".to_string(),
        ImageFormat::Gif => "gif".to_string(),
        ImageFormat::WebP => "webp".to_string(),
        ImageFormat::Tiff => "tiff".to_string(),
        ImageFormat::Bmp => "bmp".to_string(),
        ImageFormat::Ico => "ico".to_string(),
        other => other
            .extensions_str()
            .first()
            .map(|ext| ext.to_string())
            .unwrap_or_else(|| format!("{other:?}").to_ascii_lowercase()),
    }
}

pub fn human_size(len: usize) -> String {
    format!("{:.2} KB", len as f64 / 1024.0)
}

/// JPEG has no alpha channel; composite transparent pixels onto white.
fn flatten_alpha(image: &DynamicImage) -> DynamicImage {
    if !image.color().has_alpha() {
        return image.clone();
    }
    let rgba = image.to_rgba8();
    let mut flattened = RgbaImage::new(rgba.width(), rgba.height());
    for (x, y, pixel) in rgba.enumerate_pixels() {
        let alpha = u16::from(pixel[3]);
        let blend = |channel: u8| -> u8 {
            (((u16::from(channel) * alpha) + (255 * (255 - alpha))) / 255) as u8
        };
        flattened.put_pixel(
            x,
            y,
            Rgba([blend(pixel[0]), blend(pixel[1]), blend(pixel[2]), 255]),
        );
    }
    DynamicImage::ImageRgba8(flattened)
}

#[cfg(test)]
mod tests {
    use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
    use vl_contracts::VisionError;

    use super::{human_size, normalize, normalize_file, JPEG_QUALITY, MAX_DIMENSION};
    use crate::test_support::{encoded_image, png_bytes, write_png};

    #[test]
    fn small_png_keeps_dimensions_and_reports_source_format() -> anyhow::Result<()> {
        let canonical = normalize(&png_bytes(320, 200))?;
        assert_eq!(canonical.metadata.format, "png");
        assert_eq!((canonical.metadata.width, canonical.metadata.height), (320, 200));
        assert_eq!((canonical.width, canonical.height), (320, 200));
        assert_eq!(
            image::guess_format(&canonical.bytes)?,
            ImageFormat::Jpeg,
            "payload must be JPEG"
        );
        assert_eq!(canonical.metadata.file_size, human_size(canonical.bytes.len()));
        Ok(())
    }

    #[test]
    fn oversized_image_is_bounded_with_aspect_ratio() -> anyhow::Result<()> {
        let canonical = normalize(&png_bytes(4096, 1024))?;
        assert_eq!((canonical.width, canonical.height), (MAX_DIMENSION, 512));
        assert_eq!((canonical.metadata.width, canonical.metadata.height), (4096, 1024));

        let tall = normalize(&png_bytes(300, 3000))?;
        assert_eq!(tall.height, MAX_DIMENSION);
        assert!(tall.width <= 206 && tall.width >= 204, "{}", tall.width);
        Ok(())
    }

    #[test]
    fn canonical_output_renormalizes_without_changing_dimensions() -> anyhow::Result<()> {
        let first = normalize(&encoded_image(2048, 1536, ImageFormat::Jpeg))?;
        let second = normalize(&first.bytes)?;
        assert_eq!(second.metadata.format, "jpeg");
        assert_eq!((second.width, second.height), (first.width, first.height));
        assert_eq!((second.metadata.width, second.metadata.height), (2048, 1536));
        assert_eq!(JPEG_QUALITY, 90);
        Ok(())
    }

    #[test]
    fn tiny_images_are_not_upscaled() -> anyhow::Result<()> {
        let canonical = normalize(&png_bytes(3, 2))?;
        assert_eq!((canonical.width, canonical.height), (3, 2));
        Ok(())
    }

    #[test]
    fn transparent_pixels_become_white() -> anyhow::Result<()> {
        let transparent = DynamicImage::ImageRgba8(RgbaImage::from_pixel(8, 8, Rgba([0, 0, 0, 0])));
        let mut bytes = Vec::new();
        transparent.write_to(&mut std::io::Cursor::new(&mut bytes), ImageFormat::Png)?;

        let canonical = normalize(&bytes)?;
        let decoded = image::load_from_memory(&canonical.bytes)?.to_rgb8();
        let pixel = decoded.get_pixel(4, 4);
        assert!(pixel.0.iter().all(|channel| *channel > 240), "{pixel:?}");
        Ok(())
    }

    #[test]
    fn format_comes_from_content_not_extension() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("mislabeled.jpg");
        write_png(&path, 16, 16);
        let canonical = normalize_file(&path)?;
        assert_eq!(canonical.metadata.format, "png");
        Ok(())
    }

    #[test]
    fn garbage_bytes_are_invalid_images() {
        let err = normalize(b"definitely not an image").unwrap_err();
        assert!(matches!(err, VisionError::InvalidImage(_)), "{err}");

        let mut truncated = png_bytes(64, 64);
        truncated.truncate(40);
        assert!(matches!(
            normalize(&truncated),
            Err(VisionError::InvalidImage(_))
        ));
    }

    #[test]
    fn missing_file_is_a_file_system_error() {
        let err = normalize_file(std::path::Path::new("/no/such/dir/shot.png")).unwrap_err();
        assert!(matches!(err, VisionError::FileSystem(ref message) if message.contains("does not exist")));
    }

    #[test]
    fn data_url_uses_jpeg_mime() -> anyhow::Result<()> {
        let canonical = normalize(&png_bytes(4, 4))?;
        assert!(canonical.data_url().starts_with("data:image/jpeg;base64,"));
        Ok(())
    }

    #[test]
    fn human_size_uses_two_decimals() {
        assert_eq!(human_size(1536), "1.50 KB");
        assert_eq!(human_size(0), "0.00 KB");
    }
}
