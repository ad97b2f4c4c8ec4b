//! Image derivation pipeline
//!
//! Turns an uploaded source image into everything the blog needs: a resized
//! canonical rendition re-encoded as WebP, a set of responsive
//! transformation URLs, a thumbnail URL and an inline blurred placeholder.
//!
//! Decode/resize/encode is CPU-bound and runs on the blocking thread pool;
//! any failure is terminal for the upload and nothing is persisted.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use bytes::Bytes;
use image::codecs::webp::{WebPEncoder, WebPQuality};
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat};
use std::sync::Arc;
use tracing::debug;

use crate::error::{AppError, Result};
use crate::models::ResponsiveUrl;
use crate::services::cloudinary::TransformUrlBuilder;

pub const DEFAULT_MAX_WIDTH: u32 = 2400;
pub const DEFAULT_WIDTHS: [u32; 4] = [512, 718, 1024, 1280];
pub const DEFAULT_QUALITY: u8 = 70;

const THUMBNAIL_WIDTH: u32 = 250;
const THUMBNAIL_QUALITY: u8 = 70;
const PLACEHOLDER_WIDTH: u32 = 100;
const PLACEHOLDER_QUALITY: u8 = 30;
const PLACEHOLDER_BLUR_SIGMA: f32 = 1.5;

/// Caller-supplied derivation parameters.
#[derive(Clone, Debug)]
pub struct DerivationOptions {
    /// Maximum canonical width; wider sources are scaled down, narrower
    /// ones pass through unchanged (no upscaling).
    pub max_width: u32,
    /// Target responsive widths, order preserved in the output.
    pub widths: Vec<u32>,
    /// Quality factor for the canonical encode and the transformation URLs.
    pub quality: u8,
    /// Destination folder at the image host.
    pub folder: String,
    /// Base asset name at the image host.
    pub name: String,
}

/// Everything derived from one source image.
#[derive(Debug)]
pub struct DerivedImage {
    /// Canonical WebP bytes handed to the image host.
    pub canonical: Bytes,
    /// Canonical bytes as a base64 data URL (the host upload format).
    pub data_url: String,
    pub width: u32,
    pub height: u32,
    pub responsive_urls: Vec<ResponsiveUrl>,
    pub thumbnail_url: String,
    /// Small blurred copy inlined as a data URL; renderable without a
    /// further network round-trip.
    pub placeholder_data_url: String,
}

pub struct DerivationPipeline {
    urls: TransformUrlBuilder,
}

impl DerivationPipeline {
    pub fn new(urls: TransformUrlBuilder) -> Self {
        Self { urls }
    }

    /// Explicit mapping from declared MIME type to decoder format.
    /// Anything not in the table fails closed.
    ///
    /// AVIF passes the MIME check but decoding it requires the
    /// `avif-decoder` feature of `image`, which links the system dav1d
    /// library and is not enabled; an AVIF body therefore fails at the
    /// decode step and the upload is rejected with 400.
    pub fn format_for_mime(content_type: &str) -> Option<ImageFormat> {
        match content_type.to_ascii_lowercase().as_str() {
            "image/jpeg" | "image/jpg" => Some(ImageFormat::Jpeg),
            "image/png" => Some(ImageFormat::Png),
            "image/webp" => Some(ImageFormat::WebP),
            "image/avif" => Some(ImageFormat::Avif),
            _ => None,
        }
    }

    /// Run the full derivation (blocking version).
    ///
    /// **Note:** CPU-intensive; call `derive_async` from request handlers.
    pub fn derive(
        &self,
        source: &[u8],
        content_type: &str,
        options: &DerivationOptions,
    ) -> Result<DerivedImage> {
        let format = Self::format_for_mime(content_type)
            .ok_or_else(|| AppError::UnsupportedMediaType(content_type.to_string()))?;

        let img = image::load_from_memory_with_format(source, format)
            .map_err(|e| AppError::Validation(format!("failed to decode image: {e}")))?;

        let (source_w, source_h) = img.dimensions();
        debug!(
            source_width = source_w,
            source_height = source_h,
            "deriving image renditions"
        );

        let (canon_w, canon_h) = scaled_dimensions(source_w, source_h, options.max_width);
        let canonical_img = if canon_w == source_w {
            img.clone()
        } else {
            img.resize_exact(canon_w.max(1), canon_h.max(1), FilterType::Triangle)
        };
        let canonical = encode_webp(&canonical_img, options.quality)?;
        let data_url = to_data_url(&canonical);

        let path = format!("{}/{}", options.folder, options.name);
        let responsive_urls = self
            .urls
            .responsive_urls(&options.widths, options.quality, &path);
        let thumbnail_url = self
            .urls
            .transform_url(THUMBNAIL_WIDTH, THUMBNAIL_QUALITY, None, &path);

        let placeholder_data_url = build_placeholder(&img)?;

        debug!(
            width = canon_w,
            height = canon_h,
            size = canonical.len(),
            renditions = responsive_urls.len(),
            "image derivation complete"
        );

        Ok(DerivedImage {
            canonical: Bytes::from(canonical),
            data_url,
            width: canon_w,
            height: canon_h,
            responsive_urls,
            thumbnail_url,
            placeholder_data_url,
        })
    }

    /// Run the derivation on the blocking thread pool.
    pub async fn derive_async(
        self: Arc<Self>,
        source: Bytes,
        content_type: String,
        options: DerivationOptions,
    ) -> Result<DerivedImage> {
        let pipeline = self.clone();
        tokio::task::spawn_blocking(move || pipeline.derive(&source, &content_type, &options))
            .await
            .map_err(|e| AppError::Internal(format!("derivation task panicked: {e}")))?
    }
}

/// Proportional resize rule shared by the canonical and placeholder steps:
/// sources at or below `max_width` keep their dimensions, wider sources are
/// scaled so width == max_width with the height rounded to nearest.
pub fn scaled_dimensions(width: u32, height: u32, max_width: u32) -> (u32, u32) {
    if width <= max_width {
        return (width, height);
    }
    let ratio = max_width as f64 / width as f64;
    (max_width, ((height as f64) * ratio).round() as u32)
}

fn encode_webp(img: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
    let rgb = img.to_rgb8();
    let mut buf = Vec::new();
    let encoder = WebPEncoder::new_with_quality(&mut buf, WebPQuality::lossy(quality));
    encoder
        .encode(rgb.as_raw(), rgb.width(), rgb.height(), image::ColorType::Rgb8)
        .map_err(|e| AppError::Internal(format!("failed to encode webp: {e}")))?;
    Ok(buf)
}

fn to_data_url(webp_bytes: &[u8]) -> String {
    format!("data:image/webp;base64,{}", BASE64.encode(webp_bytes))
}

fn build_placeholder(img: &DynamicImage) -> Result<String> {
    let (w, h) = img.dimensions();
    let (pw, ph) = scaled_dimensions(w, h, PLACEHOLDER_WIDTH);
    let small = img
        .resize_exact(pw.max(1), ph.max(1), FilterType::Triangle)
        .blur(PLACEHOLDER_BLUR_SIGMA);
    let encoded = encode_webp(&small, PLACEHOLDER_QUALITY)?;
    Ok(to_data_url(&encoded))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn pipeline() -> DerivationPipeline {
        DerivationPipeline::new(TransformUrlBuilder::new("demo"))
    }

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::new_rgb8(width, height);
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    fn options(max_width: u32) -> DerivationOptions {
        DerivationOptions {
            max_width,
            widths: vec![512, 1024],
            quality: 70,
            folder: "blog".to_string(),
            name: "cover".to_string(),
        }
    }

    #[test]
    fn test_scaled_dimensions_downscale() {
        // width 3000 capped at 2400: height = round(h * 2400/3000)
        assert_eq!(scaled_dimensions(3000, 2000, 2400), (2400, 1600));
        assert_eq!(scaled_dimensions(3000, 1999, 2400), (2400, 1599));
    }

    #[test]
    fn test_scaled_dimensions_no_upscale() {
        assert_eq!(scaled_dimensions(1200, 800, 2400), (1200, 800));
        assert_eq!(scaled_dimensions(2400, 1600, 2400), (2400, 1600));
    }

    #[test]
    fn test_mime_table_fails_closed() {
        assert!(DerivationPipeline::format_for_mime("image/jpeg").is_some());
        assert!(DerivationPipeline::format_for_mime("IMAGE/PNG").is_some());
        assert!(DerivationPipeline::format_for_mime("image/webp").is_some());
        assert!(DerivationPipeline::format_for_mime("image/avif").is_some());
        assert!(DerivationPipeline::format_for_mime("image/gif").is_none());
        assert!(DerivationPipeline::format_for_mime("text/html").is_none());
    }

    #[test]
    fn test_unknown_mime_is_unsupported_media_type() {
        let err = pipeline()
            .derive(&[0u8; 4], "application/pdf", &options(2400))
            .unwrap_err();
        assert!(matches!(err, AppError::UnsupportedMediaType(_)));
    }

    #[test]
    fn test_avif_passes_mime_check_but_fails_at_decode() {
        // accepted by the table, rejected at decode (no AVIF decoder built in)
        let err = pipeline()
            .derive(&[0u8; 16], "image/avif", &options(2400))
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_undecodable_body_is_validation_error() {
        let err = pipeline()
            .derive(&[0u8; 16], "image/png", &options(2400))
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_derive_downscales_wide_source() {
        let source = png_bytes(300, 200);
        let derived = pipeline()
            .derive(&source, "image/png", &options(240))
            .unwrap();
        assert_eq!(derived.width, 240);
        assert_eq!(derived.height, 160);
        assert!(!derived.canonical.is_empty());
    }

    #[test]
    fn test_derive_passes_narrow_source_through() {
        let source = png_bytes(120, 80);
        let derived = pipeline()
            .derive(&source, "image/png", &options(2400))
            .unwrap();
        assert_eq!(derived.width, 120);
        assert_eq!(derived.height, 80);
    }

    #[test]
    fn test_derive_builds_responsive_urls_in_width_order() {
        let source = png_bytes(120, 80);
        let derived = pipeline()
            .derive(&source, "image/png", &options(2400))
            .unwrap();
        assert_eq!(derived.responsive_urls.len(), 2);
        assert_eq!(derived.responsive_urls[0].width, 512);
        assert_eq!(derived.responsive_urls[1].width, 1024);
        assert!(derived.responsive_urls[0].url.contains("w_512"));
        assert!(derived.responsive_urls[0].url.contains("q_70"));
        assert!(derived.responsive_urls[1].url.contains("blog/cover"));
    }

    #[test]
    fn test_derive_inlines_placeholder_as_data_url() {
        let source = png_bytes(200, 100);
        let derived = pipeline()
            .derive(&source, "image/png", &options(2400))
            .unwrap();
        assert!(derived
            .placeholder_data_url
            .starts_with("data:image/webp;base64,"));
        assert!(derived.data_url.starts_with("data:image/webp;base64,"));
        // placeholder is decodable and at most 100px wide
        let b64 = derived
            .placeholder_data_url
            .trim_start_matches("data:image/webp;base64,");
        let bytes = BASE64.decode(b64).unwrap();
        let placeholder = image::load_from_memory(&bytes).unwrap();
        assert_eq!(placeholder.dimensions(), (100, 50));
    }

    #[test]
    fn test_thumbnail_url_uses_fixed_width() {
        let source = png_bytes(120, 80);
        let derived = pipeline()
            .derive(&source, "image/png", &options(2400))
            .unwrap();
        assert!(derived.thumbnail_url.contains("w_250"));
    }
}
