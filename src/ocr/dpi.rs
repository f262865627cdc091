//! DPI normalization for OCR input images.
//!
//! Computes the effective DPI that maximizes legibility without exceeding
//! the dimension budget, clamps into `[min_dpi, max_dpi]`, and reports the
//! full preprocessing record. The dimension clamp applies even when
//! `auto_adjust_dpi` is disabled; a forced clamp is flagged via
//! `dimension_clamped`.

use crate::core::config::ExtractionConfig;
use crate::error::Result;
use crate::types::ImagePreprocessingMetadata;
use image::DynamicImage;
use image::imageops::FilterType;

const DEFAULT_SOURCE_DPI: f64 = 72.0;
const RESAMPLE_METHOD: &str = "lanczos3";

/// Normalize an image to the configured DPI envelope.
///
/// `source_dpi` is the image's native resolution when known (EXIF), else the
/// 72 DPI raster assumption.
pub fn normalize_image_dpi(
    image: &DynamicImage,
    source_dpi: Option<f64>,
    config: &ExtractionConfig,
) -> Result<(DynamicImage, ImagePreprocessingMetadata)> {
    let (width, height) = (image.width(), image.height());
    let original_dpi = source_dpi.unwrap_or(DEFAULT_SOURCE_DPI).max(1.0);

    // The DPI clamp applies with and without auto-adjust; a forced clamp
    // under auto_adjust_dpi=false is recorded via dimension_clamped.
    let desired_dpi = config.target_dpi.clamp(config.min_dpi, config.max_dpi);
    let auto_adjusted = config.auto_adjust_dpi && desired_dpi != config.target_dpi;

    let mut scale_factor = desired_dpi as f64 / original_dpi;

    let mut new_width = ((width as f64) * scale_factor).round().max(1.0) as u32;
    let mut new_height = ((height as f64) * scale_factor).round().max(1.0) as u32;

    let max_dimension = config.max_image_dimension.max(1) as u32;
    let mut dimension_clamped = !config.auto_adjust_dpi && desired_dpi != config.target_dpi;

    let largest = new_width.max(new_height);
    if largest > max_dimension {
        let shrink = max_dimension as f64 / largest as f64;
        scale_factor *= shrink;
        new_width = ((width as f64) * scale_factor).round().max(1.0) as u32;
        new_height = ((height as f64) * scale_factor).round().max(1.0) as u32;
        dimension_clamped = true;
    }

    let final_dpi = ((original_dpi * scale_factor).round() as i32).clamp(config.min_dpi, config.max_dpi);

    let skipped_resize = new_width == width && new_height == height;

    let metadata = ImagePreprocessingMetadata {
        original_dimensions: (width, height),
        original_dpi: (original_dpi, original_dpi),
        target_dpi: config.target_dpi,
        scale_factor,
        auto_adjusted,
        final_dpi,
        new_dimensions: if skipped_resize {
            None
        } else {
            Some((new_width, new_height))
        },
        resample_method: RESAMPLE_METHOD.to_string(),
        dimension_clamped,
        skipped_resize,
        resize_error: None,
    };

    if skipped_resize {
        return Ok((image.clone(), metadata));
    }

    let resized = image.resize_exact(new_width, new_height, FilterType::Lanczos3);
    Ok((resized, metadata))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(target: i32, min: i32, max: i32, max_dimension: i32, auto_adjust: bool) -> ExtractionConfig {
        ExtractionConfig {
            target_dpi: target,
            min_dpi: min,
            max_dpi: max,
            max_image_dimension: max_dimension,
            auto_adjust_dpi: auto_adjust,
            ..Default::default()
        }
    }

    fn blank(width: u32, height: u32) -> DynamicImage {
        DynamicImage::new_rgb8(width, height)
    }

    #[test]
    fn test_upscale_to_target() {
        let image = blank(100, 100);
        let (resized, metadata) = normalize_image_dpi(&image, Some(72.0), &config(300, 72, 600, 4096, true)).unwrap();

        assert_eq!(metadata.final_dpi, 300);
        assert!(!metadata.skipped_resize);
        assert!(resized.width() > 100);
        assert_eq!(metadata.resample_method, "lanczos3");
    }

    #[test]
    fn test_final_dpi_clamped_into_bounds() {
        let image = blank(100, 100);
        let (_, metadata) = normalize_image_dpi(&image, Some(72.0), &config(1000, 72, 600, 65536, true)).unwrap();
        assert!(metadata.final_dpi >= 72 && metadata.final_dpi <= 600);
        assert!(metadata.auto_adjusted);
    }

    #[test]
    fn test_dimension_budget_enforced() {
        let image = blank(2000, 1000);
        let (resized, metadata) = normalize_image_dpi(&image, Some(72.0), &config(600, 72, 600, 2048, true)).unwrap();

        assert!(resized.width().max(resized.height()) <= 2048);
        assert!(metadata.dimension_clamped);
    }

    #[test]
    fn test_clamp_applies_without_auto_adjust() {
        let image = blank(2000, 1000);
        let (resized, metadata) = normalize_image_dpi(&image, Some(72.0), &config(600, 72, 600, 2048, false)).unwrap();

        assert!(resized.width().max(resized.height()) <= 2048);
        assert!(metadata.dimension_clamped);
    }

    #[test]
    fn test_no_resize_when_already_at_target() {
        let image = blank(500, 500);
        let (_, metadata) = normalize_image_dpi(&image, Some(300.0), &config(300, 72, 600, 4096, true)).unwrap();

        assert!(metadata.skipped_resize);
        assert!(metadata.new_dimensions.is_none());
        assert!((metadata.scale_factor - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_preprocessing_report_fields() {
        let image = blank(100, 50);
        let (_, metadata) = normalize_image_dpi(&image, None, &config(300, 72, 600, 4096, true)).unwrap();

        assert_eq!(metadata.original_dimensions, (100, 50));
        assert_eq!(metadata.original_dpi, (72.0, 72.0));
        assert_eq!(metadata.target_dpi, 300);
        assert!(metadata.scale_factor > 1.0);
    }
}
