//! Vision table extraction: detect regions, recover structure, emit
//! DataFrame + markdown.
//!
//! Detector and formatter instances are cached singletons keyed by
//! (model, threshold, cache_dir) so models load once per process; eviction
//! is manual via [`clear_table_caches`]. When the inference runtime is
//! unavailable, requests fail with `MissingDependencyError` and the rest of
//! extraction continues.

pub mod algorithm;
pub mod detector;
pub mod formatter;
pub mod runtime;
pub mod types;

pub use detector::TableDetector;
pub use formatter::TableFormatter;
pub use runtime::{TableModelRuntime, clear_table_model_runtime, set_table_model_runtime};
pub use types::{BBox, BboxPredictions, CroppedTable, TablePredictions};

use crate::cache::{fast_hash, generate_cache_key, get_table_cache};
use crate::core::config::{ExtractionConfig, TableExtractionConfig};
use crate::error::Result;
use crate::pdf::{PageRenderOptions, PdfRenderer};
use crate::types::TableData;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Rendering envelope for table detection; detection models work at modest
/// resolution, so the budget is generous and the target low.
const TABLE_RENDER_TARGET_DPI: i32 = 150;
const TABLE_RENDER_MAX_DIMENSION: i32 = 25000;

static DETECTOR_CACHE: Lazy<Mutex<HashMap<String, Arc<TableDetector>>>> = Lazy::new(|| Mutex::new(HashMap::new()));
static FORMATTER_CACHE: Lazy<Mutex<HashMap<String, Arc<TableFormatter>>>> = Lazy::new(|| Mutex::new(HashMap::new()));

fn singleton_key(model: &str, threshold: f64, cache_dir: Option<&str>) -> String {
    format!("{model}|{:016x}|{}", threshold.to_bits(), cache_dir.unwrap_or(""))
}

fn cached_detector(config: &TableExtractionConfig) -> Arc<TableDetector> {
    let key = singleton_key(
        &config.detection_model,
        config.detection_threshold,
        config.model_cache_dir.as_deref(),
    );
    let mut cache = DETECTOR_CACHE.lock().expect("detector cache lock poisoned");
    Arc::clone(
        cache
            .entry(key)
            .or_insert_with(|| Arc::new(TableDetector::new(config.clone()))),
    )
}

fn cached_formatter(config: &TableExtractionConfig) -> Arc<TableFormatter> {
    let key = singleton_key(
        &config.structure_model,
        config.structure_threshold,
        config.model_cache_dir.as_deref(),
    );
    let mut cache = FORMATTER_CACHE.lock().expect("formatter cache lock poisoned");
    Arc::clone(
        cache
            .entry(key)
            .or_insert_with(|| Arc::new(TableFormatter::new(config.clone()))),
    )
}

/// Drop the cached detector and formatter singletons.
pub fn clear_table_caches() {
    DETECTOR_CACHE.lock().expect("detector cache lock poisoned").clear();
    FORMATTER_CACHE.lock().expect("formatter cache lock poisoned").clear();
}

fn table_cache_key(pdf_bytes: &[u8], config: &TableExtractionConfig) -> String {
    let pdf_hash = format!("{:016x}", fast_hash(pdf_bytes));
    let config_material = serde_json::to_string(config).unwrap_or_default();
    let config_hash = format!("{:016x}", fast_hash(config_material.as_bytes()));

    generate_cache_key(&[("pdf_hash", pdf_hash.as_str()), ("table_config", config_hash.as_str())])
}

/// Extract tables from every page of a PDF.
pub fn extract_tables_from_pdf(pdf_bytes: &[u8], config: &ExtractionConfig) -> Result<Vec<TableData>> {
    let table_config = resolve_table_config(config);

    let cache_key = table_cache_key(pdf_bytes, &table_config);
    let cache = get_table_cache();

    let mut owns_ticket = false;

    if config.use_cache {
        if let Some(hit) = read_cached_tables(&cache_key)? {
            return Ok(hit);
        }

        loop {
            match cache.begin_processing(&cache_key) {
                crate::cache::TicketAttempt::Owner(_) => {
                    if let Some(hit) = read_cached_tables(&cache_key)? {
                        cache.mark_complete(&cache_key);
                        return Ok(hit);
                    }
                    owns_ticket = true;
                    break;
                }
                crate::cache::TicketAttempt::Waiter(_) => {
                    cache.wait_for(&cache_key);
                    if let Some(hit) = read_cached_tables(&cache_key)? {
                        return Ok(hit);
                    }
                }
            }
        }
    }

    let result = extract_tables_uncached(pdf_bytes, &table_config);

    if owns_ticket {
        if let Ok(tables) = &result {
            match rmp_serde::to_vec_named(tables) {
                Ok(bytes) => {
                    if let Err(e) = cache.set(&cache_key, &bytes, None) {
                        tracing::warn!(error = %e, "failed to store table cache entry");
                    }
                }
                Err(e) => tracing::warn!(error = %e, "failed to serialize tables for cache"),
            }
        }
        cache.mark_complete(&cache_key);
    }

    result
}

fn resolve_table_config(config: &ExtractionConfig) -> TableExtractionConfig {
    let mut table_config = config.tables.clone().unwrap_or_default();
    if table_config.model_cache_dir.is_none() {
        table_config.model_cache_dir = crate::utils::resolve_model_cache_dir(config.model_cache_dir.as_deref())
            .map(|p| p.display().to_string());
    }
    table_config
}

fn read_cached_tables(cache_key: &str) -> Result<Option<Vec<TableData>>> {
    let Some(bytes) = get_table_cache().get(cache_key, None)? else {
        return Ok(None);
    };

    match rmp_serde::from_slice(&bytes) {
        Ok(tables) => Ok(Some(tables)),
        Err(e) => {
            tracing::warn!(key = %cache_key, error = %e, "corrupt table cache entry; treating as miss");
            Ok(None)
        }
    }
}

fn extract_tables_uncached(pdf_bytes: &[u8], config: &TableExtractionConfig) -> Result<Vec<TableData>> {
    let detector = cached_detector(config);
    let formatter = if config.extract_from_ocr {
        None
    } else {
        Some(cached_formatter(config))
    };

    let renderer = PdfRenderer::new()?;
    let page_count = renderer.page_count(pdf_bytes, None)?;

    let render_options = PageRenderOptions {
        target_dpi: TABLE_RENDER_TARGET_DPI,
        max_image_dimension: TABLE_RENDER_MAX_DIMENSION,
        auto_adjust_dpi: true,
        min_dpi: 72,
        max_dpi: 600,
    };

    let mut tables = Vec::new();

    for page_index in 0..page_count {
        let page_image = renderer.render_page_to_image(pdf_bytes, page_index, &render_options, None)?;

        let detected = detector.detect_tables_in_page(&page_image, page_index)?;

        for cropped in detected {
            let (x1, y1, x2, y2) = cropped.bbox;
            let left = x1.max(0.0) as u32;
            let top = y1.max(0.0) as u32;
            let width = ((x2 - x1).max(1.0) as u32).min(page_image.width().saturating_sub(left));
            let height = ((y2 - y1).max(1.0) as u32).min(page_image.height().saturating_sub(top));

            if width == 0 || height == 0 {
                continue;
            }

            let table_image = page_image.crop_imm(left, top, width, height);

            let mut df = match &formatter {
                Some(formatter) => formatter.format_table(&table_image)?,
                None => formatter::build_dataframe_from_ocr(&table_image),
            };

            // Structure model produced an empty grid: fall back to OCR.
            if !df.has_content() {
                let fallback = formatter::build_dataframe_from_ocr(&table_image);
                if fallback.has_content() {
                    df = fallback;
                }
            }

            let mut png = Vec::new();
            if let Err(e) = table_image.write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png) {
                tracing::warn!(error = %e, "failed to encode table crop");
                png.clear();
            }

            let text = if df.has_content() { df.to_markdown() } else { String::new() };

            tables.push(TableData {
                cropped_image: if png.is_empty() { None } else { Some(png) },
                df: if df.is_empty() { None } else { Some(df) },
                page_number: cropped.page_index + 1,
                text,
            });
        }
    }

    tracing::info!(count = tables.len(), "extracted tables from PDF");
    Ok(tables)
}
