//! Table region detection over full page images.

use super::algorithm::non_maximum_suppression;
use super::runtime::get_table_model_runtime;
use super::types::CroppedTable;
use crate::core::config::TableExtractionConfig;
use crate::error::Result;
use image::DynamicImage;

pub struct TableDetector {
    config: TableExtractionConfig,
}

impl TableDetector {
    pub fn new(config: TableExtractionConfig) -> Self {
        Self { config }
    }

    /// Detect table regions on a page: model evaluation, confidence filter,
    /// then NMS keeping higher-confidence boxes.
    pub fn detect_tables_in_page(&self, page_image: &DynamicImage, page_index: usize) -> Result<Vec<CroppedTable>> {
        let runtime = get_table_model_runtime()?;
        let predictions = runtime.detect(
            page_image,
            &self.config.detection_model,
            self.config.model_cache_dir.as_deref(),
        )?;

        let confident: Vec<usize> = predictions
            .scores
            .iter()
            .enumerate()
            .filter(|&(_, &score)| f64::from(score) >= self.config.detection_threshold)
            .map(|(i, _)| i)
            .collect();
        let filtered = predictions.select(&confident);

        let kept = non_maximum_suppression(&filtered.boxes, &filtered.scores, self.config.nms_iou_threshold as f32);

        let mut tables: Vec<CroppedTable> = kept
            .into_iter()
            .map(|index| CroppedTable {
                bbox: filtered.boxes[index],
                confidence: filtered.scores[index],
                page_index,
            })
            .collect();

        // Reading order: top to bottom, then left to right.
        tables.sort_by(|a, b| {
            (a.bbox.1, a.bbox.0)
                .partial_cmp(&(b.bbox.1, b.bbox.0))
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        Ok(tables)
    }

    pub fn config(&self) -> &TableExtractionConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::runtime::{clear_table_model_runtime, set_table_model_runtime};
    use crate::tables::types::{BboxPredictions, TablePredictions};
    use serial_test::serial;
    use std::sync::Arc;

    struct FixedDetections {
        predictions: BboxPredictions,
    }

    impl crate::tables::runtime::TableModelRuntime for FixedDetections {
        fn name(&self) -> &str {
            "fixed"
        }

        fn detect(&self, _: &DynamicImage, _: &str, _: Option<&str>) -> Result<BboxPredictions> {
            Ok(self.predictions.clone())
        }

        fn recognize_structure(&self, _: &DynamicImage, _: &str, _: Option<&str>) -> Result<TablePredictions> {
            Ok(TablePredictions::default())
        }
    }

    #[test]
    #[serial]
    fn test_detection_filters_and_suppresses() {
        set_table_model_runtime(Arc::new(FixedDetections {
            predictions: BboxPredictions {
                boxes: vec![
                    (10.0, 10.0, 100.0, 100.0),
                    (12.0, 12.0, 102.0, 102.0),
                    (10.0, 200.0, 100.0, 300.0),
                    (10.0, 400.0, 100.0, 420.0),
                ],
                scores: vec![0.95, 0.85, 0.9, 0.3],
                labels: vec![0, 0, 0, 0],
            },
        }));

        let detector = TableDetector::new(TableExtractionConfig::default());
        let image = DynamicImage::new_rgb8(500, 500);

        let tables = detector.detect_tables_in_page(&image, 0).unwrap();

        // Low-confidence box dropped, overlapping pair suppressed to one.
        assert_eq!(tables.len(), 2);
        assert!(tables[0].bbox.1 <= tables[1].bbox.1);
        assert!((tables[0].confidence - 0.95).abs() < 1e-6);

        clear_table_model_runtime();
    }

    #[test]
    #[serial]
    fn test_detection_without_runtime_fails() {
        clear_table_model_runtime();
        let detector = TableDetector::new(TableExtractionConfig::default());
        let image = DynamicImage::new_rgb8(10, 10);
        assert!(detector.detect_tables_in_page(&image, 0).is_err());
    }
}
