//! Table structure recovery: filtering, sorting, NMS, grid synthesis.
//!
//! Given row/column/spanning-cell predictions for a cropped table region,
//! recovers an R x C cell grid: predictions below the structure threshold
//! are dropped (spanning cells at 1.2x the threshold), rows sort by top
//! coordinate and columns by left, each axis gets non-maximum suppression,
//! and cells materialize where a row and column box overlap with IoU > 0.1.

use super::types::{BBox, BboxPredictions, TablePredictions, bbox_area, bbox_intersection};
use crate::core::config::TableExtractionConfig;
use crate::types::TableDataFrame;
use image::DynamicImage;
use ndarray::Array2;

/// Minimum row/column IoU for a grid cell to exist.
const CELL_IOU_THRESHOLD: f32 = 0.1;

/// Spanning cells are filtered at this multiple of the base threshold.
const SPANNING_THRESHOLD_FACTOR: f64 = 1.2;

/// Suppress boxes whose intersection-over-box-area with a higher-confidence
/// box exceeds the threshold. Returns kept indices, best first.
pub fn non_maximum_suppression(boxes: &[BBox], scores: &[f32], threshold: f32) -> Vec<usize> {
    if boxes.is_empty() {
        return Vec::new();
    }

    let mut order: Vec<usize> = (0..boxes.len()).collect();
    order.sort_by(|&a, &b| scores[b].partial_cmp(&scores[a]).unwrap_or(std::cmp::Ordering::Equal));

    let mut suppressed = vec![false; boxes.len()];
    let mut kept = Vec::new();

    for &index in &order {
        if suppressed[index] {
            continue;
        }
        kept.push(index);

        for &other in &order {
            if other == index || suppressed[other] {
                continue;
            }
            let area = bbox_area(&boxes[other]);
            if area <= 0.0 {
                suppressed[other] = true;
                continue;
            }
            let iob = bbox_intersection(&boxes[index], &boxes[other]) / area;
            if iob > threshold {
                suppressed[other] = true;
            }
        }
    }

    kept
}

fn filter_by_confidence(predictions: &BboxPredictions, threshold: f64) -> BboxPredictions {
    let indices: Vec<usize> = predictions
        .scores
        .iter()
        .enumerate()
        .filter(|&(_, &score)| f64::from(score) >= threshold)
        .map(|(i, _)| i)
        .collect();
    predictions.select(&indices)
}

fn sort_by_coordinate(predictions: &BboxPredictions, vertical: bool) -> BboxPredictions {
    let mut indices: Vec<usize> = (0..predictions.len()).collect();
    indices.sort_by(|&a, &b| {
        let key_a = if vertical { predictions.boxes[a].1 } else { predictions.boxes[a].0 };
        let key_b = if vertical { predictions.boxes[b].1 } else { predictions.boxes[b].0 };
        key_a.partial_cmp(&key_b).unwrap_or(std::cmp::Ordering::Equal)
    });
    predictions.select(&indices)
}

/// Filter, sort, and suppress structure predictions into clean row/column
/// sets.
pub fn refine_predictions(predictions: &TablePredictions, config: &TableExtractionConfig) -> TablePredictions {
    let rows = filter_by_confidence(&predictions.rows, config.structure_threshold);
    let columns = filter_by_confidence(&predictions.columns, config.structure_threshold);
    let spanning_cells = filter_by_confidence(
        &predictions.spanning_cells,
        config.structure_threshold * SPANNING_THRESHOLD_FACTOR,
    );

    let rows = sort_by_coordinate(&rows, true);
    let columns = sort_by_coordinate(&columns, false);

    let nms_threshold = config.nms_iou_threshold as f32;
    let rows = rows.select(&sorted(non_maximum_suppression(&rows.boxes, &rows.scores, nms_threshold)));
    let columns = columns.select(&sorted(non_maximum_suppression(
        &columns.boxes,
        &columns.scores,
        nms_threshold,
    )));

    TablePredictions {
        rows,
        columns,
        spanning_cells,
    }
}

fn sorted(mut indices: Vec<usize>) -> Vec<usize> {
    indices.sort_unstable();
    indices
}

/// Row x column IoU matrix.
pub fn intersection_matrix(row_boxes: &[BBox], col_boxes: &[BBox]) -> Array2<f32> {
    let mut matrix = Array2::zeros((row_boxes.len(), col_boxes.len()));

    for (row_index, row_box) in row_boxes.iter().enumerate() {
        let row_area = bbox_area(row_box);
        for (col_index, col_box) in col_boxes.iter().enumerate() {
            let intersection = bbox_intersection(row_box, col_box);
            let union = row_area + bbox_area(col_box) - intersection;
            matrix[(row_index, col_index)] = if union > 0.0 { intersection / union } else { 0.0 };
        }
    }

    matrix
}

/// Build the cell grid for refined predictions, extracting text for each
/// materialized cell from the region image.
pub fn extract_table_dataframe<F>(
    image: &DynamicImage,
    predictions: &TablePredictions,
    config: &TableExtractionConfig,
    mut cell_text: F,
) -> TableDataFrame
where
    F: FnMut(&DynamicImage) -> String,
{
    let refined = refine_predictions(predictions, config);

    if refined.rows.is_empty() || refined.columns.is_empty() {
        tracing::warn!("no valid rows or columns in table predictions");
        return TableDataFrame::default();
    }

    let matrix = intersection_matrix(&refined.rows.boxes, &refined.columns.boxes);
    let (num_rows, num_cols) = matrix.dim();

    let mut rows: Vec<Vec<String>> = Vec::with_capacity(num_rows);

    for row_index in 0..num_rows {
        let mut cells = Vec::with_capacity(num_cols);

        for col_index in 0..num_cols {
            if matrix[(row_index, col_index)] <= CELL_IOU_THRESHOLD {
                cells.push(String::new());
                continue;
            }

            let row_box = refined.rows.boxes[row_index];
            let col_box = refined.columns.boxes[col_index];

            let left = row_box.0.max(col_box.0).max(0.0);
            let top = row_box.1.max(col_box.1).max(0.0);
            let right = row_box.2.min(col_box.2);
            let bottom = row_box.3.min(col_box.3);

            if right <= left || bottom <= top {
                cells.push(String::new());
                continue;
            }

            let width = ((right - left) as u32).min(image.width().saturating_sub(left as u32));
            let height = ((bottom - top) as u32).min(image.height().saturating_sub(top as u32));

            if width == 0 || height == 0 {
                cells.push(String::new());
                continue;
            }

            let crop = image.crop_imm(left as u32, top as u32, width, height);
            cells.push(cell_text(&crop).trim().to_string());
        }

        rows.push(cells);
    }

    TableDataFrame {
        columns: (0..num_cols).map(|i| format!("Column_{i}")).collect(),
        rows,
    }
}
