//! Geometry and prediction types for the vision table pipeline.

use serde::{Deserialize, Serialize};

/// Axis-aligned box: (x1, y1, x2, y2) in image pixel space.
pub type BBox = (f32, f32, f32, f32);

pub fn bbox_area(bbox: &BBox) -> f32 {
    ((bbox.2 - bbox.0).max(0.0)) * ((bbox.3 - bbox.1).max(0.0))
}

pub fn bbox_intersection(a: &BBox, b: &BBox) -> f32 {
    let x1 = a.0.max(b.0);
    let y1 = a.1.max(b.1);
    let x2 = a.2.min(b.2);
    let y2 = a.3.min(b.3);
    (x2 - x1).max(0.0) * (y2 - y1).max(0.0)
}

/// Intersection over union of two boxes.
pub fn bbox_iou(a: &BBox, b: &BBox) -> f32 {
    let intersection = bbox_intersection(a, b);
    let union = bbox_area(a) + bbox_area(b) - intersection;
    if union > 0.0 { intersection / union } else { 0.0 }
}

/// Bounding-box predictions from a model head.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BboxPredictions {
    pub boxes: Vec<BBox>,
    pub scores: Vec<f32>,
    pub labels: Vec<i32>,
}

impl BboxPredictions {
    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    /// Keep only the entries at the given indices, in order.
    pub fn select(&self, indices: &[usize]) -> Self {
        Self {
            boxes: indices.iter().map(|&i| self.boxes[i]).collect(),
            scores: indices.iter().map(|&i| self.scores[i]).collect(),
            labels: indices.iter().map(|&i| self.labels[i]).collect(),
        }
    }
}

/// Structure-model output for one table region.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TablePredictions {
    pub rows: BboxPredictions,
    pub columns: BboxPredictions,
    pub spanning_cells: BboxPredictions,
}

/// A detected table region on a page.
#[derive(Debug, Clone, PartialEq)]
pub struct CroppedTable {
    pub bbox: BBox,
    pub confidence: f32,
    /// 0-indexed page position; reported 1-indexed in TableData.
    pub page_index: usize,
}
