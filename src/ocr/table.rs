//! Table reconstruction from tesseract TSV output.
//!
//! Tesseract's TSV format lists recognized words with bounding boxes. Words
//! are clustered into rows by vertical overlap and into columns by
//! horizontal gaps, yielding a cell grid plus a markdown rendering.

use crate::error::{KreuzbergError, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct TsvWord {
    pub text: String,
    pub left: i32,
    pub top: i32,
    pub width: i32,
    pub height: i32,
    pub confidence: f64,
}

/// Parse word-level rows (level 5) out of tesseract TSV output.
pub fn extract_words_from_tsv(tsv_data: &str, min_confidence: f64) -> Result<Vec<TsvWord>> {
    let mut words = Vec::new();

    for (line_number, line) in tsv_data.lines().enumerate() {
        if line_number == 0 || line.trim().is_empty() {
            continue;
        }

        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 12 {
            continue;
        }

        let level: i32 = fields[0]
            .parse()
            .map_err(|_| KreuzbergError::ocr(format!("Malformed TSV level field on line {line_number}")))?;
        if level != 5 {
            continue;
        }

        let confidence: f64 = fields[10].parse().unwrap_or(-1.0);
        let text = fields[11].trim();

        if confidence < min_confidence || text.is_empty() {
            continue;
        }

        words.push(TsvWord {
            text: text.to_string(),
            left: fields[6].parse().unwrap_or(0),
            top: fields[7].parse().unwrap_or(0),
            width: fields[8].parse().unwrap_or(0),
            height: fields[9].parse().unwrap_or(0),
            confidence,
        });
    }

    Ok(words)
}

/// Cluster words into a cell grid.
///
/// `column_threshold` is the minimum horizontal gap (pixels) that starts a
/// new column; `row_threshold_ratio` scales the median word height into the
/// row-break distance.
pub fn reconstruct_table(words: &[TsvWord], column_threshold: i32, row_threshold_ratio: f64) -> Vec<Vec<String>> {
    if words.is_empty() {
        return Vec::new();
    }

    let mut sorted: Vec<&TsvWord> = words.iter().collect();
    sorted.sort_by_key(|w| (w.top, w.left));

    let mut heights: Vec<i32> = words.iter().map(|w| w.height).collect();
    heights.sort_unstable();
    let median_height = heights[heights.len() / 2].max(1);
    let row_threshold = ((median_height as f64) * row_threshold_ratio).max(1.0) as i32;

    // Group into visual rows by top coordinate.
    let mut rows: Vec<Vec<&TsvWord>> = Vec::new();
    let mut current_row: Vec<&TsvWord> = Vec::new();
    let mut current_top = sorted[0].top;

    for word in sorted {
        if (word.top - current_top).abs() > row_threshold && !current_row.is_empty() {
            current_row.sort_by_key(|w| w.left);
            rows.push(std::mem::take(&mut current_row));
            current_top = word.top;
        }
        current_row.push(word);
    }
    if !current_row.is_empty() {
        current_row.sort_by_key(|w| w.left);
        rows.push(current_row);
    }

    // Derive column boundaries from horizontal gaps across all rows.
    let mut column_starts: Vec<i32> = Vec::new();
    for row in &rows {
        let mut previous_end: Option<i32> = None;
        for word in row {
            let starts_column = match previous_end {
                None => true,
                Some(end) => word.left - end > column_threshold,
            };
            if starts_column && !column_starts.iter().any(|&start| (start - word.left).abs() <= column_threshold) {
                column_starts.push(word.left);
            }
            previous_end = Some(word.left + word.width);
        }
    }
    column_starts.sort_unstable();

    if column_starts.is_empty() {
        return Vec::new();
    }

    let mut grid: Vec<Vec<String>> = Vec::with_capacity(rows.len());

    for row in rows {
        let mut cells = vec![String::new(); column_starts.len()];

        for word in row {
            let column = column_starts
                .iter()
                .rposition(|&start| word.left + column_threshold >= start)
                .unwrap_or(0);

            if !cells[column].is_empty() {
                cells[column].push(' ');
            }
            cells[column].push_str(&word.text);
        }

        grid.push(cells);
    }

    grid
}

/// Render a cell grid as a GFM table, first row as header.
pub fn table_to_markdown(cells: &[Vec<String>]) -> String {
    if cells.is_empty() {
        return String::new();
    }

    let width = cells.iter().map(Vec::len).max().unwrap_or(0);
    let mut lines = Vec::with_capacity(cells.len() + 1);

    for (index, row) in cells.iter().enumerate() {
        let mut padded = row.clone();
        padded.resize(width, String::new());
        lines.push(format!("| {} |", padded.join(" | ")));

        if index == 0 {
            lines.push(format!("| {} |", vec!["---"; width].join(" | ")));
        }
    }

    lines.join("\n")
}
