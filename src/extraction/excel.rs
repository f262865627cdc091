//! Spreadsheet parsing via calamine.
//!
//! Every sheet becomes a `## <sheet_name>` heading followed by a GitHub
//! Flavored Markdown table. The first row is the header; shorter rows are
//! padded to the header width with empty fields.

use calamine::{Data, Range, Reader, open_workbook_auto};
use std::collections::HashMap;
use std::fmt::Write as FmtWrite;
use std::io::Cursor;
use std::path::Path;

use crate::error::{KreuzbergError, Result};
use crate::types::{ExcelSheet, ExcelWorkbook};

pub fn read_excel_file(file_path: &Path) -> Result<ExcelWorkbook> {
    let workbook = open_workbook_auto(file_path)
        .map_err(|e| KreuzbergError::parsing(format!("Failed to open spreadsheet: {e}")))?;

    process_workbook(workbook)
}

pub fn read_excel_bytes(data: &[u8], file_extension: &str) -> Result<ExcelWorkbook> {
    let cursor = Cursor::new(data);

    match file_extension.to_lowercase().as_str() {
        ".xlsx" | ".xlsm" | ".xlam" | ".xltm" => {
            let workbook = calamine::Xlsx::new(cursor)
                .map_err(|e| KreuzbergError::parsing(format!("Failed to parse XLSX: {e}")))?;
            process_workbook(workbook)
        }
        ".xls" | ".xla" => {
            let workbook =
                calamine::Xls::new(cursor).map_err(|e| KreuzbergError::parsing(format!("Failed to parse XLS: {e}")))?;
            process_workbook(workbook)
        }
        ".xlsb" => {
            let workbook = calamine::Xlsb::new(cursor)
                .map_err(|e| KreuzbergError::parsing(format!("Failed to parse XLSB: {e}")))?;
            process_workbook(workbook)
        }
        ".ods" => {
            let workbook =
                calamine::Ods::new(cursor).map_err(|e| KreuzbergError::parsing(format!("Failed to parse ODS: {e}")))?;
            process_workbook(workbook)
        }
        ".csv" | ".tsv" => read_delimited_bytes(data, file_extension),
        _ => Err(KreuzbergError::parsing(format!(
            "Unsupported spreadsheet extension: {file_extension}"
        ))),
    }
}

/// CSV/TSV share the sheet model with a single synthetic sheet.
fn read_delimited_bytes(data: &[u8], file_extension: &str) -> Result<ExcelWorkbook> {
    let text = crate::text::safe_decode(data);
    let delimiter = if file_extension == ".tsv" { '\t' } else { ',' };

    let rows: Vec<Vec<Data>> = text
        .lines()
        .map(|line| {
            line.split(delimiter)
                .map(|cell| Data::String(cell.trim().to_string()))
                .collect()
        })
        .collect();

    let sheet_name = if file_extension == ".tsv" { "TSV" } else { "CSV" };
    let markdown = render_rows(sheet_name, &rows);
    let (row_count, col_count) = (rows.len(), rows.first().map_or(0, Vec::len));

    let mut metadata = HashMap::new();
    metadata.insert("sheet_count".to_string(), "1".to_string());
    metadata.insert("sheet_names".to_string(), sheet_name.to_string());

    Ok(ExcelWorkbook {
        sheets: vec![ExcelSheet {
            name: sheet_name.to_string(),
            markdown,
            row_count,
            col_count,
        }],
        metadata,
    })
}

fn process_workbook<RS, R>(mut workbook: R) -> Result<ExcelWorkbook>
where
    RS: std::io::Read + std::io::Seek,
    R: Reader<RS>,
{
    let sheet_names = workbook.sheet_names();

    let mut sheets = Vec::with_capacity(sheet_names.len());

    for name in &sheet_names {
        if let Ok(range) = workbook.worksheet_range(name) {
            sheets.push(process_sheet(name, &range));
        }
    }

    let mut metadata = HashMap::with_capacity(2);
    metadata.insert("sheet_count".to_string(), sheet_names.len().to_string());
    metadata.insert("sheet_names".to_string(), sheet_names.join(", "));

    Ok(ExcelWorkbook { sheets, metadata })
}

fn process_sheet(name: &str, range: &Range<Data>) -> ExcelSheet {
    let (rows, cols) = range.get_size();

    let markdown = if rows == 0 || cols == 0 {
        format!("## {name}\n\n*Empty sheet*")
    } else {
        let all_rows: Vec<Vec<Data>> = range.rows().map(|r| r.to_vec()).collect();
        render_rows(name, &all_rows)
    };

    ExcelSheet {
        name: name.to_owned(),
        markdown,
        row_count: rows,
        col_count: cols,
    }
}

fn render_rows(sheet_name: &str, rows: &[Vec<Data>]) -> String {
    let mut result = String::with_capacity(64 + rows.len() * 32);

    write!(result, "## {sheet_name}\n\n").unwrap();

    if rows.is_empty() {
        result.push_str("*No data*");
        return result;
    }

    let header = &rows[0];
    let header_len = header.len();

    result.push_str("| ");
    for (i, cell) in header.iter().enumerate() {
        if i > 0 {
            result.push_str(" | ");
        }
        format_cell_value_into(&mut result, cell);
    }
    result.push_str(" |\n");

    result.push_str("| ");
    for i in 0..header_len {
        if i > 0 {
            result.push_str(" | ");
        }
        result.push_str("---");
    }
    result.push_str(" |\n");

    for row in rows.iter().skip(1) {
        result.push_str("| ");
        // Short rows pad to the header width with empty fields.
        for i in 0..header_len {
            if i > 0 {
                result.push_str(" | ");
            }
            if let Some(cell) = row.get(i) {
                format_cell_value_into(&mut result, cell);
            }
        }
        result.push_str(" |\n");
    }

    result.trim_end().to_string()
}

#[inline]
fn format_cell_value_into(buffer: &mut String, data: &Data) {
    match data {
        Data::Empty => {}
        Data::String(s) => {
            if s.contains('|') || s.contains('\\') {
                escape_markdown_into(buffer, s);
            } else {
                buffer.push_str(s);
            }
        }
        Data::Float(f) => {
            if f.fract() == 0.0 && f.abs() < 1e15 {
                write!(buffer, "{}", *f as i64).unwrap();
            } else {
                write!(buffer, "{f}").unwrap();
            }
        }
        Data::Int(i) => {
            write!(buffer, "{i}").unwrap();
        }
        Data::Bool(b) => {
            buffer.push_str(if *b { "true" } else { "false" });
        }
        Data::DateTime(dt) => {
            if let Some(datetime) = dt.as_datetime() {
                write!(buffer, "{}", datetime.format("%Y-%m-%dT%H:%M:%S")).unwrap();
            } else {
                write!(buffer, "{dt:?}").unwrap();
            }
        }
        Data::DateTimeIso(s) => {
            buffer.push_str(s);
        }
        Data::DurationIso(s) => {
            buffer.push_str(s);
        }
        Data::Error(e) => {
            write!(buffer, "#ERR: {e:?}").unwrap();
        }
    }
}

#[inline]
fn escape_markdown_into(buffer: &mut String, s: &str) {
    for ch in s.chars() {
        match ch {
            '|' => buffer.push_str("\\|"),
            '\\' => buffer.push_str("\\\\"),
            _ => buffer.push(ch),
        }
    }
}

/// Join per-sheet markdown into the workbook document.
pub fn excel_to_markdown(workbook: &ExcelWorkbook) -> String {
    workbook
        .sheets
        .iter()
        .map(|sheet| sheet.markdown.trim_end())
        .collect::<Vec<_>>()
        .join("\n\n")
}
