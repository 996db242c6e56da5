//! CSV and spreadsheet extraction.
//!
//! A table is rendered as text the embedder can work with: the header line
//! first, then one line per data row pairing each value with its column
//! header (`name: Ada | age: 36`). Empty cells are skipped.
//!
//! Rows are sparse `(column, value)` lists sorted by column, so a lone cell
//! far to the right costs no more than one next to the header.

use super::ooxml::{self, Row, Sheet};
use crate::error::ExtractionError;

/// Render rows (first row is the header) as text.
pub fn render_table(rows: &[Row]) -> String {
    let Some((header, body)) = rows.split_first() else {
        return String::new();
    };
    let header: Vec<(usize, &str)> = header
        .iter()
        .map(|(col, h)| (*col, h.trim()))
        .filter(|(_, h)| !h.is_empty())
        .collect();

    let mut lines = Vec::with_capacity(rows.len());
    let header_line = header
        .iter()
        .map(|(_, h)| *h)
        .collect::<Vec<_>>()
        .join(" | ");
    if !header_line.is_empty() {
        lines.push(header_line);
    }

    for row in body {
        let fields: Vec<String> = row
            .iter()
            .filter(|(_, value)| !value.trim().is_empty())
            .map(|(col, value)| {
                match header.binary_search_by_key(col, |(c, _)| *c) {
                    Ok(i) => format!("{}: {}", header[i].1, value.trim()),
                    Err(_) => value.trim().to_string(),
                }
            })
            .collect();
        if !fields.is_empty() {
            lines.push(fields.join(" | "));
        }
    }
    lines.join("\n")
}

/// Extract CSV text. Ragged rows are accepted; invalid UTF-8 is replaced.
pub fn csv_text(bytes: &[u8]) -> Result<String, ExtractionError> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);

    let mut rows = Vec::new();
    for record in reader.byte_records() {
        let record = record.map_err(|e| ExtractionError::Tabular(e.to_string()))?;
        rows.push(
            record
                .iter()
                .enumerate()
                .map(|(col, field)| (col, String::from_utf8_lossy(field).into_owned()))
                .collect(),
        );
    }
    Ok(render_table(&rows))
}

/// Extract XLSX text, one rendered table per sheet.
pub fn xlsx_text(bytes: &[u8]) -> Result<String, ExtractionError> {
    let sheets: Vec<Sheet> = ooxml::xlsx_sheets(bytes)?;
    Ok(sheets
        .iter()
        .map(|sheet| render_table(sheet))
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join("\n"))
}
