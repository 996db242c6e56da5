//! Direct text extraction from OOXML packages (DOCX, PPTX, XLSX).
//!
//! OOXML files are ZIP archives of XML parts. Text is read straight from
//! the parts with `quick-xml`, without any office suite:
//!
//! - DOCX: `word/document.xml`, one line per `w:p` paragraph.
//! - PPTX: `ppt/slides/slideN.xml` in slide order, one line per slide.
//! - XLSX: `xl/worksheets/sheetN.xml` in sheet order, returned as rows of
//!   cells for [`super::tabular`] to render.

use std::io::Read;

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::ExtractionError;

/// Maximum sheets to process in an xlsx.
const XLSX_MAX_SHEETS: usize = 100;
/// Maximum cells to process per sheet (avoids unbounded memory).
const XLSX_MAX_CELLS_PER_SHEET: usize = 100_000;
/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;
/// Widest worksheet Excel can produce (column `XFD`).
const XLSX_MAX_COLUMNS: usize = 16_384;

type Archive<'a> = zip::ZipArchive<std::io::Cursor<&'a [u8]>>;

/// One sheet row: non-empty `(column, value)` cells, sorted by column.
pub type Row = Vec<(usize, String)>;

/// One worksheet.
pub type Sheet = Vec<Row>;

fn ooxml_err(e: impl std::fmt::Display) -> ExtractionError {
    ExtractionError::Ooxml(e.to_string())
}

fn open_archive(bytes: &[u8]) -> Result<Archive<'_>, ExtractionError> {
    zip::ZipArchive::new(std::io::Cursor::new(bytes)).map_err(ooxml_err)
}

/// Read a ZIP entry, refusing entries that decompress past `max_bytes`.
/// Returns `Ok(None)` when the entry does not exist.
fn read_entry_bounded(
    archive: &mut Archive<'_>,
    name: &str,
    max_bytes: u64,
) -> Result<Option<Vec<u8>>, ExtractionError> {
    let entry = match archive.by_name(name) {
        Ok(entry) => entry,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(ooxml_err(e)),
    };
    let mut out = Vec::new();
    entry
        .take(max_bytes)
        .read_to_end(&mut out)
        .map_err(ooxml_err)?;
    if out.len() as u64 >= max_bytes {
        return Err(ExtractionError::Ooxml(format!(
            "ZIP entry {} exceeds size limit ({} bytes)",
            name, max_bytes
        )));
    }
    Ok(Some(out))
}

/// Entry names matching `{prefix}N{suffix}`, sorted by N.
fn numbered_entries(archive: &Archive<'_>, prefix: &str, suffix: &str) -> Vec<String> {
    let mut names: Vec<String> = archive
        .file_names()
        .filter(|n| n.starts_with(prefix) && n.ends_with(suffix))
        .map(|s| s.to_string())
        .collect();
    names.sort_by_key(|name| {
        name.trim_start_matches(prefix)
            .trim_end_matches(suffix)
            .parse::<u32>()
            .unwrap_or(u32::MAX)
    });
    names
}

/// Text of each `block` element (by local name), in document order.
///
/// Collects the content of `t` elements; `tab` and `br` become whitespace.
/// Blocks with no text are skipped.
fn block_texts(xml: &[u8], block: &[u8]) -> Result<Vec<String>, ExtractionError> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut blocks = Vec::new();
    let mut current = String::new();
    let mut in_t = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                if e.local_name().as_ref() == b"t" {
                    in_t = true;
                }
            }
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"tab" => current.push('\t'),
                b"br" => current.push(' '),
                _ => {}
            },
            Ok(Event::Text(te)) if in_t => {
                current.push_str(&te.unescape().map_err(ooxml_err)?);
            }
            Ok(Event::End(e)) => {
                let name = e.local_name();
                if name.as_ref() == b"t" {
                    in_t = false;
                } else if name.as_ref() == block {
                    push_trimmed(&mut blocks, &current);
                    current.clear();
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ooxml_err(e)),
            _ => {}
        }
        buf.clear();
    }
    push_trimmed(&mut blocks, &current);
    Ok(blocks)
}

fn push_trimmed(out: &mut Vec<String>, text: &str) {
    let text = text.trim();
    if !text.is_empty() {
        out.push(text.to_string());
    }
}

/// Paragraph text of a DOCX, newline-joined.
pub fn docx_text(bytes: &[u8]) -> Result<String, ExtractionError> {
    let mut archive = open_archive(bytes)?;
    let xml = read_entry_bounded(&mut archive, "word/document.xml", MAX_XML_ENTRY_BYTES)?
        .ok_or_else(|| ExtractionError::Ooxml("word/document.xml not found".to_string()))?;
    Ok(block_texts(&xml, b"p")?.join("\n"))
}

/// Slide text of a PPTX: paragraphs space-joined within a slide, slides
/// newline-joined in slide order.
pub fn pptx_text(bytes: &[u8]) -> Result<String, ExtractionError> {
    let mut archive = open_archive(bytes)?;
    let slide_names = numbered_entries(&archive, "ppt/slides/slide", ".xml");
    if slide_names.is_empty() {
        return Err(ExtractionError::Ooxml("no slides found".to_string()));
    }
    let mut slides = Vec::with_capacity(slide_names.len());
    for name in slide_names {
        if let Some(xml) = read_entry_bounded(&mut archive, &name, MAX_XML_ENTRY_BYTES)? {
            push_trimmed(&mut slides, &block_texts(&xml, b"p")?.join(" "));
        }
    }
    Ok(slides.join("\n"))
}

/// Worksheets of an XLSX, in sheet order.
pub fn xlsx_sheets(bytes: &[u8]) -> Result<Vec<Sheet>, ExtractionError> {
    let mut archive = open_archive(bytes)?;
    let shared_strings = read_shared_strings(&mut archive)?;
    let sheet_names = numbered_entries(&archive, "xl/worksheets/sheet", ".xml");
    if sheet_names.is_empty() {
        return Err(ExtractionError::Ooxml("no worksheets found".to_string()));
    }
    let mut sheets = Vec::new();
    for name in sheet_names.into_iter().take(XLSX_MAX_SHEETS) {
        if let Some(xml) = read_entry_bounded(&mut archive, &name, MAX_XML_ENTRY_BYTES)? {
            sheets.push(sheet_rows(&xml, &shared_strings)?);
        }
    }
    Ok(sheets)
}

/// Shared string table; each `si` may hold several rich-text runs.
fn read_shared_strings(archive: &mut Archive<'_>) -> Result<Vec<String>, ExtractionError> {
    let Some(xml) = read_entry_bounded(archive, "xl/sharedStrings.xml", MAX_XML_ENTRY_BYTES)?
    else {
        return Ok(Vec::new());
    };
    let mut strings = Vec::new();
    let mut reader = Reader::from_reader(xml.as_slice());
    let mut buf = Vec::new();
    let mut current = String::new();
    let mut in_t = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                if e.local_name().as_ref() == b"t" {
                    in_t = true;
                }
            }
            Ok(Event::Text(te)) if in_t => {
                current.push_str(&te.unescape().map_err(ooxml_err)?);
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_t = false,
                b"si" => strings.push(std::mem::take(&mut current)),
                _ => {}
            },
            Ok(Event::Empty(e)) => {
                if e.local_name().as_ref() == b"si" {
                    strings.push(String::new());
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ooxml_err(e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(strings)
}

/// Zero-based column index from a cell reference such as `"AB12"`.
/// `Ok(None)` when the reference has no column letters.
fn column_index(cell_ref: &[u8]) -> Result<Option<usize>, ExtractionError> {
    let out_of_range = || {
        ExtractionError::Ooxml(format!(
            "cell reference {} is beyond the last column",
            String::from_utf8_lossy(cell_ref)
        ))
    };
    let mut col = 0usize;
    let mut seen = false;
    for &b in cell_ref {
        if !b.is_ascii_alphabetic() {
            break;
        }
        let digit = (b.to_ascii_uppercase() - b'A' + 1) as usize;
        col = col
            .checked_mul(26)
            .and_then(|c| c.checked_add(digit))
            .filter(|c| *c <= XLSX_MAX_COLUMNS)
            .ok_or_else(out_of_range)?;
        seen = true;
    }
    Ok(seen.then(|| col - 1))
}

#[derive(Default)]
struct CellState {
    column: usize,
    kind: Vec<u8>,
    value: String,
}

fn sheet_rows(xml: &[u8], shared_strings: &[String]) -> Result<Sheet, ExtractionError> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut rows: Sheet = Vec::new();
    let mut row: Row = Vec::new();
    let mut cell: Option<CellState> = None;
    let mut next_column = 0usize;
    let mut in_value = false;
    let mut cell_count = 0usize;

    loop {
        if cell_count >= XLSX_MAX_CELLS_PER_SHEET {
            break;
        }
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"row" => {
                    row.clear();
                    next_column = 0;
                }
                b"c" => {
                    let mut state = CellState {
                        column: next_column,
                        ..CellState::default()
                    };
                    for attr in e.attributes().flatten() {
                        match attr.key.as_ref() {
                            b"r" => {
                                if let Some(col) = column_index(&attr.value)? {
                                    state.column = col;
                                }
                            }
                            b"t" => state.kind = attr.value.to_vec(),
                            _ => {}
                        }
                    }
                    if state.column >= XLSX_MAX_COLUMNS {
                        return Err(ooxml_err("row has more cells than the last column"));
                    }
                    next_column = state.column + 1;
                    cell = Some(state);
                }
                b"v" | b"t" => in_value = cell.is_some(),
                _ => {}
            },
            Ok(Event::Empty(e)) => {
                if e.local_name().as_ref() == b"c" {
                    next_column = next_column.saturating_add(1);
                }
            }
            Ok(Event::Text(te)) if in_value => {
                if let Some(state) = cell.as_mut() {
                    state.value.push_str(&te.unescape().map_err(ooxml_err)?);
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"v" | b"t" => in_value = false,
                b"c" => {
                    if let Some(state) = cell.take() {
                        let value = resolve_cell(&state, shared_strings);
                        if !value.is_empty() {
                            row.push((state.column, value));
                            cell_count += 1;
                        }
                    }
                }
                b"row" => {
                    if !row.is_empty() {
                        rows.push(ordered(std::mem::take(&mut row)));
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ooxml_err(e)),
            _ => {}
        }
        buf.clear();
    }
    if !row.is_empty() {
        rows.push(ordered(row));
    }
    Ok(rows)
}

fn resolve_cell(state: &CellState, shared_strings: &[String]) -> String {
    let raw = state.value.trim();
    match state.kind.as_slice() {
        b"s" => raw
            .parse::<usize>()
            .ok()
            .and_then(|i| shared_strings.get(i))
            .map(|s| s.trim().to_string())
            .unwrap_or_default(),
        b"b" => match raw {
            "1" => "TRUE".to_string(),
            "0" => "FALSE".to_string(),
            other => other.to_string(),
        },
        _ => raw.to_string(),
    }
}

/// Sort cells by column; a later duplicate reference wins.
fn ordered(mut cells: Row) -> Row {
    cells.sort_by_key(|(col, _)| *col);
    let mut out: Row = Vec::with_capacity(cells.len());
    for (col, value) in cells {
        match out.last_mut() {
            Some(last) if last.0 == col => last.1 = value,
            _ => out.push((col, value)),
        }
    }
    out
}
