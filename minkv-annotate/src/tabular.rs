//! Delimited tabular input
//!
//! The delimiter is sniffed from widening leading windows of the text.
//! The first row is the header; every other row becomes an `InputRecord`.

use crate::error::{AnnotateError, AnnotateResult};
use crate::model::{EntityKind, InputRecord};
use indexmap::IndexMap;

/// `(window size in chars, candidate delimiters in preference order)`
const SNIFF_WINDOWS: [(usize, &[u8]); 3] = [
    (500, b",;\t"),
    (1000, b",;\t"),
    (2000, b";,\t"),
];

const DEFAULT_DELIMITER: u8 = b',';

const BOM: char = '\u{feff}';

/// Guess the delimiter of `text`, defaulting to `,`
pub fn sniff_delimiter(text: &str) -> u8 {
    for (window, candidates) in SNIFF_WINDOWS {
        if let Some(delimiter) = sniff_window(text, window, candidates) {
            tracing::debug!(
                delimiter = %(delimiter as char).escape_default(),
                window,
                "Sniffed delimiter"
            );
            return delimiter;
        }
    }
    tracing::warn!("Failed to sniff delimiter, using ','");
    DEFAULT_DELIMITER
}

fn sniff_window(text: &str, window: usize, candidates: &[u8]) -> Option<u8> {
    let truncated = text.chars().count() > window;
    let sample: String = text.chars().take(window).collect();

    let mut lines: Vec<&str> = sample.lines().filter(|l| !l.trim().is_empty()).collect();
    if truncated && lines.len() > 1 {
        lines.pop();
    }
    if lines.is_empty() {
        return None;
    }

    candidates.iter().copied().find(|&delimiter| {
        let first = count_unquoted(lines[0], delimiter);
        first > 0 && lines.iter().all(|line| count_unquoted(line, delimiter) == first)
    })
}

fn count_unquoted(line: &str, delimiter: u8) -> usize {
    let mut quoted = false;
    let mut count = 0;
    for byte in line.bytes() {
        if byte == b'"' {
            quoted = !quoted;
        } else if byte == delimiter && !quoted {
            count += 1;
        }
    }
    count
}

/// Parsed table: header plus data rows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabularTable {
    pub delimiter: u8,
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Parse `text` with a sniffed delimiter
pub fn read_table(text: &str) -> AnnotateResult<TabularTable> {
    let text = text.strip_prefix(BOM).unwrap_or(text);
    let delimiter = sniff_delimiter(text);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(str::to_string).collect::<Vec<_>>());
    }

    if rows.is_empty() {
        return Err(AnnotateError::Common(minkv_common::Error::InvalidInput(
            "Tabular input is empty".to_string(),
        )));
    }
    let header = rows.remove(0);

    tracing::info!(columns = header.len(), rows = rows.len(), "Read tabular input");

    Ok(TabularTable {
        delimiter,
        header,
        rows,
    })
}

/// Column positions used for resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnLayout {
    pub image: usize,
    pub well: Option<usize>,
    pub plate: Option<usize>,
}

impl ColumnLayout {
    /// Locate the resolution columns; Plate/Screen roots need `well` and `plate`
    pub fn from_header(header: &[String], root_kind: EntityKind) -> AnnotateResult<Self> {
        let image = find_column(header, "image").unwrap_or(0);

        let (well, plate) = match root_kind {
            EntityKind::Plate | EntityKind::Screen => {
                let well = find_column(header, "well")
                    .ok_or_else(|| AnnotateError::MissingColumn("well".to_string()))?;
                let plate = find_column(header, "plate")
                    .ok_or_else(|| AnnotateError::MissingColumn("plate".to_string()))?;
                (Some(well), Some(plate))
            }
            _ => (None, None),
        };

        tracing::debug!(image, ?well, ?plate, "Column layout");
        Ok(Self { image, well, plate })
    }

    fn is_resolution_column(&self, index: usize) -> bool {
        index == self.image || Some(index) == self.well || Some(index) == self.plate
    }
}

fn find_column(header: &[String], name: &str) -> Option<usize> {
    header
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case(name))
}

/// One record per data row; cells beyond the header are ignored
pub fn records(table: &TabularTable, layout: &ColumnLayout) -> Vec<InputRecord> {
    table
        .rows
        .iter()
        .map(|row| {
            let cell = |index: Option<usize>| index.and_then(|i| row.get(i)).map(String::as_str);

            let mut fields: IndexMap<String, Vec<String>> = IndexMap::new();
            for (index, value) in row.iter().enumerate().take(table.header.len()) {
                if layout.is_resolution_column(index) {
                    continue;
                }
                fields
                    .entry(table.header[index].trim().to_string())
                    .or_default()
                    .push(value.clone());
            }

            InputRecord {
                fields,
                ..InputRecord::new(
                    cell(Some(layout.image)).unwrap_or_default(),
                    cell(layout.well),
                    cell(layout.plate),
                )
            }
        })
        .collect()
}
