//! Decoding of CSV files and workbooks into a [`Dataset`].

use crate::error::{LoadError, LoadResult};
use crate::types::{CellValue, Dataset, Row};
use calamine::{open_workbook_auto, Data, Reader};
use chrono::NaiveDateTime;
use csv::ReaderBuilder;
use std::collections::HashSet;
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};

const WORKBOOK_EXTENSIONS: [&str; 5] = ["xlsx", "xlsm", "xlsb", "xls", "ods"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Data records seen, header excluded.
    pub total_rows: usize,
    /// Records dropped because they could not be decoded.
    pub skipped_rows: usize,
}

/// Load the first sheet of a file, picking the decoder from its extension.
pub fn load_path<P: AsRef<Path>>(path: P) -> LoadResult<(Dataset, LoadReport)> {
    let path = path.as_ref();
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    let loaded = if ext == "csv" {
        let file = std::fs::File::open(path)?;
        load_csv(file)?
    } else if WORKBOOK_EXTENSIONS.contains(&ext.as_str()) {
        load_workbook(path)?
    } else {
        return Err(LoadError::UnsupportedFormat(path.display().to_string()));
    };

    info!(
        path = %path.display(),
        rows = loaded.0.rows.len(),
        columns = loaded.0.columns.len(),
        skipped = loaded.1.skipped_rows,
        "loaded dataset"
    );
    Ok(loaded)
}

/// Decode CSV text. The first record is the header; every cell stays text
/// and blank cells become [`CellValue::Empty`].
pub fn load_csv<R: Read>(reader: R) -> LoadResult<(Dataset, LoadReport)> {
    let mut rdr = ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
    let columns = unique_headers(headers);

    let mut report = LoadReport::default();
    let mut rows: Vec<Row> = Vec::new();
    for result in rdr.records() {
        report.total_rows += 1;
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "skipping malformed CSV record");
                report.skipped_rows += 1;
                continue;
            }
        };
        let cells = columns.iter().enumerate().map(|(i, _)| match record.get(i) {
            Some(s) if !s.trim().is_empty() => CellValue::Text(s.to_string()),
            _ => CellValue::Empty,
        });
        if let Some(row) = build_row(&columns, cells) {
            rows.push(row);
        }
    }

    finish(columns, rows, report)
}

/// Decode the first worksheet of any workbook format calamine understands.
pub fn load_workbook<P: AsRef<Path>>(path: P) -> LoadResult<(Dataset, LoadReport)> {
    let mut workbook = open_workbook_auto(path)?;
    let sheet = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or(LoadError::NoSheet)?;
    let range = workbook.worksheet_range(&sheet)?;

    let mut sheet_rows = range.rows();
    let Some(header_row) = sheet_rows.next() else {
        return Err(LoadError::Empty);
    };
    let columns = unique_headers(header_row.iter().map(header_name).collect());

    let mut report = LoadReport::default();
    let mut rows: Vec<Row> = Vec::new();
    for cells in sheet_rows {
        report.total_rows += 1;
        let values = (0..columns.len())
            .map(|i| cells.get(i).map(cell_value).unwrap_or(CellValue::Empty));
        if let Some(row) = build_row(&columns, values) {
            rows.push(row);
        }
    }

    finish(columns, rows, report)
}

fn finish(
    columns: Vec<String>,
    rows: Vec<Row>,
    report: LoadReport,
) -> LoadResult<(Dataset, LoadReport)> {
    if rows.is_empty() {
        return Err(LoadError::Empty);
    }
    Ok((Dataset { columns, rows }, report))
}

/// Rows made only of blank cells are dropped.
fn build_row<I>(columns: &[String], values: I) -> Option<Row>
where
    I: IntoIterator<Item = CellValue>,
{
    let mut row = Row::new();
    let mut any = false;
    for (name, value) in columns.iter().zip(values) {
        any |= !value.is_blank();
        row.push(name.clone(), value);
    }
    if any {
        Some(row)
    } else {
        None
    }
}

fn bool_text(b: bool) -> String {
    let text = if b { "TRUE" } else { "FALSE" };
    text.to_string()
}

fn header_name(cell: &Data) -> String {
    match cell {
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => CellValue::Number(*f).to_string(),
        Data::Bool(b) => bool_text(*b),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        _ => String::new(),
    }
}

fn cell_value(cell: &Data) -> CellValue {
    match cell {
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Float(f) => CellValue::Number(*f),
        Data::String(s) if s.trim().is_empty() => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Bool(b) => CellValue::Text(bool_text(*b)),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(ndt) => CellValue::Date(ndt),
            None => CellValue::Number(dt.as_f64()),
        },
        Data::DateTimeIso(s) => parse_iso_datetime(s)
            .map(CellValue::Date)
            .unwrap_or_else(|| CellValue::Text(s.clone())),
        Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Error(_) | Data::Empty => CellValue::Empty,
    }
}

fn parse_iso_datetime(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .or_else(|| {
            chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Blank headers become `__EMPTY`, `__EMPTY_1`, ...; repeats get `_1`, `_2`
/// suffixes so every column name is unique.
fn unique_headers(raw: Vec<String>) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut out = Vec::with_capacity(raw.len());
    for name in raw {
        let base = if name.trim().is_empty() {
            "__EMPTY".to_string()
        } else {
            name
        };
        let mut candidate = base.clone();
        let mut n = 0usize;
        while seen.contains(&candidate) {
            n += 1;
            candidate = format!("{}_{}", base, n);
        }
        seen.insert(candidate.clone());
        out.push(candidate);
    }
    out
}
