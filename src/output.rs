use crate::error::{ExportError, ExportResult};
use crate::reports::TransactionLine;
use crate::types::{CellValue, DetailedEntry, RankingRow, Report, Row, TopN};
use crate::util::{format_int, format_money};
use chrono::NaiveDate;
use rust_xlsxwriter::{Format, Workbook};
use serde::Serialize;
use std::path::Path;
use tabled::{settings::Style, Table, Tabled};
use tracing::info;

pub const EXPORT_SHEET_NAME: &str = "Top Data Details";

/// Flatten ranked entries into exportable records: each entry's detail rows
/// as they are, or a `{name, value}` stand-in when it has none.
pub fn flatten_for_export(detailed: &[DetailedEntry]) -> Vec<Row> {
    detailed
        .iter()
        .flat_map(|entry| {
            if entry.details.is_empty() {
                vec![Row::new()
                    .with("name", entry.name.as_str())
                    .with("value", entry.value)]
            } else {
                entry.details.clone()
            }
        })
        .collect()
}

/// Everything before the first `.` of a file name.
fn file_stem(source_name: &str) -> &str {
    source_name.split('.').next().unwrap_or(source_name)
}

/// `vouchers.xlsx` with top 10 -> `vouchers_top_10_details.xlsx`.
pub fn export_file_name(source_name: &str, top_n: TopN) -> String {
    format!("{}_{}_details.xlsx", file_stem(source_name), top_n.file_tag())
}

/// `vouchers.xlsx` with top 10 -> `vouchers_top_10_summary.json`.
pub fn summary_file_name(source_name: &str, top_n: TopN) -> String {
    format!("{}_{}_summary.json", file_stem(source_name), top_n.file_tag())
}

pub fn chart_file_name(source_name: &str) -> String {
    format!("{}_chart.png", file_stem(source_name))
}

/// Column names across all records, in first-seen order.
pub fn union_columns(rows: &[Row]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for row in rows {
        for name in row.columns() {
            if !columns.iter().any(|c| c == name) {
                columns.push(name.to_string());
            }
        }
    }
    columns
}

/// Write row records as CSV; records missing a column get an empty cell.
pub fn write_rows_csv(path: &Path, rows: &[Row]) -> ExportResult<()> {
    if rows.is_empty() {
        return Err(ExportError::NothingToExport);
    }
    let columns = union_columns(rows);
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(&columns)?;
    for row in rows {
        let record: Vec<String> = columns.iter().map(|c| row.text(c)).collect();
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    info!(path = %path.display(), rows = rows.len(), "wrote CSV export");
    Ok(())
}

/// Write row records to a single-sheet workbook. Numbers stay numeric and
/// dates get a date format.
pub fn write_xlsx(path: &Path, rows: &[Row]) -> ExportResult<()> {
    if rows.is_empty() {
        return Err(ExportError::NothingToExport);
    }
    let columns = union_columns(rows);
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(EXPORT_SHEET_NAME)?;

    let header = Format::new().set_bold();
    let date_format = Format::new().set_num_format("yyyy-mm-dd");
    let datetime_format = Format::new().set_num_format("yyyy-mm-dd hh:mm:ss");

    for (col, name) in columns.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, name, &header)?;
    }
    for (i, row) in rows.iter().enumerate() {
        let r = (i + 1) as u32;
        for (col, name) in columns.iter().enumerate() {
            let c = col as u16;
            match row.get(name) {
                Some(CellValue::Number(n)) => {
                    worksheet.write_number(r, c, *n)?;
                }
                Some(CellValue::Text(s)) => {
                    worksheet.write_string(r, c, s)?;
                }
                Some(CellValue::Date(dt)) => {
                    let serial = excel_serial(dt);
                    let format = if serial.fract() == 0.0 {
                        &date_format
                    } else {
                        &datetime_format
                    };
                    worksheet.write_number_with_format(r, c, serial, format)?;
                }
                Some(CellValue::Empty) | None => {}
            }
        }
    }

    workbook.save(path)?;
    info!(path = %path.display(), rows = rows.len(), "wrote workbook export");
    Ok(())
}

/// Days since 1899-12-30, with the time of day as the fraction.
fn excel_serial(dt: &chrono::NaiveDateTime) -> f64 {
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default();
    (*dt - epoch).num_seconds() as f64 / 86_400.0
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> ExportResult<()> {
    let s = serde_json::to_string_pretty(value)?;
    std::fs::write(path, s)?;
    Ok(())
}

/// Ranked entries as preview rows; count mode shows plain integers.
pub fn ranking_rows(report: &Report, count_mode: bool) -> Vec<RankingRow> {
    report
        .detailed
        .iter()
        .enumerate()
        .map(|(idx, entry)| RankingRow {
            rank: idx + 1,
            name: entry.name.clone(),
            value: format_value(entry.value, count_mode),
            transactions: entry.details.len(),
        })
        .collect()
}

pub fn format_value(value: f64, count_mode: bool) -> String {
    if count_mode {
        format_int(value.round() as i64)
    } else {
        format_money(value)
    }
}

pub fn preview_table_rows<T>(rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    let slice: Vec<T> = rows.iter().cloned().take(max_rows).collect();
    if slice.is_empty() {
        println!("(no rows)\n");
        return;
    }
    let table_str = Table::new(slice).with(Style::markdown()).to_string();
    println!("{}\n", table_str);
}

/// Stat cards, the ranking table and the drill-down of every entry with
/// more than one transaction.
pub fn print_report(report: &Report, count_mode: bool) {
    println!("{}\n", report.title);
    println!("Total Vouchers:  {}", format_int(report.stats.total_rows));
    println!("Total Customers: {}", format_int(report.stats.distinct_entities));
    println!("Total Paid:      {}\n", format_money(report.stats.total_monetary));

    let ranking = ranking_rows(report, count_mode);
    preview_table_rows(&ranking, ranking.len());

    for (idx, entry) in report.detailed.iter().enumerate() {
        if entry.details.len() <= 1 {
            continue;
        }
        println!(
            "{}. {} ({} transactions)",
            idx + 1,
            entry.name,
            entry.details.len()
        );
        for (i, row) in entry.details.iter().enumerate() {
            print_transaction(&TransactionLine::from_row(row, i));
        }
        println!();
    }
}

fn print_transaction(line: &TransactionLine) {
    println!("   - {}  {}", line.heading, line.amount);
    if let Some(c) = &line.customer {
        println!("       Customer: {}", c);
    }
    if let Some(inv) = &line.invoice_no {
        println!("       Invoice No: {}", inv);
    }
    println!("       Date: {}", line.date);
    println!("       Expire Date: {}", line.expire_date);
    if let Some(days) = line.processing_days {
        println!("       Total Processing: {} days", days);
    }
    if let Some(p) = &line.purpose {
        println!("       Purpose: {}", p);
    }
}
