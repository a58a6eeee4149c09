// Tolerant value parsing and display formatting.
//
// Spreadsheet exports mix currency strings, serial numbers, real dates and
// free text in the same column. Everything here degrades to `None` (or a
// fixed placeholder when rendering) instead of failing, so the report code
// can treat a bad cell as "no contribution".
use crate::types::CellValue;
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime};
use num_format::{Locale, ToFormattedString};
use once_cell::sync::Lazy;
use regex::Regex;

static DMY_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{1,2})[./-](\d{1,2})[./-](\d{4})").expect("valid day-month-year pattern")
});

// Largest serial Excel can represent (9999-12-31).
const MAX_SERIAL_DAY: f64 = 2_958_465.0;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%B %d %Y",
    "%b %d %Y",
    "%d %B %Y",
    "%d %b %Y",
];

/// Parse a currency-like string such as `"$1,234.56"` or `"USD -20"`.
///
/// Every character other than ASCII digits, `.` and `-` is dropped first, so
/// thousands separators disappear. The longest leading `-?digits[.digits]` of
/// what remains is parsed. Locales that use `.` for thousands are not
/// recognised: `"1.234,56"` reads as `1.23456`.
pub fn parse_money(raw: &str) -> Option<f64> {
    let stripped: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();

    let bytes = stripped.as_bytes();
    let mut end = 0usize;
    if bytes.first() == Some(&b'-') {
        end = 1;
    }
    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;
    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        digits += frac_end - frac_start;
        end = frac_end;
    }
    if digits == 0 {
        return None;
    }
    stripped[..end].trim_end_matches('.').parse::<f64>().ok()
}

/// Numeric value of a cell: numbers pass through, text goes through
/// [`parse_money`], dates and blanks have none.
pub fn parse_money_cell(value: &CellValue) -> Option<f64> {
    match value {
        CellValue::Number(n) if n.is_finite() => Some(*n),
        CellValue::Number(_) => None,
        CellValue::Text(s) => parse_money(s),
        CellValue::Date(_) | CellValue::Empty => None,
    }
}

/// Resolve a cell to a calendar day.
///
/// Text shaped like `D/M/YYYY` (also with `.` or `-`) is always read as
/// day-month-year and must name a real date; `31/02/2025` is rejected rather
/// than rolled into March. Anything else is tried against a list of common
/// formats. Time of day is discarded.
pub fn parse_date(value: &CellValue) -> Option<NaiveDate> {
    match value {
        CellValue::Date(dt) => Some(dt.date()),
        CellValue::Number(serial) => serial_to_date(*serial),
        CellValue::Text(s) => parse_date_str(s),
        CellValue::Empty => None,
    }
}

/// String form of [`parse_date`].
pub fn parse_date_str(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Some(caps) = DMY_PREFIX.captures(s) {
        let day: u32 = caps[1].parse().ok()?;
        let month: u32 = caps[2].parse().ok()?;
        let year: i32 = caps[3].parse().ok()?;
        if year > 1000 && (1..=12).contains(&month) && (1..=31).contains(&day) {
            if let Some(d) = NaiveDate::from_ymd_opt(year, month, day) {
                return Some(d);
            }
        }
    }

    parse_date_fallback(s)
}

fn parse_date_fallback(s: &str) -> Option<NaiveDate> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.date_naive());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }
    None
}

/// Spreadsheet serial day (1900 system) to a date.
fn serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || !(1.0..=MAX_SERIAL_DAY).contains(&serial) {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    epoch.checked_add_signed(Duration::days(serial.trunc() as i64))
}

/// Whole days from `start` to `end`. `None` when either side has no date or
/// when `end` is before `start`.
pub fn days_between(start: &CellValue, end: &CellValue) -> Option<i64> {
    let start = parse_date(start)?;
    let end = parse_date(end)?;
    let days = (end - start).num_days();
    if days >= 0 {
        Some(days)
    } else {
        None
    }
}

/// `$1,234.56` style rendering of a cell; `$0.00` when it has no amount.
pub fn format_currency(value: &CellValue) -> String {
    match parse_money_cell(value) {
        Some(n) => format_money(n),
        None => "$0.00".to_string(),
    }
}

pub fn format_money(n: f64) -> String {
    if !n.is_finite() {
        return "$0.00".to_string();
    }
    format!("${}", format_number(n, 2))
}

/// `MM/DD/YYYY` when the cell holds a date, `N/A` when blank, otherwise the
/// raw text.
pub fn format_date(value: &CellValue) -> String {
    if value.is_blank() {
        return "N/A".to_string();
    }
    match parse_date(value) {
        Some(d) => d.format("%m/%d/%Y").to_string(),
        None => value.to_string(),
    }
}

pub fn format_number(n: f64, decimals: usize) -> String {
    // Fixed decimals with en-locale thousands separators, e.g. `1,234,567.89`.
    let neg = n.is_sign_negative() && n != 0.0;
    let abs_n = n.abs();
    let s = format!("{:.*}", decimals, abs_n);
    let mut parts = s.split('.');
    let int_part = parts.next().unwrap_or("0");
    let frac_part = parts.next();
    let mut res = group_thousands(int_part);
    if let Some(frac) = frac_part {
        if decimals > 0 {
            res.push('.');
            res.push_str(frac);
        }
    }
    if neg && res.chars().any(|c| c.is_ascii_digit() && c != '0') {
        format!("-{}", res)
    } else {
        res
    }
}

/// `1234567` -> `1,234,567`. Works on the digit string, so no magnitude
/// is too large to group.
fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    n.to_formatted_string(&Locale::en)
}
