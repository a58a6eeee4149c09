use chrono::{NaiveDateTime, NaiveTime};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::fmt;
use tabled::Tabled;

/// Sentinel used by the front end for count mode.
pub const COUNT_SENTINEL: &str = "COUNT_OF_LABELS";
/// Display name of the count-mode measure.
pub const COUNT_MEASURE_NAME: &str = "Total Cooperated";

/// A single decoded spreadsheet cell.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Number(f64),
    Date(NaiveDateTime),
    Empty,
}

impl CellValue {
    /// `Empty` and blank text both count as "no value" for lookups and labels.
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Text(s) => f.write_str(s),
            // Integral numbers print without a trailing `.0`, as a sheet would show them.
            CellValue::Number(n) if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 => {
                write!(f, "{}", *n as i64)
            }
            CellValue::Number(n) => write!(f, "{}", n),
            CellValue::Date(dt) if dt.time() == NaiveTime::MIN => {
                write!(f, "{}", dt.format("%Y-%m-%d"))
            }
            CellValue::Date(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
            CellValue::Empty => Ok(()),
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

impl Serialize for CellValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            CellValue::Text(s) => serializer.serialize_str(s),
            CellValue::Number(n) => serializer.serialize_f64(*n),
            CellValue::Date(_) => serializer.collect_str(self),
            CellValue::Empty => serializer.serialize_none(),
        }
    }
}

/// One decoded record: column name to value, in header order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    fields: Vec<(String, CellValue)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field. A repeated name replaces the earlier value in place.
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<CellValue>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name, value)),
        }
    }

    /// Builder form of [`Row::push`].
    pub fn with(mut self, name: impl Into<String>, value: impl Into<CellValue>) -> Self {
        self.push(name, value);
        self
    }

    /// Exact lookup by column name.
    pub fn get(&self, name: &str) -> Option<&CellValue> {
        self.fields.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    /// Fuzzy lookup: names are compared lowercased with every whitespace
    /// character removed, so `"PV Code "` matches `"pv code"` and `"pvcode"`.
    pub fn find_by_key(&self, key: &str) -> Option<&CellValue> {
        let wanted = squash_key(key);
        self.fields
            .iter()
            .find(|(k, _)| squash_key(k) == wanted)
            .map(|(_, v)| v)
    }

    /// Stringified cell, or an empty string when the column is absent.
    pub fn text(&self, name: &str) -> String {
        self.get(name).map(|v| v.to_string()).unwrap_or_default()
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CellValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

fn squash_key(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (k, v) in &self.fields {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// Decoded sheet: rows plus the ordered column names taken from the header.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl Dataset {
    /// Build a dataset whose columns are the first row's keys.
    pub fn from_rows(rows: Vec<Row>) -> Self {
        let columns = rows
            .first()
            .map(|r| r.columns().map(str::to_string).collect())
            .unwrap_or_default();
        Self { columns, rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// What each group is reduced to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Measure {
    /// Sum of a numeric column.
    Column(String),
    /// One per row.
    Count,
}

impl Measure {
    /// Accepts either a column name or the count sentinel.
    pub fn from_choice(choice: &str) -> Self {
        if choice == COUNT_SENTINEL {
            Measure::Count
        } else {
            Measure::Column(choice.to_string())
        }
    }

    pub fn is_count(&self) -> bool {
        matches!(self, Measure::Count)
    }

    pub fn column(&self) -> Option<&str> {
        match self {
            Measure::Column(c) => Some(c),
            Measure::Count => None,
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            Measure::Column(c) => c,
            Measure::Count => COUNT_MEASURE_NAME,
        }
    }
}

/// How many ranked entries to keep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TopN {
    Limit(usize),
    All,
}

impl TopN {
    pub const PRESETS: [TopN; 6] = [
        TopN::Limit(10),
        TopN::Limit(20),
        TopN::Limit(30),
        TopN::Limit(50),
        TopN::Limit(100),
        TopN::All,
    ];

    /// Parse `"all"`, `"-1"` or a positive integer.
    pub fn parse(s: &str) -> Option<TopN> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("all") || s == "-1" {
            return Some(TopN::All);
        }
        match s.parse::<usize>() {
            Ok(n) if n > 0 => Some(TopN::Limit(n)),
            _ => None,
        }
    }

    /// `"Top 10"` / `"All"`, used in titles.
    pub fn display(&self) -> String {
        match self {
            TopN::Limit(n) => format!("Top {}", n),
            TopN::All => "All".to_string(),
        }
    }

    /// `"top_10"` / `"all"`, used in export file names.
    pub fn file_tag(&self) -> String {
        match self {
            TopN::Limit(n) => format!("top_{}", n),
            TopN::All => "all".to_string(),
        }
    }
}

impl Default for TopN {
    fn default() -> Self {
        TopN::Limit(10)
    }
}

/// Current column/measure/top-N choice. Everything derived is a pure
/// function of the rows and this tuple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Selection {
    pub label: Option<String>,
    pub measure: Option<Measure>,
    pub top_n: TopN,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateEntry {
    pub name: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailedEntry {
    pub name: String,
    pub value: f64,
    pub details: Vec<Row>,
}

impl DetailedEntry {
    pub fn entry(&self) -> AggregateEntry {
        AggregateEntry {
            name: self.name.clone(),
            value: self.value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct SummaryStats {
    pub total_rows: usize,
    pub distinct_entities: usize,
    pub total_monetary: f64,
}

/// Everything the rendering side needs for one selection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub title: String,
    pub paid_only: bool,
    pub entries: Vec<AggregateEntry>,
    pub detailed: Vec<DetailedEntry>,
    pub stats: SummaryStats,
}

impl Report {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Console preview row for the ranked list.
#[derive(Debug, Serialize, Tabled, Clone)]
pub struct RankingRow {
    #[serde(rename = "Rank")]
    #[tabled(rename = "Rank")]
    pub rank: usize,
    #[serde(rename = "Name")]
    #[tabled(rename = "Name")]
    pub name: String,
    #[serde(rename = "Value")]
    #[tabled(rename = "Value")]
    pub value: String,
    #[serde(rename = "Transactions")]
    #[tabled(rename = "Transactions")]
    pub transactions: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn find_by_key_ignores_case_and_spacing() {
        let row = Row::new()
            .with(" PV  Code", "PV-001")
            .with("Invoice No", "INV-9");
        assert_eq!(row.find_by_key("pv code"), Some(&CellValue::from("PV-001")));
        assert_eq!(row.find_by_key("invoiceno"), Some(&CellValue::from("INV-9")));
        assert_eq!(row.find_by_key("purpose"), None);
    }

    #[test]
    fn push_replaces_existing_field() {
        let mut row = Row::new().with("A", "1");
        row.push("A", "2");
        assert_eq!(row.len(), 1);
        assert_eq!(row.text("A"), "2");
    }

    #[test]
    fn display_matches_sheet_rendering() {
        assert_eq!(CellValue::Number(42.0).to_string(), "42");
        assert_eq!(CellValue::Number(1.5).to_string(), "1.5");
        let midnight = NaiveDate::from_ymd_opt(2024, 3, 15)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(CellValue::Date(midnight).to_string(), "2024-03-15");
        assert_eq!(CellValue::Empty.to_string(), "");
    }

    #[test]
    fn top_n_parsing() {
        assert_eq!(TopN::parse("20"), Some(TopN::Limit(20)));
        assert_eq!(TopN::parse("All"), Some(TopN::All));
        assert_eq!(TopN::parse("-1"), Some(TopN::All));
        assert_eq!(TopN::parse("0"), None);
        assert_eq!(TopN::parse("ten"), None);
        assert_eq!(TopN::Limit(5).file_tag(), "top_5");
        assert_eq!(TopN::All.display(), "All");
    }

    #[test]
    fn measure_from_sentinel() {
        assert_eq!(Measure::from_choice(COUNT_SENTINEL), Measure::Count);
        assert_eq!(Measure::Count.display_name(), "Total Cooperated");
        assert_eq!(
            Measure::from_choice("Total Amount").column(),
            Some("Total Amount")
        );
    }

    #[test]
    fn dataset_columns_come_from_first_row() {
        let ds = Dataset::from_rows(vec![Row::new().with("X", "1").with("Y", "2")]);
        assert_eq!(ds.columns, vec!["X", "Y"]);
        assert!(Dataset::from_rows(vec![]).columns.is_empty());
    }
}
