// Column role detection.
//
// All keyword guessing about what a header means lives here. The report
// pipeline only ever receives explicit column names, so an explicit user
// mapping can replace these heuristics without touching it.
use crate::types::{Measure, Selection, TopN};

const NON_LABEL_KEYWORDS: [&str; 5] = ["payment", "total amount", "price", "tax", "date"];

fn first_containing<'a>(columns: &'a [String], keywords: &[&str]) -> Option<&'a str> {
    columns
        .iter()
        .find(|c| {
            let lower = c.to_lowercase();
            keywords.iter().any(|k| lower.contains(k))
        })
        .map(String::as_str)
}

/// Columns that make sense as grouping keys: anything that does not look
/// like a status, amount, price, tax or date column.
pub fn label_candidates(columns: &[String]) -> Vec<&str> {
    columns
        .iter()
        .filter(|c| {
            let lower = c.to_lowercase();
            !NON_LABEL_KEYWORDS.iter().any(|k| lower.contains(k))
        })
        .map(String::as_str)
        .collect()
}

/// Columns offered as a summable measure besides count mode.
pub fn measure_candidates(columns: &[String]) -> Vec<&str> {
    columns
        .iter()
        .filter(|c| c.to_lowercase().contains("total amount"))
        .map(String::as_str)
        .collect()
}

fn candidate_containing<'a>(candidates: &[&'a str], keywords: &[&str]) -> Option<&'a str> {
    candidates.iter().copied().find(|c| {
        let lower = c.to_lowercase();
        keywords.iter().any(|k| lower.contains(k))
    })
}

/// Customer/supplier first, then PV code, then the first candidate.
pub fn default_label(columns: &[String]) -> Option<&str> {
    let candidates = label_candidates(columns);
    candidate_containing(&candidates, &["customer", "supplier"])
        .or_else(|| candidate_containing(&candidates, &["pv code"]))
        .or_else(|| candidates.first().copied())
}

/// A "total amount" column, else whatever sits in the second position.
pub fn default_measure(columns: &[String]) -> Option<&str> {
    first_containing(columns, &["total amount"]).or_else(|| columns.get(1).map(String::as_str))
}

pub fn payment_status_column(columns: &[String]) -> Option<&str> {
    first_containing(columns, &["payment"])
}

/// "total amount" wins over "total paid" even when the latter comes first.
pub fn total_column(columns: &[String]) -> Option<&str> {
    first_containing(columns, &["total amount"])
        .or_else(|| first_containing(columns, &["total paid"]))
}

pub fn entity_column(columns: &[String]) -> Option<&str> {
    first_containing(columns, &["supplier", "customer"])
}

/// Initial selection offered right after a file is loaded.
pub fn default_selection(columns: &[String]) -> Selection {
    Selection {
        label: default_label(columns).map(str::to_string),
        measure: default_measure(columns).map(|c| Measure::Column(c.to_string())),
        top_n: TopN::default(),
    }
}
