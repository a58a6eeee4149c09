use crate::columns::{entity_column, payment_status_column, total_column};
use crate::types::{
    AggregateEntry, CellValue, Dataset, DetailedEntry, Measure, Report, Row, Selection,
    SummaryStats, TopN,
};
use crate::util::{days_between, format_currency, format_date, parse_money_cell};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Rows considered settled. With a payment-status column only rows whose
/// status reads `paid` (any case, surrounding spaces ignored) survive;
/// without one every row does. Input order is kept.
pub fn filter_paid<'a>(rows: &'a [Row], columns: &[String]) -> Vec<&'a Row> {
    match payment_status_column(columns) {
        Some(status) => rows
            .iter()
            .filter(|r| r.text(status).trim().to_lowercase() == "paid")
            .collect(),
        None => rows.iter().collect(),
    }
}

/// Grouping key of a row, or `None` when the label cell is missing or blank.
fn label_key(row: &Row, label: &str) -> Option<String> {
    match row.get(label) {
        Some(v) if !v.is_blank() => Some(v.to_string()),
        _ => None,
    }
}

fn measure_of(row: &Row, column: &str) -> Option<f64> {
    row.get(column).and_then(parse_money_cell)
}

/// Descending by value; incomparable values count as equal.
fn by_value_desc(a: f64, b: f64) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}

/// Rank groups of `rows` by the chosen measure.
///
/// Count mode adds one per labelled row. Sum mode adds the parsed measure
/// only when it is strictly positive, so a group made purely of zero or
/// unparseable amounts never shows up. Ties keep the order in which groups
/// first contributed. Without a label or measure there is nothing to rank.
///
/// A group's amounts are added largest first, the order
/// [`attach_details`] lists them in, so both sides agree to the last bit.
pub fn aggregate(
    rows: &[&Row],
    label: Option<&str>,
    measure: Option<&Measure>,
    top_n: TopN,
) -> Vec<AggregateEntry> {
    let (Some(label), Some(measure)) = (label, measure) else {
        return Vec::new();
    };

    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<(String, Vec<f64>)> = Vec::new();
    for row in rows {
        let Some(key) = label_key(row, label) else {
            continue;
        };
        let amount = match measure {
            Measure::Count => 1.0,
            Measure::Column(column) => match measure_of(row, column) {
                Some(v) if v > 0.0 => v,
                _ => continue,
            },
        };
        match index.get(&key) {
            Some(&i) => groups[i].1.push(amount),
            None => {
                index.insert(key.clone(), groups.len());
                groups.push((key, vec![amount]));
            }
        }
    }

    let mut ranked: Vec<AggregateEntry> = groups
        .into_iter()
        .map(|(name, mut amounts)| {
            amounts.sort_by(|a, b| by_value_desc(*a, *b));
            AggregateEntry {
                name,
                value: amounts.iter().sum(),
            }
        })
        .collect();

    // `sort_by` is stable, which keeps equal values in encounter order.
    ranked.sort_by(|a, b| by_value_desc(a.value, b.value));
    if let TopN::Limit(n) = top_n {
        ranked.truncate(n);
    }
    ranked
}

/// Attach to each ranked entry every filtered row sharing its label, highest
/// measure first. Rows whose measure did not parse are still listed (sorted
/// as zero); they just never counted towards the entry's value.
pub fn attach_details(
    rows: &[&Row],
    entries: &[AggregateEntry],
    label: &str,
    measure: &Measure,
) -> Vec<DetailedEntry> {
    let mut groups: HashMap<String, Vec<&Row>> = HashMap::new();
    for row in rows {
        if let Some(key) = label_key(row, label) {
            groups.entry(key).or_default().push(*row);
        }
    }

    entries
        .iter()
        .map(|entry| {
            let mut details: Vec<&Row> = groups.get(&entry.name).cloned().unwrap_or_default();
            if let Measure::Column(column) = measure {
                details.sort_by(|a, b| {
                    by_value_desc(
                        measure_of(a, column).unwrap_or(0.0),
                        measure_of(b, column).unwrap_or(0.0),
                    )
                });
            }
            DetailedEntry {
                name: entry.name.clone(),
                value: entry.value,
                details: details.into_iter().cloned().collect(),
            }
        })
        .collect()
}

/// Stat-card figures over the filtered rows. Independent of the chosen
/// label, measure and top-N.
pub fn summary_stats(rows: &[&Row], columns: &[String]) -> SummaryStats {
    let total_monetary = match total_column(columns) {
        Some(column) => rows
            .iter()
            .map(|r| measure_of(r, column).unwrap_or(0.0))
            .sum(),
        None => 0.0,
    };
    let distinct_entities = match entity_column(columns) {
        Some(column) => rows
            .iter()
            .filter_map(|r| label_key(r, column))
            .collect::<HashSet<String>>()
            .len(),
        None => 0,
    };
    SummaryStats {
        total_rows: rows.len(),
        distinct_entities,
        total_monetary,
    }
}

/// e.g. `Top 10 Customer by Total Amount (Paid Only)`.
pub fn report_title(selection: &Selection, columns: &[String]) -> String {
    let (Some(label), Some(measure)) = (&selection.label, &selection.measure) else {
        return "Top Items".to_string();
    };
    let suffix = if payment_status_column(columns).is_some() {
        " (Paid Only)"
    } else {
        ""
    };
    format!(
        "{} {} by {}{}",
        selection.top_n.display(),
        label,
        measure.display_name(),
        suffix
    )
}

/// Run the whole pipeline for one selection: filter once, then rank,
/// attach details and compute stats from that same filtered set.
pub fn build_report(dataset: &Dataset, selection: &Selection) -> Report {
    let columns = &dataset.columns;
    let filtered = filter_paid(&dataset.rows, columns);
    let entries = aggregate(
        &filtered,
        selection.label.as_deref(),
        selection.measure.as_ref(),
        selection.top_n,
    );
    let detailed = match (&selection.label, &selection.measure) {
        (Some(label), Some(measure)) if !entries.is_empty() => {
            attach_details(&filtered, &entries, label, measure)
        }
        _ => Vec::new(),
    };
    let stats = summary_stats(&filtered, columns);
    debug!(
        rows = dataset.rows.len(),
        filtered = filtered.len(),
        entries = entries.len(),
        "built report"
    );
    Report {
        title: report_title(selection, columns),
        paid_only: payment_status_column(columns).is_some(),
        entries,
        detailed,
        stats,
    }
}

/// Drill-down view of one voucher, with fields located by fuzzy header match.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionLine {
    pub heading: String,
    pub amount: String,
    pub customer: Option<String>,
    pub invoice_no: Option<String>,
    pub date: String,
    pub expire_date: String,
    pub processing_days: Option<i64>,
    pub purpose: Option<String>,
}

fn lookup<'a>(row: &'a Row, keys: &[&str]) -> Option<&'a CellValue> {
    keys.iter()
        .filter_map(|k| row.find_by_key(k))
        .find(|v| !v.is_blank())
}

fn lookup_text(row: &Row, keys: &[&str]) -> Option<String> {
    lookup(row, keys).map(|v| v.to_string())
}

impl TransactionLine {
    /// `index` is zero-based; it only shows up when the row has no PV code.
    pub fn from_row(row: &Row, index: usize) -> Self {
        let blank = CellValue::Empty;
        let date = lookup(row, &["date", "create date"]).unwrap_or(&blank);
        let expire = lookup(row, &["expire date", "paid date"]).unwrap_or(&blank);
        let amount = lookup(row, &["total amount", "total paid"]).unwrap_or(&blank);
        Self {
            heading: lookup_text(row, &["pv code"])
                .unwrap_or_else(|| format!("Transaction #{}", index + 1)),
            amount: format_currency(amount),
            customer: lookup_text(row, &["customer", "supplier"]),
            invoice_no: lookup_text(row, &["invoice no"]),
            date: format_date(date),
            expire_date: format_date(expire),
            processing_days: days_between(date, expire),
            purpose: lookup_text(row, &["purpose"]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Dataset;

    fn voucher(customer: &str, total: &str, status: &str) -> Row {
        Row::new()
            .with("Customer", customer)
            .with("Total", total)
            .with("Payment Status", status)
    }

    fn scenario() -> Dataset {
        Dataset::from_rows(vec![
            voucher("A", "$100.00", "Paid"),
            voucher("A", "$50.00", "Pending"),
            voucher("B", "$30.00", "Paid"),
        ])
    }

    fn entry(name: &str, value: f64) -> AggregateEntry {
        AggregateEntry {
            name: name.to_string(),
            value,
        }
    }

    fn sum_measure() -> Measure {
        Measure::Column("Total".to_string())
    }

    #[test]
    fn filter_keeps_only_paid_rows() {
        let ds = scenario();
        let paid = filter_paid(&ds.rows, &ds.columns);
        assert_eq!(paid.len(), 2);
        assert_eq!(paid[0].text("Customer"), "A");
        assert_eq!(paid[1].text("Customer"), "B");
    }

    #[test]
    fn filter_status_is_trimmed_and_case_insensitive() {
        let ds = Dataset::from_rows(vec![
            voucher("A", "1", "  PAID "),
            voucher("B", "1", "paid."),
            voucher("C", "1", "Unpaid"),
        ]);
        let paid = filter_paid(&ds.rows, &ds.columns);
        assert_eq!(paid.len(), 1);
        assert_eq!(paid[0].text("Customer"), "A");
    }

    #[test]
    fn filter_passes_everything_without_status_column() {
        let rows = vec![
            Row::new().with("Customer", "A").with("Total", "1"),
            Row::new().with("Customer", "B").with("Total", "2"),
        ];
        let ds = Dataset::from_rows(rows);
        let kept = filter_paid(&ds.rows, &ds.columns);
        assert_eq!(kept.len(), ds.rows.len());
    }

    #[test]
    fn sum_mode_ranks_paid_totals() {
        let ds = scenario();
        let paid = filter_paid(&ds.rows, &ds.columns);
        let ranked = aggregate(&paid, Some("Customer"), Some(&sum_measure()), TopN::All);
        assert_eq!(ranked, vec![entry("A", 100.0), entry("B", 30.0)]);
        assert_eq!(summary_stats(&paid, &ds.columns).total_rows, 2);
    }

    #[test]
    fn count_mode_keeps_encounter_order_on_ties() {
        let ds = scenario();
        let paid = filter_paid(&ds.rows, &ds.columns);
        let ranked = aggregate(&paid, Some("Customer"), Some(&Measure::Count), TopN::All);
        assert_eq!(ranked, vec![entry("A", 1.0), entry("B", 1.0)]);
    }

    #[test]
    fn non_positive_and_unparseable_amounts_are_skipped() {
        let rows = vec![
            Row::new().with("Customer", "A").with("Total", "N/A"),
            Row::new().with("Customer", "A").with("Total", "-5"),
            Row::new().with("Customer", "A").with("Total", "20"),
            Row::new().with("Customer", "Z").with("Total", "0"),
            Row::new().with("Customer", "").with("Total", "99"),
            Row::new().with("Customer", "   ").with("Total", "99"),
        ];
        let refs: Vec<&Row> = rows.iter().collect();
        let ranked = aggregate(&refs, Some("Customer"), Some(&sum_measure()), TopN::All);
        assert_eq!(ranked, vec![entry("A", 20.0)]);
    }

    #[test]
    fn numeric_cells_are_summed_directly() {
        let rows = vec![
            Row::new().with("Customer", "A").with("Total", 12.5),
            Row::new().with("Customer", "A").with("Total", 7.5),
        ];
        let refs: Vec<&Row> = rows.iter().collect();
        let ranked = aggregate(&refs, Some("Customer"), Some(&sum_measure()), TopN::All);
        assert_eq!(ranked, vec![entry("A", 20.0)]);
    }

    #[test]
    fn missing_configuration_yields_nothing() {
        let ds = scenario();
        let paid = filter_paid(&ds.rows, &ds.columns);
        assert!(aggregate(&paid, None, Some(&Measure::Count), TopN::All).is_empty());
        assert!(aggregate(&paid, Some("Customer"), None, TopN::All).is_empty());
        assert!(aggregate(&[], Some("Customer"), Some(&Measure::Count), TopN::All).is_empty());
    }

    #[test]
    fn top_n_is_a_prefix_of_the_full_ranking() {
        let rows: Vec<Row> = (0..12)
            .map(|i| {
                Row::new()
                    .with("Customer", format!("C{}", i % 6))
                    .with("Total", format!("{}", (i * 7) % 5 + 1))
            })
            .collect();
        let refs: Vec<&Row> = rows.iter().collect();
        let all = aggregate(&refs, Some("Customer"), Some(&sum_measure()), TopN::All);
        assert!(all.windows(2).all(|w| w[0].value >= w[1].value));
        for n in 1..=all.len() {
            let top = aggregate(&refs, Some("Customer"), Some(&sum_measure()), TopN::Limit(n));
            assert_eq!(top, all[..n].to_vec());
        }
    }

    #[test]
    fn details_are_exhaustive_and_sorted() {
        let rows = vec![
            Row::new().with("Customer", "A").with("Total", "10").with("Ref", "1"),
            Row::new().with("Customer", "A").with("Total", "oops").with("Ref", "2"),
            Row::new().with("Customer", "A").with("Total", "$1,000").with("Ref", "3"),
            Row::new().with("Customer", "B").with("Total", "5").with("Ref", "4"),
        ];
        let refs: Vec<&Row> = rows.iter().collect();
        let measure = sum_measure();
        let ranked = aggregate(&refs, Some("Customer"), Some(&measure), TopN::All);
        let detailed = attach_details(&refs, &ranked, "Customer", &measure);

        assert_eq!(detailed.len(), 2);
        let refs_of_a: Vec<String> = detailed[0].details.iter().map(|r| r.text("Ref")).collect();
        assert_eq!(refs_of_a, vec!["3", "1", "2"]);
        assert_eq!(detailed[0].value, 1010.0);

        for d in &detailed {
            let sum: f64 = d
                .details
                .iter()
                .filter_map(|r| measure_of(r, "Total"))
                .filter(|v| *v > 0.0)
                .sum();
            assert_eq!(sum, d.value);
        }
    }

    #[test]
    fn fractional_amounts_sum_the_same_as_their_details() {
        let rows = vec![
            Row::new().with("Customer", "A").with("Total", "0.1"),
            Row::new().with("Customer", "A").with("Total", "0.2"),
            Row::new().with("Customer", "A").with("Total", "0.3"),
        ];
        let refs: Vec<&Row> = rows.iter().collect();
        let measure = sum_measure();
        let ranked = aggregate(&refs, Some("Customer"), Some(&measure), TopN::All);
        let detailed = attach_details(&refs, &ranked, "Customer", &measure);

        let in_detail_order: f64 = detailed[0]
            .details
            .iter()
            .filter_map(|r| measure_of(r, "Total"))
            .sum();
        assert_eq!(in_detail_order, detailed[0].value);
        assert_eq!(ranked[0].value, 0.3 + 0.2 + 0.1);
    }

    #[test]
    fn count_mode_detail_length_matches_value() {
        let ds = Dataset::from_rows(vec![
            voucher("A", "1", "Paid"),
            voucher("B", "1", "Paid"),
            voucher("A", "1", "Paid"),
        ]);
        let paid = filter_paid(&ds.rows, &ds.columns);
        let ranked = aggregate(&paid, Some("Customer"), Some(&Measure::Count), TopN::All);
        let detailed = attach_details(&paid, &ranked, "Customer", &Measure::Count);
        for d in &detailed {
            assert_eq!(d.details.len() as f64, d.value);
        }
        assert_eq!(detailed[0].name, "A");
    }

    #[test]
    fn unknown_entry_gets_no_details() {
        let rows = vec![Row::new().with("Customer", "A").with("Total", "1")];
        let refs: Vec<&Row> = rows.iter().collect();
        let detailed = attach_details(&refs, &[entry("ghost", 3.0)], "Customer", &sum_measure());
        assert_eq!(detailed.len(), 1);
        assert!(detailed[0].details.is_empty());
    }

    #[test]
    fn stats_count_entities_and_money() {
        let rows = vec![
            Row::new().with("Supplier", "X").with("Total Amount", "$10.50"),
            Row::new().with("Supplier", "Y").with("Total Amount", "bad"),
            Row::new().with("Supplier", "X").with("Total Amount", "-0.50"),
            Row::new().with("Supplier", "").with("Total Amount", "1"),
        ];
        let columns = vec!["Supplier".to_string(), "Total Amount".to_string()];
        let refs: Vec<&Row> = rows.iter().collect();
        let stats = summary_stats(&refs, &columns);
        assert_eq!(stats.total_rows, 4);
        assert_eq!(stats.distinct_entities, 2);
        assert_eq!(stats.total_monetary, 11.0);
    }

    #[test]
    fn stats_without_known_columns() {
        let rows = vec![Row::new().with("Ref", "1")];
        let refs: Vec<&Row> = rows.iter().collect();
        let stats = summary_stats(&refs, &["Ref".to_string()]);
        assert_eq!(
            stats,
            SummaryStats {
                total_rows: 1,
                distinct_entities: 0,
                total_monetary: 0.0
            }
        );
    }

    #[test]
    fn titles() {
        let ds = scenario();
        let mut sel = Selection {
            label: Some("Customer".into()),
            measure: Some(sum_measure()),
            top_n: TopN::Limit(10),
        };
        assert_eq!(
            report_title(&sel, &ds.columns),
            "Top 10 Customer by Total (Paid Only)"
        );
        sel.measure = Some(Measure::Count);
        sel.top_n = TopN::All;
        assert_eq!(
            report_title(&sel, &["Customer".to_string()]),
            "All Customer by Total Cooperated"
        );
        sel.label = None;
        assert_eq!(report_title(&sel, &ds.columns), "Top Items");
    }

    #[test]
    fn build_report_is_deterministic() {
        let ds = scenario();
        let sel = Selection {
            label: Some("Customer".into()),
            measure: Some(sum_measure()),
            top_n: TopN::Limit(1),
        };
        let first = build_report(&ds, &sel);
        let second = build_report(&ds, &sel);
        assert_eq!(first, second);
        assert_eq!(first.entries, vec![entry("A", 100.0)]);
        assert_eq!(first.detailed[0].details.len(), 1);
        assert!(first.paid_only);
        assert_eq!(first.stats.total_rows, 2);
    }

    #[test]
    fn transaction_line_fields() {
        let row = Row::new()
            .with("PV Code", "PV-7")
            .with("Customer", "Acme")
            .with("Invoice No", "")
            .with("Create Date", "01/01/2024")
            .with("Expire Date", "10/01/2024")
            .with("Total Amount", "1234.5")
            .with("Purpose", "Office chairs");
        let line = TransactionLine::from_row(&row, 0);
        assert_eq!(line.heading, "PV-7");
        assert_eq!(line.amount, "$1,234.50");
        assert_eq!(line.customer.as_deref(), Some("Acme"));
        assert_eq!(line.invoice_no, None);
        assert_eq!(line.date, "01/01/2024");
        assert_eq!(line.expire_date, "01/10/2024");
        assert_eq!(line.processing_days, Some(9));
        assert_eq!(line.purpose.as_deref(), Some("Office chairs"));
    }

    #[test]
    fn transaction_line_fallbacks() {
        let row = Row::new().with("Supplier", "S").with("Total Paid", "oops");
        let line = TransactionLine::from_row(&row, 2);
        assert_eq!(line.heading, "Transaction #3");
        assert_eq!(line.amount, "$0.00");
        assert_eq!(line.customer.as_deref(), Some("S"));
        assert_eq!(line.date, "N/A");
        assert_eq!(line.processing_days, None);
    }
}
