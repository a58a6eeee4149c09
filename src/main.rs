// Console front end.
//
// - Option [1] loads a CSV or workbook and picks default columns.
// - Option [2] changes the label column, the measure and how many entries
//   to rank.
// - Option [3] prints the ranked summary with its drill-down.
// - Option [4] exports the flattened details to an .xlsx file and the
//   report itself to JSON.
use once_cell::sync::Lazy;
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use voucher_report::output;
use voucher_report::session::{Notice, Session};
use voucher_report::types::{Measure, TopN};
use voucher_report::util::format_int;

// The loaded rows and current selection live for the whole run so reports
// can be regenerated after every change without reloading the file.
static APP_STATE: Lazy<Mutex<Session>> = Lazy::new(|| Mutex::new(Session::new()));

fn state() -> MutexGuard<'static, Session> {
    APP_STATE.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Print `prompt` and read one trimmed line. `None` once stdin is closed
/// or unreadable.
fn read_line(prompt: &str) -> Option<String> {
    print!("{}", prompt);
    let _ = io::stdout().flush();
    let mut buf = String::new();
    match io::stdin().read_line(&mut buf) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(buf.trim().to_string()),
    }
}

/// Read a 1-based menu pick. Blank input or end of input keeps the current
/// value (`None`).
fn read_pick(len: usize) -> Option<usize> {
    loop {
        let input = read_line("Enter choice (blank to keep): ")?;
        if input.is_empty() {
            return None;
        }
        match input.parse::<usize>() {
            Ok(n) if (1..=len).contains(&n) => return Some(n - 1),
            _ => println!("Invalid choice. Please enter a number from 1 to {}.", len),
        }
    }
}

fn handle_load() {
    let path = match read_line("Path to .xlsx/.csv file: ") {
        Some(p) if !p.is_empty() => p,
        _ => return,
    };
    println!("Processing your file...");
    let mut session = state();
    let notice = session.load_path(&path);
    if notice.is_error() {
        eprintln!("{}\n", notice.message);
        return;
    }
    println!("{}", notice.message);
    if let Some(load) = session.last_load() {
        if load.skipped_rows > 0 {
            println!(
                "Note: {} rows skipped due to parse errors.",
                format_int(load.skipped_rows)
            );
        }
    }
    println!();
}

fn handle_choose_columns() {
    let mut session = state();
    if !session.is_loaded() {
        println!("Error: No data loaded. Please load a file first (option 1).\n");
        return;
    }

    let labels: Vec<String> = session
        .label_options()
        .into_iter()
        .map(str::to_string)
        .collect();
    println!("Select Label Column:");
    for (i, l) in labels.iter().enumerate() {
        println!("[{}] {}", i + 1, l);
    }
    if let Some(i) = read_pick(labels.len()) {
        session.set_label(Some(labels[i].clone()));
    }

    let measures = session.measure_options();
    println!("\nAnalyze Data Column:");
    for (i, m) in measures.iter().enumerate() {
        println!("[{}] {}", i + 1, m.display_name());
    }
    if let Some(i) = read_pick(measures.len()) {
        session.set_measure(Some(measures[i].clone()));
    }

    println!("\nShow Items:");
    for (i, t) in TopN::PRESETS.iter().enumerate() {
        println!("[{}] {}", i + 1, t.display());
    }
    if let Some(i) = read_pick(TopN::PRESETS.len()) {
        session.set_top_n(TopN::PRESETS[i]);
    }
    println!();
}

fn handle_show_report() {
    let mut session = state();
    if !session.is_loaded() {
        println!("Error: No data loaded. Please load a file first (option 1).\n");
        return;
    }
    let count_mode = matches!(session.selection().measure, Some(Measure::Count));
    let report = session.report();
    if report.is_empty() {
        println!("{}\n", report.title);
        println!("Select a label and data column to see the ranking.\n");
        return;
    }
    output::print_report(report, count_mode);
}

fn handle_export() {
    let mut session = state();
    println!("Generating data export...");
    let details = session.export_details(Path::new("."));
    let failed = details.is_err();
    print_notice(&Session::export_notice(&details));
    if !failed {
        print_notice(&Session::export_notice(&session.export_summary(Path::new("."))));
    }
    println!();
}

fn print_notice(notice: &Notice) {
    if notice.is_error() {
        eprintln!("{}", notice.message);
    } else {
        println!("{}", notice.message);
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "voucher_report=warn".into()),
        )
        .init();

    loop {
        println!("Voucher Report:");
        println!("[1] Load a file");
        println!("[2] Choose columns");
        println!("[3] Show report");
        println!("[4] Export data");
        println!("[5] Exit\n");
        let Some(choice) = read_line("Enter choice: ") else {
            println!();
            break;
        };
        match choice.as_str() {
            "1" => handle_load(),
            "2" => handle_choose_columns(),
            "3" => handle_show_report(),
            "4" => handle_export(),
            "5" => {
                println!("Exiting the program.");
                break;
            }
            _ => println!("Invalid choice. Please enter 1 to 5.\n"),
        }
    }
}
