//! Ranked summaries of payment-voucher spreadsheets.
//!
//! Rows are decoded once (`loader`), then every view is recomputed from the
//! rows and the current [`Selection`](types::Selection):
//!
//! - `reports::filter_paid` keeps settled vouchers,
//! - `reports::aggregate` ranks labels by a summed column or by count,
//! - `reports::attach_details` lists each ranked label's vouchers,
//! - `reports::summary_stats` fills the stat cards,
//! - `output::flatten_for_export` turns the result back into rows.
//!
//! ```no_run
//! use voucher_report::session::Session;
//!
//! let mut session = Session::new();
//! let notice = session.load_path("vouchers.xlsx");
//! println!("{}", notice.message);
//! println!("{}", session.report().title);
//! ```

pub mod columns;
pub mod error;
pub mod loader;
pub mod output;
pub mod reports;
pub mod session;
pub mod types;
pub mod util;

pub use error::{ExportError, LoadError};
pub use types::{
    AggregateEntry, CellValue, Dataset, DetailedEntry, Measure, Report, Row, Selection,
    SummaryStats, TopN,
};
