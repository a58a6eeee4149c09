//! State owned by the front end: the loaded dataset, the current selection
//! and the last computed report.

use crate::columns::{default_selection, label_candidates, measure_candidates};
use crate::error::{ExportError, ExportResult, LoadError};
use crate::loader::{self, LoadReport};
use crate::output::{
    export_file_name, flatten_for_export, summary_file_name, write_json, write_xlsx,
};
use crate::reports::build_report;
use crate::types::{Dataset, Measure, Report, Selection, TopN};
use std::path::{Path, PathBuf};
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

/// User-facing message. Only load and export outcomes produce one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.level == NoticeLevel::Error
    }
}

#[derive(Debug, Default)]
pub struct Session {
    source_name: Option<String>,
    dataset: Option<Dataset>,
    last_load: Option<LoadReport>,
    selection: Selection,
    memo: Option<(Selection, Report)>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode `path` and make it the current dataset. On failure, or when
    /// the file holds no rows, the previous dataset stays in place.
    pub fn load_path<P: AsRef<Path>>(&mut self, path: P) -> Notice {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        match loader::load_path(path) {
            Ok((dataset, report)) => {
                let notice = self.install(name, dataset);
                self.last_load = Some(report);
                notice
            }
            Err(e) => self.load_failed(e),
        }
    }

    /// Install rows that were decoded elsewhere.
    pub fn load_dataset(&mut self, source_name: &str, dataset: Dataset) -> Notice {
        if dataset.is_empty() {
            return self.load_failed(LoadError::Empty);
        }
        let notice = self.install(source_name.to_string(), dataset);
        self.last_load = None;
        notice
    }

    fn install(&mut self, name: String, dataset: Dataset) -> Notice {
        self.selection = default_selection(&dataset.columns);
        info!(file = %name, rows = dataset.rows.len(), "dataset installed");
        let message = format!(
            "File \"{}\" loaded. Defaulting to Top Customers view.",
            name
        );
        self.source_name = Some(name);
        self.dataset = Some(dataset);
        self.memo = None;
        Notice::info(message)
    }

    fn load_failed(&self, err: LoadError) -> Notice {
        if err.is_empty_dataset() {
            return Notice::info("The selected file is empty or has an unsupported format.");
        }
        error!(error = %err, "failed to load file");
        Notice::error(format!(
            "An error occurred while processing the file. Please ensure it is a valid spreadsheet. ({})",
            err
        ))
    }

    pub fn is_loaded(&self) -> bool {
        self.dataset.is_some()
    }

    pub fn source_name(&self) -> Option<&str> {
        self.source_name.as_deref()
    }

    pub fn last_load(&self) -> Option<&LoadReport> {
        self.last_load.as_ref()
    }

    pub fn columns(&self) -> &[String] {
        self.dataset.as_ref().map(|d| d.columns.as_slice()).unwrap_or(&[])
    }

    pub fn label_options(&self) -> Vec<&str> {
        label_candidates(self.columns())
    }

    /// Count mode first, then the summable columns (every column when none
    /// looks like a total).
    pub fn measure_options(&self) -> Vec<Measure> {
        let columns = self.columns();
        let mut names = measure_candidates(columns);
        if names.is_empty() {
            names = columns.iter().map(String::as_str).collect();
        }
        std::iter::once(Measure::Count)
            .chain(names.into_iter().map(|c| Measure::Column(c.to_string())))
            .collect()
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn set_label(&mut self, label: Option<String>) {
        self.selection.label = label;
    }

    pub fn set_measure(&mut self, measure: Option<Measure>) {
        self.selection.measure = measure;
    }

    pub fn set_top_n(&mut self, top_n: TopN) {
        self.selection.top_n = top_n;
    }

    /// Report for the current selection. Reuses the previous result when the
    /// selection has not changed since it was built.
    pub fn report(&mut self) -> &Report {
        let fresh = matches!(&self.memo, Some((sel, _)) if *sel == self.selection);
        if !fresh {
            self.memo = None;
        }
        let selection = &self.selection;
        let dataset = &self.dataset;
        &self
            .memo
            .get_or_insert_with(|| {
                let report = match dataset {
                    Some(ds) => build_report(ds, selection),
                    None => build_report(&Dataset::default(), selection),
                };
                (selection.clone(), report)
            })
            .1
    }

    /// Write the flattened details of the current report next to `dir`,
    /// named after the source file and the top-N scope.
    pub fn export_details(&mut self, dir: &Path) -> ExportResult<PathBuf> {
        let source = self
            .source_name
            .clone()
            .ok_or(ExportError::NothingToExport)?;
        let top_n = self.selection.top_n;
        let report = self.report();
        if report.is_empty() {
            return Err(ExportError::NothingToExport);
        }
        let rows = flatten_for_export(&report.detailed);
        let path = dir.join(export_file_name(&source, top_n));
        write_xlsx(&path, &rows)?;
        Ok(path)
    }

    /// Write the current report (title, ranking, details, stats) as JSON.
    pub fn export_summary(&mut self, dir: &Path) -> ExportResult<PathBuf> {
        let source = self
            .source_name
            .clone()
            .ok_or(ExportError::NothingToExport)?;
        let top_n = self.selection.top_n;
        let report = self.report();
        if report.is_empty() {
            return Err(ExportError::NothingToExport);
        }
        let path = dir.join(summary_file_name(&source, top_n));
        write_json(&path, report)?;
        Ok(path)
    }

    /// Notice describing an export outcome.
    pub fn export_notice(result: &ExportResult<PathBuf>) -> Notice {
        match result {
            Ok(path) => Notice::info(format!(
                "Top data exported successfully to {}.",
                path.display()
            )),
            Err(ExportError::NothingToExport) => Notice::info("No data available to export."),
            Err(e) => {
                error!(error = %e, "export failed");
                Notice::error(format!("Failed to export data. ({})", e))
            }
        }
    }
}
