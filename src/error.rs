use thiserror::Error;

pub type LoadResult<T> = Result<T, LoadError>;
pub type ExportResult<T> = Result<T, ExportError>;

/// Failures while decoding an input file. `Empty` is informational: the
/// file was readable but held no data rows.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Workbook error: {0}")]
    Workbook(#[from] calamine::Error),

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("Workbook has no worksheets")]
    NoSheet,

    #[error("The file is empty or has no data rows")]
    Empty,
}

impl LoadError {
    /// True for the "nothing to show" case, which is a notice rather than a failure.
    pub fn is_empty_dataset(&self) -> bool {
        matches!(self, LoadError::Empty)
    }
}

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Excel export error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("No data available to export")]
    NothingToExport,
}
