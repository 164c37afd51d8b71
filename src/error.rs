use thiserror::Error;

use crate::data::model::ColumnKind;

/// Structural problems when building a dataset by hand.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DatasetError {
    #[error("duplicate column '{0}'")]
    DuplicateColumn(String),
    #[error("row {row}: expected {expected} values, found {found}")]
    RowWidth {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("row {row}: value in column '{column}' is not {expected}")]
    KindMismatch {
        row: usize,
        column: String,
        expected: ColumnKind,
    },
}

#[derive(Debug, Error)]
pub enum LoadError {
    /// No supported format could parse the input. Each attempted format
    /// contributes one `(format, reason)` pair.
    #[error("unreadable file: {}", describe_attempts(.attempts))]
    UnreadableFile { attempts: Vec<(&'static str, String)> },
    #[error("reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

fn describe_attempts(attempts: &[(&'static str, String)]) -> String {
    attempts
        .iter()
        .map(|(format, reason)| format!("{format}: {reason}"))
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FilterError {
    #[error("unknown column '{0}'")]
    UnknownColumn(String),
    #[error("invalid range for '{column}': {lower} > {upper}")]
    InvalidRange {
        column: String,
        lower: f64,
        upper: f64,
    },
    #[error("column '{column}' is {found}, filter needs {expected}")]
    TypeMismatch {
        column: String,
        expected: ColumnKind,
        found: ColumnKind,
    },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DistributionError {
    #[error("no rows match current filters (column '{column}' has no values)")]
    EmptyDataset { column: String },
    #[error("unknown column '{0}'")]
    UnknownColumn(String),
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("csv writer: {0}")]
    CsvFlush(String),
    #[error("spreadsheet: {0}")]
    Spreadsheet(#[from] rust_xlsxwriter::XlsxError),
    #[error("spreadsheet: {0}")]
    Limit(String),
    #[error(transparent)]
    Dataset(#[from] DatasetError),
}

/// Any failure of a single user action.
#[derive(Debug, Error)]
pub enum Error {
    #[error("no dataset loaded")]
    NoDataset,
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Filter(#[from] FilterError),
    #[error(transparent)]
    Distribution(#[from] DistributionError),
    #[error(transparent)]
    Export(#[from] ExportError),
}
