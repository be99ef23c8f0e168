use std::path::PathBuf;

use thiserror::Error;

/// Failure to turn a source file into a [`Dataset`](crate::data::model::Dataset).
///
/// Load errors end the session for that source: the window reports them and
/// waits for the user to fix the file (or pick another one).
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("file not found: {0}")]
    NotFound(PathBuf),

    #[error("unsupported file extension: .{0}")]
    UnsupportedFormat(String),

    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("spreadsheet error: {0}")]
    Spreadsheet(#[from] calamine::Error),

    #[error("invalid file format: {0}")]
    InvalidFormat(String),

    #[error("column '{0}' appears more than once after trimming")]
    DuplicateColumn(String),

    #[error("required column '{0}' is missing")]
    MissingColumn(String),
}

/// A query referenced a field the dataset does not have.
///
/// The field set is fixed by configuration, so this is a programming or
/// configuration mistake rather than something a user can trigger.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("unknown field '{0}'")]
    UnknownField(String),
}
