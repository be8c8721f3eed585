use datafusion::{arrow::error::ArrowError, error::DataFusionError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("DataFusion: {0}")]
    DataFusion(#[from] DataFusionError),

    #[error("Arrow: {0}")]
    Arrow(#[from] ArrowError),

    #[error("I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("Zip archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Spreadsheet: {0}")]
    Spreadsheet(#[from] calamine::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("'The date supplied {date} is invalid'")]
    InvalidDate { date: String },

    #[error("API responded with error: {0}")]
    ApiFailure(#[from] reqwest::Error),

    #[error("Failed to parse URL: {0}")]
    UrlParsingFailed(#[from] url::ParseError),

    #[error("Sheet '{sheet}' not found in workbook {workbook}")]
    MissingSheet { sheet: String, workbook: String },

    #[error("Period label '{value}' does not contain the ': ' separator")]
    MalformedPeriod { value: String },

    #[error("Table has {available} columns, cannot keep {requested} identifier columns")]
    IdentifierColumnsOutOfRange { requested: usize, available: usize },

    #[error("Column '{column}' not found")]
    MissingColumn { column: String },

    #[error("Archive entry '{file_name}' does not match any known report file")]
    UnexpectedFile { file_name: String },

    #[error("Object store: {0}")]
    ObjectStore(#[from] object_store::Error),

    #[error("Credentials: {message}")]
    Credentials { message: String },

    #[error("{message}")]
    NoData { message: String },
}
