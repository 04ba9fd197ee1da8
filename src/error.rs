use thiserror::Error;

/// Every failure a request can end in. None of these are retried; the caller
/// reports the message and abandons the request.
#[derive(Error, Debug)]
pub enum EdaError {
    #[error("Failed to read CSV data: {0}")]
    Csv(#[from] csv::Error),
    #[error("Failed to read workbook: {0}")]
    Excel(#[from] calamine::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Sheet '{sheet}' not found (available: {})", available.join(", "))]
    UnknownSheet { sheet: String, available: Vec<String> },
    #[error("Header row {row} is out of range (0..={max})")]
    HeaderRowOutOfRange { row: usize, max: usize },
    #[error("Input contains no header row")]
    EmptyInput,
    #[error("Column '{column}' has {found} values, expected {expected}")]
    RaggedTable {
        column: String,
        found: usize,
        expected: usize,
    },
    #[error("Column '{name}' not found")]
    ColumnNotFound { name: String },
    #[error("No text columns available for value counts")]
    NoTextColumns,
    #[error("Column '{column}' is {found}, value counts need a text column")]
    NotTextColumn { column: String, found: String },
    #[error("Column '{column}' is {found}, grouping needs a date/time column")]
    NotDateTimeColumn { column: String, found: String },
    #[error("cannot bucket: null date/time values present in column '{column}' ({nulls} rows)")]
    NullDateTimeValues { column: String, nulls: usize },
    #[error("Cannot {op} column '{column}': it is {found}, not numeric")]
    TypeMismatch {
        op: String,
        column: String,
        found: String,
    },
    #[error("Invalid chart request: {0}")]
    InvalidRequest(String),
    #[error("Parse error: {0}")]
    Parse(String),
}

pub type Result<T> = std::result::Result<T, EdaError>;
