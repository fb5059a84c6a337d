use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to open activity file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to read activity CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("activity CSV is missing required column `{0}`")]
    MissingColumn(&'static str),

    /// A date that none of the accepted formats could parse. Loading stops
    /// at the first one; rows are never skipped.
    #[error("line {line}: unparseable active_date_timestamp {value:?}")]
    InvalidDate { line: u64, value: String },
}
