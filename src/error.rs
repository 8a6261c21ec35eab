use thiserror::Error;

impl From<std::io::Error> for LedgerError {
    fn from(err: std::io::Error) -> Self {
        Self::StorageReadError(format!("I/O error: {}", err))
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        Self::StorageReadError(format!("JSON decode error: {}", err))
    }
}

impl From<config::ConfigError> for LedgerError {
    fn from(err: config::ConfigError) -> Self {
        Self::ConfigError(err.to_string())
    }
}

#[derive(Error, Debug)]
pub enum LedgerError {
    /// Malformed or incomplete record, or a header missing a required column.
    #[error("Format error: {0}")]
    FormatError(String),

    #[error("Secret unavailable: {0}")]
    SecretUnavailable(String),

    /// Propagated from the row source; the step may be retried at the same cursor.
    #[error("Storage read error: {0}")]
    StorageReadError(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl LedgerError {
    pub fn missing_column(name: &str) -> Self {
        Self::FormatError(format!("header is missing required column '{}'", name))
    }

    pub fn missing_field(field: &str, row: usize) -> Self {
        Self::FormatError(format!("row {} has a blank '{}' field", row, field))
    }

    pub fn cursor_out_of_range(cursor: usize, first: usize) -> Self {
        Self::InvalidArgument(format!(
            "cursor {} is before the first data row {}",
            cursor, first
        ))
    }

    /// True for errors the caller can retry with the same cursor.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StorageReadError(_))
    }
}
