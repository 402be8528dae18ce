use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("HTTP request failed: {0}")]
    Transport(String),

    #[error("HTTP request to {url} returned status {status}")]
    HttpStatus { status: u16, url: String },

    #[error("CSV parsing failed: {0}")]
    Parse(String),

    #[error("Missing required column: {0}")]
    MissingColumn(String),

    #[error("Column '{column}' has {actual} rows, expected {expected}")]
    RowCountMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("Writing table failed: {0}")]
    Write(String),

    #[error("Row count query failed: {0}")]
    Query(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),
}

impl EtlError {
    /// True for failures of the fetch itself, including non-success statuses.
    pub fn is_transport(&self) -> bool {
        matches!(self, EtlError::Transport(_) | EtlError::HttpStatus { .. })
    }
}

impl From<csv::Error> for EtlError {
    fn from(err: csv::Error) -> Self {
        EtlError::Parse(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;
