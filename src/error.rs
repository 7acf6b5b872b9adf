use thiserror::Error;

/// Errors returned by fingerprinting and database operations.
///
/// "No match" is not an error: recognition returns `Ok(None)`.
#[derive(Debug, Error)]
pub enum FingerprintError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("snapshot io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot format error: {0}")]
    Snapshot(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, FingerprintError>;
