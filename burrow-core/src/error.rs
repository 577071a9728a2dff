use burrow_scanner::ScanError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Scanner error: {0}")]
    Scanner(#[from] ScanError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DiscoveryError>;
