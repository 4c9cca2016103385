use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the analyzer
#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Unsupported AI source: {0}")]
    UnsupportedProvider(String),

    #[error("Machine identifier unavailable: {0}")]
    MachineIdentity(String),

    #[error("Encryption failed: {0}")]
    Encryption(String),

    #[error("Decryption failed: {0}")]
    Decryption(String),

    #[error("Failed to write {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("Malformed response stream: {0}")]
    Stream(String),

    #[error("Analysis cancelled")]
    Cancelled,

    #[error("Invalid session state: {0}")]
    SessionState(String),
}

pub type Result<T> = std::result::Result<T, AnalyzerError>;
