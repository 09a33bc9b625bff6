//! Errors that stop a validation call from producing a report.
//!
//! Model defects never appear here; they are reported as findings.
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuditError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Malformed TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Invalid address '{text}': {reason}")]
    InvalidAddress { text: String, reason: String },
    #[error("Validation cancelled before the report was assembled")]
    Cancelled,
}
