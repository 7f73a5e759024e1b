//! Error types for the doctor pipeline.
//!
//! Most failures in a diagnostic session are data (failed steps, findings,
//! a `failed` outcome). Only the conditions below surface as errors.

use crate::risk::Risk;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DoctorError {
    #[error("Gate denied for step {step_id}: {risk} risk requires confirmation")]
    GateDenied { step_id: String, risk: Risk },

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("Command timed out after {0}ms")]
    Timeout(u64),

    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Config error: {0}")]
    Config(String),

    #[error("Unknown export format: '{0}'. Valid values: json, text")]
    UnknownFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl DoctorError {
    /// Whether the error came from the authorization gate
    pub fn is_gate_denial(&self) -> bool {
        matches!(self, DoctorError::GateDenied { .. })
    }
}

pub type Result<T> = std::result::Result<T, DoctorError>;
