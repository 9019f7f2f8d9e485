//! Error types for keytrial

use crate::types::Phase;
use thiserror::Error;

/// Errors that can occur while driving a trial or loading its inputs
#[derive(Debug, Error)]
pub enum TrialError {
    #[error("Trial already {phase}; no further snapshot will be exported")]
    AlreadyTerminal { phase: Phase },

    #[error("Trial is {phase}; finish it before re-arming")]
    TrialInProgress { phase: Phase },

    #[error("Target passage cannot change once the trial is {phase}")]
    PassageLocked { phase: Phase },

    #[error("Invalid engine configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to parse input: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid replay script: {0}")]
    InvalidScript(String),
}
