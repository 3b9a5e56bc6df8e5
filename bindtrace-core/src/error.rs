use thiserror::Error;

use crate::resolution::Stage;

/// Errors raised by the tracing core.
///
/// Resolution failures (not found, version mismatch, ...) are never errors
/// here; they are classified and reported as event data.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BindTraceError {
    /// A resolution attempt was asked to enter a stage it already entered.
    #[error("resolution stage '{stage}' was already entered by this attempt")]
    StageRevisited { stage: Stage },

    /// `tracer::install` was called after a process-wide tracer was set.
    #[error("a process-wide binder tracer is already installed")]
    TracerAlreadyInstalled,

    #[error("unknown event category '{name}'")]
    UnknownCategory { name: String },

    #[error("invalid assembly version '{value}'")]
    InvalidVersion { value: String },
}

pub type Result<T> = std::result::Result<T, BindTraceError>;
