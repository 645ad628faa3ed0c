//! Error types for the REM engine.
//!
//! Configuration-time errors (`InvalidGridSpec`, `InvalidConfig`) are raised
//! before any sample is taken. Run-time errors (`ModelInstantiation`,
//! `Evaluation`) abort the whole run; no partial map is kept.

use thiserror::Error;

use crate::engine::EngineState;

#[derive(Debug, Error)]
pub enum RemError {
    #[error("Invalid grid spec: {reason}")]
    InvalidGridSpec { reason: String },

    #[error("Invalid REM configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("Engine is {actual:?}, operation requires {expected:?}")]
    InvalidState {
        expected: EngineState,
        actual: EngineState,
    },

    #[error("Failed to instantiate {model} model: {reason}")]
    ModelInstantiation { model: &'static str, reason: String },

    #[error("Evaluation failed: {reason}")]
    Evaluation { reason: String },
}

impl RemError {
    pub fn grid(reason: impl Into<String>) -> Self {
        RemError::InvalidGridSpec { reason: reason.into() }
    }

    pub fn config(reason: impl Into<String>) -> Self {
        RemError::InvalidConfig { reason: reason.into() }
    }

    pub fn model(model: &'static str, reason: impl Into<String>) -> Self {
        RemError::ModelInstantiation { model, reason: reason.into() }
    }

    pub fn evaluation(reason: impl Into<String>) -> Self {
        RemError::Evaluation { reason: reason.into() }
    }

    /// True for errors that can be detected before sampling starts.
    pub fn is_configuration_error(&self) -> bool {
        matches!(self, RemError::InvalidGridSpec { .. } | RemError::InvalidConfig { .. })
    }
}

pub type RemResult<T> = Result<T, RemError>;
