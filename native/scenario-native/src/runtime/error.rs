//! Error types for the scenario runtime.
//!
//! Store failures, missing effect handlers and failed effects all surface as
//! a [`RuntimeError`] returned from the executor; nothing here panics.

use serde_json::{json, Value};
use std::fmt;
use thiserror::Error;

/// Errors raised by key-path parsing and store mutations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    #[error("Invalid key path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("Type mismatch at '{path}': expected {expected}, found {found}")]
    TypeMismatch {
        path: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Index {index} at '{path}' is too far past the end of an array of {len}")]
    IndexOutOfRange {
        path: String,
        index: usize,
        len: usize,
    },

    /// The owning store task has stopped.
    #[error("Store is closed")]
    Closed,
}

/// Opaque failure reported by a platform effect handler.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct EffectError {
    pub message: String,
    /// Structured payload bound to `onError` callbacks (e.g. an HTTP error body).
    pub details: Option<Value>,
}

impl EffectError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Value bound as argument `0` of an `onError` callback.
    pub fn to_value(&self) -> Value {
        json!({
            "message": self.message,
            "details": self.details.clone().unwrap_or(Value::Null),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectKind {
    Navigation,
    Api,
    Feedback,
    System,
}

impl fmt::Display for EffectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EffectKind::Navigation => "navigation",
            EffectKind::Api => "api",
            EffectKind::Feedback => "feedback",
            EffectKind::System => "system",
        };
        f.write_str(name)
    }
}

/// Failure result of executing an action descriptor.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// StoreOperationError
    #[error("Store operation failed: {0}")]
    Store(#[from] StoreError),

    /// ActionDispatchError
    #[error("No handler registered for {0} effects")]
    Dispatch(EffectKind),

    /// ExternalEffectError
    #[error("{kind} effect failed: {source}")]
    Effect {
        kind: EffectKind,
        #[source]
        source: EffectError,
    },

    /// A `Sequence` stopped at `step` (1-based).
    #[error("Sequence step {step} failed: {source}")]
    Step {
        step: usize,
        #[source]
        source: Box<RuntimeError>,
    },

    #[error("Unknown action '{0}'")]
    UnknownAction(String),
}

impl RuntimeError {
    /// 1-based index of the outermost failing sequence step, if any.
    pub fn failed_step(&self) -> Option<usize> {
        match self {
            RuntimeError::Step { step, .. } => Some(*step),
            _ => None,
        }
    }

    /// The innermost error, with sequence attribution stripped.
    pub fn root_cause(&self) -> &RuntimeError {
        match self {
            RuntimeError::Step { source, .. } => source.root_cause(),
            other => other,
        }
    }
}
