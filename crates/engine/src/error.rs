//! The module contains the errors the engine can report.
//!
//! The errors are:
//!
//! - [`Validation`] a record's fields fail domain rules.
//! - [`ReferentialIntegrity`] a delete was attempted on a record still
//!   referenced elsewhere.
//! - [`CommitFailure`] one or more records failed validation during commit.
//!
//! Nothing here is fatal: every variant leaves the session usable and is
//! normally delivered through an [`ErrorSink`](crate::ErrorSink).
//!
//!  [`Validation`]: EngineError::Validation
//!  [`ReferentialIntegrity`]: EngineError::ReferentialIntegrity
//!  [`CommitFailure`]: EngineError::CommitFailure
use std::fmt;

use thiserror::Error;

use crate::{RecordRef, Version};

/// A single validation message bound to a field of a record.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Engine custom errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("{record} is invalid: {}", join(.errors))]
    Validation {
        record: RecordRef,
        errors: Vec<FieldError>,
    },
    #[error("{target} is still referenced by {} record(s)", .referrers.len())]
    ReferentialIntegrity {
        target: RecordRef,
        referrers: Vec<RecordRef>,
    },
    #[error("commit rejected: {} record(s) failed validation", .0.len())]
    CommitFailure(Vec<EngineError>),
    #[error("unknown field \"{field}\" for {kind}")]
    UnknownField { kind: String, field: String },
    #[error("Invalid value for \"{field}\": {message}")]
    InvalidValue { field: String, message: String },
    #[error("\"{0}\" key not found!")]
    KeyNotFound(String),
    #[error("\"{0}\" already present!")]
    ExistingKey(String),
    #[error("cannot {action} while {mode}")]
    InvalidTransition {
        action: &'static str,
        mode: &'static str,
    },
    #[error("cannot rewind to version {target}: version {committed} is already committed")]
    RewindPastCommit { target: Version, committed: Version },
    #[error("persistence failed: {0}")]
    Persistence(String),
}

fn join(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
