//! Error types surfaced by the inspection core.
//!
//! [`InspectError`] is the outward taxonomy: every kernel-call failure is
//! classified into exactly one variant and surfaced once. Presentation and
//! exit-code choices belong to the caller.

use thiserror::Error;

/// Errors produced by inspection operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InspectError {
    /// The referenced program or map does not exist.
    #[error("{subject} not found")]
    NotFound { subject: String },

    /// The map exists but holds no entry for the given key.
    #[error("key not found in map")]
    KeyNotFound,

    /// The supplied cursor key was the last key of the map.
    #[error("no more keys")]
    NoMoreKeys,

    /// The map has no keys at all.
    #[error("map is empty")]
    MapEmpty,

    /// The caller lacks the capability the kernel requires.
    #[error("permission denied while {operation}")]
    PermissionDenied { operation: String },

    /// Caller-supplied identifier, key or value was rejected before any
    /// kernel call.
    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },

    /// Any other kernel or transport failure.
    #[error("{operation} failed: {reason}")]
    OperationFailed { operation: String, reason: String },
}

impl InspectError {
    pub fn not_found(subject: impl Into<String>) -> Self {
        InspectError::NotFound {
            subject: subject.into(),
        }
    }

    pub fn invalid_input(reason: impl Into<String>) -> Self {
        InspectError::InvalidInput {
            reason: reason.into(),
        }
    }
}
