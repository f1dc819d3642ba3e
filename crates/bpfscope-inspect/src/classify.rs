//! Lifting [`KernelError`] into [`InspectError`].
//!
//! The same kernel failure means different things depending on what was
//! being attempted, so every lift names its operation.

use bpfscope_core::InspectError;
use bpfscope_sys::KernelError;

/// Classifies a failure to open `subject` (by ID or pinned path).
pub(crate) fn open_error(err: KernelError, subject: &str) -> InspectError {
    match err {
        KernelError::NotFound | KernelError::EndOfSequence => InspectError::not_found(subject),
        wrong @ KernelError::WrongObjectType { .. } => {
            InspectError::invalid_input(format!("{}: {}", subject, wrong))
        }
        other => call_error(other, &format!("opening {}", subject)),
    }
}

/// Classifies any other failed call.
pub(crate) fn call_error(err: KernelError, operation: &str) -> InspectError {
    match err {
        KernelError::PermissionDenied => InspectError::PermissionDenied {
            operation: operation.to_string(),
        },
        other => InspectError::OperationFailed {
            operation: operation.to_string(),
            reason: other.to_string(),
        },
    }
}
