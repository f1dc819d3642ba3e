//! Kernel-call failure classification.
//!
//! The kernel reports most failures as a bare errno, and ENOENT in particular
//! means different things per call: the end of an ID or key walk, or a
//! missing object or key. Backends classify at the call site, so callers
//! only ever see [`KernelError`].

use std::fmt;
use std::io;

use thiserror::Error;

/// The kind of object a kernel handle refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Program,
    Map,
    /// Some other pinned object, e.g. a BPF link.
    Other,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectKind::Program => write!(f, "program"),
            ObjectKind::Map => write!(f, "map"),
            ObjectKind::Other => write!(f, "non-program, non-map object"),
        }
    }
}

/// A classified kernel-call failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KernelError {
    /// A next-ID or next-key walk has no further element.
    #[error("end of sequence")]
    EndOfSequence,

    /// EPERM or EACCES.
    #[error("permission denied")]
    PermissionDenied,

    /// The object or key does not exist.
    #[error("no such object")]
    NotFound,

    /// A pinned path refers to a different kind of object than requested.
    #[error("object is a {found}, not a {expected}")]
    WrongObjectType {
        expected: ObjectKind,
        found: ObjectKind,
    },

    /// A map walk took more steps than the map can hold entries, which only
    /// happens when the map is being rewritten underneath the cursor.
    #[error("iteration aborted after {steps} steps")]
    IterationAborted { steps: u64 },

    /// Any other errno.
    #[error("{}", io::Error::from_raw_os_error(*errno))]
    Other { errno: i32 },
}

impl KernelError {
    /// Classifies an errno from a next-ID or next-key call, where ENOENT ends
    /// the walk.
    pub fn from_walk_errno(errno: i32) -> Self {
        match errno {
            libc::ENOENT => KernelError::EndOfSequence,
            other => Self::from_common_errno(other),
        }
    }

    /// Classifies an errno from an open or lookup call, where ENOENT means
    /// the object or key is absent.
    pub fn from_access_errno(errno: i32) -> Self {
        match errno {
            libc::ENOENT => KernelError::NotFound,
            other => Self::from_common_errno(other),
        }
    }

    fn from_common_errno(errno: i32) -> Self {
        match errno {
            libc::EPERM | libc::EACCES => KernelError::PermissionDenied,
            other => KernelError::Other { errno: other },
        }
    }
}
