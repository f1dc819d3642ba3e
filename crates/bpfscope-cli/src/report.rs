//! Failure reporting: user-facing error text and exit codes.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use bpfscope_core::InspectError;

use crate::output::{OutputMode, Renderer};

/// Everything a command can fail with.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Inspect(#[from] InspectError),

    /// A pinned object was not found because the pin root itself is missing.
    #[error("BPF filesystem not mounted at {}", root.display())]
    BpffsNotMounted { root: PathBuf },

    #[error("failed to encode JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),

    #[error("live inspection is only supported on Linux")]
    Unsupported,
}

/// Where a report is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;

pub fn exit_code(result: &Result<String, CliError>) -> i32 {
    match result {
        Ok(_) => EXIT_SUCCESS,
        Err(_) => EXIT_FAILURE,
    }
}

/// Formats `err` for the user.
///
/// JSON mode reports `{"error": ...}` on stdout; plain mode writes text,
/// with remediation steps where there are any, to stderr.
pub fn render_error(err: &CliError, mode: OutputMode) -> (Stream, String) {
    if mode.is_json() {
        let text = Renderer::new(mode)
            .error(&err.to_string())
            .unwrap_or_else(|_| r#"{"error":"failed to encode error"}"#.to_string());
        return (Stream::Stdout, text);
    }
    (Stream::Stderr, plain_error(err))
}

fn plain_error(err: &CliError) -> String {
    match err {
        CliError::Inspect(InspectError::PermissionDenied { .. }) => permission_help(),
        CliError::BpffsNotMounted { root } => bpffs_help(&root.display().to_string()),
        CliError::Inspect(InspectError::KeyNotFound) => "Error: key not found in map".to_string(),
        CliError::Inspect(InspectError::NoMoreKeys) => "Error: no more keys".to_string(),
        CliError::Inspect(InspectError::MapEmpty) => "Error: map is empty".to_string(),
        other => format!("Error: {}", other),
    }
}

fn permission_help() -> String {
    "Error: Permission denied.

This operation requires elevated privileges. You need one of the following:
  - Run as root (sudo bpfscope ...)
  - Have CAP_SYS_ADMIN capability
  - Have CAP_BPF capability (Linux 5.8+)

To grant CAP_BPF capability to the binary:
  sudo setcap cap_bpf=ep /path/to/bpfscope"
        .to_string()
}

fn bpffs_help(root: &str) -> String {
    format!(
        "Error: BPF filesystem not mounted at {root}.

To mount the BPF filesystem, run:
  sudo mount -t bpf bpf {root}

To mount it permanently, add to /etc/fstab:
  bpf {root} bpf defaults 0 0"
    )
}
