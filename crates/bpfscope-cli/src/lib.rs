//! Library side of the `bpfscope` binary: argument parsing, configuration,
//! command execution, rendering and error reporting.
//!
//! Kept separate from `main.rs` so commands can be exercised against the
//! in-memory kernel.

pub mod args;
pub mod commands;
pub mod config;
pub mod hex;
pub mod output;
pub mod report;

pub use args::Cli;
pub use commands::App;
pub use config::Config;
pub use report::CliError;
