//! Runtime configuration: flags and environment.
//!
//! Environment variables:
//! - `BPFSCOPE_PIN_ROOT`: BPF filesystem mount point (default: "/sys/fs/bpf"),
//!   overridden by `--pin-root`
//! - `BPFSCOPE_LOG`: tracing filter directive (default: "warn")

use std::path::PathBuf;

use tracing_subscriber::EnvFilter;

use crate::args::Cli;
use crate::output::OutputMode;

pub const DEFAULT_PIN_ROOT: &str = "/sys/fs/bpf";
pub const PIN_ROOT_ENV: &str = "BPFSCOPE_PIN_ROOT";
pub const LOG_ENV: &str = "BPFSCOPE_LOG";
const DEFAULT_LOG_FILTER: &str = "warn";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub output: OutputMode,
    /// Fill in pinned paths when showing programs and maps.
    pub show_pins: bool,
    pub pin_root: PathBuf,
}

impl Config {
    pub fn from_cli(cli: &Cli) -> Self {
        let output = if cli.pretty {
            OutputMode::PrettyJson
        } else if cli.json {
            OutputMode::Json
        } else {
            OutputMode::Plain
        };
        Config {
            output,
            show_pins: cli.bpffs,
            pin_root: cli.pin_root.clone(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            output: OutputMode::Plain,
            show_pins: false,
            pin_root: PathBuf::from(DEFAULT_PIN_ROOT),
        }
    }
}

/// Picks the log directive from a `BPFSCOPE_LOG` value, falling back to the
/// default on absent or malformed directives.
pub fn log_directive(value: Option<&str>) -> &str {
    match value {
        Some(d) if EnvFilter::try_new(d).is_ok() => d,
        _ => DEFAULT_LOG_FILTER,
    }
}

/// Installs the stderr log subscriber.
pub fn init_logging() {
    let directive = std::env::var(LOG_ENV).ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(log_directive(directive.as_deref())))
        .with_writer(std::io::stderr)
        .init();
}
