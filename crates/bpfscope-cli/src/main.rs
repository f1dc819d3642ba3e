//! The `bpfscope` binary.
//!
//! Reads configuration from flags and environment variables (see
//! [`bpfscope_cli::config`]), logs to stderr, and prints results to stdout.

use std::io::Write;
use std::process;

use clap::Parser;

use bpfscope_cli::args::Command;
use bpfscope_cli::output::Renderer;
use bpfscope_cli::report::{self, CliError, Stream};
use bpfscope_cli::{Cli, Config};

fn main() {
    let cli = Cli::parse();
    bpfscope_cli::config::init_logging();
    let config = Config::from_cli(&cli);

    let result = run(&cli.command, &config);
    let code = report::exit_code(&result);
    match result {
        Ok(text) => {
            if !text.is_empty() {
                let mut stdout = std::io::stdout().lock();
                if let Err(e) = writeln!(stdout, "{}", text) {
                    tracing::error!(error = %e, "failed to write output");
                    process::exit(report::EXIT_FAILURE);
                }
            }
        }
        Err(err) => {
            tracing::debug!(error = ?err, "command failed");
            match report::render_error(&err, config.output) {
                (Stream::Stdout, text) => println!("{}", text),
                (Stream::Stderr, text) => eprintln!("{}", text),
            }
        }
    }
    process::exit(code);
}

#[cfg(target_os = "linux")]
fn run(command: &Command, config: &Config) -> Result<String, CliError> {
    use std::sync::Arc;

    use bpfscope_cli::App;
    use bpfscope_sys::SyscallKernel;

    if let Command::Version = command {
        return version(config);
    }
    let app = App::new(Arc::new(SyscallKernel::new()), config.clone());
    app.execute(command)
}

#[cfg(not(target_os = "linux"))]
fn run(command: &Command, config: &Config) -> Result<String, CliError> {
    match command {
        Command::Version => version(config),
        _ => Err(CliError::Unsupported),
    }
}

fn version(config: &Config) -> Result<String, CliError> {
    Ok(Renderer::new(config.output).version(bpfscope_cli::commands::VERSION)?)
}
