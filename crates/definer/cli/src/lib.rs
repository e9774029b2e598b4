//! Definer CLI - interactive front end for the concept graph
//!
//! Reads lines from stdin (or a script file) and feeds them to the current
//! interpreter session. Lines starting with `:/` manage the session list:
//!
//! ```text
//! :/list   :/switch N   :/create   :/finish
//! :/show_expanded [IDX|:]...   :/flatten [IDX]...   :/help   :/quit
//! ```

#![deny(unsafe_code)]

use clap::Parser;
use std::ffi::OsString;
use std::fs::File;
use std::io::{self, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod error;
mod output;
mod repl;

pub use config::DefinerConfig;
pub use error::{CliError, CliResult};
pub use output::OutputFormat;
pub use repl::Repl;

/// Definer CLI application
#[derive(Parser)]
#[command(name = "definer")]
#[command(about = "Definer - build, name and check concepts interactively", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "DEFINER_CONFIG")]
    config: Option<String>,

    /// Output format for expansions (text, json, yaml)
    #[arg(short, long, default_value = "text")]
    output: OutputFormat,

    /// Read input lines from a file instead of stdin
    #[arg(short, long)]
    script: Option<String>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

/// Run using the current process arguments.
pub fn run() -> CliResult<()> {
    run_with_args(std::env::args_os())
}

/// Run using the provided argument iterator.
pub fn run_with_args<I, T>(args: I) -> CliResult<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .without_time()
                .with_writer(io::stderr),
        )
        .init();

    let config = DefinerConfig::load(cli.config.as_deref())?;
    tracing::debug!(?config, "configuration loaded");

    let mut repl = Repl::new(config, cli.output)?;
    let mut stdout = io::stdout().lock();
    match cli.script {
        Some(path) => {
            let file = File::open(&path)
                .map_err(|e| CliError::InvalidArgument(format!("cannot read {}: {}", path, e)))?;
            repl.run(BufReader::new(file), &mut stdout)
        }
        None => repl.run(io::stdin().lock(), &mut stdout),
    }
}
