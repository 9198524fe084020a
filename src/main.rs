mod collect;
mod commands;
mod config;
mod display;
mod query;
mod scan;
mod sessions;
mod table;

use std::error::Error as _;
use std::io;
use std::process::ExitCode;

use clap::{Args, Parser};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::query::{SortKey, SortOrder};

#[derive(Debug, Error)]
pub enum CliError {
    #[error("config error: {0}")]
    Config(String),
    #[error("cannot use session directory: {0}")]
    Scan(String),
    #[error("failed to write output: {0}")]
    Output(#[from] io::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type CliResult<T> = Result<T, CliError>;

#[derive(Parser, Debug)]
#[command(name = "codex-history", version)]
#[command(about = "List Codex session histories with cwd and first user ask", long_about = None)]
struct Cli {
    #[command(flatten)]
    list: ListArgs,
    /// Log debug details to stderr (RUST_LOG takes precedence)
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ListArgs {
    /// Session directory (default: ~/.codex/sessions, or $CODEX_HOME/sessions)
    #[arg(short, long, value_name = "PATH")]
    pub dir: Option<String>,
    /// Limit number of rows
    #[arg(short = 'n', long, value_name = "N", allow_negative_numbers = true)]
    pub limit: Option<i64>,
    /// Output JSON
    #[arg(long)]
    pub json: bool,
    /// Do not truncate cwd, ask or path; columns may exceed the terminal width
    #[arg(long)]
    pub full: bool,
    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,
    /// Sort key (default: mtime)
    #[arg(long, value_enum, value_name = "KEY")]
    pub sort: Option<SortKey>,
    /// Sort order (default: desc)
    #[arg(long, value_enum, value_name = "DIR")]
    pub order: Option<SortOrder>,
    /// Only sessions on/after this time (ISO like 2025-08-30)
    #[arg(long, value_name = "TIME")]
    pub since: Option<String>,
    /// Only sessions before this time (ISO)
    #[arg(long, value_name = "TIME")]
    pub before: Option<String>,
    /// Only sessions whose cwd contains this substring
    #[arg(long, value_name = "SUBSTR")]
    pub cwd_filter: Option<String>,
    /// Number of session files parsed concurrently (default: 16)
    #[arg(long, value_name = "N")]
    pub concurrency: Option<usize>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // stdout carries the table / JSON, so logs go to stderr and default to warnings only.
    let default_level = if cli.verbose { "debug" } else { "warn" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .init();

    match commands::list::handle_list_cmd(cli.list).await {
        Ok(()) => ExitCode::SUCCESS,
        // Reader went away (e.g. `| head`); nothing left to report.
        Err(CliError::Output(err)) if err.kind() == io::ErrorKind::BrokenPipe => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err}");
            let mut source = err.source();
            while let Some(cause) = source {
                eprintln!("  caused by: {cause}");
                source = cause.source();
            }
            ExitCode::FAILURE
        }
    }
}
