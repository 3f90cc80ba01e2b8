//! Command-line interface for worktab.
//!
//! Parses flags for the interactive tab shell and handles the `paths`
//! subcommand.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use worktab_config::{Config, LogLevel};

/// worktab - workspace tab session manager
#[derive(Parser)]
#[command(name = "worktab")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Config file to use instead of the default location
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Sign in as this user on startup
    #[arg(long, value_name = "ID")]
    pub user: Option<String>,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, value_name = "LEVEL", value_parser = parse_log_level)]
    pub log_level: Option<LogLevel>,

    /// Directory holding the per-user tab files
    #[arg(long, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Keep tab sets in memory only
    #[arg(long)]
    pub ephemeral: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the config, tab store and log file locations
    Paths,
}

fn parse_log_level(s: &str) -> Result<LogLevel, String> {
    LogLevel::parse(s).ok_or_else(|| format!("unknown log level '{s}'"))
}

/// Runtime options passed from CLI to the shell
#[derive(Clone, Debug, Default)]
pub struct RuntimeOptions {
    pub config_path: Option<PathBuf>,
    pub user: Option<String>,
    pub log_level: Option<LogLevel>,
    pub data_dir: Option<PathBuf>,
    pub ephemeral: bool,
}

/// Result of CLI processing
pub enum CliResult {
    /// Continue with normal startup
    Continue(RuntimeOptions),
    /// Exit with the given code (subcommand completed)
    Exit(i32),
}

/// Process CLI arguments and handle subcommands
pub fn process_cli() -> CliResult {
    process_args(Cli::parse())
}

fn process_args(cli: Cli) -> CliResult {
    match cli.command {
        Some(Commands::Paths) => {
            print_paths(cli.config.as_deref(), cli.data_dir.as_deref());
            CliResult::Exit(0)
        }
        None => CliResult::Continue(RuntimeOptions {
            config_path: cli.config,
            user: cli.user,
            log_level: cli.log_level,
            data_dir: cli.data_dir,
            ephemeral: cli.ephemeral,
        }),
    }
}

fn print_paths(config: Option<&std::path::Path>, data_dir: Option<&std::path::Path>) {
    let config_path = config
        .map(PathBuf::from)
        .unwrap_or_else(Config::config_path);
    let tab_dir = data_dir
        .map(PathBuf::from)
        .unwrap_or_else(|| Config::default().tab_store_dir());

    println!("config:    {}", config_path.display());
    println!("tab store: {}", tab_dir.display());
    println!("log file:  {}", crate::debug::log_path().display());
}
