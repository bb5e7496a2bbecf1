// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `habprov`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "habprov",
    version,
    about = "Install the Habitat supervisor on a remote host and load services into it.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Habprov.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "Habprov.toml")]
    pub config: String,

    /// Override `[connection].host` from the config file.
    #[arg(long, value_name = "HOST")]
    pub host: Option<String>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `HABPROV_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Print every command and upload the run would perform, without
    /// connecting to the host.
    #[arg(long, conflicts_with = "check")]
    pub dry_run: bool,

    /// Parse + validate the config, then exit.
    #[arg(long)]
    pub check: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
