// src/errors.rs

//! Crate-wide error types.
//!
//! The taxonomy follows the provisioning stages: configuration problems are
//! found before any remote interaction, connect failures are retried until a
//! deadline, and command/transport failures are fatal for the run.

use std::time::Duration;

use thiserror::Error;

/// Top-level error for a provisioning run.
#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// One or more invalid configuration values.
///
/// Validation collects every problem instead of stopping at the first one,
/// so a single run of `--check` reports everything that needs fixing.
#[derive(Error, Debug)]
#[error("{}", join_problems(.problems))]
pub struct ConfigError {
    pub problems: Vec<ConfigProblem>,
}

fn join_problems(problems: &[ConfigProblem]) -> String {
    problems
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// A single invalid field.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigProblem {
    #[error("service '{service}': {message}")]
    InvalidStrategy { service: String, message: String },

    #[error("service '{service}': {message}")]
    InvalidTopology { service: String, message: String },

    #[error("{0}")]
    InvalidServiceType(String),

    #[error("service '{service}': invalid bind specification '{bind}' (expected alias:service.group)")]
    InvalidBind { service: String, bind: String },

    #[error("service '{0}': package identifier must look like origin/name")]
    InvalidPackageIdent(String),

    #[error("[connection].host must not be empty")]
    MissingHost,

    #[error("{field}: {message}")]
    InvalidDuration { field: String, message: String },
}

/// The session could not be opened before the connect deadline.
#[derive(Error, Debug)]
#[error("could not connect after {attempts} attempt(s) in {elapsed:?}: {source:#}")]
pub struct ConnectError {
    pub attempts: u32,
    pub elapsed: Duration,
    #[source]
    pub source: anyhow::Error,
}

/// A remote command ran to completion but reported failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("command {command:?} exited with non-zero exit status: {status}")]
    NonZeroExit { command: String, status: i32 },
}

/// I/O failure while talking to the remote host.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("error executing command {command:?}: {source:#}")]
    Start {
        command: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("error waiting for command {command:?}: {source:#}")]
    Wait {
        command: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("error reading output of command {command:?}: {source}")]
    Stream {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("error uploading {path}: {source:#}")]
    Upload {
        path: String,
        #[source]
        source: anyhow::Error,
    },
}

pub type Result<T> = std::result::Result<T, ProvisionError>;
