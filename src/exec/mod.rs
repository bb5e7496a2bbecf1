// src/exec/mod.rs

//! Remote command execution layer.
//!
//! - [`transport`] defines the `Communicator` capability the engine drives.
//! - [`relay`] turns a byte stream into lines delivered to an output sink.
//! - [`runner`] runs one command, wiring stdout/stderr through two relays and
//!   turning a non-zero exit status into an error.
//! - [`retry`] opens the session with fixed-interval, deadline-bounded retry.
//! - [`ssh`] and [`dry_run`] are the concrete communicators.
//! - [`sink`] holds the output sinks.

pub mod dry_run;
pub mod relay;
pub mod retry;
pub mod runner;
pub mod sink;
pub mod ssh;
pub mod transport;

pub use dry_run::DryRunCommunicator;
pub use relay::{LineReader, RelayReport, relay_lines, spawn_relay};
pub use retry::{RetryPolicy, connect_with_retry, retry_until_deadline};
pub use runner::{Session, run_command};
pub use sink::{ConsoleSink, MemorySink, OutputSink, SharedSink};
pub use ssh::SshCommunicator;
pub use transport::{
    BoxFuture, Communicator, CompletedProcess, ContentReader, OutputWriter, RemoteCmd,
    RemoteProcess,
};
