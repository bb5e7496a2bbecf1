// src/exec/transport.rs

//! Capability interface to the remote host.
//!
//! The engine never talks to SSH (or anything else) directly; it drives a
//! [`Communicator`]. Production code uses [`super::ssh::SshCommunicator`],
//! `--dry-run` uses [`super::dry_run::DryRunCommunicator`], and tests plug in
//! scripted fakes.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use anyhow::Result;
use tokio::io::{AsyncRead, AsyncWrite};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Write end of an output conduit handed to the transport.
pub type OutputWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Content streamed to the host by [`Communicator::upload`].
pub type ContentReader = Box<dyn AsyncRead + Send + Unpin>;

/// A command ready to be started on the remote host.
pub struct RemoteCmd {
    /// Opaque shell text, run by the remote login shell.
    pub command: String,
    pub stdout: OutputWriter,
    pub stderr: OutputWriter,
}

/// A started remote command.
pub trait RemoteProcess: Send {
    /// Wait for the command to exit and return its exit status.
    ///
    /// Implementations own the `stdout`/`stderr` writers of the [`RemoteCmd`]
    /// and must have dropped them by the time the returned future resolves,
    /// otherwise the relays reading the other ends never finish.
    fn wait(self: Box<Self>) -> BoxFuture<'static, Result<i32>>;
}

/// Session with one remote host.
pub trait Communicator: Send + Sync {
    /// Open the session. May be called again after a failed attempt.
    fn connect(&self) -> BoxFuture<'_, Result<()>>;

    /// Close the session. A no-op when not connected.
    fn disconnect(&self) -> BoxFuture<'_, Result<()>>;

    /// Start `cmd`; output is written to its writers while it runs.
    fn start(&self, cmd: RemoteCmd) -> BoxFuture<'_, Result<Box<dyn RemoteProcess>>>;

    /// Write `content` to `path` on the host without going through a shell
    /// literal.
    fn upload<'a>(&'a self, path: &'a str, content: ContentReader) -> BoxFuture<'a, Result<()>>;

    /// How long the initial connection may be retried.
    fn timeout(&self) -> Duration;
}

/// A process that already finished; its writers were dropped on creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletedProcess {
    status: i32,
}

impl CompletedProcess {
    pub fn new(status: i32) -> Self {
        Self { status }
    }

    pub fn success() -> Self {
        Self::new(0)
    }
}

impl RemoteProcess for CompletedProcess {
    fn wait(self: Box<Self>) -> BoxFuture<'static, Result<i32>> {
        let status = self.status;
        Box::pin(async move { Ok(status) })
    }
}
