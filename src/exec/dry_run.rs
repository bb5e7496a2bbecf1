// src/exec/dry_run.rs

//! A [`Communicator`] that only reports what it would do.

use std::time::Duration;

use anyhow::Result;
use tokio::io::AsyncReadExt;

use super::sink::SharedSink;
use super::transport::{
    BoxFuture, Communicator, CompletedProcess, ContentReader, RemoteCmd, RemoteProcess,
};

/// Prints every connect, command and upload to the sink and reports success.
///
/// Used by `--dry-run` to show the full command sequence for a config
/// without touching the host.
pub struct DryRunCommunicator {
    host: String,
    sink: SharedSink,
    timeout: Duration,
}

impl DryRunCommunicator {
    pub fn new(host: impl Into<String>, sink: SharedSink, timeout: Duration) -> Self {
        Self {
            host: host.into(),
            sink,
            timeout,
        }
    }

    fn say(&self, line: String) -> Result<()> {
        self.sink.output(&format!("[dry-run] {line}"))
    }
}

impl Communicator for DryRunCommunicator {
    fn connect(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move { self.say(format!("connect {}", self.host)) })
    }

    fn disconnect(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move { self.say(format!("disconnect {}", self.host)) })
    }

    fn start(&self, cmd: RemoteCmd) -> BoxFuture<'_, Result<Box<dyn RemoteProcess>>> {
        Box::pin(async move {
            self.say(format!("$ {}", cmd.command))?;
            Ok(Box::new(CompletedProcess::success()) as Box<dyn RemoteProcess>)
        })
    }

    fn upload<'a>(&'a self, path: &'a str, mut content: ContentReader) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let mut buf = Vec::new();
            content.read_to_end(&mut buf).await?;
            self.say(format!("upload {} bytes to {}", buf.len(), path))
        })
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}
