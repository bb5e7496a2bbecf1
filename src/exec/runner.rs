// src/exec/runner.rs

//! Run one remote command with live output.

use std::io;
use std::io::Cursor;

use tracing::{debug, info, warn};

use super::relay::{RelayReport, spawn_relay};
use super::sink::SharedSink;
use super::transport::{Communicator, RemoteCmd};
use crate::errors::{ExecutionError, Result, TransportError};

/// Buffer size of each in-memory stdout/stderr pipe.
const PIPE_CAPACITY: usize = 64 * 1024;

/// Run `command` on the host behind `comm`, relaying stdout and stderr line
/// by line to `sink`.
///
/// Returns only after the process exited, the transport released both write
/// ends, and both relays drained everything that was written. Exit status 0
/// is success; anything else becomes [`ExecutionError::NonZeroExit`].
pub async fn run_command<C>(comm: &C, command: &str, sink: &SharedSink) -> Result<()>
where
    C: Communicator + ?Sized,
{
    info!(command = %command, "running remote command");

    let (stdout_w, stdout_r) = tokio::io::duplex(PIPE_CAPACITY);
    let (stderr_w, stderr_r) = tokio::io::duplex(PIPE_CAPACITY);
    let stdout_relay = spawn_relay(stdout_r, sink.clone());
    let stderr_relay = spawn_relay(stderr_r, sink.clone());

    let cmd = RemoteCmd {
        command: command.to_string(),
        stdout: Box::new(stdout_w),
        stderr: Box::new(stderr_w),
    };

    let process = match comm.start(cmd).await {
        Ok(process) => process,
        Err(source) => {
            // The writers went down with the failed start; let the relays end.
            let _ = tokio::join!(stdout_relay, stderr_relay);
            return Err(TransportError::Start {
                command: command.to_string(),
                source,
            }
            .into());
        }
    };

    let status = process.wait().await;
    let (stdout_done, stderr_done) = tokio::join!(stdout_relay, stderr_relay);

    let status = status.map_err(|source| TransportError::Wait {
        command: command.to_string(),
        source,
    })?;
    let stdout_report = finish_relay(command, "stdout", stdout_done)?;
    let stderr_report = finish_relay(command, "stderr", stderr_done)?;

    debug!(
        command = %command,
        status,
        stdout_lines = stdout_report.lines,
        stderr_lines = stderr_report.lines,
        "remote command finished"
    );

    if status != 0 {
        return Err(ExecutionError::NonZeroExit {
            command: command.to_string(),
            status,
        }
        .into());
    }

    Ok(())
}

fn finish_relay(
    command: &str,
    stream: &str,
    joined: std::result::Result<io::Result<RelayReport>, tokio::task::JoinError>,
) -> Result<RelayReport> {
    let report = joined
        .map_err(io::Error::other)
        .and_then(|r| r)
        .map_err(|source| TransportError::Stream {
            command: command.to_string(),
            source,
        })?;

    if report.sink_failed {
        warn!(
            command = %command,
            stream,
            "some {stream} lines were not delivered because the output sink failed"
        );
    }
    Ok(report)
}

/// A connected host plus the sink that receives its output.
///
/// Provisioning steps go through a session so they never deal with pipes or
/// relays themselves.
pub struct Session<'a, C: Communicator + ?Sized> {
    comm: &'a C,
    sink: SharedSink,
}

impl<'a, C: Communicator + ?Sized> Session<'a, C> {
    pub fn new(comm: &'a C, sink: SharedSink) -> Self {
        Self { comm, sink }
    }

    /// See [`run_command`].
    pub async fn run(&self, command: &str) -> Result<()> {
        run_command(self.comm, command, &self.sink).await
    }

    /// Write `contents` to `path` on the host via the transport's upload
    /// primitive.
    pub async fn upload(&self, path: &str, contents: &str) -> Result<()> {
        debug!(path, bytes = contents.len(), "uploading file");
        let reader = Box::new(Cursor::new(contents.as_bytes().to_vec()));
        self.comm
            .upload(path, reader)
            .await
            .map_err(|source| TransportError::Upload {
                path: path.to_string(),
                source,
            })?;
        Ok(())
    }
}
