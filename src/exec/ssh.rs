// src/exec/ssh.rs

//! [`Communicator`] backed by the system OpenSSH client.
//!
//! `connect` starts a control master whose socket lives in a private
//! temporary directory; every command and upload is then multiplexed over it,
//! so authentication happens once per run.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use tempfile::TempDir;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::transport::{BoxFuture, Communicator, ContentReader, RemoteCmd, RemoteProcess};
use crate::config::ConnectionSettings;
use crate::provision::command::shell_quote;

/// Upper bound for a single TCP/SSH handshake attempt.
const HANDSHAKE_TIMEOUT_SECS: u64 = 10;

/// The control master exits on its own this long after its last client, in
/// case the run dies before `disconnect`.
const CONTROL_PERSIST_SECS: u64 = 60;

struct ControlMaster {
    // Removed (with the socket) on drop.
    _dir: TempDir,
    socket: PathBuf,
}

pub struct SshCommunicator {
    settings: ConnectionSettings,
    control: Mutex<Option<ControlMaster>>,
}

impl SshCommunicator {
    pub fn new(settings: ConnectionSettings) -> Self {
        Self {
            settings,
            control: Mutex::new(None),
        }
    }

    /// `user@host`, or just `host` when no user is configured.
    pub fn destination(&self) -> String {
        match &self.settings.user {
            Some(user) => format!("{}@{}", user, self.settings.host),
            None => self.settings.host.clone(),
        }
    }

    fn ssh(&self, socket: &Path) -> Command {
        let mut cmd = Command::new("ssh");
        cmd.arg("-o")
            .arg("BatchMode=yes")
            .arg("-o")
            .arg(format!("ControlPath={}", socket.display()));
        if let Some(port) = self.settings.port {
            cmd.arg("-p").arg(port.to_string());
        }
        if let Some(identity) = &self.settings.identity_file {
            cmd.arg("-i").arg(identity);
        }
        cmd.kill_on_drop(true);
        cmd
    }

    fn control_socket(&self) -> Result<PathBuf> {
        let guard = self
            .control
            .lock()
            .map_err(|_| anyhow!("ssh control state lock poisoned"))?;
        match guard.as_ref() {
            Some(master) => Ok(master.socket.clone()),
            None => bail!("not connected to {}", self.settings.host),
        }
    }

    async fn open_master(&self) -> Result<()> {
        if self.control_socket().is_ok() {
            return Ok(());
        }

        let dir = tempfile::Builder::new()
            .prefix("habprov-ssh-")
            .tempdir()
            .context("creating ssh control directory")?;
        let socket = dir.path().join("control.sock");
        let log_path = dir.path().join("connect.log");
        let log = std::fs::File::create(&log_path)
            .with_context(|| format!("creating {}", log_path.display()))?;

        // stderr goes to a file: with -f the backgrounded master would keep a
        // pipe open forever.
        let status = self
            .ssh(&socket)
            .arg("-o")
            .arg("ControlMaster=yes")
            .arg("-o")
            .arg(format!("ControlPersist={CONTROL_PERSIST_SECS}"))
            .arg("-o")
            .arg(format!("ConnectTimeout={HANDSHAKE_TIMEOUT_SECS}"))
            .arg("-o")
            .arg("StrictHostKeyChecking=accept-new")
            .arg("-f")
            .arg("-N")
            .arg("--")
            .arg(self.destination())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::from(log))
            .status()
            .await
            .context("spawning ssh")?;

        if !status.success() {
            let detail = tokio::fs::read_to_string(&log_path)
                .await
                .unwrap_or_default();
            bail!(
                "ssh to {} failed ({}): {}",
                self.destination(),
                status,
                detail.trim()
            );
        }

        info!(destination = %self.destination(), "ssh control master established");
        let mut guard = self
            .control
            .lock()
            .map_err(|_| anyhow!("ssh control state lock poisoned"))?;
        *guard = Some(ControlMaster { _dir: dir, socket });
        Ok(())
    }

    async fn close_master(&self) -> Result<()> {
        let master = {
            let mut guard = self
                .control
                .lock()
                .map_err(|_| anyhow!("ssh control state lock poisoned"))?;
            guard.take()
        };
        let Some(master) = master else {
            return Ok(());
        };

        let status = self
            .ssh(&master.socket)
            .arg("-O")
            .arg("exit")
            .arg("--")
            .arg(self.destination())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .context("spawning ssh -O exit")?;

        if !status.success() {
            bail!("closing ssh control master exited with {status}");
        }
        debug!(destination = %self.destination(), "ssh control master closed");
        Ok(())
    }

    async fn start_command(&self, remote: RemoteCmd) -> Result<Box<dyn RemoteProcess>> {
        let socket = self.control_socket()?;
        let mut child = self
            .ssh(&socket)
            .arg("--")
            .arg(self.destination())
            .arg(&remote.command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .context("spawning ssh")?;

        let stdout = child.stdout.take().context("ssh stdout was not captured")?;
        let stderr = child.stderr.take().context("ssh stderr was not captured")?;

        let RemoteCmd {
            stdout: out_w,
            stderr: err_w,
            ..
        } = remote;

        let pumps = vec![
            tokio::spawn(pump(stdout, out_w)),
            tokio::spawn(pump(stderr, err_w)),
        ];

        Ok(Box::new(SshProcess { child, pumps }))
    }

    async fn upload_file(&self, path: &str, mut content: ContentReader) -> Result<()> {
        let socket = self.control_socket()?;
        let mut child = self
            .ssh(&socket)
            .arg("--")
            .arg(self.destination())
            .arg(format!("cat > {}", shell_quote(path)))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .context("spawning ssh")?;

        let mut stdin = child.stdin.take().context("ssh stdin was not captured")?;
        let copied = tokio::io::copy(&mut content, &mut stdin)
            .await
            .context("streaming upload content")?;
        stdin.shutdown().await.ok();
        drop(stdin);

        let output = child
            .wait_with_output()
            .await
            .context("waiting for upload")?;
        if !output.status.success() {
            bail!(
                "remote write exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        debug!(path, bytes = copied, "upload finished");
        Ok(())
    }
}

/// Copy one output stream of the ssh child into the conduit, then close it.
async fn pump<R, W>(mut reader: R, mut writer: W) -> std::io::Result<u64>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let n = tokio::io::copy(&mut reader, &mut writer).await?;
    writer.shutdown().await?;
    Ok(n)
}

struct SshProcess {
    child: Child,
    pumps: Vec<JoinHandle<std::io::Result<u64>>>,
}

impl RemoteProcess for SshProcess {
    fn wait(self: Box<Self>) -> BoxFuture<'static, Result<i32>> {
        let SshProcess { mut child, pumps } = *self;
        Box::pin(async move {
            let status = child.wait().await.context("waiting for ssh")?;

            // The pumps own the conduit writers; once they return the relays
            // see end-of-stream.
            for pump in pumps {
                match pump.await {
                    Ok(Ok(_)) => {}
                    Ok(Err(e)) => warn!(error = %e, "copying remote output failed"),
                    Err(e) => warn!(error = %e, "output copy task failed"),
                }
            }

            // Killed by a signal: no exit code.
            Ok(status.code().unwrap_or(-1))
        })
    }
}

impl Communicator for SshCommunicator {
    fn connect(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(self.open_master())
    }

    fn disconnect(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(self.close_master())
    }

    fn start(&self, cmd: RemoteCmd) -> BoxFuture<'_, Result<Box<dyn RemoteProcess>>> {
        Box::pin(self.start_command(cmd))
    }

    fn upload<'a>(&'a self, path: &'a str, content: ContentReader) -> BoxFuture<'a, Result<()>> {
        Box::pin(self.upload_file(path, content))
    }

    fn timeout(&self) -> Duration {
        self.settings.timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::validate::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_RETRY_INTERVAL};

    fn settings(user: Option<&str>) -> ConnectionSettings {
        ConnectionSettings {
            host: "10.1.2.3".to_string(),
            user: user.map(str::to_string),
            port: Some(2222),
            identity_file: None,
            timeout: DEFAULT_CONNECT_TIMEOUT,
            retry_interval: DEFAULT_RETRY_INTERVAL,
        }
    }

    #[test]
    fn destination_includes_user_when_configured() {
        assert_eq!(
            SshCommunicator::new(settings(Some("ubuntu"))).destination(),
            "ubuntu@10.1.2.3"
        );
        assert_eq!(SshCommunicator::new(settings(None)).destination(), "10.1.2.3");
    }

    #[tokio::test]
    async fn commands_before_connect_are_rejected() {
        let comm = SshCommunicator::new(settings(None));
        let err = comm.control_socket().unwrap_err();
        assert!(err.to_string().contains("not connected"));
        // Disconnecting without a session is a no-op.
        comm.disconnect().await.unwrap();
    }

    #[test]
    fn timeout_comes_from_settings() {
        assert_eq!(
            SshCommunicator::new(settings(None)).timeout(),
            DEFAULT_CONNECT_TIMEOUT
        );
    }
}
