use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use anyhow::{Result, anyhow};
use habprov::exec::{
    BoxFuture, Communicator, CompletedProcess, ContentReader, RemoteCmd, RemoteProcess,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Everything the code under test did to the fake host, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeEvent {
    /// A successful connect (failed attempts are only counted).
    Connect,
    Disconnect,
    Command(String),
    Upload { path: String, contents: String },
}

struct Response {
    pattern: String,
    status: i32,
    stdout: Vec<String>,
    stderr: Vec<String>,
}

#[derive(Default)]
struct State {
    events: Vec<FakeEvent>,
    connect_attempts: u32,
    connect_failures_left: Option<u32>,
    responses: Vec<Response>,
    fail_uploads: bool,
    fail_disconnect: bool,
}

/// A scripted in-memory host.
///
/// - commands succeed with no output unless a response matches
/// - a response matches when its pattern is a substring of the command
/// - uploads are read fully and recorded
///
/// Clones share state, so a test can keep one handle for inspection.
#[derive(Clone)]
pub struct FakeCommunicator {
    state: Arc<Mutex<State>>,
    timeout: Duration,
}

impl FakeCommunicator {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                connect_failures_left: Some(0),
                ..Default::default()
            })),
            timeout: Duration::from_secs(5),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Fail the first `n` connect attempts.
    pub fn fail_connects(self, n: u32) -> Self {
        self.lock().connect_failures_left = Some(n);
        self
    }

    /// Never accept a connection.
    pub fn refuse_connections(self) -> Self {
        self.lock().connect_failures_left = None;
        self
    }

    /// Exit with `status` for commands containing `pattern`.
    pub fn respond(self, pattern: &str, status: i32) -> Self {
        self.respond_with_output(pattern, status, &[], &[])
    }

    pub fn respond_with_output(
        self,
        pattern: &str,
        status: i32,
        stdout: &[&str],
        stderr: &[&str],
    ) -> Self {
        self.lock().responses.push(Response {
            pattern: pattern.to_string(),
            status,
            stdout: stdout.iter().map(|s| s.to_string()).collect(),
            stderr: stderr.iter().map(|s| s.to_string()).collect(),
        });
        self
    }

    pub fn fail_uploads(self) -> Self {
        self.lock().fail_uploads = true;
        self
    }

    pub fn fail_disconnect(self) -> Self {
        self.lock().fail_disconnect = true;
        self
    }

    pub fn events(&self) -> Vec<FakeEvent> {
        self.lock().events.clone()
    }

    pub fn commands(&self) -> Vec<String> {
        self.lock()
            .events
            .iter()
            .filter_map(|e| match e {
                FakeEvent::Command(c) => Some(c.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn uploads(&self) -> Vec<(String, String)> {
        self.lock()
            .events
            .iter()
            .filter_map(|e| match e {
                FakeEvent::Upload { path, contents } => Some((path.clone(), contents.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn connect_attempts(&self) -> u32 {
        self.lock().connect_attempts
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }
}

impl Default for FakeCommunicator {
    fn default() -> Self {
        Self::new()
    }
}

impl Communicator for FakeCommunicator {
    fn connect(&self) -> BoxFuture<'_, Result<()>> {
        let result = {
            let mut state = self.lock();
            state.connect_attempts += 1;
            let attempt = state.connect_attempts;
            match state.connect_failures_left {
                Some(0) => {
                    state.events.push(FakeEvent::Connect);
                    Ok(())
                }
                Some(n) => {
                    state.connect_failures_left = Some(n - 1);
                    Err(anyhow!("connection refused (attempt {attempt})"))
                }
                None => Err(anyhow!("connection refused (attempt {attempt})")),
            }
        };
        Box::pin(async move { result })
    }

    fn disconnect(&self) -> BoxFuture<'_, Result<()>> {
        let result = {
            let mut state = self.lock();
            state.events.push(FakeEvent::Disconnect);
            if state.fail_disconnect {
                Err(anyhow!("control socket already gone"))
            } else {
                Ok(())
            }
        };
        Box::pin(async move { result })
    }

    fn start(&self, cmd: RemoteCmd) -> BoxFuture<'_, Result<Box<dyn RemoteProcess>>> {
        let (status, stdout_lines, stderr_lines) = {
            let mut state = self.lock();
            state.events.push(FakeEvent::Command(cmd.command.clone()));
            match state
                .responses
                .iter()
                .find(|r| cmd.command.contains(&r.pattern))
            {
                Some(r) => (r.status, r.stdout.clone(), r.stderr.clone()),
                None => (0, Vec::new(), Vec::new()),
            }
        };

        Box::pin(async move {
            let RemoteCmd {
                mut stdout,
                mut stderr,
                ..
            } = cmd;
            for line in stdout_lines {
                stdout.write_all(format!("{line}\n").as_bytes()).await?;
            }
            for line in stderr_lines {
                stderr.write_all(format!("{line}\n").as_bytes()).await?;
            }
            Ok(Box::new(CompletedProcess::new(status)) as Box<dyn RemoteProcess>)
        })
    }

    fn upload<'a>(&'a self, path: &'a str, mut content: ContentReader) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let mut contents = String::new();
            content.read_to_string(&mut contents).await?;

            let mut state = self.lock();
            state.events.push(FakeEvent::Upload {
                path: path.to_string(),
                contents,
            });
            if state.fail_uploads {
                return Err(anyhow!("permission denied writing {path}"));
            }
            Ok(())
        })
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}
