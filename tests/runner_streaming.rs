// tests/runner_streaming.rs

use std::error::Error;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::anyhow;
use tokio::io::AsyncWriteExt;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use habprov::errors::{ExecutionError, ProvisionError};
use habprov::exec::{
    BoxFuture, Communicator, ContentReader, RemoteCmd, RemoteProcess, Session, run_command,
};
use habprov_test_utils::fake_communicator::{FakeCommunicator, FakeEvent};
use habprov_test_utils::{memory_sink, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

/// Writes one line, then holds the command open until the gate is released
/// before writing a second line and exiting.
struct GatedHost {
    gate: Mutex<Option<oneshot::Receiver<()>>>,
}

struct GatedProcess {
    writer: JoinHandle<std::io::Result<()>>,
}

impl RemoteProcess for GatedProcess {
    fn wait(self: Box<Self>) -> BoxFuture<'static, anyhow::Result<i32>> {
        let writer = self.writer;
        Box::pin(async move {
            writer.await??;
            Ok(0)
        })
    }
}

impl Communicator for GatedHost {
    fn connect(&self) -> BoxFuture<'_, anyhow::Result<()>> {
        Box::pin(async { Ok(()) })
    }

    fn disconnect(&self) -> BoxFuture<'_, anyhow::Result<()>> {
        Box::pin(async { Ok(()) })
    }

    fn start(&self, cmd: RemoteCmd) -> BoxFuture<'_, anyhow::Result<Box<dyn RemoteProcess>>> {
        let gate = self.gate.lock().unwrap().take();
        Box::pin(async move {
            let gate = gate.ok_or_else(|| anyhow!("command already started"))?;
            let RemoteCmd {
                mut stdout, stderr, ..
            } = cmd;
            let writer = tokio::spawn(async move {
                stdout.write_all(b"first line\n").await?;
                stdout.flush().await?;
                let _ = gate.await;
                stdout.write_all(b"second line\n").await?;
                drop(stderr);
                Ok(())
            });
            Ok(Box::new(GatedProcess { writer }) as Box<dyn RemoteProcess>)
        })
    }

    fn upload<'a>(
        &'a self,
        _path: &'a str,
        _content: ContentReader,
    ) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async { Ok(()) })
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(1)
    }
}

#[tokio::test]
async fn lines_reach_the_sink_while_the_command_runs() -> TestResult {
    let (release, gate) = oneshot::channel();
    let comm = Arc::new(GatedHost {
        gate: Mutex::new(Some(gate)),
    });
    let (memory, sink) = memory_sink();

    let running = tokio::spawn({
        let comm = Arc::clone(&comm);
        async move { run_command(comm.as_ref(), "tail -f sup.log", &sink).await }
    });

    with_timeout(async {
        while memory.lines().is_empty() {
            tokio::task::yield_now().await;
        }
    })
    .await;
    assert_eq!(memory.lines(), vec!["first line"]);
    assert!(!running.is_finished());

    release.send(()).map_err(|_| "command ended before release")?;
    with_timeout(running).await??;

    assert_eq!(memory.lines(), vec!["first line", "second line"]);
    Ok(())
}

#[tokio::test]
async fn both_streams_arrive_in_order() -> TestResult {
    let comm = FakeCommunicator::new().respond_with_output(
        "hab --version",
        0,
        &["hab 0.79.1", "built 2019"],
        &["deprecated flag"],
    );
    let (memory, sink) = memory_sink();

    run_command(&comm, "hab --version", &sink).await?;

    let lines = memory.lines();
    assert_eq!(lines.len(), 3);
    let stdout: Vec<_> = lines.iter().filter(|l| l.as_str() != "deprecated flag").collect();
    assert_eq!(stdout, vec!["hab 0.79.1", "built 2019"]);
    Ok(())
}

#[tokio::test]
async fn output_larger_than_the_pipe_does_not_stall() -> TestResult {
    let line = "x".repeat(200);
    let many: Vec<&str> = std::iter::repeat_n(line.as_str(), 1000).collect();
    let comm = FakeCommunicator::new().respond_with_output("yes", 0, &many, &many);
    let (memory, sink) = memory_sink();

    with_timeout(run_command(&comm, "yes | head", &sink)).await?;

    assert_eq!(memory.lines().len(), 2000);
    Ok(())
}

#[tokio::test]
async fn non_zero_exit_is_reported_after_output() -> TestResult {
    let comm = FakeCommunicator::new().respond_with_output("false", 7, &[], &["nope"]);
    let (memory, sink) = memory_sink();

    let err = run_command(&comm, "false", &sink).await.unwrap_err();

    assert!(matches!(
        err,
        ProvisionError::Execution(ExecutionError::NonZeroExit { status: 7, .. })
    ));
    assert_eq!(memory.lines(), vec!["nope"]);
    assert!(err.to_string().contains("exit status: 7"));
    Ok(())
}

#[tokio::test]
async fn session_routes_commands_and_uploads_through_the_communicator() -> TestResult {
    let comm = FakeCommunicator::new();
    comm.connect().await?;
    let (_memory, sink) = memory_sink();
    let session = Session::new(&comm, sink);

    session.run("uptime").await?;
    session.upload("notes.txt", "hello\n").await?;

    assert_eq!(
        comm.events(),
        vec![
            FakeEvent::Connect,
            FakeEvent::Command("uptime".to_string()),
            FakeEvent::Upload {
                path: "notes.txt".to_string(),
                contents: "hello\n".to_string()
            },
        ]
    );
    Ok(())
}
