// src/exec/relay.rs

//! Line-buffered relay from a byte stream to an [`OutputSink`].

use std::io;
use std::panic::{AssertUnwindSafe, catch_unwind};

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::task::JoinHandle;
use tracing::{trace, warn};

use super::sink::SharedSink;

/// Splits a byte stream into text lines.
///
/// Lines end at `\n`; a trailing `\r` is dropped and invalid UTF-8 is
/// replaced. A final line without a newline is still returned once the
/// stream closes.
pub struct LineReader<R> {
    reader: BufReader<R>,
    buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            buf: Vec::new(),
        }
    }

    /// Next complete line, or `None` once the stream is drained.
    pub async fn next_line(&mut self) -> io::Result<Option<String>> {
        self.buf.clear();
        let n = self.reader.read_until(b'\n', &mut self.buf).await?;
        if n == 0 {
            return Ok(None);
        }

        if self.buf.last() == Some(&b'\n') {
            self.buf.pop();
        }
        if self.buf.last() == Some(&b'\r') {
            self.buf.pop();
        }

        Ok(Some(String::from_utf8_lossy(&self.buf).into_owned()))
    }
}

/// What a relay did before its stream closed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayReport {
    /// Lines read from the stream (delivered or not).
    pub lines: usize,
    /// The sink returned an error or panicked; later lines were discarded.
    pub sink_failed: bool,
}

/// Forward every line of `reader` to `sink` until the stream closes.
///
/// Once the sink fails, lines are still read and discarded so the writer on
/// the other end never blocks on a full pipe.
pub async fn relay_lines<R>(reader: R, sink: SharedSink) -> io::Result<RelayReport>
where
    R: AsyncRead + Unpin,
{
    let mut lines = LineReader::new(reader);
    let mut report = RelayReport::default();

    while let Some(line) = lines.next_line().await? {
        report.lines += 1;
        if report.sink_failed {
            trace!(line = %line, "discarding line after sink failure");
            continue;
        }

        match catch_unwind(AssertUnwindSafe(|| sink.output(&line))) {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                warn!(error = %err, "output sink failed; draining remaining output");
                report.sink_failed = true;
            }
            Err(_) => {
                warn!("output sink panicked; draining remaining output");
                report.sink_failed = true;
            }
        }
    }

    Ok(report)
}

/// Run [`relay_lines`] as an independent Tokio task.
pub fn spawn_relay<R>(reader: R, sink: SharedSink) -> JoinHandle<io::Result<RelayReport>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(relay_lines(reader, sink))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use anyhow::bail;
    use tokio::io::AsyncWriteExt;

    use super::*;
    use crate::exec::sink::{MemorySink, OutputSink};

    #[tokio::test]
    async fn final_partial_line_is_emitted_once() {
        let sink = MemorySink::new();
        let input: &[u8] = b"first\nsecond\nthird";

        let report = relay_lines(input, Arc::new(sink.clone())).await.unwrap();

        assert_eq!(sink.lines(), vec!["first", "second", "third"]);
        assert_eq!(report.lines, 3);
        assert!(!report.sink_failed);
    }

    #[tokio::test]
    async fn crlf_and_empty_lines_are_preserved_as_lines() {
        let sink = MemorySink::new();
        let input: &[u8] = b"a\r\n\nb\n";

        relay_lines(input, Arc::new(sink.clone())).await.unwrap();

        assert_eq!(sink.lines(), vec!["a", "", "b"]);
    }

    #[tokio::test]
    async fn invalid_utf8_is_replaced_not_fatal() {
        let sink = MemorySink::new();
        let input: &[u8] = b"ok\n\xff\xfe\nstill ok\n";

        relay_lines(input, Arc::new(sink.clone())).await.unwrap();

        let lines = sink.lines();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[2], "still ok");
    }

    #[tokio::test]
    async fn empty_stream_yields_nothing() {
        let sink = MemorySink::new();
        let report = relay_lines(&b""[..], Arc::new(sink.clone())).await.unwrap();
        assert_eq!(report, RelayReport::default());
        assert!(sink.lines().is_empty());
    }

    struct FailAfter {
        limit: usize,
        seen: AtomicUsize,
    }

    impl OutputSink for FailAfter {
        fn output(&self, _line: &str) -> anyhow::Result<()> {
            let n = self.seen.fetch_add(1, Ordering::SeqCst);
            if n >= self.limit {
                bail!("console went away");
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn failing_sink_does_not_block_the_writer() {
        let sink = Arc::new(FailAfter {
            limit: 2,
            seen: AtomicUsize::new(0),
        });
        let (mut writer, reader) = tokio::io::duplex(64);
        let relay = spawn_relay(reader, sink.clone());

        // Far more than the pipe can hold; only completes if the relay drains.
        for i in 0..2_000 {
            writer
                .write_all(format!("line {i}\n").as_bytes())
                .await
                .unwrap();
        }
        drop(writer);

        let report = relay.await.unwrap().unwrap();
        assert_eq!(report.lines, 2_000);
        assert!(report.sink_failed);
        assert_eq!(sink.seen.load(Ordering::SeqCst), 3);
    }

    struct Panicking;

    impl OutputSink for Panicking {
        fn output(&self, _line: &str) -> anyhow::Result<()> {
            panic!("sink bug");
        }
    }

    #[tokio::test]
    async fn panicking_sink_is_contained() {
        let input: &[u8] = b"one\ntwo\n";
        let report = relay_lines(input, Arc::new(Panicking)).await.unwrap();
        assert_eq!(report.lines, 2);
        assert!(report.sink_failed);
    }
}
