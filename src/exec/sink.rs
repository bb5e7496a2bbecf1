// src/exec/sink.rs

//! Destinations for remote output lines.

use std::io::Write;
use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow};

/// Receives one call per complete line of remote output.
///
/// Implementations are shared between the stdout and stderr relays of a
/// command, so they must be `Send + Sync`. Returning an error (or panicking)
/// only stops delivery for the current stream; the relay keeps draining.
pub trait OutputSink: Send + Sync {
    fn output(&self, line: &str) -> Result<()>;
}

pub type SharedSink = Arc<dyn OutputSink>;

/// Writes every line to stdout as soon as it arrives.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleSink;

impl OutputSink for ConsoleSink {
    fn output(&self, line: &str) -> Result<()> {
        let mut out = std::io::stdout().lock();
        writeln!(out, "{line}")?;
        out.flush()?;
        Ok(())
    }
}

/// Collects lines in memory. Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

impl OutputSink for MemorySink {
    fn output(&self, line: &str) -> Result<()> {
        let mut guard = self
            .lines
            .lock()
            .map_err(|_| anyhow!("memory sink lock poisoned"))?;
        guard.push(line.to_string());
        Ok(())
    }
}
