//! Access-log sink.
//!
//! # Responsibilities
//! - Hold the compiled format, the live bitmask and the writer together
//! - Write one line per logged request
//! - Fall back to stderr when the configured writer fails
//!
//! # Design Decisions
//! - Writers are plain byte sinks, independent of `tracing`; the access log
//!   has a fixed, template-defined layout that log aggregators parse
//! - A broken writer is reported through `tracing` and the line still goes
//!   to stderr rather than being dropped
//! - Named destinations are written by a dedicated `tracing-appender` worker
//!   thread. Request tasks only enqueue the line, so a slow disk or a full
//!   pipe never blocks a runtime worker
//! - The queue is not lossy: access-log lines are not sampled away under
//!   bursts, and the worker flushes what is queued when the last handle drops

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use tracing_appender::non_blocking::{NonBlocking, NonBlockingBuilder, WorkerGuard};

use crate::format::CompiledFormat;
use crate::stats::LogBitmask;

/// Append-only destination for access-log lines.
pub trait LogWriter: Send + Sync {
    fn write_line(&self, line: &[u8]) -> io::Result<()>;
}

/// Synchronous writer for in-memory buffers and tests. Anything that can
/// block on I/O should go through [`non_blocking`] instead.
impl<W: Write + Send> LogWriter for Mutex<W> {
    fn write_line(&self, line: &[u8]) -> io::Result<()> {
        let mut writer = self.lock().unwrap_or_else(PoisonError::into_inner);
        writer.write_all(line)?;
        writer.flush()
    }
}

/// Writer whose lines are handed to a background thread.
struct NonBlockingWriter {
    writer: NonBlocking,
    _guard: WorkerGuard,
}

impl LogWriter for NonBlockingWriter {
    fn write_line(&self, line: &[u8]) -> io::Result<()> {
        // Each write is one queued message, so lines never interleave.
        self.writer.clone().write_all(line)
    }
}

/// Move writes to `writer` onto a dedicated thread.
pub fn non_blocking<W: Write + Send + 'static>(writer: W) -> Arc<dyn LogWriter> {
    let (writer, guard) = NonBlockingBuilder::default()
        .lossy(false)
        .thread_name("access-log")
        .finish(writer);
    Arc::new(NonBlockingWriter {
        writer,
        _guard: guard,
    })
}

/// Open a log destination by name: `stderr`, `stdout`, or a file path that
/// is created if needed and appended to.
pub fn open_destination(destination: &str) -> io::Result<Arc<dyn LogWriter>> {
    match destination {
        "stderr" => Ok(non_blocking(io::stderr())),
        "stdout" => Ok(non_blocking(io::stdout())),
        path => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(Path::new(path))?;
            Ok(non_blocking(file))
        }
    }
}

/// Everything needed to emit access-log lines for one supervisor.
#[derive(Clone)]
pub struct AccessLog {
    pub(crate) format: CompiledFormat,
    pub(crate) bitmask: LogBitmask,
    writer: Arc<dyn LogWriter>,
}

impl AccessLog {
    pub fn new(format: CompiledFormat, bitmask: LogBitmask, writer: Arc<dyn LogWriter>) -> Self {
        Self {
            format,
            bitmask,
            writer,
        }
    }

    pub fn format(&self) -> &CompiledFormat {
        &self.format
    }

    pub fn bitmask(&self) -> &LogBitmask {
        &self.bitmask
    }

    pub fn write(&self, line: &[u8]) {
        if let Err(err) = self.writer.write_line(line) {
            tracing::warn!(error = %err, "Access log write failed, falling back to stderr");
            let _ = io::stderr().lock().write_all(line);
        }
    }
}
