//! Dedicated writer task for the data and log streams.
//!
//! Every write goes through one task that owns both sinks. Handles send a
//! command over an mpsc channel and wait for its acknowledgement, so a call
//! returns only once its bytes are committed (or rejected) and no write can
//! start before the previous one has finished.
//!
//! # Architecture
//!
//! ```text
//! EventWriter ─┐
//! (clones)     ├─► mpsc::Sender<Command> ─► Writer Task ─┬─► stdout sink
//! WriterTask ──┘        ◄── oneshot ack ──                └─► stderr sink
//! ```
//!
//! The first event of a run is prefixed with `<stream>` in the same write.
//! The stream is closed, if at all, by [`WriterTask::finish`], which also
//! ends the task; handles that outlive it get [`ModularInputError::WriterClosed`].

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::io::AsyncWrite;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::error::{ModularInputError, Result, SinkKind};
use crate::protocol::Event;
use crate::sink::{BoundedSink, UNBOUNDED};

/// Default command queue capacity.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

const STREAM_OPEN: &[u8] = b"<stream>";
const STREAM_CLOSE: &[u8] = b"</stream>";

/// Severity of a log line on the error stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Verbose diagnostics.
    Debug,
    /// Normal operation.
    Info,
    /// Something unexpected but recoverable.
    Warn,
    /// A failure of the current operation.
    Error,
    /// The run cannot continue.
    Fatal,
}

impl Severity {
    /// Upper-case spelling used on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
            Severity::Fatal => "FATAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for the writer task.
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Capacity of the data sink in bytes.
    pub out_capacity: usize,
    /// Capacity of the log sink in bytes.
    pub err_capacity: usize,
    /// Command queue capacity.
    pub channel_capacity: usize,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            out_capacity: UNBOUNDED,
            err_capacity: UNBOUNDED,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

/// What a write is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    /// `<event>` fragment inside the stream.
    Event,
    /// Standalone document on the data sink.
    Document,
    /// Line on the log sink.
    Log,
}

enum Command {
    Write {
        target: Target,
        payload: Bytes,
        ack: oneshot::Sender<Result<()>>,
    },
    Finish {
        close_stream: bool,
        ack: oneshot::Sender<Result<()>>,
    },
}

/// Committed byte counts, published by the writer task.
#[derive(Debug, Default)]
struct Positions {
    out: AtomicUsize,
    err: AtomicUsize,
}

/// Handle for writing events and log lines.
///
/// Cheap to clone. All clones feed the same writer task, so writes issued in
/// sequence are committed in that sequence.
#[derive(Clone)]
pub struct EventWriter {
    tx: mpsc::Sender<Command>,
    positions: Arc<Positions>,
}

impl EventWriter {
    /// Write an event, opening the stream first if needed.
    pub async fn write_event(&self, event: &Event) -> Result<()> {
        let fragment = event.to_xml()?;
        self.submit(Target::Event, Bytes::from(fragment)).await
    }

    /// Write a complete XML document to the data sink.
    pub async fn write_document(&self, document: impl Into<String>) -> Result<()> {
        self.submit(Target::Document, Bytes::from(document.into()))
            .await
    }

    /// Write `"{LEVEL} {message}\n"` to the log sink.
    pub async fn log(&self, severity: Severity, message: impl AsRef<str>) -> Result<()> {
        let line = format!("{} {}\n", severity, message.as_ref());
        self.submit(Target::Log, Bytes::from(line)).await
    }

    /// Log at DEBUG.
    pub async fn debug(&self, message: impl AsRef<str>) -> Result<()> {
        self.log(Severity::Debug, message).await
    }

    /// Log at INFO.
    pub async fn info(&self, message: impl AsRef<str>) -> Result<()> {
        self.log(Severity::Info, message).await
    }

    /// Log at WARN.
    pub async fn warn(&self, message: impl AsRef<str>) -> Result<()> {
        self.log(Severity::Warn, message).await
    }

    /// Log at ERROR.
    pub async fn error(&self, message: impl AsRef<str>) -> Result<()> {
        self.log(Severity::Error, message).await
    }

    /// Log at FATAL.
    pub async fn fatal(&self, message: impl AsRef<str>) -> Result<()> {
        self.log(Severity::Fatal, message).await
    }

    /// Bytes committed to the data sink.
    #[inline]
    pub fn out_position(&self) -> usize {
        self.positions.out.load(Ordering::Acquire)
    }

    /// Bytes committed to the log sink.
    #[inline]
    pub fn err_position(&self) -> usize {
        self.positions.err.load(Ordering::Acquire)
    }

    /// Whether the writer task has finished.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    async fn submit(&self, target: Target, payload: Bytes) -> Result<()> {
        let (ack, done) = oneshot::channel();
        self.tx
            .send(Command::Write {
                target,
                payload,
                ack,
            })
            .await
            .map_err(|_| ModularInputError::WriterClosed)?;
        done.await.map_err(|_| ModularInputError::WriterClosed)?
    }
}

/// Owner side of a running writer task.
///
/// Dropping it without calling [`finish`](WriterTask::finish) leaves the task
/// running until every [`EventWriter`] clone is gone.
pub struct WriterTask<O, E> {
    tx: mpsc::Sender<Command>,
    join: JoinHandle<(BoundedSink<O>, BoundedSink<E>)>,
}

impl<O, E> WriterTask<O, E> {
    /// End the run and hand back both sinks.
    ///
    /// With `close_stream`, `</stream>` is written if a stream was opened. A
    /// failure to write it is logged and otherwise ignored: an unterminated
    /// stream is still readable by the host.
    pub async fn finish(self, close_stream: bool) -> Result<(BoundedSink<O>, BoundedSink<E>)> {
        let (ack, done) = oneshot::channel();
        if self
            .tx
            .send(Command::Finish { close_stream, ack })
            .await
            .is_ok()
        {
            if let Ok(Err(e)) = done.await {
                tracing::warn!("Failed to close event stream: {}", e);
            }
        }
        drop(self.tx);

        self.join
            .await
            .map_err(|e| ModularInputError::Io(std::io::Error::other(e)))
    }
}

/// Spawn the writer task and return a handle for writing.
///
/// # Returns
///
/// The cloneable [`EventWriter`] handed to plugin code and the
/// [`WriterTask`] used to end the run.
pub fn spawn_event_writer<O, E>(out: O, err: E, config: WriterConfig) -> (EventWriter, WriterTask<O, E>)
where
    O: AsyncWrite + Unpin + Send + 'static,
    E: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(config.channel_capacity.max(1));
    let positions = Arc::new(Positions::default());

    let out = BoundedSink::new(SinkKind::Out, out, config.out_capacity);
    let err = BoundedSink::new(SinkKind::Err, err, config.err_capacity);
    let join = tokio::spawn(writer_loop(rx, out, err, positions.clone()));

    (
        EventWriter {
            tx: tx.clone(),
            positions,
        },
        WriterTask { tx, join },
    )
}

/// Spawn the writer task with default configuration.
pub fn spawn_event_writer_default<O, E>(out: O, err: E) -> (EventWriter, WriterTask<O, E>)
where
    O: AsyncWrite + Unpin + Send + 'static,
    E: AsyncWrite + Unpin + Send + 'static,
{
    spawn_event_writer(out, err, WriterConfig::default())
}

/// Main writer loop: one command at a time, strictly in arrival order.
async fn writer_loop<O, E>(
    mut rx: mpsc::Receiver<Command>,
    mut out: BoundedSink<O>,
    mut err: BoundedSink<E>,
    positions: Arc<Positions>,
) -> (BoundedSink<O>, BoundedSink<E>)
where
    O: AsyncWrite + Unpin,
    E: AsyncWrite + Unpin,
{
    let mut stream_open = false;

    while let Some(command) = rx.recv().await {
        match command {
            Command::Write {
                target,
                payload,
                ack,
            } => {
                let result = match target {
                    Target::Event if !stream_open => {
                        let mut framed = Vec::with_capacity(STREAM_OPEN.len() + payload.len());
                        framed.extend_from_slice(STREAM_OPEN);
                        framed.extend_from_slice(&payload);
                        let result = out.write(&framed).await;
                        stream_open = result.is_ok();
                        result
                    }
                    Target::Event | Target::Document => out.write(&payload).await,
                    Target::Log => err.write(&payload).await,
                };
                publish(&positions, &out, &err);
                // The caller may have given up waiting; nothing to report to.
                let _ = ack.send(result);
            }
            Command::Finish { close_stream, ack } => {
                let result = if close_stream && stream_open {
                    out.write(STREAM_CLOSE).await
                } else {
                    Ok(())
                };
                publish(&positions, &out, &err);
                let _ = ack.send(result);
                break;
            }
        }
    }

    tracing::debug!(
        out = out.bytes_written(),
        err = err.bytes_written(),
        "event writer finished"
    );
    (out, err)
}

fn publish<O, E>(positions: &Positions, out: &BoundedSink<O>, err: &BoundedSink<E>) {
    positions.out.store(out.bytes_written(), Ordering::Release);
    positions.err.store(err.bytes_written(), Ordering::Release);
}
