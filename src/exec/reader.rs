// src/exec/reader.rs

//! Line reader over one output channel of the child.
//!
//! Each reader is its own task. Every loop iteration awaits exactly one line
//! and hands it to the observer before asking for the next one, so lines of
//! one channel are delivered in arrival order. Cancellation goes through a
//! oneshot owned by the [`StreamReader`] handle and always wins over a line
//! that is ready at the same time.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::sink::LogSink;
use crate::types::StreamSource;

/// Upper bound on one delivered line; a child that never writes a newline
/// cannot grow the read buffer past this.
pub const MAX_LINE_BYTES: usize = 64 * 1024;

/// Receives what a reader produces.
///
/// Calls for one channel are strictly sequential. After `on_eof` or
/// `on_error`, or once cancellation has been acknowledged, the observer hears
/// nothing more from that reader.
pub trait StreamObserver: Send + Sync + 'static {
    fn on_line(&self, source: StreamSource, line: String);

    fn on_eof(&self, source: StreamSource) {
        let _ = source;
    }

    /// A genuine read error. Never called for cancellation.
    fn on_error(&self, source: StreamSource, error: &io::Error) {
        let _ = (source, error);
    }
}

/// How a reader task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// End of stream.
    Closed,
    Cancelled,
    Errored,
}

/// Handle to a running reader task.
///
/// Dropping the handle cancels the reader.
#[derive(Debug)]
pub struct StreamReader {
    source: StreamSource,
    cancel: Option<oneshot::Sender<()>>,
    handle: JoinHandle<ReadOutcome>,
}

impl StreamReader {
    /// Start draining `stream` into `observer`.
    pub fn attach<R>(stream: R, source: StreamSource, observer: Arc<dyn StreamObserver>) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        let (cancel_tx, cancel_rx) = oneshot::channel();
        let handle = tokio::spawn(read_loop(stream, source, observer, cancel_rx));
        debug!(%source, "stream reader attached");
        Self {
            source,
            cancel: Some(cancel_tx),
            handle,
        }
    }

    pub fn source(&self) -> StreamSource {
        self.source
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Stop the reader and wait for its task to end.
    ///
    /// Once this returns the observer receives no further calls. A reader
    /// that already hit EOF or an error reports that outcome instead.
    pub async fn cancel(mut self) -> ReadOutcome {
        if let Some(tx) = self.cancel.take() {
            // The task may already be gone.
            let _ = tx.send(());
        }
        join(self.source, &mut self.handle).await
    }

    /// Let the reader run to EOF for at most `grace`, then cancel it.
    ///
    /// Used after the child exited, so output it wrote just before exiting
    /// still reaches the observer.
    pub async fn finish(mut self, grace: Duration) -> ReadOutcome {
        match tokio::time::timeout(grace, &mut self.handle).await {
            Ok(result) => outcome_of(self.source, result),
            Err(_) => {
                debug!(source = %self.source, "stream still open after exit; cancelling");
                self.cancel().await
            }
        }
    }
}

async fn join(source: StreamSource, handle: &mut JoinHandle<ReadOutcome>) -> ReadOutcome {
    outcome_of(source, handle.await)
}

fn outcome_of(
    source: StreamSource,
    result: Result<ReadOutcome, tokio::task::JoinError>,
) -> ReadOutcome {
    result.unwrap_or_else(|err| {
        warn!(%source, error = %err, "stream reader task failed");
        ReadOutcome::Errored
    })
}

async fn read_loop<R>(
    stream: R,
    source: StreamSource,
    observer: Arc<dyn StreamObserver>,
    mut cancel_rx: oneshot::Receiver<()>,
) -> ReadOutcome
where
    R: AsyncRead + Send + Unpin + 'static,
{
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::with_capacity(256);

    loop {
        buf.clear();
        // Longer lines are delivered in MAX_LINE_BYTES pieces.
        let mut limited = (&mut reader).take(MAX_LINE_BYTES as u64);
        tokio::select! {
            biased;

            // Explicit cancel or dropped handle.
            _ = &mut cancel_rx => {
                debug!(%source, "stream reader cancelled");
                return ReadOutcome::Cancelled;
            }

            res = limited.read_until(b'\n', &mut buf) => match res {
                Ok(0) => {
                    debug!(%source, "end of stream");
                    observer.on_eof(source);
                    return ReadOutcome::Closed;
                }
                Ok(_) => {
                    let line = decode_line(&buf);
                    trace!(%source, %line, "read line");
                    observer.on_line(source, line);
                }
                Err(err) => {
                    warn!(%source, error = %err, "error reading from pipe");
                    observer.on_error(source, &err);
                    return ReadOutcome::Errored;
                }
            },
        }
    }
}

/// Strip the line terminator and decode, replacing invalid UTF-8.
fn decode_line(buf: &[u8]) -> String {
    let mut bytes = buf;
    if let Some(rest) = bytes.strip_suffix(b"\n") {
        bytes = rest;
        if let Some(rest) = bytes.strip_suffix(b"\r") {
            bytes = rest;
        }
    }
    String::from_utf8_lossy(bytes).into_owned()
}

impl StreamObserver for LogSink {
    fn on_line(&self, source: StreamSource, line: String) {
        self.append(line, source);
    }

    fn on_eof(&self, source: StreamSource) {
        debug!(%source, "backend closed its output stream");
    }

    fn on_error(&self, source: StreamSource, error: &io::Error) {
        // Pipe failures stay out of the captured log.
        warn!(%source, %error, "stopped capturing backend output");
    }
}
