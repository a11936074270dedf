// src/core/stream.rs

//! Line streams: the capacity-one conduits between pipeline stages.
//!
//! Every blocking operation here also watches the pipeline's cancellation scope
//! and gives up as soon as it fires, so no producer can stay parked on a full
//! stream after an interrupt.

use thiserror::Error;
use tokio::sync::mpsc;

use crate::CancellationToken;
use crate::constants::STREAM_CAPACITY;

/// Producing end of a stream.
pub type LineSender = mpsc::Sender<String>;
/// Consuming end of a stream.
pub type LineReceiver = mpsc::Receiver<String>;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamError {
    #[error("pipeline was cancelled")]
    Cancelled,
    #[error("the consuming stage has closed its input")]
    Closed,
}

/// Creates a new stream with one line of capacity.
pub fn channel() -> (LineSender, LineReceiver) {
    mpsc::channel(STREAM_CAPACITY)
}

/// Sends a line, waiting for the consumer to make room.
pub async fn send_line(
    tx: &LineSender,
    line: String,
    token: &CancellationToken,
) -> Result<(), StreamError> {
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(StreamError::Cancelled),
        sent = tx.send(line) => sent.map_err(|_| StreamError::Closed),
    }
}

/// Receives the next line. `None` means the stream is closed or the scope was cancelled.
pub async fn recv_line(rx: &mut LineReceiver, token: &CancellationToken) -> Option<String> {
    tokio::select! {
        biased;
        _ = token.cancelled() => None,
        line = rx.recv() => line,
    }
}

/// Closes the stream and throws away whatever is still buffered in it.
///
/// Once closed, further sends fail immediately, so the upstream producer stops
/// instead of waiting on a consumer that is gone. Returns the number of lines dropped.
pub fn discard_pending(mut rx: LineReceiver) -> usize {
    rx.close();
    let mut dropped = 0;
    while rx.try_recv().is_ok() {
        dropped += 1;
    }
    if dropped > 0 {
        log::trace!("Discarded {} unread line(s)", dropped);
    }
    dropped
}
