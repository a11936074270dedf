// src/core/bridge.rs

//! Byte-stream view of a line stream.
//!
//! A child process reads its stdin as bytes, while stages exchange whole lines.
//! [`LineReader`] sits in between: it keeps at most one unread line, refills it
//! from the stream only when it runs dry, and reports end-of-input once the
//! stream is closed and nothing is pending.
//!
//! ```text
//!   LineReceiver ──▶ [one pending line + '\n'] ──▶ AsyncRead ──▶ child stdin
//! ```

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, ReadBuf};

use crate::core::stream::LineReceiver;

/// Adapts a [`LineReceiver`] into an [`AsyncRead`]. Each line is terminated with `\n`.
#[derive(Debug)]
pub struct LineReader {
    source: LineReceiver,
    pending: Vec<u8>,
    offset: usize,
}

impl LineReader {
    pub fn new(source: LineReceiver) -> Self {
        Self {
            source,
            pending: Vec::new(),
            offset: 0,
        }
    }

    /// True while part of a line is still waiting to be read.
    pub fn has_pending(&self) -> bool {
        self.offset < self.pending.len()
    }

    /// Gives the stream back, dropping any partially read line.
    pub fn into_inner(self) -> LineReceiver {
        if self.has_pending() {
            log::trace!(
                "Dropping {} unread byte(s) of a partially consumed line",
                self.pending.len() - self.offset
            );
        }
        self.source
    }
}

impl AsyncRead for LineReader {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();

        if !this.has_pending() {
            match this.source.poll_recv(cx) {
                Poll::Pending => return Poll::Pending,
                // Closed with nothing pending: leave `buf` untouched to signal EOF.
                Poll::Ready(None) => return Poll::Ready(Ok(())),
                Poll::Ready(Some(line)) => {
                    this.pending.clear();
                    this.pending.extend_from_slice(line.as_bytes());
                    this.pending.push(b'\n');
                    this.offset = 0;
                }
            }
        }

        let remaining = this.pending.get(this.offset..).unwrap_or_default();
        let count = remaining.len().min(buf.remaining());
        if let Some(chunk) = remaining.get(..count) {
            buf.put_slice(chunk);
            this.offset += count;
        }
        Poll::Ready(Ok(()))
    }
}
