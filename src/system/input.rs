// src/system/input.rs

//! The raw input reader.
//!
//! A dedicated task reads the input source line by line and hands each line to
//! the REPL as an [`InputEvent`]. Keeping the read in its own task lets the REPL
//! race "a line is available" against an interrupt, and lets a running pipeline
//! consume further lines as data for its first stage.

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::constants::{END_MARKER_TEXT, END_OF_TRANSMISSION};
use crate::models::InputEvent;

/// Live input shared by the REPL and the first stage of each pipeline.
#[derive(Debug)]
pub struct LiveInput {
    events: mpsc::Receiver<InputEvent>,
    reader: JoinHandle<()>,
}

impl LiveInput {
    /// Starts reading lines from the process's standard input.
    pub fn stdin() -> Self {
        Self::spawn(tokio::io::stdin())
    }

    /// Starts reading lines from any byte source.
    pub fn spawn<R>(source: R) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let (tx, events) = mpsc::channel(crate::constants::STREAM_CAPACITY);
        let reader = tokio::spawn(read_lines(source, tx));
        Self { events, reader }
    }

    /// Waits for the next event. Cancel-safe: no event is lost if the future is dropped.
    pub async fn next_event(&mut self) -> InputEvent {
        self.events.recv().await.unwrap_or(InputEvent::EndOfStream)
    }
}

impl Drop for LiveInput {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

async fn read_lines<R>(source: R, tx: mpsc::Sender<InputEvent>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(source);
    let mut buffer = Vec::new();

    loop {
        buffer.clear();
        let event = match reader.read_until(b'\n', &mut buffer).await {
            Ok(0) => InputEvent::EndOfStream,
            Ok(_) => InputEvent::Line(trim_line_ending(&buffer)),
            Err(e) => InputEvent::ReadError(e),
        };

        let last = !matches!(event, InputEvent::Line(_));
        if tx.send(event).await.is_err() || last {
            break;
        }
    }
    log::debug!("Input reader finished");
}

fn trim_line_ending(raw: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw);
    text.trim_end_matches('\n').trim_end_matches('\r').to_string()
}

/// True for the terminal end markers: a line starting with `Ctrl+D` (U+0004),
/// or the printable `^D`.
pub fn is_end_marker(line: &str) -> bool {
    line.starts_with(END_OF_TRANSMISSION) || line == END_MARKER_TEXT
}
