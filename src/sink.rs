//! Append-only event log
//!
//! Handlers queue events on a channel and a single writer task appends them
//! to the log file as JSON lines, so concurrent handlers never contend on
//! the file itself.

use std::path::PathBuf;
use tokio::fs::OpenOptions;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::events::Event;

const FLUSH_INTERVAL_MS: u64 = 250;

/// Sender handle for queueing events, cheap to clone into every handler
#[derive(Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<Event>,
}

impl EventSink {
    /// Queue an event for the writer task. A failed send means the writer
    /// task is gone; the event is dropped and the loss logged.
    pub fn emit(&self, event: impl Into<Event>) {
        let event = event.into();
        if self.tx.send(event).is_err() {
            error!("Event sink is closed, event dropped");
        }
    }
}

/// Start the writer task and return the sender handle
pub fn start(path: PathBuf) -> EventSink {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(writer_task(path, rx));
    EventSink { tx }
}

async fn writer_task(path: PathBuf, mut rx: mpsc::UnboundedReceiver<Event>) {
    let file = match OpenOptions::new().append(true).create(true).open(&path).await {
        Ok(f) => f,
        Err(e) => {
            error!("Cannot open event log {}: {}", path.display(), e);
            return;
        }
    };
    let mut out = BufWriter::new(file);
    let mut flush_interval =
        tokio::time::interval(tokio::time::Duration::from_millis(FLUSH_INTERVAL_MS));

    info!("Event log started at {}", path.display());

    loop {
        tokio::select! {
            event = rx.recv() => {
                match event {
                    Some(e) => {
                        if let Err(err) = write_line(&mut out, &e).await {
                            error!("Failed to write event: {}", err);
                        }
                    }
                    None => {
                        let _ = out.flush().await;
                        info!("Event log shutting down");
                        break;
                    }
                }
            }
            _ = flush_interval.tick() => {
                if let Err(err) = out.flush().await {
                    error!("Failed to flush event log: {}", err);
                }
            }
        }
    }
}

async fn write_line(
    out: &mut BufWriter<tokio::fs::File>,
    event: &Event,
) -> std::io::Result<()> {
    let line = match serde_json::to_string(event) {
        Ok(l) => l,
        Err(e) => {
            debug!("Unserializable event: {}", e);
            return Ok(());
        }
    };
    out.write_all(line.as_bytes()).await?;
    out.write_all(b"\n").await?;
    Ok(())
}
