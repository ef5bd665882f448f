//! Command channel: many writers, one reader, one text line per message.
//!
//! Delivery is at-most-once. Every transport (the Unix socket listener in
//! [`crate::protocol`], or an in-process [`QueueWriter`]) funnels raw lines into
//! a single bounded [`CommandQueue`] owned by the rotation loop. A full queue
//! drops the message.

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::{TryRecvError, TrySendError};

use rotator_core::Command;

use crate::error::DaemonError;

pub const QUEUE_CAPACITY: usize = 64;

/// Caller side of the channel.
pub trait CommandSender {
    /// Hand one line to the transport. Success means "accepted", nothing more.
    fn send(&self, text: &str) -> Result<(), DaemonError>;
}

/// Create a connected writer/reader pair.
pub fn queue() -> (QueueWriter, CommandQueue) {
    let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
    (QueueWriter { tx }, CommandQueue { rx, closed: false })
}

/// In-process writer. Clones share the same queue.
#[derive(Debug, Clone)]
pub struct QueueWriter {
    tx: mpsc::Sender<String>,
}

impl QueueWriter {
    /// Enqueue one line without waiting.
    pub fn push_line(&self, line: &str) -> Result<(), DaemonError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(());
        }
        match self.tx.try_send(line.to_string()) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(dropped)) => {
                tracing::warn!(command = %dropped, "command queue full; dropping message");
                Err(DaemonError::QueueFull {
                    capacity: QUEUE_CAPACITY,
                })
            }
            Err(TrySendError::Closed(_)) => Err(DaemonError::ChannelUnavailable {
                endpoint: "in-process queue".to_string(),
            }),
        }
    }
}

impl CommandSender for QueueWriter {
    fn send(&self, text: &str) -> Result<(), DaemonError> {
        self.push_line(text)
    }
}

/// The daemon's single reader handle.
#[derive(Debug)]
pub struct CommandQueue {
    rx: mpsc::Receiver<String>,
    closed: bool,
}

impl CommandQueue {
    /// Next parseable command, without blocking. Unparseable lines are dropped.
    pub fn poll(&mut self) -> Option<Command> {
        while !self.closed {
            match self.rx.try_recv() {
                Ok(line) => {
                    if let Some(command) = parse_line(&line) {
                        return Some(command);
                    }
                }
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Disconnected) => self.closed = true,
            }
        }
        None
    }

    /// Wait for the next parseable command. Never resolves once every writer
    /// is gone, so it can sit in a `select!` next to timers.
    pub async fn next(&mut self) -> Command {
        while !self.closed {
            match self.rx.recv().await {
                Some(line) => {
                    if let Some(command) = parse_line(&line) {
                        return command;
                    }
                }
                None => self.closed = true,
            }
        }
        std::future::pending().await
    }
}

fn parse_line(line: &str) -> Option<Command> {
    let command = Command::parse(line);
    if command.is_none() {
        tracing::debug!(line = %line, "ignoring unrecognized command");
    }
    command
}
