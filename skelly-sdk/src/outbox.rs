//! Outbound command queue and the write worker that drains it.
//!
//! Producers (handshake, dispatcher reactions, handler hooks) hold a
//! cloneable [`Outbox`]. Ordinary commands go through a bounded queue of
//! [`QUEUE_CAPACITY`]; when it is full, [`Outbox::send`] waits and
//! [`Outbox::try_send`] fails with [`SendError::QueueFull`]. Nothing is
//! dropped silently.
//!
//! Keep-alive replies use a separate priority lane that the write worker
//! always drains first and that is exempt from the flood delay.

use std::time::Duration;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::Instant;

use crate::error::SendError;
use crate::framer;
use crate::session::Termination;

/// Capacity of the ordinary command queue.
pub const QUEUE_CAPACITY: usize = 100;
const PRIORITY_CAPACITY: usize = 16;
/// How long the write worker waits for a clean shutdown of the transport.
const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// Handle for queueing commands on the live session.
#[derive(Clone, Debug)]
pub struct Outbox {
    ordinary: mpsc::Sender<String>,
    priority: mpsc::Sender<String>,
}

/// Receiving side, owned by the write worker.
pub(crate) struct Queues {
    ordinary: mpsc::Receiver<String>,
    priority: mpsc::Receiver<String>,
}

pub(crate) fn channel(capacity: usize) -> (Outbox, Queues) {
    let (ordinary_tx, ordinary_rx) = mpsc::channel(capacity);
    let (priority_tx, priority_rx) = mpsc::channel(PRIORITY_CAPACITY);
    (
        Outbox { ordinary: ordinary_tx, priority: priority_tx },
        Queues { ordinary: ordinary_rx, priority: priority_rx },
    )
}

impl Outbox {
    /// Queue a raw command, waiting for space if the queue is full.
    pub async fn send(&self, command: impl Into<String>) -> Result<(), SendError> {
        self.ordinary.send(command.into()).await.map_err(|_| SendError::Closed)
    }

    /// Queue a raw command without waiting. For use from synchronous hooks.
    pub fn try_send(&self, command: impl Into<String>) -> Result<(), SendError> {
        self.ordinary.try_send(command.into()).map_err(|e| match e {
            TrySendError::Full(_) => SendError::QueueFull,
            TrySendError::Closed(_) => SendError::Closed,
        })
    }

    /// Queue a command ahead of everything on the ordinary queue.
    pub async fn send_priority(&self, command: impl Into<String>) -> Result<(), SendError> {
        self.priority.send(command.into()).await.map_err(|_| SendError::Closed)
    }

    pub async fn privmsg(&self, target: &str, text: &str) -> Result<(), SendError> {
        self.send(format!("PRIVMSG {target} :{text}")).await
    }

    pub async fn notice(&self, target: &str, text: &str) -> Result<(), SendError> {
        self.send(format!("NOTICE {target} :{text}")).await
    }

    /// `JOIN <channel>`, with the key only when one is given.
    pub async fn join(&self, channel: &str, key: Option<&str>) -> Result<(), SendError> {
        match key.filter(|k| !k.is_empty()) {
            Some(key) => self.send(format!("JOIN {channel} {key}")).await,
            None => self.send(format!("JOIN {channel}")).await,
        }
    }

    pub async fn mode(&self, target: &str, modes: &str) -> Result<(), SendError> {
        self.send(format!("MODE {target} {modes}")).await
    }

    pub async fn nick(&self, nick: &str) -> Result<(), SendError> {
        self.send(format!("NICK {nick}")).await
    }

    /// True once the write worker has gone away.
    pub fn is_closed(&self) -> bool {
        self.ordinary.is_closed()
    }
}

/// Write worker: serializes queued commands onto the transport until the
/// session terminates or a write fails.
pub(crate) async fn write_worker<W>(
    mut writer: W,
    mut queues: Queues,
    flood_delay: Duration,
    term: Termination,
) where
    W: AsyncWrite + Unpin,
{
    let mut next_ordinary = Instant::now();
    loop {
        let ready_at = next_ordinary;
        let command = tokio::select! {
            biased;
            _ = term.ended() => break,
            Some(command) = queues.priority.recv() => command,
            command = async {
                tokio::time::sleep_until(ready_at).await;
                queues.ordinary.recv().await
            } => match command {
                Some(command) => {
                    next_ordinary = Instant::now() + flood_delay;
                    command
                }
                None => break,
            },
        };

        let written = tokio::select! {
            _ = term.ended() => break,
            written = framer::write_line(&mut writer, &command) => written,
        };
        match written {
            Ok(()) => tracing::trace!(">> {command}"),
            Err(e) => {
                tracing::warn!(error = %e, "Error writing to server");
                term.trigger(e.into());
                break;
            }
        }
    }

    // Both the read-error path and the watchdog can end up here; a second
    // shutdown on a dead stream just errors and is ignored.
    let _ = tokio::time::timeout(CLOSE_GRACE, writer.shutdown()).await;
}
