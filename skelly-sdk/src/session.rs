//! One connected period: handshake, two workers, dispatch loop.
//!
//! A session splits the transport into a read half owned by the read
//! worker and a write half owned by the write worker. The dispatch loop
//! runs on the caller's task and races inbound lines against the
//! watchdog. Whichever side detects a problem first records it on the
//! shared [`Termination`]; everybody else sees it and winds down.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;

use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::error::SessionEnd;
use crate::framer::{self, LineReader};
use crate::handler::Handler;
use crate::outbox::{self, Outbox, Queues, QUEUE_CAPACITY};
use crate::watchdog::Watchdog;

/// Observe-once termination signal shared by everything in a session.
///
/// The first reason recorded wins; later triggers are no-ops, so the
/// read-error path and the watchdog may both fire without harm.
#[derive(Clone, Debug)]
pub struct Termination {
    tx: Arc<watch::Sender<Option<SessionEnd>>>,
}

impl Default for Termination {
    fn default() -> Self {
        Self::new()
    }
}

impl Termination {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Record `reason` unless the session already ended. Returns whether
    /// this call was the one that ended it.
    pub fn trigger(&self, reason: SessionEnd) -> bool {
        self.tx.send_if_modified(|slot| {
            if slot.is_none() {
                *slot = Some(reason);
                true
            } else {
                false
            }
        })
    }

    pub fn reason(&self) -> Option<SessionEnd> {
        self.tx.borrow().clone()
    }

    pub fn is_ended(&self) -> bool {
        self.tx.borrow().is_some()
    }

    /// Resolves with the winning reason once the session has ended.
    pub async fn ended(&self) -> SessionEnd {
        let mut rx = self.tx.subscribe();
        loop {
            if let Some(reason) = rx.borrow_and_update().clone() {
                return reason;
            }
            if rx.changed().await.is_err() {
                // We hold the sender, so this cannot happen.
                return std::future::pending().await;
            }
        }
    }
}

/// A single connect cycle.
pub struct Session {
    config: Arc<Config>,
    handler: Arc<dyn Handler>,
    term: Termination,
    outbox: Outbox,
    queues: Queues,
}

impl Session {
    pub fn new(config: Arc<Config>, handler: Arc<dyn Handler>) -> Self {
        let (outbox, queues) = outbox::channel(QUEUE_CAPACITY);
        Self {
            config,
            handler,
            term: Termination::new(),
            outbox,
            queues,
        }
    }

    /// Handle for queueing commands on this session.
    pub fn outbox(&self) -> Outbox {
        self.outbox.clone()
    }

    pub fn termination(&self) -> Termination {
        self.term.clone()
    }

    /// Registration lines, in the order the server expects them.
    pub fn handshake(config: &Config) -> Vec<String> {
        let mut lines = Vec::with_capacity(3);
        if let Some(ref password) = config.password {
            lines.push(format!("PASS {password}"));
        }
        lines.push(format!("USER {} 0 * :{}", config.username, config.realname));
        lines.push(format!("NICK {}", config.nickname));
        lines
    }

    /// Drive the session over `stream` until it terminates. Both workers
    /// have exited and the transport is closed when this returns.
    pub async fn run<S>(self, stream: S) -> SessionEnd
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let Session { config, handler, term, outbox, queues } = self;
        let (read_half, write_half) = tokio::io::split(stream);
        let mut workers = JoinSet::new();

        workers.spawn(outbox::write_worker(
            write_half,
            queues,
            config.throttle.flood_delay,
            term.clone(),
        ));

        for line in Self::handshake(&config) {
            if outbox.send(line).await.is_err() {
                break;
            }
        }

        let (line_tx, mut line_rx) = mpsc::channel(QUEUE_CAPACITY);
        workers.spawn(framer::read_worker(LineReader::new(read_half), line_tx, term.clone()));

        let mut dispatcher = Dispatcher::new(config.clone(), handler, outbox, term.clone());
        let mut watchdog = Watchdog::new(config.throttle.idle_timeout);

        let end = loop {
            tokio::select! {
                biased;
                reason = term.ended() => break reason,
                line = line_rx.recv() => match line {
                    Some(line) => {
                        watchdog.reset();
                        // Reactions wait for queue space; a peer that stops
                        // reading must not keep the watchdog from firing.
                        tokio::select! {
                            biased;
                            reason = term.ended() => break reason,
                            _ = dispatcher.on_line(&line) => {}
                            reason = watchdog.expired() => {
                                term.trigger(reason);
                                break term.ended().await;
                            }
                        }
                    }
                    // The read worker only exits after recording a reason.
                    None => break term.ended().await,
                },
                reason = watchdog.expired() => {
                    term.trigger(reason);
                    break term.ended().await;
                }
            }
        };

        // Cancels the deferred JOIN if it has not fired yet.
        drop(dispatcher);
        while workers.join_next().await.is_some() {}

        tracing::debug!(reason = %end, "Session finished");
        end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn first_reason_wins() {
        let term = Termination::new();
        assert!(!term.is_ended());
        assert!(term.trigger(SessionEnd::Io("connection reset".into())));
        assert!(!term.trigger(SessionEnd::IdleTimeout(Duration::from_secs(300))));
        assert!(matches!(term.reason(), Some(SessionEnd::Io(_))));
    }

    #[tokio::test]
    async fn concurrent_triggers_do_not_fault() {
        let term = Termination::new();
        let a = {
            let term = term.clone();
            tokio::spawn(async move { term.trigger(SessionEnd::Io("read error".into())) })
        };
        let b = {
            let term = term.clone();
            tokio::spawn(async move { term.trigger(SessionEnd::IdleTimeout(Duration::from_secs(1))) })
        };
        let (a, b) = (a.await.unwrap(), b.await.unwrap());
        assert!(a ^ b, "exactly one trigger wins");
        assert!(term.is_ended());
    }

    #[tokio::test]
    async fn waiters_wake_on_trigger() {
        let term = Termination::new();
        let waiter = {
            let term = term.clone();
            tokio::spawn(async move { term.ended().await })
        };
        tokio::task::yield_now().await;
        term.trigger(SessionEnd::ServerError("bye".into()));
        assert!(matches!(waiter.await.unwrap(), SessionEnd::ServerError(_)));
        // Late subscribers see it immediately.
        assert!(matches!(term.ended().await, SessionEnd::ServerError(_)));
    }

    #[test]
    fn handshake_order() {
        let config = Config {
            password: Some("sekrit".into()),
            username: "bot".into(),
            realname: "A bot".into(),
            nickname: "skelly".into(),
            ..Default::default()
        };
        assert_eq!(
            Session::handshake(&config),
            vec!["PASS sekrit", "USER bot 0 * :A bot", "NICK skelly"]
        );

        let config = Config { password: None, ..config };
        assert_eq!(Session::handshake(&config)[0], "USER bot 0 * :A bot");
    }
}
