//! The reconnect loop.
//!
//! `Idle → Connecting → Connected → Closing → Idle`, forever. A failed
//! connect and an ended session are both followed by the same fixed
//! backoff; there is no retry cap and no backoff growth.

use std::sync::Arc;

use crate::config::Config;
use crate::error::{ConnectError, SessionEnd};
use crate::handler::Handler;
use crate::session::Session;
use crate::transport::Connector;

/// Where the supervisor is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    Connecting,
    Connected,
    Closing,
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            State::Idle => "idle",
            State::Connecting => "connecting",
            State::Connected => "connected",
            State::Closing => "closing",
        };
        f.write_str(name)
    }
}

/// Outcome of one connect cycle.
#[derive(Debug)]
pub enum Cycle {
    ConnectFailed(ConnectError),
    Ended(SessionEnd),
}

pub struct Supervisor<C> {
    config: Arc<Config>,
    connector: C,
    handler: Arc<dyn Handler>,
}

impl<C: Connector> Supervisor<C> {
    pub fn new(config: Arc<Config>, connector: C, handler: Arc<dyn Handler>) -> Self {
        Self { config, connector, handler }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Connect, run, wait, repeat. Never returns.
    pub async fn run(&self) {
        let backoff = self.config.throttle.reconnect;
        let mut attempt: u64 = 0;
        loop {
            attempt += 1;
            match self.run_once(attempt).await {
                Cycle::ConnectFailed(e) => {
                    tracing::warn!(
                        attempt,
                        reason = "connect",
                        error = %e,
                        delay_secs = backoff.as_secs(),
                        "Failed to connect, retrying"
                    );
                }
                Cycle::Ended(end) => {
                    self.handler.on_session_end(&end);
                    tracing::warn!(
                        attempt,
                        reason = end.kind(),
                        error = %end,
                        delay_secs = backoff.as_secs(),
                        "Disconnected, will reconnect"
                    );
                }
            }
            self.transition(State::Idle);
            tokio::time::sleep(backoff).await;
        }
    }

    /// A single `Connecting → Connected → Closing` pass, without the
    /// backoff wait.
    pub async fn run_once(&self, attempt: u64) -> Cycle {
        self.transition(State::Connecting);
        let server = self.config.server_addr();
        let stream = match self.connector.connect(&self.config).await {
            Ok(stream) => stream,
            Err(e) => return Cycle::ConnectFailed(e),
        };

        self.transition(State::Connected);
        tracing::info!(%server, attempt, "Connected");
        let session = Session::new(self.config.clone(), self.handler.clone());
        let end = session.run(stream).await;

        self.transition(State::Closing);
        Cycle::Ended(end)
    }

    fn transition(&self, state: State) {
        tracing::debug!(%state, "Supervisor state");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::io::DuplexStream;

    /// Fails every attempt with a dial error.
    struct Refusing {
        attempts: Arc<AtomicUsize>,
    }

    impl Connector for Refusing {
        type Stream = DuplexStream;

        async fn connect(&self, config: &Config) -> Result<DuplexStream, ConnectError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(ConnectError::Dial {
                addr: config.server_addr(),
                source: std::io::Error::from(std::io::ErrorKind::ConnectionRefused),
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn keeps_retrying_with_fixed_backoff() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let config = Arc::new(Config::default());
        let supervisor = Supervisor::new(
            config,
            Refusing { attempts: attempts.clone() },
            Arc::new(crate::NoopHandler),
        );
        let start = tokio::time::Instant::now();
        let run = tokio::spawn(async move { supervisor.run().await });

        // Attempts land at t = 0, 15, 30, ...
        tokio::time::sleep(Duration::from_secs(15 * 10 + 1)).await;
        assert_eq!(attempts.load(Ordering::SeqCst), 11);
        assert!(!run.is_finished());
        assert!(start.elapsed() >= Duration::from_secs(150));
        run.abort();
    }

    #[tokio::test]
    async fn run_once_reports_connect_failure() {
        let supervisor = Supervisor::new(
            Arc::new(Config::default()),
            Refusing { attempts: Arc::new(AtomicUsize::new(0)) },
            Arc::new(crate::NoopHandler),
        );
        assert!(matches!(supervisor.run_once(1).await, Cycle::ConnectFailed(ConnectError::Dial { .. })));
    }

    #[test]
    fn state_names() {
        assert_eq!(State::Connecting.to_string(), "connecting");
        assert_eq!(State::Idle.to_string(), "idle");
    }
}
