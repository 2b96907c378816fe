//! Error taxonomy for the connection lifecycle.
//!
//! Only [`SessionEnd`] crosses from the session workers back to the
//! supervisor. [`ConnectError`] is retried by the supervisor,
//! [`MalformedLine`] is logged and dropped by the dispatcher, and
//! [`SendError`] is handed back to whoever tried to queue a command.

use std::time::Duration;

/// Failure to establish the transport.
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    #[error("failed to resolve {addr}: {source}")]
    Resolve {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{addr} has no {family} address")]
    NoAddress { addr: String, family: crate::config::AddressFamily },

    #[error("local address {addr} unusable: {reason}")]
    LocalAddress { addr: String, reason: String },

    #[error("TCP connect to {addr} failed: {source}")]
    Dial {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("connect to {addr} timed out after {}s", .after.as_secs())]
    Timeout { addr: String, after: Duration },

    #[error("invalid TLS server name '{0}'")]
    ServerName(String),

    #[error("client certificate {path}: {reason}")]
    Certificate { path: String, reason: String },

    #[error("TLS handshake with {addr} failed: {source}")]
    Tls {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// Why a live session stopped. Every variant is followed by a reconnect.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SessionEnd {
    /// Read or write failure on the transport, including EOF.
    #[error("I/O error: {0}")]
    Io(String),

    /// The watchdog saw no inbound line for the configured duration.
    #[error("idle timeout: no data received for {}s", .0.as_secs())]
    IdleTimeout(Duration),

    /// The server sent `ERROR` (e.g. `Closing Link`).
    #[error("server error: {0}")]
    ServerError(String),
}

impl SessionEnd {
    /// Short tag for structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            SessionEnd::Io(_) => "io",
            SessionEnd::IdleTimeout(_) => "idle_timeout",
            SessionEnd::ServerError(_) => "server_error",
        }
    }
}

impl From<std::io::Error> for SessionEnd {
    fn from(e: std::io::Error) -> Self {
        SessionEnd::Io(e.to_string())
    }
}

/// An inbound line the dispatcher could not use.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MalformedLine {
    #[error("empty line")]
    Empty,
    #[error("prefix without a command")]
    MissingCommand,
    #[error("{0} without a sender prefix")]
    MissingPrefix(String),
    #[error("{command} with {fields} fields, need at least {needed}")]
    TooFewFields {
        command: String,
        fields: usize,
        needed: usize,
    },
}

/// Failure to queue an outbound command.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    /// The bounded queue is at capacity (only from `try_send`).
    #[error("outbound queue is full")]
    QueueFull,
    /// The session that owned the queue has ended.
    #[error("session closed")]
    Closed,
}

/// A [`Config`](crate::Config) the connection cannot work with.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("server is required")]
    MissingServer,
    #[error("channel is required")]
    MissingChannel,
    #[error("port must be between 1 and 65535")]
    Port,
    #[error("invalid nickname '{0}'")]
    Nickname(String),
}
