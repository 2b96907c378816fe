//! skelly-sdk: the connection engine of an always-reconnecting IRC bot.
//!
//! The [`Supervisor`] dials through a [`Connector`], runs one [`Session`]
//! per connection and reconnects after a fixed backoff whenever the
//! session ends. Inside a session the transport is split between a read
//! worker and a write worker; the dispatch loop answers keep-alives,
//! finishes registration, joins the channel and hands messages to the
//! bot's [`Handler`].
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use skelly_sdk::{Config, NoopHandler, Supervisor, TcpConnector};
//!
//! # async fn example() {
//! let config = Arc::new(Config { server: "irc.example.org".into(), ..Default::default() });
//! Supervisor::new(config, TcpConnector, Arc::new(NoopHandler)).run().await;
//! # }
//! ```

pub mod config;
pub mod dispatch;
pub mod error;
pub mod framer;
pub mod handler;
pub mod message;
pub mod outbox;
pub mod session;
pub mod supervisor;
pub mod transport;
pub mod watchdog;

pub use config::{AddressFamily, Config, Throttle, TlsConfig};
pub use error::{ConfigError, ConnectError, MalformedLine, SendError, SessionEnd};
pub use handler::{Handler, NoopHandler};
pub use outbox::Outbox;
pub use session::{Session, Termination};
pub use supervisor::Supervisor;
pub use transport::{Connector, EstablishedConnection, TcpConnector};
