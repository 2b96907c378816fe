//! skelly: an IRC bot that stays connected.
//!
//! Connects to one server, registers, joins one channel and keeps doing so
//! forever: dropped links, stalled servers and failed dials all end in a
//! fixed wait and a fresh connection.
//!
//!   skelly --server irc.libera.chat --channel '#skelly' --tls
//!   skelly --config /etc/skelly.toml --nick otherbot

mod bot;
mod config;

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use skelly_sdk::{Supervisor, TcpConnector};
use tracing_subscriber::EnvFilter;

use crate::bot::SkellyBot;
use crate::config::{Cli, FileConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // JSON logs for log shippers (SKELLY_LOG_JSON=1), human-readable otherwise
    let json_logs = std::env::var("SKELLY_LOG_JSON").unwrap_or_default() == "1";
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("skelly_bot=info,skelly_sdk=info"));
    if json_logs {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let cli = Cli::parse();
    let file = match cli.config {
        Some(ref path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };
    let config = Arc::new(config::resolve(&cli, &file)?);

    tracing::info!(
        server = %config.server_addr(),
        channel = %config.channel,
        nick = %config.nickname,
        tls = config.tls.enabled,
        family = %config.family,
        "Starting skelly"
    );

    let supervisor = Supervisor::new(config, TcpConnector, Arc::new(SkellyBot));
    tokio::select! {
        _ = supervisor.run() => {}
        _ = tokio::signal::ctrl_c() => tracing::info!("Interrupted, shutting down"),
    }
    Ok(())
}
