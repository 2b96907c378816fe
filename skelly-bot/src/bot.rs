//! The demo bot: logs what it hears and answers a couple of commands.
//!
//! Hooks run on the dispatch loop, so replies use `try_send` and never
//! wait on the outbound queue.

use skelly_sdk::{Handler, Outbox, SendError, SessionEnd};

/// Prefix for channel commands.
const COMMAND_PREFIX: char = '!';

#[derive(Debug, Default)]
pub struct SkellyBot;

/// Reply to a command, or `None` if the text is not one we know.
pub fn command_reply(nick: &str, text: &str) -> Option<String> {
    let rest = text.strip_prefix(COMMAND_PREFIX)?;
    let (command, args) = rest.split_once(' ').unwrap_or((rest, ""));
    match command {
        "ping" => Some(format!("{nick}: pong")),
        "echo" if !args.trim().is_empty() => Some(args.trim().to_string()),
        "help" => Some("commands: !ping, !echo <text>, !help".to_string()),
        _ => None,
    }
}

fn reply(outbox: &Outbox, target: &str, text: &str) {
    match outbox.try_send(format!("PRIVMSG {target} :{text}")) {
        Ok(()) => {}
        Err(SendError::QueueFull) => tracing::warn!(%target, "Outbound queue full, dropping reply"),
        Err(SendError::Closed) => tracing::debug!(%target, "Session gone, reply not sent"),
    }
}

impl Handler for SkellyBot {
    fn on_private_message(&self, outbox: &Outbox, nick: &str, identity: &str, message: &str) {
        tracing::info!(from = %identity, "Private message: {message}");
        if let Some(text) = command_reply(nick, message) {
            reply(outbox, nick, &text);
        }
    }

    fn on_channel_message(&self, outbox: &Outbox, nick: &str, identity: &str, channel: &str, message: &str) {
        tracing::info!(%channel, from = %identity, "<{nick}> {message}");
        if let Some(text) = command_reply(nick, message) {
            reply(outbox, channel, &text);
        }
    }

    fn on_registered(&self, _outbox: &Outbox, nick: &str) {
        tracing::info!(%nick, "Ready");
    }

    fn on_session_end(&self, reason: &SessionEnd) {
        tracing::info!(reason = reason.kind(), "Session over: {reason}");
    }
}
