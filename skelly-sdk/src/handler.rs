//! Hooks the dispatcher calls for application-level events.

use crate::error::SessionEnd;
use crate::framer::InboundLine;
use crate::outbox::Outbox;

/// Bot behaviour plugged into the dispatcher.
///
/// Hooks run synchronously on the dispatch loop, which also services the
/// watchdog. Anything slow should be moved onto its own task, e.g.
/// `tokio::spawn` with a cloned [`Outbox`].
pub trait Handler: Send + Sync + 'static {
    /// A `PRIVMSG` addressed to the bot's current nickname.
    fn on_private_message(&self, outbox: &Outbox, nick: &str, identity: &str, message: &str);

    /// A `PRIVMSG` to the configured channel.
    fn on_channel_message(
        &self,
        outbox: &Outbox,
        nick: &str,
        identity: &str,
        channel: &str,
        message: &str,
    );

    /// Registration finished (`001`); `nick` is the confirmed nickname.
    fn on_registered(&self, _outbox: &Outbox, _nick: &str) {}

    /// Every inbound line, before it is parsed.
    fn on_raw_line(&self, _line: &InboundLine) {}

    /// The session ended; the supervisor reconnects after its backoff.
    fn on_session_end(&self, _reason: &SessionEnd) {}
}

/// Handler that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHandler;

impl Handler for NoopHandler {
    fn on_private_message(&self, _: &Outbox, _: &str, _: &str, _: &str) {}
    fn on_channel_message(&self, _: &Outbox, _: &str, _: &str, _: &str, _: &str) {}
}
