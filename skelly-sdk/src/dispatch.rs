//! Routing of inbound lines to protocol reactions and handler hooks.
//!
//! [`route`] is the pure half: it maps a parsed line (plus the bot's
//! current nickname and channel) to a [`Route`]. [`Dispatcher`] is the
//! stateful half that carries the route out against the session's outbox.

use std::sync::Arc;

use rand::Rng;
use tokio::task::JoinSet;

use crate::config::Config;
use crate::error::{MalformedLine, SessionEnd};
use crate::framer::InboundLine;
use crate::handler::Handler;
use crate::message::ParsedEvent;
use crate::outbox::Outbox;
use crate::session::Termination;

/// What the dispatcher should do with one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Answer a keep-alive; holds the complete reply.
    Pong(String),
    /// `001`: registration complete under `nick`.
    Registered { nick: String },
    /// `433`: the requested nickname is taken.
    NickInUse,
    /// `ERROR` from the server; the link is going away.
    ServerError(String),
    PrivateMessage {
        nick: String,
        identity: String,
        message: String,
    },
    ChannelMessage {
        nick: String,
        identity: String,
        channel: String,
        message: String,
    },
    /// `KICK`: deliberately not acted on.
    Kicked,
    Ignore,
}

/// Minimum fields on a PRIVMSG line: prefix, command, target, text.
const PRIVMSG_MIN_FIELDS: usize = 4;

/// Decide how to react to `event`.
pub fn route(event: &ParsedEvent, current_nick: &str, channel: &str) -> Result<Route, MalformedLine> {
    match event.command.as_str() {
        "PING" => {
            let token = event.arg(0).ok_or_else(|| MalformedLine::TooFewFields {
                command: "PING".to_string(),
                fields: event.field_count(),
                needed: 2,
            })?;
            // Answer in the same form the server asked.
            if event.params.is_empty() {
                Ok(Route::Pong(format!("PONG :{token}")))
            } else {
                Ok(Route::Pong(format!("PONG {token}")))
            }
        }
        "001" => Ok(Route::Registered {
            nick: event.arg(0).unwrap_or(current_nick).to_string(),
        }),
        "433" => Ok(Route::NickInUse),
        "ERROR" => Ok(Route::ServerError(event.text_from(0).unwrap_or_default())),
        "KICK" => Ok(Route::Kicked),
        "PRIVMSG" => {
            let fields = event.field_count();
            if fields < PRIVMSG_MIN_FIELDS {
                return Err(MalformedLine::TooFewFields {
                    command: "PRIVMSG".to_string(),
                    fields,
                    needed: PRIVMSG_MIN_FIELDS,
                });
            }
            let prefix = event
                .prefix
                .as_ref()
                .ok_or_else(|| MalformedLine::MissingPrefix("PRIVMSG".to_string()))?;
            let target = event.arg(0).unwrap_or_default();
            let message = event.text_from(1).unwrap_or_default();

            if target.eq_ignore_ascii_case(current_nick) {
                Ok(Route::PrivateMessage {
                    nick: prefix.nick.clone(),
                    identity: prefix.identity.clone(),
                    message,
                })
            } else if target.eq_ignore_ascii_case(channel) {
                Ok(Route::ChannelMessage {
                    nick: prefix.nick.clone(),
                    identity: prefix.identity.clone(),
                    channel: channel.to_string(),
                    message,
                })
            } else {
                Ok(Route::Ignore)
            }
        }
        _ => Ok(Route::Ignore),
    }
}

/// Random fallback nickname, `a` followed by four digits.
pub fn fallback_nick() -> String {
    format!("a{}", rand::thread_rng().gen_range(1000..=9999))
}

/// Per-session dispatch state.
pub struct Dispatcher {
    config: Arc<Config>,
    handler: Arc<dyn Handler>,
    outbox: Outbox,
    term: Termination,
    nick: String,
    registered: bool,
    deferred: JoinSet<()>,
}

impl Dispatcher {
    pub fn new(config: Arc<Config>, handler: Arc<dyn Handler>, outbox: Outbox, term: Termination) -> Self {
        let nick = config.nickname.clone();
        Self {
            config,
            handler,
            outbox,
            term,
            nick,
            registered: false,
            deferred: JoinSet::new(),
        }
    }

    /// Nickname the server currently knows us by.
    pub fn nick(&self) -> &str {
        &self.nick
    }

    pub fn is_registered(&self) -> bool {
        self.registered
    }

    /// Parse, route and react to one inbound line.
    pub async fn on_line(&mut self, line: &InboundLine) {
        self.handler.on_raw_line(line);

        let routed = ParsedEvent::parse(&line.text)
            .and_then(|event| route(&event, &self.nick, &self.config.channel));
        match routed {
            Ok(route) => self.react(route).await,
            Err(e) => tracing::trace!(seq = line.seq, error = %e, "Ignoring line"),
        }
    }

    async fn react(&mut self, route: Route) {
        match route {
            Route::Pong(reply) => {
                if self.outbox.send_priority(reply).await.is_err() {
                    tracing::debug!("Session closed before PONG could be queued");
                }
            }
            Route::Registered { nick } => {
                if self.registered {
                    return;
                }
                self.registered = true;
                self.nick = nick;
                tracing::info!(nick = %self.nick, "Registered");
                self.identify().await;
                self.handler.on_registered(&self.outbox, &self.nick);
                self.schedule_join();
            }
            Route::NickInUse => {
                if self.registered {
                    return;
                }
                let alt = fallback_nick();
                tracing::warn!(taken = %self.nick, trying = %alt, "Nickname in use");
                self.nick = alt;
                let _ = self.outbox.nick(&self.nick).await;
            }
            Route::ServerError(text) => {
                tracing::warn!(%text, "Server closed the link");
                self.term.trigger(SessionEnd::ServerError(text));
            }
            Route::PrivateMessage { nick, identity, message } => {
                self.handler.on_private_message(&self.outbox, &nick, &identity, &message);
            }
            Route::ChannelMessage { nick, identity, channel, message } => {
                self.handler
                    .on_channel_message(&self.outbox, &nick, &identity, &channel, &message);
            }
            Route::Kicked | Route::Ignore => {}
        }
    }

    /// Post-registration identity setup: user modes, NickServ, OPER.
    async fn identify(&self) {
        let config = &self.config;
        if let Some(modes) = config.modes.as_deref().filter(|m| !m.is_empty()) {
            let modes = modes.trim_start_matches('+');
            let _ = self.outbox.mode(&self.nick, &format!("+{modes}")).await;
        }
        if let Some(ref password) = config.nickserv_password {
            let _ = self
                .outbox
                .privmsg("NickServ", &format!("IDENTIFY {} {password}", config.nickname))
                .await;
        }
        if let Some(ref password) = config.oper_password {
            let _ = self.outbox.send(format!("OPER {} {password}", config.username)).await;
        }
    }

    /// Queue the channel JOIN after the handshake grace period, without
    /// holding up the dispatch loop. Dropped with the dispatcher.
    fn schedule_join(&mut self) {
        let outbox = self.outbox.clone();
        let term = self.term.clone();
        let delay = self.config.throttle.join_delay;
        let join = self.config.join_command();
        let channel = self.config.channel.clone();
        self.deferred.spawn(async move {
            tokio::select! {
                _ = term.ended() => {}
                _ = tokio::time::sleep(delay) => {
                    match outbox.send(join).await {
                        Ok(()) => tracing::info!(%channel, "Joining channel"),
                        Err(e) => tracing::debug!(error = %e, "JOIN not queued"),
                    }
                }
            }
        });
    }
}
