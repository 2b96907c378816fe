//! Shared fixtures: a scripted server on the far end of a duplex pipe and
//! a handler that records what the dispatcher hands it.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use skelly_sdk::{Config, Handler, Outbox, Session, SessionEnd};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines, ReadHalf, WriteHalf};
use tokio::task::JoinHandle;

pub struct FakeServer {
    lines: Lines<BufReader<ReadHalf<DuplexStream>>>,
    writer: WriteHalf<DuplexStream>,
}

impl FakeServer {
    pub fn new(stream: DuplexStream) -> Self {
        let (reader, writer) = tokio::io::split(stream);
        Self { lines: BufReader::new(reader).lines(), writer }
    }

    /// Next line the client wrote. Panics if the client hung up.
    pub async fn expect(&mut self) -> String {
        self.lines
            .next_line()
            .await
            .expect("read from client")
            .expect("client closed the connection")
    }

    /// Next line, or `None` if nothing arrives within `wait`.
    pub async fn expect_within(&mut self, wait: Duration) -> Option<String> {
        tokio::time::timeout(wait, self.lines.next_line())
            .await
            .ok()
            .and_then(|r| r.ok().flatten())
    }

    /// Every line until the client closes.
    pub async fn drain(&mut self) -> Vec<String> {
        let mut out = Vec::new();
        while let Ok(Some(line)) = self.lines.next_line().await {
            out.push(line);
        }
        out
    }

    pub async fn send(&mut self, line: &str) {
        self.writer
            .write_all(format!("{line}\r\n").as_bytes())
            .await
            .expect("write to client");
    }

    /// Read and check the registration handshake.
    pub async fn expect_handshake(&mut self, config: &Config) {
        if let Some(ref password) = config.password {
            assert_eq!(self.expect().await, format!("PASS {password}"));
        }
        assert_eq!(self.expect().await, format!("USER {} 0 * :{}", config.username, config.realname));
        assert_eq!(self.expect().await, format!("NICK {}", config.nickname));
    }
}

/// What a [`Recorder`] saw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Seen {
    Private { nick: String, identity: String, message: String },
    Channel { nick: String, identity: String, channel: String, message: String },
    Registered(String),
    Ended(String),
}

/// Records hook calls and answers `!ping` in the channel.
#[derive(Default)]
pub struct Recorder {
    pub seen: Mutex<Vec<Seen>>,
}

impl Recorder {
    pub fn seen(&self) -> Vec<Seen> {
        self.seen.lock().unwrap().clone()
    }
}

impl Handler for Recorder {
    fn on_private_message(&self, _outbox: &Outbox, nick: &str, identity: &str, message: &str) {
        self.seen.lock().unwrap().push(Seen::Private {
            nick: nick.into(),
            identity: identity.into(),
            message: message.into(),
        });
    }

    fn on_channel_message(&self, outbox: &Outbox, nick: &str, identity: &str, channel: &str, message: &str) {
        self.seen.lock().unwrap().push(Seen::Channel {
            nick: nick.into(),
            identity: identity.into(),
            channel: channel.into(),
            message: message.into(),
        });
        if message == "!ping" {
            outbox.try_send(format!("PRIVMSG {channel} :pong")).unwrap();
        }
    }

    fn on_registered(&self, _outbox: &Outbox, nick: &str) {
        self.seen.lock().unwrap().push(Seen::Registered(nick.into()));
    }

    fn on_session_end(&self, reason: &SessionEnd) {
        self.seen.lock().unwrap().push(Seen::Ended(reason.kind().into()));
    }
}

/// Run a session over an in-memory pipe.
pub fn start_session(config: Config, handler: Arc<dyn Handler>) -> (FakeServer, JoinHandle<SessionEnd>) {
    let (server, _outbox, handle) = start_session_with(config, handler, 64 * 1024);
    (server, handle)
}

/// Like [`start_session`], over a pipe holding at most `pipe_bytes` in
/// each direction, also returning the session's outbox.
pub fn start_session_with(
    config: Config,
    handler: Arc<dyn Handler>,
    pipe_bytes: usize,
) -> (FakeServer, Outbox, JoinHandle<SessionEnd>) {
    let (client, server) = tokio::io::duplex(pipe_bytes);
    let session = Session::new(Arc::new(config), handler);
    let outbox = session.outbox();
    let handle = tokio::spawn(session.run(client));
    (FakeServer::new(server), outbox, handle)
}
