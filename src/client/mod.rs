//! Minimal IRC client the services ride on.
//!
//! [`ClientHandle`] is the cheap, cloneable side modules hold: it queues
//! outbound messages and owns the event emitter. [`Connection`] owns the
//! socket and runs the read/write loop, emitting a [`ClientEvent`] for every
//! inbound line.

mod events;

pub use events::{ClientEvent, ClientEventKind, Source};

use crate::config::{IrcConfig, OperConfig};
use crate::error::ClientError;
use crate::events::Emitter;
use crate::proto::{Message, Response, irc_eq};
use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::codec::{Framed, LinesCodec};
use tracing::{debug, info, warn};

/// Upper bound for a single inbound line; longer lines are a codec error.
const MAX_LINE_LENGTH: usize = 8192;

struct ClientInner {
    nick: RwLock<String>,
    outbound: mpsc::UnboundedSender<Message>,
    events: Emitter<ClientEvent>,
}

/// Shared handle to the live connection.
#[derive(Clone)]
pub struct ClientHandle {
    inner: Arc<ClientInner>,
}

impl ClientHandle {
    /// Create a handle whose outbound messages land on `outbound`.
    pub fn new(nick: &str, outbound: mpsc::UnboundedSender<Message>) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                nick: RwLock::new(nick.to_string()),
                outbound,
                events: Emitter::new(),
            }),
        }
    }

    /// Current nickname of the bot.
    pub fn nick(&self) -> String {
        self.inner.nick.read().clone()
    }

    pub fn set_nick(&self, nick: &str) {
        *self.inner.nick.write() = nick.to_string();
    }

    pub fn events(&self) -> &Emitter<ClientEvent> {
        &self.inner.events
    }

    /// Deliver an event to listeners. Called by the connection loop.
    pub fn emit(&self, event: &ClientEvent) -> usize {
        self.inner.events.emit(event)
    }

    pub fn send(&self, msg: Message) -> Result<(), ClientError> {
        self.inner.outbound.send(msg)?;
        Ok(())
    }

    pub fn join(&self, channel: &str) -> Result<(), ClientError> {
        self.send(Message::new("JOIN", vec![channel.to_string()]))
    }

    /// Request channel membership (RPL_NAMREPLY follows as raw lines).
    pub fn names(&self, channel: &str) -> Result<(), ClientError> {
        self.send(Message::new("NAMES", vec![channel.to_string()]))
    }

    /// Issue a privilege query. The answer arrives later as raw numerics.
    pub fn whois(&self, nick: &str) -> Result<(), ClientError> {
        self.send(Message::new("WHOIS", vec![nick.to_string()]))
    }

    pub fn notice(&self, target: &str, text: &str) -> Result<(), ClientError> {
        self.send(Message::notice(target, text))
    }

    pub fn say(&self, target: &str, text: &str) -> Result<(), ClientError> {
        self.send(Message::privmsg(target, text))
    }
}

/// Socket side of the client.
pub struct Connection {
    framed: Framed<TcpStream, LinesCodec>,
    outbound: mpsc::UnboundedReceiver<Message>,
    handle: ClientHandle,
    channels: Vec<String>,
    oper: Option<OperConfig>,
}

impl Connection {
    /// Connect and send the registration burst (PASS/NICK/USER).
    pub async fn connect(
        config: &IrcConfig,
        oper: Option<OperConfig>,
    ) -> Result<(ClientHandle, Self), ClientError> {
        info!(server = %config.server, port = config.port, nick = %config.nick, "Connecting to IRC");

        let stream = TcpStream::connect((config.server.as_str(), config.port))
            .await
            .map_err(ClientError::Connect)?;
        let mut framed = Framed::new(stream, LinesCodec::new_with_max_length(MAX_LINE_LENGTH));

        if let Some(ref password) = config.password {
            framed
                .send(Message::new("PASS", vec![password.clone()]).to_string())
                .await?;
        }
        framed
            .send(Message::new("NICK", vec![config.nick.clone()]).to_string())
            .await?;
        framed
            .send(
                Message::new(
                    "USER",
                    vec![
                        config.username.clone(),
                        "0".to_string(),
                        "*".to_string(),
                        config.realname.clone(),
                    ],
                )
                .to_string(),
            )
            .await?;

        let (tx, rx) = mpsc::unbounded_channel();
        let handle = ClientHandle::new(&config.nick, tx);

        let connection = Self {
            framed,
            outbound: rx,
            handle: handle.clone(),
            channels: config.channels.clone(),
            oper,
        };
        Ok((handle, connection))
    }

    /// Pump lines until the server closes the connection.
    pub async fn run(mut self) -> Result<(), ClientError> {
        loop {
            tokio::select! {
                line = self.framed.next() => {
                    let Some(line) = line else {
                        info!("IRC connection closed by server");
                        return Err(ClientError::Closed);
                    };
                    let line = line?;
                    self.handle_line(&line).await?;
                }
                Some(msg) = self.outbound.recv() => {
                    debug!(line = %msg, "-> IRC");
                    self.framed.send(msg.to_string()).await?;
                }
            }
        }
    }

    async fn handle_line(&mut self, line: &str) -> Result<(), ClientError> {
        let msg = match line.parse::<Message>() {
            Ok(msg) => msg,
            Err(e) => {
                debug!(line = %line, error = %e, "Ignoring unparsable line");
                return Ok(());
            }
        };
        debug!(line = %line, "<- IRC");

        match msg.command.as_str() {
            "PING" => {
                self.framed
                    .send(Message::new("PONG", msg.params.clone()).to_string())
                    .await?;
            }
            "NICK" => {
                if let (Some(old), Some(new)) = (msg.source_nickname(), msg.arg(0))
                    && irc_eq(old, &self.handle.nick())
                {
                    info!(old = %old, new = %new, "Nickname changed");
                    self.handle.set_nick(new);
                }
            }
            _ => match msg.response() {
                Some(Response::RPL_WELCOME) => self.on_welcome(&msg)?,
                Some(Response::ERR_NICKNAMEINUSE) => {
                    let fallback = format!("{}_", self.handle.nick());
                    warn!(nick = %fallback, "Nickname in use, retrying");
                    self.handle.set_nick(&fallback);
                    self.handle.send(Message::new("NICK", vec![fallback]))?;
                }
                _ => {}
            },
        }

        for event in ClientEvent::from_line(msg) {
            self.handle.emit(&event);
        }
        Ok(())
    }

    fn on_welcome(&mut self, msg: &Message) -> Result<(), ClientError> {
        if let Some(nick) = msg.arg(0) {
            self.handle.set_nick(nick);
        }
        info!(nick = %self.handle.nick(), "Registered with IRC server");

        if let Some(ref oper) = self.oper {
            self.handle.send(Message::new(
                "OPER",
                vec![oper.name.clone(), oper.password.clone()],
            ))?;
        }
        for channel in &self.channels {
            self.handle.join(channel)?;
        }
        Ok(())
    }
}
