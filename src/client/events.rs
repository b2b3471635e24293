//! Events emitted by the protocol client.

use crate::events::Event;
use crate::proto::{Message, Prefix};

/// Who sent a chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    pub nick: String,
    pub user: String,
    pub host: String,
}

impl Source {
    pub fn from_prefix(prefix: &Prefix) -> Option<Self> {
        match prefix {
            Prefix::Nickname(nick, user, host) => Some(Self {
                nick: nick.clone(),
                user: user.clone(),
                host: host.clone(),
            }),
            Prefix::ServerName(_) => None,
        }
    }

    /// Source with only a nickname known.
    pub fn nick(nick: &str) -> Self {
        Self {
            nick: nick.to_string(),
            user: String::new(),
            host: String::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// Registration completed (RPL_WELCOME); carries the nick the server assigned.
    Registered { nick: String },
    /// Every inbound line, before any derived event.
    Raw(Message),
    /// PRIVMSG from a user.
    Message {
        from: Source,
        to: String,
        text: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientEventKind {
    Registered,
    Raw,
    Message,
}

impl ClientEventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Registered => "registered",
            Self::Raw => "raw",
            Self::Message => "message",
        }
    }
}

impl Event for ClientEvent {
    type Kind = ClientEventKind;

    fn kind(&self) -> ClientEventKind {
        match self {
            Self::Registered { .. } => ClientEventKind::Registered,
            Self::Raw(_) => ClientEventKind::Raw,
            Self::Message { .. } => ClientEventKind::Message,
        }
    }
}

impl ClientEvent {
    /// Events derived from one inbound line, in emission order.
    pub fn from_line(msg: Message) -> Vec<Self> {
        let mut events = Vec::with_capacity(2);

        if msg.command == "001"
            && let Some(nick) = msg.arg(0)
        {
            events.push(Self::Registered {
                nick: nick.to_string(),
            });
        }

        let derived = if msg.command == "PRIVMSG" && msg.params.len() >= 2 {
            msg.prefix
                .as_ref()
                .and_then(Source::from_prefix)
                .map(|from| Self::Message {
                    from,
                    to: msg.params[0].clone(),
                    text: msg.params[1].clone(),
                })
        } else {
            None
        };

        events.insert(0, Self::Raw(msg));
        events.extend(derived);
        events
    }
}
