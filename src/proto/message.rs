//! Owned IRC message: parsing and serialization.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use thiserror::Error;

use super::response::Response;

/// Message parse failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("empty message")]
    Empty,
    #[error("missing command in {0:?}")]
    MissingCommand(String),
}

/// Message origin: a server name or a `nick!user@host` mask.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Prefix {
    ServerName(String),
    /// (nickname, username, hostname); user and host may be empty.
    Nickname(String, String, String),
}

impl Prefix {
    /// Lenient prefix parser. A bare token with a dot and no `!`/`@` is a server.
    pub fn parse(s: &str) -> Self {
        match s.split_once('!') {
            Some((nick, rest)) => {
                let (user, host) = rest.split_once('@').unwrap_or((rest, ""));
                Self::Nickname(nick.to_string(), user.to_string(), host.to_string())
            }
            None => match s.split_once('@') {
                Some((nick, host)) => {
                    Self::Nickname(nick.to_string(), String::new(), host.to_string())
                }
                None if s.contains('.') => Self::ServerName(s.to_string()),
                None => Self::Nickname(s.to_string(), String::new(), String::new()),
            },
        }
    }
}

impl Display for Prefix {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::ServerName(name) => write!(f, "{name}"),
            Self::Nickname(nick, user, host) => {
                write!(f, "{nick}")?;
                if !user.is_empty() {
                    write!(f, "!{user}")?;
                }
                if !host.is_empty() {
                    write!(f, "@{host}")?;
                }
                Ok(())
            }
        }
    }
}

/// An owned IRC message. Tags are accepted on input and dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub prefix: Option<Prefix>,
    /// Command name, uppercased, or a three-digit numeric.
    pub command: String,
    pub params: Vec<String>,
}

impl Message {
    /// Build a message with no prefix.
    pub fn new(command: &str, params: Vec<String>) -> Self {
        Self {
            prefix: None,
            command: command.to_ascii_uppercase(),
            params,
        }
    }

    pub fn privmsg(target: &str, text: &str) -> Self {
        Self::new("PRIVMSG", vec![target.to_string(), text.to_string()])
    }

    pub fn notice(target: &str, text: &str) -> Self {
        Self::new("NOTICE", vec![target.to_string(), text.to_string()])
    }

    /// Nickname of the sender, if the prefix is a user mask.
    pub fn source_nickname(&self) -> Option<&str> {
        match self.prefix.as_ref()? {
            Prefix::Nickname(nick, _, _) => Some(nick),
            Prefix::ServerName(_) => None,
        }
    }

    /// Known numeric reply carried by this message.
    pub fn response(&self) -> Option<Response> {
        Response::from_command(&self.command)
    }

    pub fn arg(&self, index: usize) -> Option<&str> {
        self.params.get(index).map(String::as_str)
    }
}

impl FromStr for Message {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut rest = s.trim_end_matches(['\r', '\n']);
        if rest.is_empty() {
            return Err(ParseError::Empty);
        }

        if rest.starts_with('@') {
            rest = rest.split_once(' ').map(|(_, r)| r).unwrap_or("");
        }
        rest = rest.trim_start_matches(' ');

        let mut prefix = None;
        if let Some(stripped) = rest.strip_prefix(':') {
            let (p, r) = stripped.split_once(' ').unwrap_or((stripped, ""));
            prefix = Some(Prefix::parse(p));
            rest = r.trim_start_matches(' ');
        }

        let (command, mut rest) = rest.split_once(' ').unwrap_or((rest, ""));
        if command.is_empty() {
            return Err(ParseError::MissingCommand(s.to_string()));
        }

        let mut params = Vec::new();
        loop {
            rest = rest.trim_start_matches(' ');
            if rest.is_empty() {
                break;
            }
            if let Some(trailing) = rest.strip_prefix(':') {
                params.push(trailing.to_string());
                break;
            }
            let (param, r) = rest.split_once(' ').unwrap_or((rest, ""));
            params.push(param.to_string());
            rest = r;
        }

        Ok(Self {
            prefix,
            command: command.to_ascii_uppercase(),
            params,
        })
    }
}

impl Display for Message {
    /// Serializes without the trailing CRLF; the line codec appends the terminator.
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if let Some(ref prefix) = self.prefix {
            write!(f, ":{prefix} ")?;
        }
        write!(f, "{}", self.command)?;

        let last = self.params.len().saturating_sub(1);
        for (i, param) in self.params.iter().enumerate() {
            let needs_colon =
                i == last && (param.is_empty() || param.contains(' ') || param.starts_with(':'));
            if needs_colon {
                write!(f, " :{param}")?;
            } else {
                write!(f, " {param}")?;
            }
        }
        Ok(())
    }
}
