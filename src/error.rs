//! Error types shared across the bot.
//!
//! Store and token errors live next to their backends (`db`, `store`,
//! `services::tokens`); this module holds the errors of the protocol client
//! and the module host.

use crate::proto::Message;
use thiserror::Error;
use tokio::sync::mpsc;

// ============================================================================
// Client Errors (protocol connection)
// ============================================================================

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("connection failed: {0}")]
    Connect(#[source] std::io::Error),

    #[error("line codec error: {0}")]
    Codec(#[from] tokio_util::codec::LinesCodecError),

    #[error("connection closed")]
    Closed,

    #[error("outbound queue closed")]
    Send(#[from] mpsc::error::SendError<Message>),
}

impl ClientError {
    /// Static label for metrics and logs.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Connect(_) => "connect",
            Self::Codec(_) => "codec",
            Self::Closed => "closed",
            Self::Send(_) => "send",
        }
    }
}

// ============================================================================
// Module Errors (lifecycle and handler tables)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModuleError {
    #[error("command {0:?} is declared but has no handler")]
    MissingHandler(&'static str),

    #[error("handler registered for undeclared command {0:?}")]
    UndeclaredCommand(&'static str),

    #[error("command {0:?} has more than one handler")]
    DuplicateHandler(&'static str),

    #[error("unknown module: {0}")]
    UnknownModule(String),

    #[error("module {module} failed to load: {reason}")]
    LoadFailed { module: &'static str, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_error_codes() {
        assert_eq!(ClientError::Closed.error_code(), "closed");
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "nope");
        assert_eq!(ClientError::Connect(io).error_code(), "connect");
    }

    #[test]
    fn module_error_messages_name_the_command() {
        let err = ModuleError::MissingHandler("owner");
        assert!(err.to_string().contains("owner"));
    }
}
