//! Events raised by the relational and key/value stores.

use crate::events::Event;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreKind {
    Relational,
    KeyValue,
}

/// Why a store reported an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreFailure {
    /// The connection is gone; a reconnect is required.
    ConnectionLost(String),
    /// Anything else; logged only.
    Query(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    Ready(StoreKind),
    Error(StoreKind, StoreFailure),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreEventKind {
    Ready,
    Error,
}

impl StoreEventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::Error => "error",
        }
    }
}

impl Event for StoreEvent {
    type Kind = StoreEventKind;

    fn kind(&self) -> StoreEventKind {
        match self {
            Self::Ready(_) => StoreEventKind::Ready,
            Self::Error(..) => StoreEventKind::Error,
        }
    }
}
