//! Inter-process notification bus.
//!
//! Other processes sharing the account store (the web front end, mostly)
//! publish `channel payload` lines on a unix socket. Each line becomes an
//! [`IpcEvent::Message`] for subscribed modules.

use crate::events::{Emitter, Event, Listener, ListenerId};
use futures_util::StreamExt;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use tokio::net::{UnixListener, UnixStream};
use tokio_util::codec::{FramedRead, LinesCodec};
use tracing::{debug, info, warn};

const MAX_IPC_LINE: usize = 4096;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IpcEvent {
    Message { channel: String, payload: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IpcEventKind {
    Message,
}

impl IpcEventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Message => "message",
        }
    }
}

impl Event for IpcEvent {
    type Kind = IpcEventKind;

    fn kind(&self) -> IpcEventKind {
        match self {
            Self::Message { .. } => IpcEventKind::Message,
        }
    }
}

/// A notification payload understood by the services.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum IpcNotification {
    /// An account was created elsewhere and needs a name attached.
    Register { origin: String, name: String },
    #[serde(other)]
    Other,
}

impl IpcNotification {
    /// Parse a JSON payload. Non-JSON payloads yield `None`.
    pub fn parse(payload: &str) -> Option<Self> {
        serde_json::from_str(payload).ok()
    }
}

/// Handle to the bus. Cloning shares subscribers.
#[derive(Clone, Default)]
pub struct Ipc {
    events: Arc<Emitter<IpcEvent>>,
}

impl Ipc {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, kind: IpcEventKind, listener: Listener<IpcEvent>) -> ListenerId {
        self.events.add_listener(kind, listener)
    }

    pub fn unsubscribe(&self, kind: IpcEventKind, id: ListenerId) -> bool {
        self.events.remove_listener(kind, id)
    }

    pub fn events(&self) -> &Emitter<IpcEvent> {
        &self.events
    }

    /// Deliver a message to subscribers. Returns how many received it.
    pub fn publish(&self, channel: &str, payload: &str) -> usize {
        self.events.emit(&IpcEvent::Message {
            channel: channel.to_string(),
            payload: payload.to_string(),
        })
    }
}

/// Split a wire line into `(channel, payload)`.
fn split_line(line: &str) -> Option<(&str, &str)> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match line.split_once(' ') {
        Some((channel, payload)) => Some((channel, payload.trim_start())),
        None => Some((line, "")),
    }
}

/// Accept publishers on a unix socket until the listener fails.
pub async fn serve_unix<P: AsRef<Path>>(path: P, ipc: Ipc) -> std::io::Result<()> {
    let path = path.as_ref();
    if path.exists() {
        std::fs::remove_file(path)?;
    }
    let listener = UnixListener::bind(path)?;
    info!(path = %path.display(), "IPC socket listening");

    loop {
        let (stream, _) = listener.accept().await?;
        let ipc = ipc.clone();
        tokio::spawn(async move {
            read_publisher(stream, ipc).await;
        });
    }
}

async fn read_publisher(stream: UnixStream, ipc: Ipc) {
    let mut lines = FramedRead::new(stream, LinesCodec::new_with_max_length(MAX_IPC_LINE));
    while let Some(line) = lines.next().await {
        match line {
            Ok(line) => {
                if let Some((channel, payload)) = split_line(&line) {
                    let delivered = ipc.publish(channel, payload);
                    debug!(channel = %channel, delivered, "IPC message");
                }
            }
            Err(e) => {
                warn!(error = %e, "IPC publisher error");
                break;
            }
        }
    }
}
