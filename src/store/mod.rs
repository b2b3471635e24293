//! Key/value store, IPC bus, and the store event stream.
//!
//! - [`KvStore`]: redb-backed keys with store-enforced expiry (tokens)
//! - [`Ipc`]: notification bus standing in for a pub/sub connection
//! - [`StoreEvent`]: readiness and failure signals from both stores

mod events;
pub mod ipc;
mod kv;

pub use events::{StoreEvent, StoreEventKind, StoreFailure, StoreKind};
pub use ipc::{Ipc, IpcEvent, IpcEventKind, IpcNotification, serve_unix};
pub use kv::{KvStore, StoreError};
