//! Named-event emitter shared by the client, the stores, and the IPC bus.
//!
//! Listeners are keyed by an event kind and identified by a [`ListenerId`]
//! handed out at registration, so a module can later remove exactly the
//! listeners it added. Emission runs listeners synchronously, in
//! registration order, on the emitting task.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// An event that can be routed by kind.
pub trait Event: Send + Sync + 'static {
    type Kind: Copy + Eq + Hash + Debug + Send + Sync + 'static;

    fn kind(&self) -> Self::Kind;
}

/// Event callback. Listeners must not block; spawn for I/O.
pub type Listener<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// Opaque handle for a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

pub struct Emitter<E: Event> {
    listeners: RwLock<HashMap<E::Kind, Vec<(ListenerId, Listener<E>)>>>,
    next_id: AtomicU64,
}

impl<E: Event> Emitter<E> {
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn add_listener(&self, kind: E::Kind, listener: Listener<E>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .write()
            .entry(kind)
            .or_default()
            .push((id, listener));
        id
    }

    /// Remove a listener. Returns false if it was not registered under `kind`.
    pub fn remove_listener(&self, kind: E::Kind, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let Some(list) = listeners.get_mut(&kind) else {
            return false;
        };
        let before = list.len();
        list.retain(|(existing, _)| *existing != id);
        let removed = list.len() != before;
        if list.is_empty() {
            listeners.remove(&kind);
        }
        removed
    }

    /// Deliver `event` to every listener of its kind. Returns how many ran.
    pub fn emit(&self, event: &E) -> usize {
        // Snapshot so listeners may add or remove listeners while running.
        let snapshot: Vec<Listener<E>> = match self.listeners.read().get(&event.kind()) {
            Some(list) => list.iter().map(|(_, l)| Arc::clone(l)).collect(),
            None => return 0,
        };
        for listener in &snapshot {
            listener(event);
        }
        snapshot.len()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().values().map(Vec::len).sum()
    }

    /// Every registered (kind, id) pair, sorted by id.
    pub fn registrations(&self) -> Vec<(E::Kind, ListenerId)> {
        let mut all: Vec<_> = self
            .listeners
            .read()
            .iter()
            .flat_map(|(kind, list)| list.iter().map(move |(id, _)| (*kind, *id)))
            .collect();
        all.sort_by_key(|(_, id)| *id);
        all
    }
}

impl<E: Event> Default for Emitter<E> {
    fn default() -> Self {
        Self::new()
    }
}
