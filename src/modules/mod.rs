//! Module lifecycle: load/unload, bind/unbind.
//!
//! A module hands the host an [`EventTable`] when it loads. The host binds
//! every entry to its event source and keeps the listener ids; unloading
//! removes exactly those ids. Bind and unbind walk the same recorded list,
//! so they cannot drift apart.

pub mod model;

pub use model::ModelModule;

use crate::client::{ClientEvent, ClientEventKind, ClientHandle};
use crate::config::Config;
use crate::db::Database;
use crate::error::ModuleError;
use crate::events::{Emitter, Listener, ListenerId};
use crate::store::{Ipc, IpcEvent, IpcEventKind, KvStore, StoreEvent, StoreEventKind};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Shared context handed to modules on load.
pub struct Core {
    pub config: Arc<Config>,
    pub client: ClientHandle,
    pub db: Database,
    pub kv: KvStore,
    pub ipc: Ipc,
    /// Readiness and failure events from both stores.
    pub store_events: Arc<Emitter<StoreEvent>>,
}

/// One declared listener.
pub enum Binding {
    Client(ClientEventKind, Listener<ClientEvent>),
    Ipc(IpcEventKind, Listener<IpcEvent>),
    Store(StoreEventKind, Listener<StoreEvent>),
}

/// Declarative `event -> handler` table a module returns from `load`.
#[derive(Default)]
pub struct EventTable {
    entries: Vec<Binding>,
}

impl EventTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_client<F>(mut self, kind: ClientEventKind, handler: F) -> Self
    where
        F: Fn(&ClientEvent) + Send + Sync + 'static,
    {
        self.entries.push(Binding::Client(kind, Arc::new(handler)));
        self
    }

    pub fn on_ipc<F>(mut self, kind: IpcEventKind, handler: F) -> Self
    where
        F: Fn(&IpcEvent) + Send + Sync + 'static,
    {
        self.entries.push(Binding::Ipc(kind, Arc::new(handler)));
        self
    }

    pub fn on_store<F>(mut self, kind: StoreEventKind, handler: F) -> Self
    where
        F: Fn(&StoreEvent) + Send + Sync + 'static,
    {
        self.entries.push(Binding::Store(kind, Arc::new(handler)));
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BoundListener {
    Client(ClientEventKind, ListenerId),
    Ipc(IpcEventKind, ListenerId),
    Store(StoreEventKind, ListenerId),
}

impl BoundListener {
    fn describe(&self) -> (&'static str, &'static str) {
        match self {
            Self::Client(kind, _) => ("client", kind.as_str()),
            Self::Ipc(kind, _) => ("ipc", kind.as_str()),
            Self::Store(kind, _) => ("store", kind.as_str()),
        }
    }
}

/// The listeners one module registered.
#[derive(Debug, Default)]
pub struct ModuleBinding {
    listeners: Vec<BoundListener>,
}

impl ModuleBinding {
    fn bind(core: &Core, table: EventTable) -> Self {
        let listeners = table
            .entries
            .into_iter()
            .map(|binding| match binding {
                Binding::Client(kind, listener) => {
                    BoundListener::Client(kind, core.client.events().add_listener(kind, listener))
                }
                Binding::Ipc(kind, listener) => {
                    BoundListener::Ipc(kind, core.ipc.subscribe(kind, listener))
                }
                Binding::Store(kind, listener) => {
                    BoundListener::Store(kind, core.store_events.add_listener(kind, listener))
                }
            })
            .collect();
        Self { listeners }
    }

    /// Remove every recorded listener. Returns how many were still registered.
    fn unbind(self, core: &Core) -> usize {
        self.listeners
            .into_iter()
            .filter(|bound| {
                let removed = match *bound {
                    BoundListener::Client(kind, id) => core.client.events().remove_listener(kind, id),
                    BoundListener::Ipc(kind, id) => core.ipc.unsubscribe(kind, id),
                    BoundListener::Store(kind, id) => core.store_events.remove_listener(kind, id),
                };
                if !removed {
                    let (source, event) = bound.describe();
                    warn!(source, event, "Listener already gone at unbind");
                }
                removed
            })
            .count()
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

/// A functional unit that attaches to the live connection and stores.
pub trait Module: Send {
    fn name(&self) -> &'static str;

    /// Wire shared references and declare listeners.
    fn load(&mut self, core: &Arc<Core>) -> Result<EventTable, ModuleError>;

    /// Detach references. Called after the host has unbound the listeners.
    fn unload(&mut self);
}

/// Owns the modules and their bindings.
pub struct ModuleHost {
    core: Arc<Core>,
    modules: Vec<Box<dyn Module>>,
    bindings: HashMap<&'static str, ModuleBinding>,
}

impl ModuleHost {
    /// Modules are kept in declaration order.
    pub fn new(core: Arc<Core>, modules: Vec<Box<dyn Module>>) -> Self {
        Self {
            core,
            modules,
            bindings: HashMap::new(),
        }
    }

    pub fn core(&self) -> &Arc<Core> {
        &self.core
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.modules.iter().map(|m| m.name()).collect()
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    /// Load a module by name. Loading a loaded module is a no-op.
    pub fn load(&mut self, name: &str) -> Result<(), ModuleError> {
        let Some(module) = self.modules.iter_mut().find(|m| m.name() == name) else {
            return Err(ModuleError::UnknownModule(name.to_string()));
        };
        let name = module.name();
        if self.bindings.contains_key(name) {
            warn!(module = name, "Module already loaded");
            return Ok(());
        }

        let table = module.load(&self.core)?;
        let binding = ModuleBinding::bind(&self.core, table);
        info!(module = name, listeners = binding.len(), "Module loaded");
        self.bindings.insert(name, binding);
        Ok(())
    }

    /// Unload a module by name. Unknown or unloaded names are a no-op.
    ///
    /// Returns true if the module was loaded.
    pub fn unload(&mut self, name: &str) -> bool {
        let Some((name, binding)) = self.bindings.remove_entry(name) else {
            debug!(module = name, "Unload of module that is not loaded");
            return false;
        };
        let removed = binding.unbind(&self.core);
        if let Some(module) = self.modules.iter_mut().find(|m| m.name() == name) {
            module.unload();
        }
        info!(module = name, listeners = removed, "Module unloaded");
        true
    }

    /// Load every module in declaration order, stopping at the first failure.
    pub fn load_all(&mut self) -> Result<(), ModuleError> {
        for name in self.names() {
            self.load(name)?;
        }
        Ok(())
    }

    /// Unload every loaded module in reverse declaration order.
    pub fn unload_all(&mut self) {
        for name in self.names().into_iter().rev() {
            self.unload(name);
        }
    }
}
