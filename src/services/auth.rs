//! WHOIS-backed authentication.
//!
//! `authenticate` resolves the alias in the account directory, sends one
//! WHOIS per alias (concurrent callers for the same alias share it), and
//! waits for the correlated reply. The raw-line listener feeds
//! [`AuthMachine::on_raw`], which is the only writer of the privilege table.
//!
//! The modes line (379) and END OF WHOIS (318) arrive in no guaranteed order.
//! A query resolves once 318 has been seen and either 379 has been seen too
//! or the late-reply grace period has run out, so both orders give the same
//! answer.

use crate::client::ClientHandle;
use crate::config::ServicesConfig;
use crate::db::{Account, Database};
use crate::proto::{Message, Response, irc_to_lower};
use dashmap::DashMap;
use parking_lot::Mutex;
use regex::Regex;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{Instrument, debug, info, warn};
use uuid::Uuid;

static MODES_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^is using modes \+([^ ]*)").ok());

/// Extract the mode letters from the trailing text of a 379 line.
pub fn parse_privilege_modes(text: &str) -> Option<String> {
    let re = MODES_RE.as_ref()?;
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub timeout: Duration,
    pub late_reply_grace: Duration,
    pub privilege_marker: char,
}

impl From<&ServicesConfig> for AuthSettings {
    fn from(config: &ServicesConfig) -> Self {
        Self {
            timeout: config.auth_timeout(),
            late_reply_grace: config.late_reply_grace(),
            privilege_marker: config.privilege_marker,
        }
    }
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self::from(&ServicesConfig::default())
    }
}

/// Why authentication was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    /// The alias has no account.
    NotRegistered,
    /// The user is online but lacks the identified mode.
    NotIdentified,
    /// The server says no such nick.
    NoSuchNick,
    /// No complete reply within the bound.
    Timeout,
    /// WHOIS could not be sent.
    Protocol,
    /// The query was dropped, e.g. the module unloaded.
    Cancelled,
    /// The account directory failed.
    Store,
}

impl AuthFailure {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotRegistered => "not_registered",
            Self::NotIdentified => "not_identified",
            Self::NoSuchNick => "no_such_nick",
            Self::Timeout => "timeout",
            Self::Protocol => "protocol",
            Self::Cancelled => "cancelled",
            Self::Store => "store",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    Authenticated(Account),
    Denied(AuthFailure),
}

impl AuthOutcome {
    pub fn account(&self) -> Option<&Account> {
        match self {
            Self::Authenticated(account) => Some(account),
            Self::Denied(_) => None,
        }
    }
}

/// What ended a query, as seen by the code that ends it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Signal {
    Complete,
    NoSuchNick,
    Failed,
}

/// What a waiter receives. A completed query carries the modes its own
/// 379 reported, so the decision never reads shared state after waking.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Resolution {
    Complete(Option<String>),
    NoSuchNick,
    Failed,
}

struct PendingQuery {
    id: Uuid,
    waiters: Vec<oneshot::Sender<Resolution>>,
    /// Modes from this query's 379, once seen.
    modes: Option<String>,
    completed: bool,
}

pub struct AuthMachine {
    client: ClientHandle,
    db: Database,
    settings: AuthSettings,
    /// Lowercased alias -> last reported mode letters.
    privileges: DashMap<String, String>,
    pending: Mutex<HashMap<String, PendingQuery>>,
}

impl AuthMachine {
    pub fn new(client: ClientHandle, db: Database, settings: AuthSettings) -> Self {
        Self {
            client,
            db,
            settings,
            privileges: DashMap::new(),
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Last reported modes for `alias`, if any.
    pub fn privileges(&self, alias: &str) -> Option<String> {
        self.privileges
            .get(&irc_to_lower(alias))
            .map(|m| m.value().clone())
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Decide whether `alias` is a registered, identified user.
    pub async fn authenticate(self: &Arc<Self>, alias: &str) -> AuthOutcome {
        let outcome = self
            .authenticate_inner(alias)
            .instrument(crate::telemetry::spans::auth(alias))
            .await;
        let label = match &outcome {
            AuthOutcome::Authenticated(_) => "authenticated",
            AuthOutcome::Denied(failure) => failure.as_str(),
        };
        crate::metrics::record_auth(label);
        debug!(alias = %alias, outcome = label, "Authentication decided");
        outcome
    }

    async fn authenticate_inner(self: &Arc<Self>, alias: &str) -> AuthOutcome {
        let account = match self.db.accounts().find_by_alias(alias).await {
            Ok(account) if account.is_empty() => {
                return AuthOutcome::Denied(AuthFailure::NotRegistered);
            }
            Ok(account) => account,
            Err(e) => {
                warn!(alias = %alias, error = %e, "Account lookup failed");
                return AuthOutcome::Denied(AuthFailure::Store);
            }
        };

        let key = irc_to_lower(alias);
        let (tx, rx) = oneshot::channel();
        let (id, issued) = {
            let mut pending = self.pending.lock();
            match pending.get_mut(&key) {
                Some(query) => {
                    query.waiters.push(tx);
                    (query.id, false)
                }
                None => {
                    let id = Uuid::new_v4();
                    self.privileges.remove(&key);
                    pending.insert(
                        key.clone(),
                        PendingQuery {
                            id,
                            waiters: vec![tx],
                            modes: None,
                            completed: false,
                        },
                    );
                    (id, true)
                }
            }
        };

        if issued {
            debug!(alias = %alias, request = %id, "Issuing WHOIS");
            if let Err(e) = self.client.whois(alias) {
                warn!(alias = %alias, error = %e, "Failed to send WHOIS");
                self.resolve(&key, Some(id), Signal::Failed);
            }
        }

        // Each caller waits its own bound, even when it joined late.
        let waited = tokio::time::timeout(self.settings.timeout, rx).await;
        let resolution = match waited {
            Ok(Ok(resolution)) => resolution,
            Ok(Err(_)) => return AuthOutcome::Denied(AuthFailure::Cancelled),
            Err(_) => {
                info!(alias = %alias, request = %id, "WHOIS timed out");
                self.abandon(&key, id);
                return AuthOutcome::Denied(AuthFailure::Timeout);
            }
        };

        match resolution {
            Resolution::Complete(modes) => {
                let identified = modes
                    .is_some_and(|modes| modes.contains(self.settings.privilege_marker));
                if identified {
                    AuthOutcome::Authenticated(account)
                } else {
                    AuthOutcome::Denied(AuthFailure::NotIdentified)
                }
            }
            Resolution::NoSuchNick => AuthOutcome::Denied(AuthFailure::NoSuchNick),
            Resolution::Failed => AuthOutcome::Denied(AuthFailure::Protocol),
        }
    }

    /// Feed one inbound line. Lines that are not WHOIS replies are ignored.
    pub fn on_raw(self: &Arc<Self>, msg: &Message) {
        let Some(response) = msg.response() else {
            return;
        };
        let Some(nick) = msg.arg(1) else {
            return;
        };
        let key = irc_to_lower(nick);

        match response {
            Response::RPL_WHOISMODES => {
                let text = msg.params.last().map(String::as_str).unwrap_or_default();
                let modes = parse_privilege_modes(text).unwrap_or_else(|| {
                    debug!(nick = %nick, text = %text, "Unparsable modes line");
                    String::new()
                });
                let ready = {
                    let mut pending = self.pending.lock();
                    self.privileges.insert(key.clone(), modes.clone());
                    match pending.get_mut(&key) {
                        Some(query) => {
                            query.modes = Some(modes);
                            query.completed
                        }
                        None => false,
                    }
                };
                if ready {
                    self.resolve(&key, None, Signal::Complete);
                }
            }
            Response::RPL_ENDOFWHOIS => {
                let state = {
                    let mut pending = self.pending.lock();
                    pending.get_mut(&key).map(|query| {
                        query.completed = true;
                        (query.id, query.modes.is_some())
                    })
                };
                match state {
                    Some((_, true)) => self.resolve(&key, None, Signal::Complete),
                    Some((id, false)) => {
                        let machine = Arc::clone(self);
                        let grace = self.settings.late_reply_grace;
                        tokio::spawn(async move {
                            tokio::time::sleep(grace).await;
                            machine.resolve(&key, Some(id), Signal::Complete);
                        });
                    }
                    None => {}
                }
            }
            Response::ERR_NOSUCHNICK => {
                self.resolve(&key, None, Signal::NoSuchNick);
            }
            _ => {}
        }
    }

    /// Drop every pending query; waiters see `Cancelled`.
    pub fn cancel_all(&self) {
        let drained: Vec<_> = self.pending.lock().drain().collect();
        if !drained.is_empty() {
            debug!(count = drained.len(), "Cancelled pending WHOIS queries");
        }
    }

    /// Drop the waiters of query `id` whose callers gave up. The query
    /// stays pending while anyone still waits on it.
    fn abandon(&self, key: &str, id: Uuid) {
        let mut pending = self.pending.lock();
        let Some(query) = pending.get_mut(key).filter(|query| query.id == id) else {
            return;
        };
        query.waiters.retain(|waiter| !waiter.is_closed());
        if query.waiters.is_empty() {
            pending.remove(key);
        }
    }

    /// Resolve the pending query for `key`, exactly once. With `id`, only
    /// the query with that request id is resolved.
    fn resolve(&self, key: &str, id: Option<Uuid>, signal: Signal) {
        let removed = {
            let mut pending = self.pending.lock();
            match pending.get(key) {
                Some(query) if id.is_none_or(|id| id == query.id) => pending.remove(key),
                _ => None,
            }
        };
        let Some(query) = removed else {
            return;
        };
        let resolution = match signal {
            Signal::Complete => Resolution::Complete(query.modes),
            Signal::NoSuchNick => Resolution::NoSuchNick,
            Signal::Failed => Resolution::Failed,
        };
        for waiter in query.waiters {
            let _ = waiter.send(resolution.clone());
        }
    }
}
