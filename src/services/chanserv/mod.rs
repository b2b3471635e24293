//! ChanServ - channel registration and access control.
//!
//! The module listens for raw lines (WHOIS replies, RPL_YOUREOPER), chat
//! messages (commands), and IPC notifications from the web side.

mod commands;
pub mod dispatch;

pub use dispatch::{COMMANDS, CommandHandler, CommandRequest, Dispatcher, parse_command};

use crate::client::{ClientEvent, ClientEventKind, ClientHandle, Source};
use crate::db::Database;
use crate::error::ModuleError;
use crate::modules::{Core, EventTable, Module};
use crate::proto::{Message, Response};
use crate::services::{
    AuthMachine, AuthSettings, ServiceBase, TokenService, apply_effects,
};
use crate::store::{IpcEvent, IpcEventKind, IpcNotification};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Everything a command handler may touch.
pub struct CommandContext {
    pub db: Database,
    pub auth: Arc<AuthMachine>,
    pub tokens: TokenService,
    /// Nick the service answers as; used in help text.
    pub service_nick: String,
}

impl ServiceBase for CommandContext {
    fn service_name(&self) -> &str {
        &self.service_nick
    }
}

struct ChanServ {
    ctx: CommandContext,
    dispatcher: Dispatcher,
    client: ClientHandle,
}

impl ChanServ {
    fn on_raw(&self, msg: &Message) {
        if msg.response() == Some(Response::RPL_YOUREOPER) {
            self.init_services();
        }
        self.ctx.auth.on_raw(msg);
    }

    /// Take the service nick once opered.
    fn init_services(&self) {
        info!(nick = %self.ctx.service_nick, "Initializing services");
        let sanick = Message::new(
            "SANICK",
            vec![self.client.nick(), self.ctx.service_nick.clone()],
        );
        if let Err(e) = self.client.send(sanick) {
            warn!(error = %e, "Failed to send SANICK");
        }
    }

    fn on_message(self: &Arc<Self>, from: &Source, to: &str, text: &str) {
        if parse_command(from, to, text).is_none() {
            return;
        }
        let chanserv = Arc::clone(self);
        let (from, to, text) = (from.clone(), to.to_string(), text.to_string());
        tokio::spawn(async move {
            if let Some(effects) = chanserv
                .dispatcher
                .dispatch(&chanserv.ctx, &from, &to, &text)
                .await
            {
                let _ = apply_effects(&chanserv.client, effects);
            }
        });
    }

    fn on_ipc(&self, event: &IpcEvent) {
        let IpcEvent::Message { channel, payload } = event;
        info!(channel = %channel, payload = %payload, "IPC message");

        if let Some(IpcNotification::Register { origin, name }) = IpcNotification::parse(payload) {
            let db = self.ctx.db.clone();
            tokio::spawn(async move {
                match db.accounts().register(&origin, &name).await {
                    Ok(account) => {
                        info!(origin = %origin, name = %name, account_id = account.account_id, "Registered name from IPC")
                    }
                    Err(e) => warn!(origin = %origin, name = %name, error = %e, "IPC registration failed"),
                }
            });
        }
    }
}

/// Module wrapper that owns the live ChanServ state between load and unload.
#[derive(Default)]
pub struct ChanServModule {
    state: Option<Arc<ChanServ>>,
}

impl ChanServModule {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Module for ChanServModule {
    fn name(&self) -> &'static str {
        "chanserv"
    }

    fn load(&mut self, core: &Arc<Core>) -> Result<EventTable, ModuleError> {
        let dispatcher = Dispatcher::chanserv()?;
        let services = &core.config.services;
        let auth = Arc::new(AuthMachine::new(
            core.client.clone(),
            core.db.clone(),
            AuthSettings::from(services),
        ));
        let chanserv = Arc::new(ChanServ {
            ctx: CommandContext {
                db: core.db.clone(),
                auth,
                tokens: TokenService::new(core.kv.clone(), services.token_ttl()),
                service_nick: services.nick.clone(),
            },
            dispatcher,
            client: core.client.clone(),
        });
        self.state = Some(chanserv.clone());
        debug!(dispatcher = ?chanserv.dispatcher, "ChanServ dispatcher ready");

        let raw = chanserv.clone();
        let message = chanserv.clone();
        let ipc = chanserv;
        Ok(EventTable::new()
            .on_client(ClientEventKind::Raw, move |event| {
                if let ClientEvent::Raw(msg) = event {
                    raw.on_raw(msg);
                }
            })
            .on_client(ClientEventKind::Message, move |event| {
                if let ClientEvent::Message { from, to, text } = event {
                    message.on_message(from, to, text);
                }
            })
            .on_ipc(IpcEventKind::Message, move |event| ipc.on_ipc(event)))
    }

    fn unload(&mut self) {
        if let Some(chanserv) = self.state.take() {
            chanserv.ctx.auth.cancel_all();
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::events::Emitter;
    use crate::store::KvStore;
    use std::future::Future;
    use std::time::Duration;
    use tokio::sync::mpsc;

    /// How the fake network answers a WHOIS.
    #[derive(Debug, Clone, Copy)]
    pub(crate) enum Whois<'a> {
        Modes(&'a str),
        NoSuchNick,
    }

    pub(crate) struct Fixture {
        pub ctx: CommandContext,
        pub outbound: mpsc::UnboundedReceiver<Message>,
        _dir: tempfile::TempDir,
    }

    impl Fixture {
        pub(crate) async fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let db = Database::new(":memory:").await.unwrap();
            let kv = KvStore::open(dir.path().join("kv.redb"), Arc::new(Emitter::new())).unwrap();
            let (tx, outbound) = mpsc::unbounded_channel();
            let settings = AuthSettings {
                timeout: Duration::from_secs(5),
                late_reply_grace: Duration::from_millis(50),
                privilege_marker: 'r',
            };
            let auth = Arc::new(AuthMachine::new(
                ClientHandle::new("ChanServ", tx),
                db.clone(),
                settings,
            ));
            Self {
                ctx: CommandContext {
                    db,
                    auth,
                    tokens: TokenService::new(kv, Duration::from_secs(900)),
                    service_nick: "ChanServ".into(),
                },
                outbound,
                _dir: dir,
            }
        }
    }

    /// Drive `fut` to completion, answering every WHOIS it sends.
    pub(crate) async fn answering<F: Future>(
        outbound: &mut mpsc::UnboundedReceiver<Message>,
        auth: &Arc<AuthMachine>,
        reply: Whois<'_>,
        fut: F,
    ) -> F::Output {
        tokio::pin!(fut);
        loop {
            tokio::select! {
                out = &mut fut => return out,
                Some(msg) = outbound.recv() => {
                    assert_eq!(msg.command, "WHOIS");
                    let nick = &msg.params[0];
                    let lines = match reply {
                        Whois::Modes(modes) => vec![
                            format!(":irc.wetfish.net 379 ChanServ {nick} :is using modes +{modes}"),
                            format!(":irc.wetfish.net 318 ChanServ {nick} :End of /WHOIS list."),
                        ],
                        Whois::NoSuchNick => vec![
                            format!(":irc.wetfish.net 401 ChanServ {nick} :No such nick/channel"),
                        ],
                    };
                    for line in lines {
                        auth.on_raw(&line.parse().unwrap());
                    }
                }
            }
        }
    }

    pub(crate) fn source(nick: &str) -> Source {
        Source {
            nick: nick.into(),
            user: nick.into(),
            host: format!("{nick}.fish.host"),
        }
    }

    impl CommandContext {
        /// Context with throwaway stores, for handler-agnostic tests.
        pub(crate) async fn for_tests() -> Self {
            Fixture::new().await.ctx
        }
    }
}
