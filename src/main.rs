//! chanserv - Wetfish channel services bot.

use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use wetfish_chanserv::client::Connection;
use wetfish_chanserv::config::{Config, validation};
use wetfish_chanserv::db::Database;
use wetfish_chanserv::events::Emitter;
use wetfish_chanserv::modules::{Core, ModelModule, ModuleHost};
use wetfish_chanserv::services::chanserv::ChanServModule;
use wetfish_chanserv::store::{Ipc, KvStore, serve_unix};
use wetfish_chanserv::{http, metrics};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    let config = Config::load(&config_path).map_err(|e| {
        error!(path = %config_path, error = %e, "Failed to load config");
        e
    })?;

    if let Err(errors) = validation::validate(&config) {
        for e in &errors {
            error!(error = %e, "Invalid configuration");
        }
        return Err(anyhow::anyhow!(
            "{} configuration error(s) in {}",
            errors.len(),
            config_path
        ));
    }

    info!(
        server = %config.irc.server,
        nick = %config.irc.nick,
        service_nick = %config.services.nick,
        "Starting chanserv"
    );

    match config.metrics_port {
        Some(port) if port != 0 => {
            metrics::init();
            tokio::spawn(async move {
                http::run_http_server(port).await;
            });
            info!(port, "Prometheus HTTP server started");
        }
        _ => info!("Metrics disabled"),
    }

    let store_events = Arc::new(Emitter::new());
    let db = Database::connect(&config.database.path, store_events.clone()).await?;
    let kv = KvStore::open(&config.store.path, store_events.clone())?;

    let (client, connection) = Connection::connect(&config.irc, config.oper.clone()).await?;
    if config.oper.is_none() {
        warn!("No [oper] block configured; SANICK and SAMODE will be refused by the server");
    }

    let ipc = Ipc::new();
    if let Some(ref socket) = config.store.ipc_socket {
        let (socket, ipc) = (socket.clone(), ipc.clone());
        tokio::spawn(async move {
            if let Err(e) = serve_unix(&socket, ipc).await {
                error!(path = %socket, error = %e, "IPC listener failed");
            }
        });
    }

    let core = Arc::new(Core {
        config: Arc::new(config),
        client,
        db: db.clone(),
        kv: kv.clone(),
        ipc,
        store_events,
    });
    let mut host = ModuleHost::new(
        core,
        vec![Box::new(ModelModule::new()), Box::new(ChanServModule::new())],
    );
    host.load_all()?;

    // Modules are listening now; announce both stores.
    db.ready();
    kv.ready();

    let result = tokio::select! {
        res = connection.run() => res.map_err(anyhow::Error::from),
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown requested");
            Ok(())
        }
    };

    host.unload_all();
    info!("Shutdown complete");
    result
}
