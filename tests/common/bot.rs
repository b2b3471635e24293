//! Bot process management.
//!
//! Spawns the `chanserv` binary against a [`TestNetwork`](super::TestNetwork).

use std::path::PathBuf;
use std::process::{Child, Command};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::AsyncWriteExt;
use tokio::net::UnixStream;
use tokio::time::sleep;
use wetfish_chanserv::db::Database;
use wetfish_chanserv::events::Emitter;

/// Nick the bot connects with.
pub const BOT_NICK: &str = "fishbot";

/// A running bot with its own database, token store, and IPC socket.
pub struct TestBot {
    child: Child,
    ipc_socket: PathBuf,
    _data_dir: TempDir,
}

impl TestBot {
    /// Seed `accounts` as `(origin, name)` pairs, then start the bot.
    pub async fn spawn(network_port: u16, accounts: &[(&str, &str)]) -> anyhow::Result<Self> {
        let data_dir = tempfile::tempdir()?;
        let db_path = data_dir.path().join("chanserv.db");
        let ipc_socket = data_dir.path().join("ipc.sock");

        let db = Database::connect(&db_path.display().to_string(), Arc::new(Emitter::new())).await?;
        for (origin, name) in accounts {
            db.accounts().register(origin, name).await?;
        }
        db.pool().close().await;

        let config_path = data_dir.path().join("config.toml");
        let config_content = format!(
            r#"
[irc]
server = "127.0.0.1"
port = {port}
nick = "{nick}"

[oper]
name = "services"
password = "testpass"

[services]
auth_timeout_secs = 3
late_reply_grace_ms = 200

[database]
path = "{db}"

[store]
path = "{kv}"
ipc_socket = "{ipc}"
"#,
            port = network_port,
            nick = BOT_NICK,
            db = db_path.display(),
            kv = data_dir.path().join("tokens.redb").display(),
            ipc = ipc_socket.display(),
        );
        std::fs::write(&config_path, config_content)?;

        let child = Command::new(env!("CARGO_BIN_EXE_chanserv"))
            .arg(&config_path)
            .env("RUST_LOG", "warn")
            .spawn()?;

        Ok(Self {
            child,
            ipc_socket,
            _data_dir: data_dir,
        })
    }

    /// Publish one IPC line, waiting for the socket to come up first.
    pub async fn publish(&self, channel: &str, payload: &str) -> anyhow::Result<()> {
        for _ in 0..50 {
            if let Ok(mut stream) = UnixStream::connect(&self.ipc_socket).await {
                stream
                    .write_all(format!("{channel} {payload}\n").as_bytes())
                    .await?;
                stream.shutdown().await?;
                return Ok(());
            }
            sleep(Duration::from_millis(100)).await;
        }
        anyhow::bail!("IPC socket never came up at {}", self.ipc_socket.display())
    }
}

impl Drop for TestBot {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
