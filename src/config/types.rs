//! Core configuration types and loading.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Bot configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// IRC connection settings.
    pub irc: IrcConfig,
    /// Operator credentials. Services need OPER for SANICK/SAMODE.
    pub oper: Option<OperConfig>,
    /// Service behavior (auth timing, tokens).
    #[serde(default)]
    pub services: ServicesConfig,
    /// Relational store.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Key/value store and IPC.
    #[serde(default)]
    pub store: StoreConfig,
    /// Prometheus metrics HTTP port (disabled when unset).
    pub metrics_port: Option<u16>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

/// IRC connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct IrcConfig {
    /// Server hostname (e.g., "irc.wetfish.net").
    pub server: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Connect-time nickname. The bot renames itself to `services.nick` once opered.
    pub nick: String,
    #[serde(default = "default_username")]
    pub username: String,
    #[serde(default = "default_realname")]
    pub realname: String,
    /// Server password (PASS), if the network requires one.
    pub password: Option<String>,
    /// Channels joined after registration.
    #[serde(default)]
    pub channels: Vec<String>,
}

impl Default for IrcConfig {
    fn default() -> Self {
        Self {
            server: "localhost".to_string(),
            port: default_port(),
            nick: "ChanServ".to_string(),
            username: default_username(),
            realname: default_realname(),
            password: None,
            channels: Vec::new(),
        }
    }
}

/// OPER credentials.
#[derive(Debug, Clone, Deserialize)]
pub struct OperConfig {
    pub name: String,
    pub password: String,
}

/// Services configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServicesConfig {
    /// Nickname taken via SANICK once the bot is an operator (default: "ChanServ").
    #[serde(default = "default_service_nick")]
    pub nick: String,
    /// Upper bound on a WHOIS round-trip before authentication fails (default: 10).
    #[serde(default = "default_auth_timeout")]
    pub auth_timeout_secs: u64,
    /// How long to wait for a modes line that trails END OF WHOIS (default: 2000).
    #[serde(default = "default_late_reply_grace")]
    pub late_reply_grace_ms: u64,
    /// User mode that marks an identified user (default: 'r').
    #[serde(default = "default_privilege_marker")]
    pub privilege_marker: char,
    /// Lifetime of issued tokens (default: 900).
    #[serde(default = "default_token_ttl")]
    pub token_ttl_secs: u64,
}

impl ServicesConfig {
    pub fn auth_timeout(&self) -> Duration {
        Duration::from_secs(self.auth_timeout_secs)
    }

    pub fn late_reply_grace(&self) -> Duration {
        Duration::from_millis(self.late_reply_grace_ms)
    }

    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl_secs)
    }
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            nick: default_service_nick(),
            auth_timeout_secs: default_auth_timeout(),
            late_reply_grace_ms: default_late_reply_grace(),
            privilege_marker: default_privilege_marker(),
            token_ttl_secs: default_token_ttl(),
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file, or ":memory:".
    #[serde(default = "default_database_path")]
    pub path: String,
    /// Fixed delay before reconnecting after a lost connection (default: 3).
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_secs: u64,
}

impl DatabaseConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            reconnect_delay_secs: default_reconnect_delay(),
        }
    }
}

/// Key/value store configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Path to the redb file holding tokens.
    #[serde(default = "default_store_path")]
    pub path: String,
    /// Unix socket accepting IPC notifications, one `channel payload` line each.
    pub ipc_socket: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            ipc_socket: None,
        }
    }
}

fn default_port() -> u16 {
    6667
}

fn default_username() -> String {
    "chanserv".to_string()
}

fn default_realname() -> String {
    "Channel Services".to_string()
}

fn default_service_nick() -> String {
    "ChanServ".to_string()
}

fn default_auth_timeout() -> u64 {
    10
}

fn default_late_reply_grace() -> u64 {
    2000
}

fn default_privilege_marker() -> char {
    'r'
}

fn default_token_ttl() -> u64 {
    900
}

fn default_database_path() -> String {
    "chanserv.db".to_string()
}

fn default_reconnect_delay() -> u64 {
    3
}

fn default_store_path() -> String {
    "chanserv.redb".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn services_defaults() {
        let config = ServicesConfig::default();
        assert_eq!(config.nick, "ChanServ");
        assert_eq!(config.auth_timeout(), Duration::from_secs(10));
        assert_eq!(config.late_reply_grace(), Duration::from_millis(2000));
        assert_eq!(config.privilege_marker, 'r');
        assert_eq!(config.token_ttl(), Duration::from_secs(900));
    }

    #[test]
    fn database_reconnect_delay_is_three_seconds() {
        assert_eq!(
            DatabaseConfig::default().reconnect_delay(),
            Duration::from_secs(3)
        );
    }

    #[test]
    fn full_config_parses() {
        let toml = r##"
metrics_port = 9100

[irc]
server = "irc.wetfish.net"
port = 6697
nick = "fishbot"
channels = ["#wetfish", "#botspam"]

[oper]
name = "services"
password = "hunter2"

[services]
auth_timeout_secs = 5
token_ttl_secs = 60

[database]
path = "/var/lib/chanserv/chanserv.db"

[store]
path = "/var/lib/chanserv/tokens.redb"
ipc_socket = "/run/chanserv.sock"
"##;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.irc.port, 6697);
        assert_eq!(config.irc.channels.len(), 2);
        assert_eq!(config.irc.username, "chanserv");
        assert_eq!(config.oper.as_ref().map(|o| o.name.as_str()), Some("services"));
        assert_eq!(config.services.auth_timeout_secs, 5);
        assert_eq!(config.services.nick, "ChanServ");
        assert_eq!(config.database.reconnect_delay_secs, 3);
        assert_eq!(config.store.ipc_socket.as_deref(), Some("/run/chanserv.sock"));
        assert_eq!(config.metrics_port, Some(9100));
    }
}
