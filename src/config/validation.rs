//! Configuration validation.
//!
//! Validates configuration at startup to catch common errors early.

use super::Config;
use crate::proto::is_channel;
use std::path::Path;
use thiserror::Error;

/// Validation errors for configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("irc.server is required")]
    MissingServer,
    #[error("irc.nick is required")]
    MissingNick,
    #[error("irc.channels entry is not a channel: {0}")]
    InvalidChannel(String),
    #[error("services.nick is required")]
    MissingServiceNick,
    #[error("services.privilege_marker must be an ASCII letter, got {0:?}")]
    InvalidPrivilegeMarker(char),
    #[error("services.auth_timeout_secs must be greater than zero")]
    ZeroAuthTimeout,
    #[error("services.token_ttl_secs must be greater than zero")]
    ZeroTokenTtl,
    #[error("database.path parent directory does not exist: {0}")]
    DatabasePathInvalid(String),
    #[error("store.path parent directory does not exist: {0}")]
    StorePathInvalid(String),
}

/// Validate a configuration, returning all errors found.
pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.irc.server.is_empty() {
        errors.push(ValidationError::MissingServer);
    }
    if config.irc.nick.is_empty() {
        errors.push(ValidationError::MissingNick);
    }
    for channel in &config.irc.channels {
        if !is_channel(channel) {
            errors.push(ValidationError::InvalidChannel(channel.clone()));
        }
    }

    let services = &config.services;
    if services.nick.is_empty() {
        errors.push(ValidationError::MissingServiceNick);
    }
    if !services.privilege_marker.is_ascii_alphabetic() {
        errors.push(ValidationError::InvalidPrivilegeMarker(
            services.privilege_marker,
        ));
    }
    if services.auth_timeout_secs == 0 {
        errors.push(ValidationError::ZeroAuthTimeout);
    }
    if services.token_ttl_secs == 0 {
        errors.push(ValidationError::ZeroTokenTtl);
    }

    if config.database.path != ":memory:" && !parent_exists(&config.database.path) {
        errors.push(ValidationError::DatabasePathInvalid(
            config.database.path.clone(),
        ));
    }
    if !parent_exists(&config.store.path) {
        errors.push(ValidationError::StorePathInvalid(config.store.path.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn parent_exists(path: &str) -> bool {
    match Path::new(path).parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.exists(),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_valid_config() -> String {
        r##"
[irc]
server = "irc.wetfish.net"
nick = "ChanServ"
channels = ["#wetfish"]
"##
        .to_string()
    }

    #[test]
    fn test_valid_config_passes() {
        let config: Config = toml::from_str(&minimal_valid_config()).unwrap();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_empty_server_fails() {
        let toml = r#"
[irc]
server = ""
nick = "ChanServ"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let errors = validate(&config).unwrap_err();
        assert!(errors.iter().any(|e| matches!(e, ValidationError::MissingServer)));
    }

    #[test]
    fn test_bad_channel_and_marker_reported_together() {
        let toml = r#"
[irc]
server = "irc.wetfish.net"
nick = "ChanServ"
channels = ["wetfish"]

[services]
privilege_marker = "+"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let errors = validate(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().any(|e| matches!(e, ValidationError::InvalidChannel(_))));
        assert!(
            errors
                .iter()
                .any(|e| matches!(e, ValidationError::InvalidPrivilegeMarker('+')))
        );
    }

    #[test]
    fn test_missing_database_dir_fails() {
        let toml = r#"
[irc]
server = "irc.wetfish.net"
nick = "ChanServ"

[database]
path = "/nonexistent/dir/chanserv.db"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let errors = validate(&config).unwrap_err();
        assert!(errors.iter().any(|e| matches!(e, ValidationError::DatabasePathInvalid(_))));
    }
}
