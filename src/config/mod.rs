//! Configuration loading and management.
//!
//! - [`types`]: config struct definitions and TOML loading
//! - [`validation`]: startup checks that collect every problem at once

mod types;
pub mod validation;

pub use types::{
    Config, ConfigError, DatabaseConfig, IrcConfig, OperConfig, ServicesConfig, StoreConfig,
};
