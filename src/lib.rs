//! wetfish-chanserv - channel services for the Wetfish IRC network.
//!
//! The bot connects as an ordinary client, opers up, and takes the
//! `ChanServ` nick. Users are authenticated by correlating WHOIS replies
//! with the account directory shared with the website.

pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod http;
pub mod metrics;
pub mod modules;
pub mod proto;
pub mod services;
pub mod store;
pub mod telemetry;
