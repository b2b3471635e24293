//! Integration test common infrastructure.
//!
//! The bot under test is the real `chanserv` binary. Tests play the IRC
//! server: [`TestNetwork`] accepts the bot's connection and scripts the
//! server side, [`TestBot`] owns the process and its data directory.

pub mod bot;
pub mod server;

#[allow(unused_imports)]
pub use bot::TestBot;
#[allow(unused_imports)]
pub use server::{BotLink, TestNetwork};
