//! IRC protocol primitives used by the bot.
//!
//! Only the client side of the protocol is needed: parsing inbound lines,
//! serializing outbound commands, nickname casemapping, and the handful of
//! numerics the services care about.

mod casemap;
mod message;
mod response;

pub use casemap::{irc_eq, irc_to_lower};
pub use message::{Message, ParseError, Prefix};
pub use response::Response;

/// Channel-name sigil recognized by the command dispatcher.
pub const CHANNEL_SIGIL: char = '#';

/// Returns true when `target` names a channel rather than a user.
#[inline]
pub fn is_channel(target: &str) -> bool {
    target.starts_with(CHANNEL_SIGIL)
}
