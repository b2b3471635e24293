//! Channel services.
//!
//! - [`auth`]: WHOIS-backed authentication state machine
//! - [`tokens`]: short-lived action tokens
//! - [`chanserv`]: the ChanServ command set and its module

pub mod auth;
pub mod base;
pub mod chanserv;
pub mod tokens;

pub use auth::{AuthFailure, AuthMachine, AuthOutcome, AuthSettings};
pub use base::{ServiceBase, ServiceResult};
pub use tokens::{TokenError, TokenPayload, TokenService};

use crate::client::ClientHandle;
use crate::error::ClientError;
use crate::proto::Message;
use tracing::{debug, warn};

/// Effect returned by service commands.
///
/// Handlers produce effects; the module applies them to the client. This
/// keeps handler logic testable without a live connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceEffect {
    /// NOTICE to a user.
    Reply { target: String, text: String },

    /// Join a channel.
    Join { channel: String },

    /// Request the member list of a channel.
    Names { channel: String },

    /// Send a raw message (SAMODE, SANICK).
    Send(Message),
}

/// Apply a list of service effects in order.
///
/// Stops at the first send failure; the connection is gone by then.
pub fn apply_effects(client: &ClientHandle, effects: Vec<ServiceEffect>) -> Result<(), ClientError> {
    for effect in effects {
        apply_effect(client, effect)?;
    }
    Ok(())
}

fn apply_effect(client: &ClientHandle, effect: ServiceEffect) -> Result<(), ClientError> {
    match effect {
        ServiceEffect::Reply { target, text } => client.notice(&target, &text),
        ServiceEffect::Join { channel } => {
            debug!(channel = %channel, "Joining channel");
            client.join(&channel)
        }
        ServiceEffect::Names { channel } => client.names(&channel),
        ServiceEffect::Send(msg) => {
            debug!(command = %msg.command, "Sending service message");
            client.send(msg)
        }
    }
    .inspect_err(|e| warn!(error = %e, "Failed to apply service effect"))
}
