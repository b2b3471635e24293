//! Command parsing and routing.
//!
//! The dispatcher only routes. Each handler decides for itself whether the
//! caller must authenticate or hold channel access.

use super::CommandContext;
use crate::client::Source;
use crate::error::ModuleError;
use crate::proto::is_channel;
use crate::services::ServiceResult;
use crate::telemetry::{CommandTimer, spans};
use async_trait::async_trait;
use std::collections::HashMap;
use tracing::{Instrument, debug};

/// Commands ChanServ answers to. Anything else is ignored silently.
pub const COMMANDS: [&str; 5] = ["register", "mode", "access", "admin", "owner"];

/// A parsed command, after the channel override has been applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
    pub command: &'static str,
    pub sender: Source,
    /// A channel, or the bot's own nick for a private message.
    pub destination: String,
    pub args: Vec<String>,
}

impl CommandRequest {
    /// The target channel, if the destination is one.
    pub fn channel(&self) -> Option<&str> {
        is_channel(&self.destination).then_some(self.destination.as_str())
    }
}

/// Split `text` into a recognized command and its arguments.
///
/// A first argument starting with `#` replaces `destination` and is removed
/// from the arguments.
pub fn parse_command(sender: &Source, destination: &str, text: &str) -> Option<CommandRequest> {
    let mut words = text.split_whitespace();
    let word = words.next()?;
    let command = COMMANDS
        .iter()
        .copied()
        .find(|c| c.eq_ignore_ascii_case(word))?;

    let mut args: Vec<String> = words.map(str::to_string).collect();
    let destination = if args.first().is_some_and(|a| is_channel(a)) {
        args.remove(0)
    } else {
        destination.to_string()
    };

    Some(CommandRequest {
        command,
        sender: sender.clone(),
        destination,
        args,
    })
}

#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn handle(&self, ctx: &CommandContext, req: &CommandRequest) -> ServiceResult;
}

/// Explicit command -> handler table, complete by construction.
pub struct Dispatcher {
    handlers: HashMap<&'static str, Box<dyn CommandHandler>>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut commands: Vec<_> = self.handlers.keys().collect();
        commands.sort();
        f.debug_struct("Dispatcher")
            .field("commands", &commands)
            .finish()
    }
}

impl Dispatcher {
    /// Build the table. Fails unless every declared command has exactly one
    /// handler and no handler is registered for an undeclared command.
    pub fn new(entries: Vec<(&'static str, Box<dyn CommandHandler>)>) -> Result<Self, ModuleError> {
        let mut handlers = HashMap::with_capacity(entries.len());
        for (command, handler) in entries {
            if !COMMANDS.contains(&command) {
                return Err(ModuleError::UndeclaredCommand(command));
            }
            if handlers.insert(command, handler).is_some() {
                return Err(ModuleError::DuplicateHandler(command));
            }
        }
        if let Some(missing) = COMMANDS.iter().find(|c| !handlers.contains_key(*c)) {
            return Err(ModuleError::MissingHandler(*missing));
        }
        Ok(Self { handlers })
    }

    /// Dispatcher wired to the ChanServ command handlers.
    pub fn chanserv() -> Result<Self, ModuleError> {
        Self::new(super::commands::handlers())
    }

    /// Route one chat message. `None` when the text is not a command.
    pub async fn dispatch(
        &self,
        ctx: &CommandContext,
        sender: &Source,
        destination: &str,
        text: &str,
    ) -> Option<ServiceResult> {
        let req = parse_command(sender, destination, text)?;
        let handler = self.handlers.get(req.command)?;

        debug!(command = req.command, source = %sender.nick, target = %req.destination, "Dispatching command");
        let span = spans::command(req.command, &sender.nick, &req.destination);
        let _timer = CommandTimer::new(req.command);
        Some(handler.handle(ctx, &req).instrument(span).await)
    }
}
