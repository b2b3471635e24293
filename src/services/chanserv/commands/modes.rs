//! MODE: set channel modes through the services' oper privileges.

use super::{LOGIN_REQUIRED, require_channel, require_level, require_login};
use crate::db::AccessLevel;
use crate::proto::Message;
use crate::services::chanserv::{CommandContext, CommandHandler, CommandRequest};
use crate::services::{ServiceBase, ServiceEffect, ServiceResult};
use async_trait::async_trait;
use tracing::info;

/// `mode [#channel] <modes> [params...]`
pub(crate) struct ModeCommand;

const SYNTAX: &str = "Syntax: mode #channel <+modes|-modes> [parameters]";

fn is_mode_string(modes: &str) -> bool {
    modes.len() > 1
        && modes.starts_with(['+', '-'])
        && modes.chars().all(|c| c == '+' || c == '-' || c.is_ascii_alphabetic())
}

/// A leading `:` would turn the parameter and everything after it into one
/// trailing argument on the wire.
fn is_mode_param(param: &str) -> bool {
    !param.starts_with(':')
}

/// Access needed to change `letter` through `mode`. `None` for letters that
/// only their own command grants.
fn letter_level(letter: char) -> Option<AccessLevel> {
    match letter {
        'q' => None,
        'a' => Some(AccessLevel::Owner),
        _ => Some(AccessLevel::Admin),
    }
}

#[async_trait]
impl CommandHandler for ModeCommand {
    async fn handle(&self, ctx: &CommandContext, req: &CommandRequest) -> ServiceResult {
        let channel = match require_channel(ctx, req) {
            Ok(channel) => channel,
            Err(replies) => return replies,
        };
        let nick = &req.sender.nick;
        let Some(modes) = req.args.first().filter(|m| is_mode_string(m)) else {
            return ctx.error_reply(nick, SYNTAX);
        };
        if !req.args[1..].iter().all(|p| is_mode_param(p)) {
            return ctx.error_reply(nick, SYNTAX);
        }
        let letters = modes.chars().filter(char::is_ascii_alphabetic);
        if letters.clone().any(|c| letter_level(c).is_none()) {
            return ctx.error_reply(
                nick,
                &format!(
                    "Channel ownership changes with: /msg {} owner {} <nick>",
                    ctx.service_nick, channel
                ),
            );
        }

        let account = match require_login(ctx, req, LOGIN_REQUIRED).await {
            Ok(account) => account,
            Err(replies) => return replies,
        };
        let level = match require_level(ctx, req, channel, &account, AccessLevel::Admin).await {
            Ok(level) => level,
            Err(replies) => return replies,
        };
        if let Some(needed) = letters
            .filter_map(letter_level)
            .filter(|needed| *needed > level)
            .max()
        {
            return ctx.error_reply(
                nick,
                &format!(
                    "You need \x02{}\x02 access on \x02{}\x02 to set \x02{}\x02.",
                    needed, channel, modes
                ),
            );
        }

        let mut params = Vec::with_capacity(req.args.len() + 1);
        params.push(channel.to_string());
        params.extend(req.args.iter().cloned());
        let applied = params[1..].join(" ");

        info!(channel = %channel, modes = %applied, by = %nick, "Channel modes set");
        vec![
            ServiceEffect::Send(Message::new("SAMODE", params)),
            ctx.reply_effect(
                nick,
                &format!("Set \x02{}\x02 on \x02{}\x02.", applied, channel),
            ),
        ]
    }
}
