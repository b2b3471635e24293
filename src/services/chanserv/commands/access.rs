//! Access control commands: ACCESS (inspect) and ADMIN (grant).

use super::{LOGIN_REQUIRED, require_account, require_channel, require_level, require_login};
use crate::db::AccessLevel;
use crate::proto::Message;
use crate::services::chanserv::{CommandContext, CommandHandler, CommandRequest};
use crate::services::{ServiceBase, ServiceEffect, ServiceResult};
use async_trait::async_trait;
use tracing::{info, warn};

/// `access [#channel] [nick]`
pub(crate) struct AccessCommand;

#[async_trait]
impl CommandHandler for AccessCommand {
    async fn handle(&self, ctx: &CommandContext, req: &CommandRequest) -> ServiceResult {
        let channel = match require_channel(ctx, req) {
            Ok(channel) => channel,
            Err(replies) => return replies,
        };
        if let Err(replies) = require_login(ctx, req, LOGIN_REQUIRED).await {
            return replies;
        }
        let nick = &req.sender.nick;

        match req.args.first() {
            None => list_access(ctx, nick, channel).await,
            Some(alias) => {
                let account = match require_account(ctx, req, alias).await {
                    Ok(account) => account,
                    Err(replies) => return replies,
                };
                match ctx.db.channels().level(channel, account.account_id).await {
                    Ok(Some(level)) => ctx.error_reply(
                        nick,
                        &format!("\x02{}\x02 has \x02{}\x02 access on \x02{}\x02.", alias, level, channel),
                    ),
                    Ok(None) => ctx.error_reply(
                        nick,
                        &format!("\x02{}\x02 has no access on \x02{}\x02.", alias, channel),
                    ),
                    Err(e) => {
                        warn!(channel = %channel, error = %e, "Failed to read access");
                        ctx.store_failure(nick)
                    }
                }
            }
        }
    }
}

async fn list_access(ctx: &CommandContext, nick: &str, channel: &str) -> ServiceResult {
    let entries = match ctx.db.channels().list(channel).await {
        Ok(entries) => entries,
        Err(e) => {
            warn!(channel = %channel, error = %e, "Failed to list access");
            return ctx.store_failure(nick);
        }
    };

    if entries.is_empty() {
        return ctx.error_reply(
            nick,
            &format!("\x02{}\x02 has no access entries.", channel),
        );
    }

    let mut effects = vec![ctx.reply_effect(nick, &format!("Access list for \x02{}\x02:", channel))];
    for (i, entry) in entries.iter().enumerate() {
        let who = entry
            .name
            .clone()
            .unwrap_or_else(|| format!("account #{}", entry.account_id));
        effects.push(ctx.reply_effect(
            nick,
            &format!("  {:>2}  {:<6} {}", i + 1, entry.level, who),
        ));
    }
    effects.push(ctx.reply_effect(nick, &format!("End of access list ({} entries).", entries.len())));
    effects
}

/// `admin [#channel] <nick>`
pub(crate) struct AdminCommand;

#[async_trait]
impl CommandHandler for AdminCommand {
    async fn handle(&self, ctx: &CommandContext, req: &CommandRequest) -> ServiceResult {
        let channel = match require_channel(ctx, req) {
            Ok(channel) => channel,
            Err(replies) => return replies,
        };
        let nick = &req.sender.nick;
        let Some(alias) = req.args.first() else {
            return ctx.error_reply(nick, "Syntax: admin #channel <nick>");
        };

        let caller = match require_login(ctx, req, LOGIN_REQUIRED).await {
            Ok(account) => account,
            Err(replies) => return replies,
        };
        if let Err(replies) = require_level(ctx, req, channel, &caller, AccessLevel::Owner).await {
            return replies;
        }
        let target = match require_account(ctx, req, alias).await {
            Ok(account) => account,
            Err(replies) => return replies,
        };

        if let Err(e) = ctx
            .db
            .channels()
            .grant(channel, target.account_id, AccessLevel::Admin)
            .await
        {
            warn!(channel = %channel, alias = %alias, error = %e, "Failed to grant admin");
            return ctx.store_failure(nick);
        }

        info!(channel = %channel, alias = %alias, by = %nick, "Admin granted");
        vec![
            ServiceEffect::Send(Message::new(
                "SAMODE",
                vec![channel.to_string(), "+a".to_string(), alias.clone()],
            )),
            ctx.reply_effect(
                nick,
                &format!("\x02{}\x02 is now an admin of \x02{}\x02.", alias, channel),
            ),
        ]
    }
}
