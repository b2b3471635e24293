//! REGISTER: claim a channel for the caller's account.

use super::{require_channel, require_login};
use crate::services::chanserv::{CommandContext, CommandHandler, CommandRequest};
use crate::services::{ServiceBase, ServiceEffect, ServiceResult};
use async_trait::async_trait;
use tracing::{info, warn};

pub(crate) const REGISTER_LOGIN_REQUIRED: &str = "Sorry! You need to be logged in to do this. Please register with NickServ before registering a channel.";

pub(crate) struct RegisterCommand;

#[async_trait]
impl CommandHandler for RegisterCommand {
    async fn handle(&self, ctx: &CommandContext, req: &CommandRequest) -> ServiceResult {
        let channel = match require_channel(ctx, req) {
            Ok(channel) => channel,
            Err(replies) => return replies,
        };
        let account = match require_login(ctx, req, REGISTER_LOGIN_REQUIRED).await {
            Ok(account) => account,
            Err(replies) => return replies,
        };
        let nick = &req.sender.nick;

        let mut effects = vec![
            ServiceEffect::Join {
                channel: channel.to_string(),
            },
            ServiceEffect::Names {
                channel: channel.to_string(),
            },
        ];

        // An already-owned channel is not refused; the caller just does not become owner.
        match ctx.db.channels().claim_owner(channel, account.account_id).await {
            Ok(true) => {
                info!(channel = %channel, owner = %nick, account_id = account.account_id, "Channel registered");
                effects.push(ctx.reply_effect(
                    nick,
                    &format!(
                        "Wow what a great channel! \x02{}\x02 is now registered to your account.",
                        channel
                    ),
                ));
            }
            Ok(false) => {
                effects.push(ctx.reply_effect(
                    nick,
                    &format!(
                        "Wow what a great channel! \x02{}\x02 already has an owner.",
                        channel
                    ),
                ));
            }
            Err(e) => {
                warn!(channel = %channel, error = %e, "Failed to record channel owner");
                effects.extend(ctx.store_failure(nick));
            }
        }
        effects
    }
}
