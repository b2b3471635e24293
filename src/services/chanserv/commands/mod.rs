//! ChanServ command handlers.
//!
//! Shared gatekeeping lives here: channel context, login, and access level.
//! Each gate returns `Err(replies)` when the caller should be turned away.

mod access;
mod modes;
mod owner;
mod register;

use super::{CommandContext, CommandHandler, CommandRequest};
use crate::db::{Account, AccessLevel};
use crate::services::{AuthOutcome, ServiceBase, ServiceResult};
use tracing::{debug, warn};

pub(crate) const LOGIN_REQUIRED: &str = "Sorry! You need to be logged in to do this.";

/// The ChanServ handler table.
pub(crate) fn handlers() -> Vec<(&'static str, Box<dyn CommandHandler>)> {
    vec![
        ("register", Box::new(register::RegisterCommand) as Box<dyn CommandHandler>),
        ("mode", Box::new(modes::ModeCommand) as Box<dyn CommandHandler>),
        ("access", Box::new(access::AccessCommand) as Box<dyn CommandHandler>),
        ("admin", Box::new(access::AdminCommand) as Box<dyn CommandHandler>),
        ("owner", Box::new(owner::OwnerCommand) as Box<dyn CommandHandler>),
    ]
}

/// The request's channel, or the "use it in a channel" guidance.
pub(crate) fn require_channel<'r>(
    ctx: &CommandContext,
    req: &'r CommandRequest,
) -> Result<&'r str, ServiceResult> {
    req.channel().ok_or_else(|| {
        let example = format!(
            "For example: /msg {} {} #wetfish",
            ctx.service_nick, req.command
        );
        ctx.reply_effects(
            &req.sender.nick,
            &[
                "This command must be used in a channel or by specifying the channel as the first parameter.",
                example.as_str(),
            ],
        )
    })
}

/// Authenticate the sender and record the login.
///
/// `denial` is the reply for any failed authentication.
pub(crate) async fn require_login(
    ctx: &CommandContext,
    req: &CommandRequest,
    denial: &str,
) -> Result<Account, ServiceResult> {
    let nick = &req.sender.nick;
    let account = match ctx.auth.authenticate(nick).await {
        AuthOutcome::Authenticated(account) => account,
        AuthOutcome::Denied(reason) => {
            debug!(nick = %nick, reason = reason.as_str(), "Login required");
            return Err(ctx.error_reply(nick, denial));
        }
    };

    let accounts = ctx.db.accounts();
    if let Err(e) = accounts.login(nick).await {
        warn!(nick = %nick, error = %e, "Failed to record login");
    }
    if !req.sender.host.is_empty()
        && let Err(e) = accounts.set_host(nick, &req.sender.host).await
    {
        warn!(nick = %nick, error = %e, "Failed to record host");
    }
    Ok(account)
}

/// The caller's level on `channel`, if it is at least `minimum`.
pub(crate) async fn require_level(
    ctx: &CommandContext,
    req: &CommandRequest,
    channel: &str,
    account: &Account,
    minimum: AccessLevel,
) -> Result<AccessLevel, ServiceResult> {
    match ctx.db.channels().level(channel, account.account_id).await {
        Ok(Some(level)) if level >= minimum => Ok(level),
        Ok(_) => Err(ctx.error_reply(
            &req.sender.nick,
            &format!(
                "You need \x02{}\x02 access on \x02{}\x02 to do this.",
                minimum, channel
            ),
        )),
        Err(e) => {
            warn!(channel = %channel, error = %e, "Failed to check channel access");
            Err(ctx.store_failure(&req.sender.nick))
        }
    }
}

/// The account registered under `alias`, or a "not registered" reply.
pub(crate) async fn require_account(
    ctx: &CommandContext,
    req: &CommandRequest,
    alias: &str,
) -> Result<Account, ServiceResult> {
    match ctx.db.accounts().find_by_alias(alias).await {
        Ok(account) if account.is_empty() => Err(ctx.error_reply(
            &req.sender.nick,
            &format!("\x02{}\x02 is not a registered nickname.", alias),
        )),
        Ok(account) => Ok(account),
        Err(e) => {
            warn!(alias = %alias, error = %e, "Failed to look up account");
            Err(ctx.store_failure(&req.sender.nick))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::ServiceEffect;
    use crate::services::chanserv::parse_command;
    use crate::services::chanserv::testing::{Fixture, Whois, answering, source};

    #[tokio::test]
    async fn test_require_channel_guidance_names_the_command() {
        let fx = Fixture::new().await;
        let req = parse_command(&source("alice"), "ChanServ", "access").unwrap();

        let replies = require_channel(&fx.ctx, &req).unwrap_err();
        assert_eq!(replies.len(), 2);
        assert_eq!(
            replies[1],
            ServiceEffect::Reply {
                target: "alice".into(),
                text: "For example: /msg ChanServ access #wetfish".into(),
            }
        );
    }

    #[tokio::test]
    async fn test_require_login_records_activity_and_host() {
        let mut fx = Fixture::new().await;
        fx.ctx.db.accounts().register("web:1", "alice").await.unwrap();
        let req = parse_command(&source("alice"), "#wetfish", "access").unwrap();

        let account = answering(
            &mut fx.outbound,
            &fx.ctx.auth,
            Whois::Modes("ir"),
            require_login(&fx.ctx, &req, LOGIN_REQUIRED),
        )
        .await
        .unwrap();
        assert_eq!(account.origin_id, "web:1");

        let refreshed = fx.ctx.db.accounts().find_by_alias("alice").await.unwrap();
        assert_eq!(refreshed.host.as_deref(), Some("alice.fish.host"));
    }

    #[tokio::test]
    async fn test_require_login_denies_offline_user() {
        let mut fx = Fixture::new().await;
        fx.ctx.db.accounts().register("web:1", "alice").await.unwrap();
        let req = parse_command(&source("alice"), "#wetfish", "access").unwrap();

        let replies = answering(
            &mut fx.outbound,
            &fx.ctx.auth,
            Whois::NoSuchNick,
            require_login(&fx.ctx, &req, LOGIN_REQUIRED),
        )
        .await
        .unwrap_err();
        assert_eq!(
            replies,
            [ServiceEffect::Reply {
                target: "alice".into(),
                text: LOGIN_REQUIRED.into(),
            }]
        );
    }
}
