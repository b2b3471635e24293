//! OWNER: two-step ownership grant.
//!
//! `owner #channel <nick>` issues a token bound to the caller and the exact
//! grant; `owner #channel confirm <token>` redeems it. The token is revoked
//! before the grant is written, so it works once.

use super::{LOGIN_REQUIRED, require_account, require_channel, require_level, require_login};
use crate::db::AccessLevel;
use crate::proto::{Message, irc_eq, irc_to_lower};
use crate::services::chanserv::{CommandContext, CommandHandler, CommandRequest};
use crate::services::{ServiceBase, ServiceEffect, ServiceResult, TokenPayload};
use async_trait::async_trait;
use tracing::{info, warn};

const SYNTAX: &str = "Syntax: owner #channel <nick>, then owner #channel confirm <token>";
const BAD_TOKEN: &str = "That confirmation token is invalid or has expired.";

pub(crate) struct OwnerCommand;

#[async_trait]
impl CommandHandler for OwnerCommand {
    async fn handle(&self, ctx: &CommandContext, req: &CommandRequest) -> ServiceResult {
        let channel = match require_channel(ctx, req) {
            Ok(channel) => channel,
            Err(replies) => return replies,
        };
        match req.args.as_slice() {
            [word, token] if word.eq_ignore_ascii_case("confirm") => {
                confirm(ctx, req, channel, token).await
            }
            [alias] if !alias.eq_ignore_ascii_case("confirm") => {
                start(ctx, req, channel, alias).await
            }
            _ => ctx.error_reply(&req.sender.nick, SYNTAX),
        }
    }
}

fn grant_command(channel: &str, alias: &str) -> String {
    format!("owner {} {}", irc_to_lower(channel), alias)
}

async fn start(ctx: &CommandContext, req: &CommandRequest, channel: &str, alias: &str) -> ServiceResult {
    let nick = &req.sender.nick;
    let caller = match require_login(ctx, req, LOGIN_REQUIRED).await {
        Ok(account) => account,
        Err(replies) => return replies,
    };
    if let Err(replies) = require_level(ctx, req, channel, &caller, AccessLevel::Owner).await {
        return replies;
    }
    if let Err(replies) = require_account(ctx, req, alias).await {
        return replies;
    }

    let payload = TokenPayload {
        user: irc_to_lower(nick),
        command: grant_command(channel, alias),
    };
    let token = match ctx.tokens.issue(&payload) {
        Ok(token) => token,
        Err(e) => {
            warn!(channel = %channel, error = %e, "Failed to issue owner token");
            return ctx.error_reply(nick, "Sorry! A confirmation token could not be created. Please try again later.");
        }
    };

    let minutes = ctx.tokens.ttl().as_secs().div_ceil(60);
    let instruction = format!(
        "/msg {} owner {} confirm {}",
        ctx.service_nick, channel, token
    );
    let intro = format!(
        "To make \x02{}\x02 an owner of \x02{}\x02, confirm within {} minutes with:",
        alias, channel, minutes
    );
    ctx.reply_effects(nick, &[intro.as_str(), instruction.as_str()])
}

async fn confirm(ctx: &CommandContext, req: &CommandRequest, channel: &str, token: &str) -> ServiceResult {
    let nick = &req.sender.nick;
    let caller = match require_login(ctx, req, LOGIN_REQUIRED).await {
        Ok(account) => account,
        Err(replies) => return replies,
    };

    let payload = match ctx.tokens.redeem(token) {
        Ok(Some(payload)) => payload,
        Ok(None) => return ctx.error_reply(nick, BAD_TOKEN),
        Err(e) => {
            warn!(error = %e, "Failed to read owner token");
            return ctx.store_failure(nick);
        }
    };

    let mut parts = payload.command.split(' ');
    let (Some("owner"), Some(bound_channel), Some(alias), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        warn!(command = %payload.command, "Owner token carries an unexpected command");
        return ctx.error_reply(nick, BAD_TOKEN);
    };
    if !irc_eq(&payload.user, nick) || !irc_eq(bound_channel, channel) {
        return ctx.error_reply(nick, BAD_TOKEN);
    }

    if let Err(replies) = require_level(ctx, req, channel, &caller, AccessLevel::Owner).await {
        return replies;
    }
    let target = match require_account(ctx, req, alias).await {
        Ok(account) => account,
        Err(replies) => return replies,
    };

    match ctx.tokens.revoke(token) {
        Ok(true) => {}
        // Another confirm got there first.
        Ok(false) => return ctx.error_reply(nick, BAD_TOKEN),
        Err(e) => {
            warn!(error = %e, "Failed to revoke owner token");
            return ctx.store_failure(nick);
        }
    }

    if let Err(e) = ctx
        .db
        .channels()
        .grant(channel, target.account_id, AccessLevel::Owner)
        .await
    {
        warn!(channel = %channel, alias = %alias, error = %e, "Failed to grant owner");
        return ctx.store_failure(nick);
    }

    info!(channel = %channel, alias = %alias, by = %nick, "Owner granted");
    vec![
        ServiceEffect::Send(Message::new(
            "SAMODE",
            vec![channel.to_string(), "+q".to_string(), alias.to_string()],
        )),
        ctx.reply_effect(
            nick,
            &format!("\x02{}\x02 is now an owner of \x02{}\x02.", alias, channel),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::chanserv::parse_command;
    use crate::services::chanserv::testing::{Fixture, Whois, answering, source};

    async fn setup(fx: &Fixture) -> i64 {
        let alice = fx.ctx.db.accounts().register("web:1", "alice").await.unwrap();
        let bob = fx.ctx.db.accounts().register("web:2", "bob").await.unwrap();
        fx.ctx
            .db
            .channels()
            .claim_owner("#wetfish", alice.account_id)
            .await
            .unwrap();
        bob.account_id
    }

    async fn run(fx: &mut Fixture, nick: &str, dest: &str, text: &str) -> ServiceResult {
        let req = parse_command(&source(nick), dest, text).unwrap();
        answering(
            &mut fx.outbound,
            &fx.ctx.auth,
            Whois::Modes("r"),
            OwnerCommand.handle(&fx.ctx, &req),
        )
        .await
    }

    fn issued_token(effects: &ServiceResult) -> String {
        match effects.last() {
            Some(ServiceEffect::Reply { text, .. }) => {
                text.rsplit(' ').next().unwrap().to_string()
            }
            other => panic!("unexpected reply: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_owner_grant_round_trip() {
        let mut fx = Fixture::new().await;
        let bob = setup(&fx).await;

        let started = run(&mut fx, "alice", "#wetfish", "owner bob").await;
        assert_eq!(started.len(), 2);
        assert!(matches!(&started[0], ServiceEffect::Reply { text, .. } if text.contains("15 minutes")));
        let token = issued_token(&started);
        assert_eq!(token.len(), 64);
        assert_eq!(
            fx.ctx.tokens.redeem(&token).unwrap(),
            Some(TokenPayload {
                user: "alice".into(),
                command: "owner #wetfish bob".into(),
            })
        );

        let confirmed = run(&mut fx, "Alice", "ChanServ", &format!("owner #WetFish confirm {token}")).await;
        assert_eq!(
            confirmed[0],
            ServiceEffect::Send(Message::new(
                "SAMODE",
                vec!["#WetFish".into(), "+q".into(), "bob".into()]
            ))
        );
        assert_eq!(
            fx.ctx.db.channels().level("#wetfish", bob).await.unwrap(),
            Some(AccessLevel::Owner)
        );
        assert_eq!(fx.ctx.tokens.redeem(&token).unwrap(), None);

        let replay = run(&mut fx, "alice", "#wetfish", &format!("owner confirm {token}")).await;
        assert_eq!(
            replay,
            [ServiceEffect::Reply {
                target: "alice".into(),
                text: BAD_TOKEN.into(),
            }]
        );
    }

    #[tokio::test]
    async fn test_token_is_bound_to_its_issuer_and_channel() {
        let mut fx = Fixture::new().await;
        let bob = setup(&fx).await;
        let token = issued_token(&run(&mut fx, "alice", "#wetfish", "owner bob").await);

        let stolen = run(&mut fx, "bob", "#wetfish", &format!("owner confirm {token}")).await;
        assert_eq!(stolen.len(), 1);
        let elsewhere = run(&mut fx, "alice", "#other", &format!("owner confirm {token}")).await;
        assert_eq!(elsewhere.len(), 1);

        assert_eq!(
            fx.ctx.db.channels().level("#wetfish", bob).await.unwrap(),
            None
        );
        assert!(fx.ctx.tokens.redeem(&token).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_only_owner_can_start_grant() {
        let mut fx = Fixture::new().await;
        setup(&fx).await;

        let effects = run(&mut fx, "bob", "#wetfish", "owner bob").await;
        assert_eq!(
            effects,
            [ServiceEffect::Reply {
                target: "bob".into(),
                text: "You need \x02owner\x02 access on \x02#wetfish\x02 to do this.".into(),
            }]
        );
    }

    #[tokio::test]
    async fn test_unknown_token_is_rejected() {
        let mut fx = Fixture::new().await;
        setup(&fx).await;

        let effects = run(&mut fx, "alice", "#wetfish", "owner confirm deadbeef").await;
        assert_eq!(
            effects,
            [ServiceEffect::Reply {
                target: "alice".into(),
                text: BAD_TOKEN.into(),
            }]
        );
    }

    #[tokio::test]
    async fn test_missing_arguments_show_syntax() {
        let fx = Fixture::new().await;
        let req = parse_command(&source("alice"), "#wetfish", "owner").unwrap();
        let effects = OwnerCommand.handle(&fx.ctx, &req).await;
        assert_eq!(
            effects,
            [ServiceEffect::Reply {
                target: "alice".into(),
                text: SYNTAX.into(),
            }]
        );
    }
}
