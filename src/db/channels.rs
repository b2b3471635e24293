//! Channel access repository.
//!
//! Channel names are stored IRC-lowercased so `#Wetfish` and `#wetfish`
//! share one access list.

use super::{Database, DbError};
use crate::proto::irc_to_lower;
use std::fmt;

/// Access level on a channel. Owners outrank admins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AccessLevel {
    Admin,
    Owner,
}

impl AccessLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Owner => "owner",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(Self::Admin),
            "owner" => Some(Self::Owner),
            _ => None,
        }
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One access entry with the account's first registered name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessEntry {
    pub account_id: i64,
    pub name: Option<String>,
    pub level: AccessLevel,
    pub added: i64,
}

/// Repository for channel access operations.
pub struct ChannelRepository<'a> {
    db: &'a Database,
}

impl<'a> ChannelRepository<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Record `account_id` as owner if the channel has no owner yet.
    ///
    /// Returns true when ownership was recorded.
    pub async fn claim_owner(&self, channel: &str, account_id: i64) -> Result<bool, DbError> {
        let result = sqlx::query(
            r#"
            INSERT INTO channel_access (channel, account_id, level, added)
            SELECT ?1, ?2, 'owner', ?3
            WHERE NOT EXISTS (
                SELECT 1 FROM channel_access WHERE channel = ?1 AND level = 'owner'
            )
            ON CONFLICT(channel, account_id) DO UPDATE SET level = 'owner'
            "#,
        )
        .bind(irc_to_lower(channel))
        .bind(account_id)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.db.pool())
        .await
        .map_err(DbError::from);
        Ok(self.db.observe(result)?.rows_affected() > 0)
    }

    /// Set the account's level on the channel, replacing any previous level.
    pub async fn grant(
        &self,
        channel: &str,
        account_id: i64,
        level: AccessLevel,
    ) -> Result<(), DbError> {
        let result = sqlx::query(
            r#"
            INSERT INTO channel_access (channel, account_id, level, added)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(channel, account_id) DO UPDATE SET level = excluded.level
            "#,
        )
        .bind(irc_to_lower(channel))
        .bind(account_id)
        .bind(level.as_str())
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.db.pool())
        .await
        .map_err(DbError::from);
        self.db.observe(result)?;
        Ok(())
    }

    /// The account's level on the channel, if any.
    pub async fn level(
        &self,
        channel: &str,
        account_id: i64,
    ) -> Result<Option<AccessLevel>, DbError> {
        let result = sqlx::query_scalar::<_, String>(
            "SELECT level FROM channel_access WHERE channel = ? AND account_id = ?",
        )
        .bind(irc_to_lower(channel))
        .bind(account_id)
        .fetch_optional(&self.db.pool())
        .await
        .map_err(DbError::from);

        Ok(self
            .db
            .observe(result)?
            .as_deref()
            .and_then(AccessLevel::parse))
    }

    /// Every entry on the channel, owners first.
    pub async fn list(&self, channel: &str) -> Result<Vec<AccessEntry>, DbError> {
        let result = sqlx::query_as::<_, (i64, Option<String>, String, i64)>(
            r#"
            SELECT ca.account_id,
                   (SELECT n.name FROM names n WHERE n.account_id = ca.account_id
                    ORDER BY n.registered, n.rowid LIMIT 1),
                   ca.level,
                   ca.added
            FROM channel_access ca
            WHERE ca.channel = ?
            ORDER BY CASE ca.level WHEN 'owner' THEN 0 ELSE 1 END, ca.added, ca.rowid
            "#,
        )
        .bind(irc_to_lower(channel))
        .fetch_all(&self.db.pool())
        .await
        .map_err(DbError::from);

        Ok(self
            .db
            .observe(result)?
            .into_iter()
            .filter_map(|(account_id, name, level, added)| {
                Some(AccessEntry {
                    account_id,
                    name,
                    level: AccessLevel::parse(&level)?,
                    added,
                })
            })
            .collect())
    }
}
