//! Account directory: accounts and the names registered to them.
//!
//! Names match under RFC 1459 case folding, the same rule the server uses
//! for nicknames.

use super::{Database, DbError};
use crate::proto::irc_to_lower;
use sqlx::{QueryBuilder, Sqlite};

/// An account and its names, ordered by registration time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub account_id: i64,
    pub origin_id: String,
    pub host: Option<String>,
    pub names_count: i64,
    pub names: Vec<Name>,
}

impl Account {
    /// The shape returned for a lookup with no match.
    pub fn empty() -> Self {
        Self {
            account_id: 0,
            origin_id: String::new(),
            host: None,
            names_count: 0,
            names: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.account_id == 0
    }
}

/// A registered name (alias).
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Name {
    pub name: String,
    pub account_id: i64,
    pub registered: i64,
    pub active: i64,
}

/// Equality filter over account columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountCriterion {
    AccountId(i64),
    OriginId(String),
    Host(String),
}

/// Equality filter over name columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameCriterion {
    Name(String),
    AccountId(i64),
}

type AccountRow = (i64, String, Option<String>, i64);

/// Repository for account operations.
pub struct AccountRepository<'a> {
    db: &'a Database,
}

impl<'a> AccountRepository<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Ensure an account exists for `origin_id` and attach `alias` to it.
    ///
    /// Runs in one transaction: a duplicate alias fails with
    /// [`DbError::NameRegistered`] and leaves no partial rows behind.
    pub async fn register(&self, origin_id: &str, alias: &str) -> Result<Account, DbError> {
        self.db.observe(self.register_inner(origin_id, alias).await)
    }

    async fn register_inner(&self, origin_id: &str, alias: &str) -> Result<Account, DbError> {
        let now = chrono::Utc::now().timestamp();
        let mut tx = self.db.pool().begin().await?;

        sqlx::query(
            r#"
            INSERT INTO accounts (origin_id) VALUES (?)
            ON CONFLICT(origin_id) DO NOTHING
            "#,
        )
        .bind(origin_id)
        .execute(&mut *tx)
        .await?;

        let account_id: i64 =
            sqlx::query_scalar("SELECT account_id FROM accounts WHERE origin_id = ?")
                .bind(origin_id)
                .fetch_one(&mut *tx)
                .await?;

        sqlx::query(
            r#"
            INSERT INTO names (folded, name, account_id, registered, active)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(irc_to_lower(alias))
        .bind(alias)
        .bind(account_id)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return DbError::NameRegistered(alias.to_string());
            }
            DbError::from(e)
        })?;

        sqlx::query("UPDATE accounts SET names = names + 1 WHERE account_id = ?")
            .bind(account_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        self.lookup_inner(&[AccountCriterion::AccountId(account_id)])
            .await
    }

    /// Bump the alias's last-active time. Returns false for an unknown alias.
    pub async fn login(&self, alias: &str) -> Result<bool, DbError> {
        let result = sqlx::query("UPDATE names SET active = ? WHERE folded = ?")
            .bind(chrono::Utc::now().timestamp())
            .bind(irc_to_lower(alias))
            .execute(&self.db.pool())
            .await
            .map_err(DbError::from);
        Ok(self.db.observe(result)?.rows_affected() > 0)
    }

    /// Find an account by equality criteria, ANDed together.
    ///
    /// No criteria or no match yields [`Account::empty`].
    pub async fn lookup(&self, criteria: &[AccountCriterion]) -> Result<Account, DbError> {
        self.db.observe(self.lookup_inner(criteria).await)
    }

    async fn lookup_inner(&self, criteria: &[AccountCriterion]) -> Result<Account, DbError> {
        if criteria.is_empty() {
            return Ok(Account::empty());
        }

        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT account_id, origin_id, host, names FROM accounts WHERE ");
        let mut separated = query.separated(" AND ");
        for criterion in criteria {
            match criterion {
                AccountCriterion::AccountId(id) => {
                    separated.push("account_id = ").push_bind_unseparated(*id);
                }
                AccountCriterion::OriginId(origin) => {
                    separated
                        .push("origin_id = ")
                        .push_bind_unseparated(origin.clone());
                }
                AccountCriterion::Host(host) => {
                    separated.push("host = ").push_bind_unseparated(host.clone());
                }
            }
        }
        query.push(" LIMIT 1");

        let pool = self.db.pool();
        let row: Option<AccountRow> = query.build_query_as().fetch_optional(&pool).await?;
        let Some((account_id, origin_id, host, names_count)) = row else {
            return Ok(Account::empty());
        };

        let names = self
            .lookup_alias_inner(&[NameCriterion::AccountId(account_id)])
            .await?;

        Ok(Account {
            account_id,
            origin_id,
            host,
            names_count,
            names,
        })
    }

    /// Names matching every criterion, oldest registration first.
    pub async fn lookup_alias(&self, criteria: &[NameCriterion]) -> Result<Vec<Name>, DbError> {
        self.db.observe(self.lookup_alias_inner(criteria).await)
    }

    async fn lookup_alias_inner(&self, criteria: &[NameCriterion]) -> Result<Vec<Name>, DbError> {
        if criteria.is_empty() {
            return Ok(Vec::new());
        }

        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT name, account_id, registered, active FROM names WHERE ");
        let mut separated = query.separated(" AND ");
        for criterion in criteria {
            match criterion {
                NameCriterion::Name(name) => {
                    separated
                        .push("folded = ")
                        .push_bind_unseparated(irc_to_lower(name));
                }
                NameCriterion::AccountId(id) => {
                    separated.push("account_id = ").push_bind_unseparated(*id);
                }
            }
        }
        query.push(" ORDER BY registered, rowid");

        let pool = self.db.pool();
        let names = query.build_query_as::<Name>().fetch_all(&pool).await?;
        Ok(names)
    }

    /// Account owning `alias`, or the empty account.
    pub async fn find_by_alias(&self, alias: &str) -> Result<Account, DbError> {
        let names = self
            .lookup_alias(&[NameCriterion::Name(alias.to_string())])
            .await?;
        match names.first() {
            Some(name) => {
                self.lookup(&[AccountCriterion::AccountId(name.account_id)])
                    .await
            }
            None => Ok(Account::empty()),
        }
    }

    /// Record the last known host for the account owning `alias`.
    pub async fn set_host(&self, alias: &str, host: &str) -> Result<bool, DbError> {
        let result = sqlx::query(
            r#"
            UPDATE accounts SET host = ?
            WHERE account_id = (SELECT account_id FROM names WHERE folded = ?)
            "#,
        )
        .bind(host)
        .bind(irc_to_lower(alias))
        .execute(&self.db.pool())
        .await
        .map_err(DbError::from);
        Ok(self.db.observe(result)?.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_register_creates_account_with_name() {
        let db = Database::new(":memory:").await.unwrap();
        let account = db.accounts().register("web:1", "alice").await.unwrap();

        assert!(!account.is_empty());
        assert_eq!(account.origin_id, "web:1");
        assert_eq!(account.names_count, 1);
        assert_eq!(account.names.len(), 1);
        assert_eq!(account.names[0].name, "alice");
        assert_eq!(account.names[0].registered, account.names[0].active);
    }

    #[tokio::test]
    async fn test_register_same_origin_reuses_account() {
        let db = Database::new(":memory:").await.unwrap();
        let first = db.accounts().register("web:1", "alice").await.unwrap();
        let second = db.accounts().register("web:1", "alice_away").await.unwrap();

        assert_eq!(first.account_id, second.account_id);
        assert_eq!(second.names_count, 2);
        let names: Vec<_> = second.names.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, ["alice", "alice_away"]);
    }

    #[tokio::test]
    async fn test_duplicate_alias_rejected_without_partial_writes() {
        let db = Database::new(":memory:").await.unwrap();
        db.accounts().register("web:1", "alice").await.unwrap();

        let result = db.accounts().register("web:2", "ALICE").await;
        assert!(matches!(result, Err(DbError::NameRegistered(_))));

        // The second origin's account insert was rolled back with the name.
        let other = db
            .accounts()
            .lookup(&[AccountCriterion::OriginId("web:2".into())])
            .await
            .unwrap();
        assert!(other.is_empty());

        let owners = db
            .accounts()
            .lookup_alias(&[NameCriterion::Name("alice".into())])
            .await
            .unwrap();
        assert_eq!(owners.len(), 1);
    }

    #[tokio::test]
    async fn test_lookup_no_match_is_empty_account() {
        let db = Database::new(":memory:").await.unwrap();
        let account = db
            .accounts()
            .lookup(&[AccountCriterion::AccountId(42)])
            .await
            .unwrap();
        assert_eq!(account, Account::empty());
        assert!(account.names.is_empty());

        assert!(db.accounts().lookup(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_lookup_combines_criteria() {
        let db = Database::new(":memory:").await.unwrap();
        let account = db.accounts().register("web:1", "alice").await.unwrap();
        db.accounts().set_host("alice", "fish.host").await.unwrap();

        let hit = db
            .accounts()
            .lookup(&[
                AccountCriterion::AccountId(account.account_id),
                AccountCriterion::Host("fish.host".into()),
            ])
            .await
            .unwrap();
        assert_eq!(hit.account_id, account.account_id);
        assert_eq!(hit.host.as_deref(), Some("fish.host"));

        let miss = db
            .accounts()
            .lookup(&[
                AccountCriterion::AccountId(account.account_id),
                AccountCriterion::Host("elsewhere".into()),
            ])
            .await
            .unwrap();
        assert!(miss.is_empty());
    }

    #[tokio::test]
    async fn test_login_and_set_host_unknown_alias() {
        let db = Database::new(":memory:").await.unwrap();
        assert!(!db.accounts().login("nobody").await.unwrap());
        assert!(!db.accounts().set_host("nobody", "x").await.unwrap());
    }

    #[tokio::test]
    async fn test_find_by_alias_is_case_insensitive() {
        let db = Database::new(":memory:").await.unwrap();
        let account = db.accounts().register("web:1", "Alice").await.unwrap();
        assert!(db.accounts().login("alice").await.unwrap());

        let found = db.accounts().find_by_alias("ALICE").await.unwrap();
        assert_eq!(found.account_id, account.account_id);
        assert!(db.accounts().find_by_alias("bob").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_names_fold_like_irc_nicknames() {
        let db = Database::new(":memory:").await.unwrap();
        let account = db.accounts().register("web:1", "fish[1]").await.unwrap();

        let found = db.accounts().find_by_alias("FISH{1}").await.unwrap();
        assert_eq!(found.account_id, account.account_id);
        assert_eq!(found.names[0].name, "fish[1]");
        assert!(db.accounts().set_host("Fish{1}", "fish.host").await.unwrap());

        let err = db.accounts().register("web:2", "fish{1}").await.unwrap_err();
        assert!(matches!(err, DbError::NameRegistered(ref n) if n == "fish{1}"));
    }
}
