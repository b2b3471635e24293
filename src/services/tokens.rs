//! Short-lived tokens bound to an action payload.
//!
//! A token is the hex HMAC-SHA256 of fresh random noise keyed by a fresh
//! random salt. Tokens live in the key/value store under `token:<hex>` and
//! expire there; nothing sweeps them.

use crate::store::{KvStore, StoreError};
use base64::{Engine, engine::general_purpose::STANDARD};
use hmac::{Hmac, Mac};
use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

type HmacSha256 = Hmac<Sha256>;

/// Generation attempts before giving up on finding a free token.
pub const MAX_GENERATION_ATTEMPTS: usize = 8;

const KEY_PREFIX: &str = "token:";

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token store error: {0}")]
    Store(#[from] StoreError),
    #[error("no free token after {0} attempts")]
    Exhausted(usize),
    #[error("token generation failed: {0}")]
    Generation(String),
    #[error("malformed token payload: {0}")]
    Payload(#[from] serde_json::Error),
}

/// What a token authorizes: who asked, and for which command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPayload {
    pub user: String,
    pub command: String,
}

type Generator = Arc<dyn Fn() -> Result<String, TokenError> + Send + Sync>;

#[derive(Clone)]
pub struct TokenService {
    kv: KvStore,
    ttl: Duration,
    generate: Generator,
}

impl TokenService {
    pub fn new(kv: KvStore, ttl: Duration) -> Self {
        Self {
            kv,
            ttl,
            generate: Arc::new(generate_token),
        }
    }

    #[cfg(test)]
    fn with_generator(kv: KvStore, ttl: Duration, generate: Generator) -> Self {
        Self { kv, ttl, generate }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a fresh token for `payload`.
    ///
    /// A collision with a live token regenerates; any store failure is an
    /// error and the caller must not proceed.
    pub fn issue(&self, payload: &TokenPayload) -> Result<String, TokenError> {
        let encoded = serde_json::to_vec(payload)?;

        for attempt in 1..=MAX_GENERATION_ATTEMPTS {
            let token = (self.generate)()?;
            let key = storage_key(&token);
            if self.kv.get(&key)?.is_some() {
                debug!(attempt, "Token collision, regenerating");
                continue;
            }
            self.kv.set_ex(&key, &encoded, self.ttl)?;
            crate::metrics::record_token_issued();
            return Ok(token);
        }

        warn!(attempts = MAX_GENERATION_ATTEMPTS, "Token generation exhausted");
        Err(TokenError::Exhausted(MAX_GENERATION_ATTEMPTS))
    }

    /// Payload for a live token. Expired and unknown tokens are both `None`.
    pub fn redeem(&self, token: &str) -> Result<Option<TokenPayload>, TokenError> {
        match self.kv.get(&storage_key(token))? {
            Some(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            None => Ok(None),
        }
    }

    /// Delete a token. Returns false if it was already gone.
    pub fn revoke(&self, token: &str) -> Result<bool, TokenError> {
        Ok(self.kv.del(&storage_key(token))?)
    }
}

fn storage_key(token: &str) -> String {
    format!("{KEY_PREFIX}{token}")
}

fn random_b64() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    STANDARD.encode(bytes)
}

/// 64 lowercase hex characters.
fn generate_token() -> Result<String, TokenError> {
    let salt = random_b64();
    let noise = random_b64();
    let mut mac = HmacSha256::new_from_slice(salt.as_bytes())
        .map_err(|e| TokenError::Generation(e.to_string()))?;
    mac.update(noise.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}
