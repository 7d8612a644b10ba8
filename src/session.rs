//! Session token lifecycle: NoToken -> Valid -> Expired/Invalidated -> NoToken.
//!
//! A token is valid only while its cached issue date is less than
//! [`SESSION_TTL_MINUTES`] old and the cached value is non-empty. The manager
//! never retries sign-in internally; invalidation-triggered retries belong to
//! [`crate::retry`], which keeps the recursion out of this module.

use std::sync::{Arc, Mutex};

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::clock::Clock;
use crate::keystore::Keystore;
use crate::tool::ToolClient;

pub const SESSION_TOKEN_DATE_KEY: &str = "session-token.date";
pub const SESSION_TOKEN_VALUE_KEY: &str = "session-token.value";

pub const SESSION_TTL_MINUTES: i64 = 30;

pub struct SessionManager {
    keystore: Arc<dyn Keystore>,
    tool: ToolClient,
    clock: Arc<dyn Clock>,
    cached: Mutex<Option<String>>,
}

impl SessionManager {
    pub fn new(keystore: Arc<dyn Keystore>, tool: ToolClient, clock: Arc<dyn Clock>) -> Self {
        Self {
            keystore,
            tool,
            clock,
            cached: Mutex::new(None),
        }
    }

    /// Return a session token: the in-memory one if present (no I/O), else
    /// the keystore-cached one if still fresh, else a fresh sign-in.
    pub async fn token(&self) -> Result<String> {
        if let Some(token) = self.cached_token() {
            return Ok(token);
        }

        let issued_at = self
            .keystore
            .get(SESSION_TOKEN_DATE_KEY)
            .await?
            .filter(|date| !date.is_empty())
            .and_then(|date| DateTime::parse_from_rfc3339(&date).ok())
            .map(|date| date.with_timezone(&Utc));

        let fresh = issued_at.is_some_and(|issued_at| {
            self.clock.now() - issued_at < chrono::Duration::minutes(SESSION_TTL_MINUTES)
        });
        if !fresh {
            return self.sign_in().await;
        }

        match self
            .keystore
            .get(SESSION_TOKEN_VALUE_KEY)
            .await?
            .filter(|token| !token.is_empty())
        {
            Some(token) => {
                self.cache(&token);
                Ok(token)
            }
            None => self.sign_in().await,
        }
    }

    /// Run the tool's interactive sign-in and cache the new token in memory
    /// and in the keystore with its issue timestamp. Tool failures surface
    /// to the caller unretried.
    pub async fn sign_in(&self) -> Result<String> {
        tracing::info!("signing in to the secret manager");
        let token = self.tool.signin().await?.trim().to_string();

        self.keystore
            .set(SESSION_TOKEN_DATE_KEY, &self.clock.now().to_rfc3339())
            .await?;
        self.keystore
            .set(SESSION_TOKEN_VALUE_KEY, &token)
            .await?;
        self.cache(&token);
        Ok(token)
    }

    /// Blank the in-memory and keystore token fields. No tool I/O; keystore
    /// write failures are logged rather than surfaced, since the in-memory
    /// invalidation is what the retry path depends on.
    pub async fn clear(&self) {
        *self.cached.lock().expect("session cache lock poisoned") = None;
        for key in [SESSION_TOKEN_DATE_KEY, SESSION_TOKEN_VALUE_KEY] {
            if let Err(err) = self.keystore.set(key, "").await {
                tracing::warn!(error = %err, key, "failed to clear session token from keystore");
            }
        }
    }

    fn cached_token(&self) -> Option<String> {
        self.cached
            .lock()
            .expect("session cache lock poisoned")
            .clone()
    }

    fn cache(&self, token: &str) {
        *self.cached.lock().expect("session cache lock poisoned") = Some(token.to_string());
    }
}
