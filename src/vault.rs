//! Vault name and identifier resolution.
//!
//! A vault is a logical namespace in the secret manager. Its identifier,
//! once resolved, is cached in memory for the rest of the invocation and in
//! the keystore across invocations. Renaming always clears the cached id
//! before resolving under the new name.

use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use serde_json::Value;

use crate::error::HelperError;
use crate::keystore::Keystore;
use crate::session::SessionManager;
use crate::tool::{self, ToolClient};

pub const VAULT_NAME_KEY: &str = "vault.name";
pub const VAULT_UUID_KEY: &str = "vault.uuid";

/// Vault used when the user never configured one. Shared across modes; the
/// `{mode}:{key}` namespacing keeps their entries apart.
pub const DEFAULT_VAULT_NAME: &str = "credkeep";

pub struct VaultResolver {
    keystore: Arc<dyn Keystore>,
    tool: ToolClient,
    default_name: String,
    service_name: String,
    cached_id: Mutex<Option<String>>,
}

impl VaultResolver {
    pub fn new(
        keystore: Arc<dyn Keystore>,
        tool: ToolClient,
        default_name: impl Into<String>,
        service_name: impl Into<String>,
    ) -> Self {
        Self {
            keystore,
            tool,
            default_name: default_name.into(),
            service_name: service_name.into(),
            cached_id: Mutex::new(None),
        }
    }

    pub fn default_name(&self) -> &str {
        &self.default_name
    }

    /// The configured vault name, or the default (which is persisted on
    /// first use so later invocations see the same answer).
    pub async fn name(&self) -> Result<String> {
        if let Some(name) = self
            .keystore
            .get(VAULT_NAME_KEY)
            .await?
            .filter(|name| !name.is_empty())
        {
            return Ok(name);
        }
        self.keystore
            .set(VAULT_NAME_KEY, &self.default_name)
            .await?;
        Ok(self.default_name.clone())
    }

    /// Resolve the vault id: memory cache, then keystore cache, then a tool
    /// query. A vault missing upstream is created only when `allow_create`
    /// is set (callers pass it for the default vault name and for an
    /// explicit create flag); otherwise the miss is `VaultNotFound`.
    pub async fn resolve_id(
        &self,
        session: &SessionManager,
        name: &str,
        allow_create: bool,
    ) -> Result<String> {
        if let Some(id) = self.cached_id() {
            return Ok(id);
        }

        if let Some(id) = self
            .keystore
            .get(VAULT_UUID_KEY)
            .await?
            .filter(|id| !id.is_empty())
        {
            self.cache(&id);
            return Ok(id);
        }

        let token = session.token().await?;
        let id = match self.query_id(&token, name).await? {
            Some(id) => id,
            None if allow_create => self.create(&token, name).await?,
            None => return Err(HelperError::VaultNotFound(name.to_string()).into()),
        };

        self.keystore.set(VAULT_UUID_KEY, &id).await?;
        self.cache(&id);
        Ok(id)
    }

    /// Point the helper at a different vault. Any previously cached id is
    /// cleared first; the new name is persisted only once it resolves.
    pub async fn set_name(
        &self,
        session: &SessionManager,
        name: &str,
        allow_create: bool,
    ) -> Result<String> {
        *self.cached_id.lock().expect("vault cache lock poisoned") = None;
        self.keystore.set(VAULT_UUID_KEY, "").await?;

        let id = self.resolve_id(session, name, allow_create).await?;
        self.keystore.set(VAULT_NAME_KEY, name).await?;
        Ok(id)
    }

    async fn query_id(&self, token: &str, name: &str) -> Result<Option<String>> {
        match self.tool.get_vault(token, name).await {
            Ok(output) => {
                let vault: Value = serde_json::from_str(&output)
                    .context("Failed to parse vault from tool output")?;
                Ok(vault["uuid"]
                    .as_str()
                    .filter(|id| !id.is_empty())
                    .map(|id| id.to_string()))
            }
            Err(err) if tool::is_vault_not_found(&err) => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn create(&self, token: &str, name: &str) -> Result<String> {
        let description = format!("Contains credentials managed by {}.", self.service_name);
        let output = self.tool.create_vault(token, name, &description).await?;

        let vault: Value =
            serde_json::from_str(&output).context("Failed to parse created vault")?;
        let id = vault["uuid"]
            .as_str()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| HelperError::Tool("vault creation returned no uuid".to_string()))?
            .to_string();

        tracing::info!(vault = name, "created vault");
        Ok(id)
    }

    fn cached_id(&self) -> Option<String> {
        self.cached_id
            .lock()
            .expect("vault cache lock poisoned")
            .clone()
    }

    fn cache(&self, id: &str) {
        *self.cached_id.lock().expect("vault cache lock poisoned") = Some(id.to_string());
    }
}
