//! Per-invocation request context.
//!
//! One `RequestContext` is built in `main` and passed by reference through
//! the command handlers. It exclusively owns the session token and vault
//! caches for the lifetime of the process; the keystore is the durable owner
//! across invocations. Nothing here is shared between invocations.

use std::sync::Arc;

use anyhow::Result;

use crate::clock::Clock;
use crate::input::ParsedInputs;
use crate::keystore::Keystore;
use crate::mode::Mode;
use crate::session::SessionManager;
use crate::tool::{ToolClient, ToolRunner};
use crate::vault::{VaultResolver, DEFAULT_VAULT_NAME};

pub struct RequestContext {
    pub mode: Mode,
    pub inputs: ParsedInputs,
    pub session: SessionManager,
    pub vault: VaultResolver,
    pub tool: ToolClient,
}

impl RequestContext {
    pub fn new(
        mode: Mode,
        inputs: ParsedInputs,
        keystore: Arc<dyn Keystore>,
        runner: Arc<dyn ToolRunner>,
        clock: Arc<dyn Clock>,
        default_vault: Option<String>,
    ) -> Self {
        let tool = ToolClient::new(runner);
        let session = SessionManager::new(keystore.clone(), tool.clone(), clock);
        let default_name = default_vault.unwrap_or_else(|| DEFAULT_VAULT_NAME.to_string());
        let vault = VaultResolver::new(keystore, tool.clone(), default_name, mode.service_name());

        Self {
            mode,
            inputs,
            session,
            vault,
            tool,
        }
    }

    /// Ensure a session token and vault id, in that order. The default vault
    /// is created on first use; a configured non-default vault that cannot
    /// be found is a hard failure (creation is opt-in via the vault command).
    pub async fn vault_scope(&self) -> Result<(String, String)> {
        let name = self.vault.name().await?;
        let allow_create = name == self.vault.default_name();
        let vault_id = self
            .vault
            .resolve_id(&self.session, &name, allow_create)
            .await?;
        let token = self.session.token().await?;
        Ok((token, vault_id))
    }
}
