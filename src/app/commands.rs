//! Command handlers.
//!
//! Each handler derives what it needs from the request context, ensures the
//! session and vault, and talks to the external tool. Handlers return their
//! output instead of printing; only `main` writes to stdout. A credential
//! that is absent on get or erase is a silent success, matching what the
//! calling tools expect of a helper.

use anyhow::Result;

use crate::context::RequestContext;
use crate::request;
use crate::tool::{item_field, item_id};

use super::output::render_get;

/// Look up a credential by the key derived from stdin and render it in the
/// caller's protocol. Returns an empty string when nothing is stored.
pub async fn get(ctx: &RequestContext) -> Result<String> {
    let key = request::derive_key(&ctx.mode, &ctx.inputs)?;
    let (token, vault_id) = ctx.vault_scope().await?;

    let Some(item) = ctx.tool.get_item(&token, &vault_id, &key).await? else {
        tracing::debug!(%key, "no stored credential");
        return Ok(String::new());
    };

    let username = item_field(&item, "username").unwrap_or_default();
    let password = item_field(&item, "password").unwrap_or_default();
    render_get(&ctx.mode, &ctx.inputs, &username, &password)
}

/// Upsert a credential. Skips the tool mutation entirely when the stored
/// fields already match.
pub async fn store(ctx: &RequestContext) -> Result<()> {
    let request = request::for_store(&ctx.mode, &ctx.inputs)?;
    let (token, vault_id) = ctx.vault_scope().await?;

    let existing = ctx.tool.get_item(&token, &vault_id, &request.key).await?;
    if let Some(item) = &existing {
        let stored_username = item_field(item, "username").unwrap_or_default();
        let stored_password = item_field(item, "password").unwrap_or_default();
        if stored_username == request.username && stored_password == request.password {
            tracing::debug!(key = %request.key, "stored credential already up to date");
            return Ok(());
        }
    }

    match existing.as_ref().and_then(item_id) {
        Some(id) => {
            ctx.tool
                .edit_item(&token, &vault_id, &id, &request.username, &request.password)
                .await
        }
        None => {
            ctx.tool
                .create_item(
                    &token,
                    &vault_id,
                    &request.key,
                    &request.username,
                    &request.password,
                )
                .await
        }
    }
}

/// Remove a credential. Nothing stored under the key is a no-op.
pub async fn erase(ctx: &RequestContext) -> Result<()> {
    let key = request::derive_key(&ctx.mode, &ctx.inputs)?;
    let (token, vault_id) = ctx.vault_scope().await?;

    let Some(item) = ctx.tool.get_item(&token, &vault_id, &key).await? else {
        tracing::debug!(%key, "no stored credential to erase");
        return Ok(());
    };

    match item_id(&item) {
        Some(id) => ctx.tool.delete_item(&token, &vault_id, &id).await,
        None => Ok(()),
    }
}

/// Print or change the vault the helper stores credentials in. Returns the
/// name to print when called without arguments.
pub async fn vault(
    ctx: &RequestContext,
    name: Option<&str>,
    create: bool,
) -> Result<Option<String>> {
    match name {
        Some(name) => {
            ctx.vault.set_name(&ctx.session, name, create).await?;
            Ok(None)
        }
        None if create => {
            // Re-resolve the current name, creating the vault if missing.
            let current = ctx.vault.name().await?;
            ctx.vault.set_name(&ctx.session, &current, true).await?;
            Ok(None)
        }
        None => Ok(Some(ctx.vault.name().await?)),
    }
}

/// Force a fresh interactive sign-in, discarding any cached token first.
pub async fn signin(ctx: &RequestContext) -> Result<()> {
    ctx.session.clear().await;
    ctx.session.sign_in().await?;
    Ok(())
}
