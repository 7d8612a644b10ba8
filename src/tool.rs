//! External secret-manager tool invocation.
//!
//! The tool is modeled as an opaque run(stdin, args) function behind the
//! [`ToolRunner`] trait; [`OpCli`] shells out to the real binary while tests
//! substitute a scripted runner. [`ToolClient`] layers the typed operations
//! (items, vaults, sign-in) on top.
//!
//! Missing-resource detection matches the tool's error text ("doesn't seem to
//! be an item/vault"). Like the auth signatures in [`crate::retry`], that text
//! is owned by another program and may drift across its versions.

use std::process::{Command, Stdio};
use std::sync::Arc;

use anyhow::{ensure, Context, Result};
use async_trait::async_trait;
use serde_json::Value;

use crate::error::HelperError;

#[async_trait]
pub trait ToolRunner: Send + Sync {
    async fn run(&self, stdin: &str, args: &[String]) -> Result<String>;
}

/// Runs the real secret-manager CLI (`op` by default).
pub struct OpCli {
    binary: String,
}

impl OpCli {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

#[async_trait]
impl ToolRunner for OpCli {
    async fn run(&self, stdin: &str, args: &[String]) -> Result<String> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(args);
        // An empty stdin means the tool may need the terminal itself, e.g.
        // to prompt for the master passphrase during sign-in.
        if stdin.is_empty() {
            cmd.stdin(Stdio::inherit());
        } else {
            cmd.stdin(Stdio::piped());
        }
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .with_context(|| format!("Failed to run {}", self.binary))?;

        if !stdin.is_empty() {
            use std::io::Write;
            let mut pipe = child.stdin.take().context("Tool stdin pipe missing")?;
            pipe.write_all(stdin.as_bytes())
                .with_context(|| format!("Failed to write to {} stdin", self.binary))?;
        }

        let output = child
            .wait_with_output()
            .with_context(|| format!("Failed to wait for {}", self.binary))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if output.status.success() {
            return Ok(stdout.trim().to_string());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let message = format!("{stdout}{stderr}").trim().to_string();
        tracing::debug!(status = %output.status, "secret tool call failed");

        if message.starts_with("[ERROR]") {
            if crate::retry::matches_auth_signature(&message) {
                return Err(HelperError::AuthFailure(message).into());
            }
            return Err(HelperError::Tool(message).into());
        }
        Err(HelperError::Tool(format!(
            "{} exited with {}: {message}",
            self.binary, output.status
        ))
        .into())
    }
}

/// Typed operations over a [`ToolRunner`].
#[derive(Clone)]
pub struct ToolClient {
    runner: Arc<dyn ToolRunner>,
}

impl ToolClient {
    pub fn new(runner: Arc<dyn ToolRunner>) -> Self {
        Self { runner }
    }

    async fn run(&self, stdin: &str, args: &[&str]) -> Result<String> {
        let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        self.runner.run(stdin, &args).await
    }

    /// Interactive sign-in; the user types their master passphrase straight
    /// into the tool. Returns the raw session token.
    pub async fn signin(&self) -> Result<String> {
        self.run("", &["signin", "--raw"]).await
    }

    pub async fn get_vault(&self, token: &str, name: &str) -> Result<String> {
        ensure!(!token.is_empty(), "failed to get vault: missing session token");
        ensure!(!name.is_empty(), "failed to get vault: missing vault name");
        self.run("", &["get", "vault", name, "--session", token])
            .await
    }

    pub async fn create_vault(&self, token: &str, name: &str, description: &str) -> Result<String> {
        ensure!(
            !token.is_empty(),
            "failed to create vault: missing session token"
        );
        ensure!(!name.is_empty(), "failed to create vault: missing vault name");
        self.run(
            "",
            &[
                "create",
                "vault",
                name,
                "--session",
                token,
                "--description",
                description,
                "--allow-admins-to-manage",
                "false",
            ],
        )
        .await
    }

    /// Look up an item by key. `Ok(None)` when the tool reports the item does
    /// not exist; a missing credential is not an error for get/erase.
    pub async fn get_item(&self, token: &str, vault_id: &str, key: &str) -> Result<Option<Value>> {
        ensure!(!token.is_empty(), "failed to get item: missing session token");
        ensure!(!vault_id.is_empty(), "failed to get item: missing vault id");
        ensure!(!key.is_empty(), "failed to get item: missing item title");

        match self
            .run("", &["get", "item", key, "--session", token, "--vault", vault_id])
            .await
        {
            Ok(output) => {
                let item: Value = serde_json::from_str(&output)
                    .context("Failed to parse item from tool output")?;
                Ok(Some(item))
            }
            Err(err) if is_item_not_found(&err) => Ok(None),
            Err(err) => Err(err),
        }
    }

    pub async fn create_item(
        &self,
        token: &str,
        vault_id: &str,
        title: &str,
        username: &str,
        password: &str,
    ) -> Result<()> {
        ensure!(
            !token.is_empty(),
            "failed to create item: missing session token"
        );
        ensure!(
            !vault_id.is_empty(),
            "failed to create item: missing vault id"
        );
        ensure!(!title.is_empty(), "failed to create item: missing item title");

        self.run(
            "",
            &[
                "create",
                "item",
                "Login",
                &format!("title={title}"),
                &format!("username={username}"),
                &format!("password={password}"),
                "--session",
                token,
                "--vault",
                vault_id,
            ],
        )
        .await?;
        Ok(())
    }

    pub async fn edit_item(
        &self,
        token: &str,
        vault_id: &str,
        item_id: &str,
        username: &str,
        password: &str,
    ) -> Result<()> {
        ensure!(
            !token.is_empty(),
            "failed to edit item: missing session token"
        );
        ensure!(!vault_id.is_empty(), "failed to edit item: missing vault id");
        ensure!(!item_id.is_empty(), "failed to edit item: missing item id");

        self.run(
            "",
            &[
                "edit",
                "item",
                item_id,
                &format!("username={username}"),
                &format!("password={password}"),
                "--session",
                token,
                "--vault",
                vault_id,
            ],
        )
        .await?;
        Ok(())
    }

    pub async fn delete_item(&self, token: &str, vault_id: &str, item_id: &str) -> Result<()> {
        ensure!(
            !token.is_empty(),
            "failed to delete item: missing session token"
        );
        ensure!(
            !vault_id.is_empty(),
            "failed to delete item: missing vault id"
        );
        ensure!(!item_id.is_empty(), "failed to delete item: missing item id");

        self.run(
            "",
            &["delete", "item", item_id, "--session", token, "--vault", vault_id],
        )
        .await?;
        Ok(())
    }
}

/// The tool reports a missing item as an error; recognize it by text.
pub fn is_item_not_found(err: &anyhow::Error) -> bool {
    err.chain()
        .any(|cause| cause.to_string().contains("doesn't seem to be an item"))
}

/// Same for a missing vault.
pub fn is_vault_not_found(err: &anyhow::Error) -> bool {
    err.chain()
        .any(|cause| cause.to_string().contains("doesn't seem to be a vault"))
}

/// Pull a designated field value (`username`/`password`) out of an item.
pub fn item_field(item: &Value, designation: &str) -> Option<String> {
    item["details"]["fields"]
        .as_array()?
        .iter()
        .find(|field| field["designation"] == designation)?
        .get("value")?
        .as_str()
        .map(|v| v.to_string())
}

pub fn item_id(item: &Value) -> Option<String> {
    item["uuid"].as_str().map(|id| id.to_string())
}
