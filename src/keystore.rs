//! Durable key/value store for helper state.
//!
//! Holds the session token (value + issue date) and the vault name/uuid
//! across invocations. The file backend keeps a small JSON map under the
//! user config dir; values here are short-lived coordinates, the secrets
//! themselves stay behind the external tool.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::error::HelperError;

/// Key/value storage for helper state.
///
/// `get` returns `Ok(None)` when the key has never been written. Callers
/// treat an empty string the same as absent, since clearing writes "".
#[async_trait]
pub trait Keystore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// Keystore backed by a JSON file under the user config dir.
pub struct FileKeystore {
    path: PathBuf,
}

impl FileKeystore {
    /// Opens `~/.config/credkeep/keystore.json` (platform equivalent).
    pub fn open_default() -> Result<Self> {
        let dir = dirs::config_dir()
            .context("Could not find config directory")?
            .join(crate::mode::SERVICE_NAME);
        Self::with_path(dir.join("keystore.json"))
    }

    pub fn with_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create keystore dir: {parent:?}"))?;
        }
        Ok(Self { path })
    }

    fn read_map(&self) -> Result<HashMap<String, String>> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read keystore file: {:?}", self.path))?;
        let map: HashMap<String, String> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse keystore file: {:?}", self.path))?;
        Ok(map)
    }

    fn write_map(&self, map: &HashMap<String, String>) -> Result<()> {
        use std::io::Write;

        let content = serde_json::to_string_pretty(map).context("Failed to serialize keystore")?;

        // The map carries the session token; the file is owner-only from the
        // moment it exists, never tightened after a write.
        let mut options = std::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut file = options
            .open(&self.path)
            .with_context(|| format!("Failed to open keystore file: {:?}", self.path))?;
        file.write_all(content.as_bytes())
            .with_context(|| format!("Failed to write keystore file: {:?}", self.path))?;
        Ok(())
    }
}

#[async_trait]
impl Keystore for FileKeystore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read_map()?.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut map = self.read_map()?;
        map.insert(key.to_string(), value.to_string());
        self.write_map(&map)
    }
}

/// In-memory keystore for testing, with an optional injected failure.
#[derive(Default)]
pub struct MemoryKeystore {
    values: Mutex<HashMap<String, String>>,
    fail_with: Mutex<Option<String>>,
}

impl MemoryKeystore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_values<K, V>(values: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let values = values
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            values: Mutex::new(values),
            fail_with: Mutex::new(None),
        }
    }

    /// Make every subsequent get/set fail with the given message.
    pub fn fail_with(&self, message: impl Into<String>) {
        *self.fail_with.lock().expect("keystore lock poisoned") = Some(message.into());
    }

    /// Synchronous setter for seeding test state.
    pub fn insert(&self, key: impl Into<String>, value: impl Into<String>) {
        self.values
            .lock()
            .expect("keystore lock poisoned")
            .insert(key.into(), value.into());
    }

    /// Synchronous accessor for assertions.
    pub fn value(&self, key: &str) -> Option<String> {
        self.values
            .lock()
            .expect("keystore lock poisoned")
            .get(key)
            .cloned()
    }

    fn check_failure(&self) -> Result<()> {
        if let Some(message) = self
            .fail_with
            .lock()
            .expect("keystore lock poisoned")
            .clone()
        {
            return Err(HelperError::Store(message).into());
        }
        Ok(())
    }
}

#[async_trait]
impl Keystore for MemoryKeystore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.check_failure()?;
        Ok(self.value(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.check_failure()?;
        self.values
            .lock()
            .expect("keystore lock poisoned")
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_roundtrip() {
        let store = MemoryKeystore::new();
        assert_eq!(store.get("vault.name").await.unwrap(), None);
        store.set("vault.name", "work").await.unwrap();
        assert_eq!(
            store.get("vault.name").await.unwrap(),
            Some("work".to_string())
        );
    }

    #[tokio::test]
    async fn test_memory_injected_failure() {
        let store = MemoryKeystore::new();
        store.fail_with("backend offline");
        let err = store.get("vault.name").await.unwrap_err();
        assert_eq!(
            err.downcast_ref::<HelperError>(),
            Some(&HelperError::Store("backend offline".to_string()))
        );
    }
}
