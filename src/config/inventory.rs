//! Target lookup
//!
//! Callers address servers by id; a [`TargetDirectory`] turns the id into a
//! [`RemoteTarget`] with key material loaded.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use super::remote::{RemoteConfig, TargetEntry};
use crate::engine::error::ActionError;
use crate::transport::RemoteTarget;

#[async_trait]
pub trait TargetDirectory: Send + Sync {
    /// Fails with a connection error when no credentials are known for `id`
    async fn resolve(&self, id: &str) -> Result<RemoteTarget, ActionError>;
}

/// Directory backed by the `targets` section of the config
#[derive(Debug, Clone, Default)]
pub struct InventoryDirectory {
    targets: BTreeMap<String, TargetEntry>,
}

impl InventoryDirectory {
    pub fn new(targets: BTreeMap<String, TargetEntry>) -> Self {
        Self { targets }
    }

    pub fn from_config(config: &RemoteConfig) -> Self {
        Self::new(config.targets.clone())
    }

    pub fn ids(&self) -> Vec<&str> {
        self.targets.keys().map(String::as_str).collect()
    }

    pub fn entry(&self, id: &str) -> Option<&TargetEntry> {
        self.targets.get(id)
    }
}

#[async_trait]
impl TargetDirectory for InventoryDirectory {
    async fn resolve(&self, id: &str) -> Result<RemoteTarget, ActionError> {
        let entry = self.targets.get(id).ok_or_else(|| {
            ActionError::Connection(format!("no credentials for target '{}'", id))
        })?;

        let key_path = expand_home(&entry.key_file);
        let auth_key = tokio::fs::read_to_string(&key_path).await.map_err(|e| {
            ActionError::Connection(format!(
                "no credentials for target '{}': cannot read {}: {}",
                id,
                key_path.display(),
                e
            ))
        })?;
        debug!("Loaded key for target {} from {}", id, key_path.display());

        let mut target = RemoteTarget::new(&entry.host, &entry.username, auth_key)
            .with_port(entry.port);
        target.passphrase = entry
            .passphrase_env
            .as_deref()
            .and_then(|var| std::env::var(var).ok());
        target.host_key_sha256 = entry.host_key_sha256.clone();
        Ok(target)
    }
}

/// Replace a leading `~` with `$HOME`
pub fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), std::env::var_os("HOME")) {
        (Ok(rest), Some(home)) => PathBuf::from(home).join(rest),
        _ => path.to_path_buf(),
    }
}
