//! Remote configuration
//!
//! Loaded from `remote.yaml`:
//!
//! ```yaml
//! connect_timeout_ms: 10000
//! command_timeout_ms: 60000
//! swap_hint: false
//! benign_patterns:
//!   - "(?i)already exists"
//!
//! targets:
//!   web-1:
//!     host: 203.0.113.10
//!     port: 22
//!     username: root
//!     key_file: ~/.ssh/id_ed25519
//!     host_key_sha256: null
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::engine::action::BenignPatterns;
use crate::engine::error::ActionError;
use crate::transport::SshConfig;

pub const DEFAULT_CONFIG_FILE: &str = "remote.yaml";

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error in {file}: {error}")]
    Yaml {
        file: String,
        error: serde_yaml::Error,
    },
}

impl From<LoadError> for ActionError {
    fn from(err: LoadError) -> Self {
        ActionError::Config(err.to_string())
    }
}

/// Read and deserialize one YAML file
pub(crate) fn load_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, LoadError> {
    let content = std::fs::read_to_string(path)?;
    serde_yaml::from_str(&content).map_err(|e| LoadError::Yaml {
        file: path.display().to_string(),
        error: e,
    })
}

/// Connection details for one inventory entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetEntry {
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_username")]
    pub username: String,

    /// Private key path; a leading `~` is the current user's home
    pub key_file: PathBuf,

    /// Name of an environment variable holding the key passphrase
    #[serde(default)]
    pub passphrase_env: Option<String>,

    #[serde(default)]
    pub host_key_sha256: Option<String>,
}

fn default_port() -> u16 {
    22
}

fn default_username() -> String {
    "root".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    #[serde(default = "default_command_timeout_ms")]
    pub command_timeout_ms: u64,

    #[serde(default)]
    pub swap_hint: bool,

    /// Extra benign-failure patterns applied to every sequence-file step
    #[serde(default)]
    pub benign_patterns: Vec<String>,

    #[serde(default)]
    pub targets: BTreeMap<String, TargetEntry>,
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

fn default_command_timeout_ms() -> u64 {
    60_000
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout_ms(),
            command_timeout_ms: default_command_timeout_ms(),
            swap_hint: false,
            benign_patterns: Vec::new(),
            targets: BTreeMap::new(),
        }
    }
}

impl RemoteConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        load_yaml(path.as_ref())
    }

    /// Load `path` if it exists, defaults otherwise
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn ssh_config(&self) -> SshConfig {
        SshConfig {
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            command_timeout: Duration::from_millis(self.command_timeout_ms),
            swap_hint: self.swap_hint,
        }
    }

    pub fn benign_patterns(&self) -> Result<BenignPatterns, ActionError> {
        BenignPatterns::new(&self.benign_patterns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RemoteConfig::default();
        assert_eq!(config.connect_timeout_ms, 10_000);
        assert_eq!(config.command_timeout_ms, 60_000);
        assert!(!config.swap_hint);
        assert!(config.targets.is_empty());
    }

    #[test]
    fn test_parse_config() {
        let yaml = r#"
command_timeout_ms: 5000
swap_hint: true
targets:
  db-1:
    host: 10.0.0.5
    key_file: ~/.ssh/id_ed25519
"#;
        let config: RemoteConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.command_timeout_ms, 5000);
        assert_eq!(config.connect_timeout_ms, 10_000);

        let target = &config.targets["db-1"];
        assert_eq!(target.port, 22);
        assert_eq!(target.username, "root");

        let ssh = config.ssh_config();
        assert_eq!(ssh.command_timeout, Duration::from_secs(5));
        assert!(ssh.swap_hint);
    }

    #[test]
    fn test_bad_benign_pattern_is_config_error() {
        let config = RemoteConfig {
            benign_patterns: vec!["[".to_string()],
            ..Default::default()
        };
        assert!(matches!(
            config.benign_patterns(),
            Err(ActionError::Config(_))
        ));
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = RemoteConfig::load_or_default(dir.path().join("remote.yaml")).unwrap();
        assert!(config.targets.is_empty());
    }
}
