//! Application configuration.
//!
//! Loaded from `codev/config.toml` under the platform config directory.
//! A missing file yields defaults; a malformed file is a configuration
//! error, not silently ignored.

use codev_core::{CodevError, Result};
use codev_sandbox::SandboxConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Remote project service settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

fn default_base_url() -> String {
    "http://localhost:4000".to_string()
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

/// Root configuration for a Codev session host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CodevConfig {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub sandbox: SandboxConfig,
}

impl CodevConfig {
    /// Loads configuration from `path`, falling back to defaults when the
    /// file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub async fn load(path: &Path) -> Result<Self> {
        match tokio::fs::read_to_string(path).await {
            Ok(contents) => Ok(toml::from_str(&contents)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Loads configuration from the default platform location.
    pub async fn load_default() -> Result<Self> {
        Self::load(&Self::default_path()?).await
    }

    /// `<config dir>/codev/config.toml`
    pub fn default_path() -> Result<PathBuf> {
        let base = dirs::config_dir()
            .ok_or_else(|| CodevError::config("no config directory for this platform"))?;
        Ok(base.join("codev").join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codev_sandbox::CommandSpec;

    #[tokio::test]
    async fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = CodevConfig::load(&dir.path().join("missing.toml"))
            .await
            .unwrap();
        assert_eq!(config, CodevConfig::default());
        assert_eq!(
            config.sandbox.install_command,
            CommandSpec::new("npm", &["install"])
        );
    }

    #[tokio::test]
    async fn test_partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        tokio::fs::write(
            &path,
            r#"
[service]
base_url = "https://projects.example.com"

[sandbox.start_command]
program = "yarn"
args = ["dev"]
"#,
        )
        .await
        .unwrap();

        let config = CodevConfig::load(&path).await.unwrap();
        assert_eq!(config.service.base_url, "https://projects.example.com");
        assert_eq!(config.sandbox.start_command, CommandSpec::new("yarn", &["dev"]));
        assert_eq!(
            config.sandbox.install_command,
            CommandSpec::new("npm", &["install"])
        );
    }

    #[tokio::test]
    async fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        tokio::fs::write(&path, "not [valid toml").await.unwrap();

        let err = CodevConfig::load(&path).await.unwrap_err();
        assert!(matches!(err, CodevError::Serialization { .. }));
    }
}
