use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ragbox_core::upload::ACCEPTED_EXTENSIONS;
use serde::{Deserialize, Serialize};
use tracing::warn;

pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Environment override for the backend base URL; wins over the config file
/// when set and non-empty.
pub const BACKEND_URL_ENV: &str = "RAGBOX_BACKEND_URL";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub schema_version: u32,
    /// Base URL of the retrieval backend. Chat and upload are disabled with
    /// a visible warning while this is unset.
    #[serde(default)]
    pub backend_url: Option<String>,
    /// Extension allow-list applied at the file-selection boundary.
    #[serde(default)]
    pub accepted_extensions: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            backend_url: None,
            accepted_extensions: ACCEPTED_EXTENSIONS
                .iter()
                .map(|extension| extension.to_string())
                .collect(),
        }
    }
}

impl AppConfig {
    /// Resolved backend URL: environment override first, then the config
    /// file, trailing slashes trimmed. `None` when neither yields a value.
    pub fn resolve_backend_url(&self) -> Option<String> {
        let from_env = std::env::var(BACKEND_URL_ENV).ok();
        let raw = from_env
            .filter(|value| !value.trim().is_empty())
            .or_else(|| self.backend_url.clone())?;
        let trimmed = raw.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            return None;
        }
        Some(trimmed.to_owned())
    }
}

pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn from_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            path: dir.into().join("config.json"),
        }
    }

    pub fn from_default_location() -> Result<Self> {
        let mut dir = dirs::config_dir().context("failed to resolve config_dir")?;
        dir.push("ragbox");
        Ok(Self::from_dir(dir))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load_or_init(&self) -> Result<AppConfig> {
        if !self.path.exists() {
            let config = AppConfig::default();
            self.save(&config)?;
            return Ok(config);
        }

        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read {}", self.path.display()))?;
        let mut config: AppConfig =
            serde_json::from_str(&raw).context("failed to parse app config json")?;
        self.migrate(&mut config);
        self.save(&config)?;
        Ok(config)
    }

    pub fn save(&self, config: &AppConfig) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        let text = serde_json::to_string_pretty(config).context("failed to serialize config")?;
        fs::write(&self.path, text)
            .with_context(|| format!("failed to write {}", self.path.display()))?;
        Ok(())
    }

    fn migrate(&self, config: &mut AppConfig) {
        if config.schema_version >= CURRENT_SCHEMA_VERSION {
            return;
        }

        warn!(
            from = config.schema_version,
            to = CURRENT_SCHEMA_VERSION,
            "migrating app config schema"
        );

        if config.accepted_extensions.is_empty() {
            config.accepted_extensions = AppConfig::default().accepted_extensions;
        }
        config.schema_version = CURRENT_SCHEMA_VERSION;
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn creates_default_config_when_missing() {
        let dir = tempdir().expect("tempdir");
        let store = ConfigStore::from_dir(dir.path());
        let config = store.load_or_init().expect("load default");
        assert_eq!(config.schema_version, CURRENT_SCHEMA_VERSION);
        assert!(config.backend_url.is_none());
        assert!(config.accepted_extensions.iter().any(|e| e == "pdf"));
    }

    #[test]
    fn backend_url_is_normalized() {
        let config = AppConfig {
            backend_url: Some("http://localhost:9000/".to_owned()),
            ..AppConfig::default()
        };
        assert_eq!(
            config.resolve_backend_url().as_deref(),
            Some("http://localhost:9000")
        );

        let blank = AppConfig {
            backend_url: Some("   ".to_owned()),
            ..AppConfig::default()
        };
        assert!(blank.resolve_backend_url().is_none());
    }

    #[test]
    fn roundtrips_saved_values() {
        let dir = tempdir().expect("tempdir");
        let store = ConfigStore::from_dir(dir.path());
        let mut config = store.load_or_init().expect("init");
        config.backend_url = Some("http://backend.internal".to_owned());
        store.save(&config).expect("save");

        let reloaded = store.load_or_init().expect("reload");
        assert_eq!(
            reloaded.backend_url.as_deref(),
            Some("http://backend.internal")
        );
    }
}
