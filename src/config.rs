use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct RecallConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub embedding: EmbeddingConfig,
    pub retrieval: RetrievalConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: String,
    /// `"sqlite"` (persisted per-user index files) or `"memory"` (in-process cosine scan).
    pub backend: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// `"local"` (ONNX all-MiniLM-L6-v2) or `"hashing"` (offline feature hashing).
    pub provider: String,
    pub model: String,
    pub cache_dir: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetrievalConfig {
    pub default_top_k: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let data_dir = default_recall_dir()
            .join("data")
            .to_string_lossy()
            .into_owned();
        Self {
            data_dir,
            backend: "sqlite".into(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        let cache_dir = default_recall_dir()
            .join("models")
            .to_string_lossy()
            .into_owned();
        Self {
            provider: "local".into(),
            model: "all-MiniLM-L6-v2".into(),
            cache_dir,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { default_top_k: 5 }
    }
}

/// Returns `~/.recall/`
pub fn default_recall_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".recall")
}

/// Returns the default config file path: `~/.recall/config.toml`
pub fn default_config_path() -> PathBuf {
    default_recall_dir().join("config.toml")
}

impl RecallConfig {
    /// Load config from the default TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            RecallConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides (RECALL_DATA_DIR, RECALL_BACKEND,
    /// RECALL_EMBEDDING_PROVIDER, RECALL_LOG_LEVEL).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("RECALL_DATA_DIR") {
            self.storage.data_dir = val;
        }
        if let Ok(val) = std::env::var("RECALL_BACKEND") {
            self.storage.backend = val;
        }
        if let Ok(val) = std::env::var("RECALL_EMBEDDING_PROVIDER") {
            self.embedding.provider = val;
        }
        if let Ok(val) = std::env::var("RECALL_LOG_LEVEL") {
            self.server.log_level = val;
        }
    }

    /// Resolve the data directory, expanding `~` if needed.
    pub fn resolved_data_dir(&self) -> PathBuf {
        expand_tilde(&self.storage.data_dir)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = RecallConfig::default();
        assert_eq!(config.server.log_level, "info");
        assert_eq!(config.storage.backend, "sqlite");
        assert_eq!(config.embedding.provider, "local");
        assert_eq!(config.retrieval.default_top_k, 5);
        assert!(config.storage.data_dir.ends_with("data"));
    }

    #[test]
    fn parse_toml_config() {
        let toml_str = r#"
[server]
log_level = "debug"

[storage]
data_dir = "/tmp/recall-data"
backend = "memory"

[retrieval]
default_top_k = 3
"#;
        let config: RecallConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.log_level, "debug");
        assert_eq!(config.storage.data_dir, "/tmp/recall-data");
        assert_eq!(config.storage.backend, "memory");
        assert_eq!(config.retrieval.default_top_k, 3);
        // defaults still apply for unset sections
        assert_eq!(config.embedding.model, "all-MiniLM-L6-v2");
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = RecallConfig::default();
        std::env::set_var("RECALL_DATA_DIR", "/tmp/override");
        std::env::set_var("RECALL_BACKEND", "memory");
        std::env::set_var("RECALL_EMBEDDING_PROVIDER", "hashing");
        std::env::set_var("RECALL_LOG_LEVEL", "trace");

        config.apply_env_overrides();

        assert_eq!(config.storage.data_dir, "/tmp/override");
        assert_eq!(config.storage.backend, "memory");
        assert_eq!(config.embedding.provider, "hashing");
        assert_eq!(config.server.log_level, "trace");

        std::env::remove_var("RECALL_DATA_DIR");
        std::env::remove_var("RECALL_BACKEND");
        std::env::remove_var("RECALL_EMBEDDING_PROVIDER");
        std::env::remove_var("RECALL_LOG_LEVEL");
    }

    #[test]
    fn expand_tilde_leaves_absolute_paths() {
        assert_eq!(expand_tilde("/var/data"), PathBuf::from("/var/data"));
    }
}
