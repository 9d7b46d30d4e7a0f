use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};
use tracing::debug;

use super::ttl::DEFAULT_TTL_MINUTES;

/// Environment variable that overrides `provider.access_key`.
pub const ACCESS_KEY_ENV: &str = "XRATES_ACCESS_KEY";

fn default_base_url() -> String {
    "http://api.currencylayer.com".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_cache_ttl_minutes() -> i64 {
    DEFAULT_TTL_MINUTES
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProviderConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub access_key: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        ProviderConfig {
            base_url: default_base_url(),
            access_key: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default = "default_cache_ttl_minutes")]
    pub cache_ttl_minutes: i64,
    pub data_path: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            provider: ProviderConfig::default(),
            cache_ttl_minutes: default_cache_ttl_minutes(),
            data_path: None,
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        if !config_path.exists() {
            debug!("No config at {}, using defaults", config_path.display());
            return Ok(Self::default().with_env_overrides());
        }
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("com", "xrates", "xrates")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn default_data_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        let proj_dirs = ProjectDirs::from("com", "xrates", "xrates")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config.with_env_overrides())
    }

    pub fn cache_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.cache_ttl_minutes)
    }

    fn with_env_overrides(mut self) -> Self {
        if let Ok(key) = std::env::var(ACCESS_KEY_ENV) {
            if !key.trim().is_empty() {
                debug!("Using access key from {}", ACCESS_KEY_ENV);
                self.provider.access_key = Some(key);
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_deserialization() {
        let yaml_str = r#"
provider:
  base_url: "http://example.com/currencylayer"
  access_key: "secret"
  timeout_secs: 5
cache_ttl_minutes: 10
data_path: "/tmp/xrates"
"#;

        let config: AppConfig = serde_yaml::from_str(yaml_str).expect("Failed to deserialize");
        assert_eq!(config.provider.base_url, "http://example.com/currencylayer");
        assert_eq!(config.provider.access_key.as_deref(), Some("secret"));
        assert_eq!(config.provider.timeout_secs, 5);
        assert_eq!(config.cache_ttl_minutes, 10);
        assert_eq!(config.cache_ttl(), chrono::Duration::minutes(10));
        assert_eq!(config.data_path.as_deref(), Some("/tmp/xrates"));
    }

    #[test]
    fn test_config_defaults() {
        let config: AppConfig = serde_yaml::from_str("data_path: null").unwrap();
        assert_eq!(config.provider.base_url, "http://api.currencylayer.com");
        assert!(config.provider.access_key.is_none());
        assert_eq!(config.provider.timeout_secs, 30);
        assert_eq!(config.cache_ttl_minutes, 30);
    }

    #[test]
    fn test_partial_provider_section_keeps_defaults() {
        let yaml_str = r#"
provider:
  access_key: "abc"
"#;
        let config: AppConfig = serde_yaml::from_str(yaml_str).unwrap();
        assert_eq!(config.provider.base_url, "http://api.currencylayer.com");
        assert_eq!(config.provider.access_key.as_deref(), Some("abc"));
    }

    #[test]
    fn test_custom_data_path() {
        let config = AppConfig {
            data_path: Some("/var/lib/xrates".to_string()),
            ..AppConfig::default()
        };
        assert_eq!(
            config.default_data_path().unwrap(),
            PathBuf::from("/var/lib/xrates")
        );
    }
}
