//! TOML configuration with environment fallback. A missing config file is
//! not an error; every section and field has a default, and the Gemini API
//! key can come from `GEMINI_API_KEY` instead of the file.

use std::path::Path;

use anyhow::Context;
use serde::Deserialize;
use tracing::debug;

use crate::units::{Language, UnitSystem};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_REASONING_MODEL: &str = "gemini-3-pro-preview";
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub state: StateConfig,
    #[serde(default)]
    pub locale: LocaleConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_reasoning_model")]
    pub reasoning_model: String,
    #[serde(default = "default_image_model")]
    pub image_model: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_base_url(),
            reasoning_model: default_reasoning_model(),
            image_model: default_image_model(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StateConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LocaleConfig {
    #[serde(default)]
    pub language: Language,
    #[serde(default)]
    pub unit_system: UnitSystem,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_reasoning_model() -> String {
    DEFAULT_REASONING_MODEL.to_string()
}

fn default_image_model() -> String {
    DEFAULT_IMAGE_MODEL.to_string()
}

fn default_db_path() -> String {
    "pawfresh.db".to_string()
}

impl AppConfig {
    /// Load from `path`, falling back to pure defaults when the file does
    /// not exist. An empty `api_key` is backfilled from `GEMINI_API_KEY`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config file {}", path.display()))?;
            toml::from_str(&raw)
                .with_context(|| format!("failed to parse config file {}", path.display()))?
        } else {
            debug!(path = %path.display(), "no config file, using defaults");
            Self::default()
        };

        if config.provider.api_key.is_empty() {
            if let Ok(key) = std::env::var("GEMINI_API_KEY") {
                config.provider.api_key = key;
            }
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_cover_every_field() {
        let config = AppConfig::default();
        assert_eq!(config.provider.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.provider.reasoning_model, DEFAULT_REASONING_MODEL);
        assert_eq!(config.provider.image_model, DEFAULT_IMAGE_MODEL);
        assert_eq!(config.state.db_path, "pawfresh.db");
        assert_eq!(config.locale.language, Language::En);
        assert_eq!(config.locale.unit_system, UnitSystem::Metric);
    }

    #[test]
    fn partial_file_keeps_defaults_elsewhere() {
        let config: AppConfig = toml::from_str(
            r#"
            [provider]
            api_key = "test-key"

            [locale]
            language = "de"
            unit_system = "imperial"
            "#,
        )
        .unwrap();

        assert_eq!(config.provider.api_key, "test-key");
        assert_eq!(config.provider.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.locale.language, Language::De);
        assert_eq!(config.locale.unit_system, UnitSystem::Imperial);
        assert_eq!(config.state.db_path, "pawfresh.db");
    }

    #[test]
    fn missing_file_loads_defaults() {
        let config = AppConfig::load(Path::new("/nonexistent/pawfresh.toml")).unwrap();
        assert_eq!(config.state.db_path, "pawfresh.db");
    }

    #[test]
    fn file_overrides_are_honored() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
            [provider]
            reasoning_model = "gemini-other"

            [state]
            db_path = "/tmp/custom.db"
            "#
        )
        .unwrap();

        let config = AppConfig::load(file.path()).unwrap();
        assert_eq!(config.provider.reasoning_model, "gemini-other");
        assert_eq!(config.state.db_path, "/tmp/custom.db");
    }

    #[test]
    fn malformed_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not [valid toml").unwrap();
        assert!(AppConfig::load(file.path()).is_err());
    }
}
