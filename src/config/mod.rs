//! Configuration management for pkgrisk
//!
//! Handles loading, environment overrides and validation of the TOML
//! configuration file.

use crate::error::{PkgriskError, Result};
use crate::policy::ScoringPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

mod validator;

pub use validator::ConfigValidator;

pub const SCHEMA_VERSION: &str = "1.0.0";

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "_meta")]
    pub meta: MetaConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub reader: ReaderConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Metadata about the configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaConfig {
    pub schema_version: String,
    #[serde(default = "current_timestamp")]
    pub created_at: String,
    #[serde(default = "current_timestamp")]
    pub last_modified: String,
}

fn current_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Where published data is written
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    #[serde(default)]
    pub pretty_json: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Rule table override; built-in defaults when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReaderConfig {
    /// Chunk root for lookups; `storage.data_dir` when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub default_filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default_filter: "pkgrisk=info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(PkgriskError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| PkgriskError::io(e, format!("Failed to read config file: {:?}", path)))?;
        let mut config: Config = toml::from_str(&content)?;

        config.apply_env_overrides();
        ConfigValidator::validate(&config)?;

        Ok(config)
    }

    /// Load from `path`, or defaults when the file does not exist
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            return Self::load(path);
        }
        let mut config = Self::default();
        config.apply_env_overrides();
        ConfigValidator::validate(&config)?;
        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                PkgriskError::io(e, format!("Failed to create config directory: {:?}", parent))
            })?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)
            .map_err(|e| PkgriskError::io(e, format!("Failed to write config file: {:?}", path)))
    }

    /// Apply environment variable overrides
    /// Environment variables in format: PKGRISK_SECTION__KEY=value
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(std::env::vars());
    }

    fn apply_overrides(&mut self, vars: impl IntoIterator<Item = (String, String)>) {
        for (key, value) in vars {
            if let Some(config_key) = key.strip_prefix("PKGRISK_") {
                if let Err(e) = self.set_value_from_env(config_key, &value) {
                    tracing::warn!("Failed to apply env override {}: {}", key, e);
                }
            }
        }
    }

    fn set_value_from_env(&mut self, path: &str, value: &str) -> Result<()> {
        match path {
            "STORAGE__DATA_DIR" => {
                self.storage.data_dir = PathBuf::from(value);
            }
            "STORAGE__PRETTY_JSON" => {
                self.storage.pretty_json =
                    value.parse().map_err(|_| PkgriskError::InvalidConfigValue {
                        path: path.to_string(),
                        message: format!("Cannot parse '{}' as boolean", value),
                    })?;
            }
            "SCORING__POLICY_FILE" => {
                self.scoring.policy_file = (!value.is_empty()).then(|| PathBuf::from(value));
            }
            "READER__BASE_DIR" => {
                self.reader.base_dir = (!value.is_empty()).then(|| PathBuf::from(value));
            }
            "LOGGING__DEFAULT_FILTER" => {
                self.logging.default_filter = value.to_string();
            }
            _ => {
                tracing::debug!("Unknown env config key: {}", path);
            }
        }
        Ok(())
    }

    /// Scoring policy from `scoring.policy_file`, or the built-in table
    pub fn load_policy(&self) -> Result<ScoringPolicy> {
        match &self.scoring.policy_file {
            Some(path) => {
                let path = expand_path(path)?;
                tracing::info!("Loading scoring policy from {}", path.display());
                ScoringPolicy::load(&path)
            }
            None => Ok(ScoringPolicy::default()),
        }
    }

    pub fn data_dir(&self) -> Result<PathBuf> {
        expand_path(&self.storage.data_dir)
    }

    /// Chunk root used for lookups
    pub fn reader_dir(&self) -> Result<PathBuf> {
        match &self.reader.base_dir {
            Some(dir) => expand_path(dir),
            None => self.data_dir(),
        }
    }

    /// Get the default configuration file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| PkgriskError::Config("Cannot determine config directory".to_string()))?;

        Ok(config_dir.join("pkgrisk").join("config.toml"))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            meta: MetaConfig {
                schema_version: SCHEMA_VERSION.to_string(),
                created_at: current_timestamp(),
                last_modified: current_timestamp(),
            },
            storage: StorageConfig {
                data_dir: PathBuf::from("~/.pkgrisk/data"),
                pretty_json: false,
            },
            scoring: ScoringConfig::default(),
            reader: ReaderConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Expand a leading `~/` to the home directory
pub fn expand_path(path: &Path) -> Result<PathBuf> {
    let path_str = path
        .to_str()
        .ok_or_else(|| PkgriskError::Config("Invalid path encoding".to_string()))?;

    if let Some(stripped) = path_str.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| PkgriskError::Config("Cannot determine home directory".to_string()))?;
        Ok(home.join(stripped))
    } else {
        Ok(path.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.storage.data_dir = temp_dir.path().join("data");
        config.storage.pretty_json = true;
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.storage, config.storage);
        assert_eq!(loaded.meta.schema_version, SCHEMA_VERSION);
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[_meta]\nschema_version = \"1.0.0\"\n\n[storage]\ndata_dir = \"/srv/pkgrisk\"\n",
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.scoring.policy_file, None);
        assert_eq!(config.logging.default_filter, "pkgrisk=info");
        assert_eq!(config.reader_dir().unwrap(), PathBuf::from("/srv/pkgrisk"));
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let result = Config::load(&temp_dir.path().join("absent.toml"));
        assert!(matches!(result, Err(PkgriskError::ConfigNotFound { .. })));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.apply_overrides(vec![
            ("PKGRISK_STORAGE__DATA_DIR".to_string(), "/tmp/out".to_string()),
            ("PKGRISK_STORAGE__PRETTY_JSON".to_string(), "true".to_string()),
            ("PKGRISK_READER__BASE_DIR".to_string(), "/mnt/mirror".to_string()),
            ("OTHER_VAR".to_string(), "ignored".to_string()),
        ]);
        assert_eq!(config.storage.data_dir, PathBuf::from("/tmp/out"));
        assert!(config.storage.pretty_json);
        assert_eq!(config.reader_dir().unwrap(), PathBuf::from("/mnt/mirror"));
    }

    #[test]
    fn test_bad_env_value_is_ignored() {
        let mut config = Config::default();
        config.apply_overrides(vec![(
            "PKGRISK_STORAGE__PRETTY_JSON".to_string(),
            "sometimes".to_string(),
        )]);
        assert!(!config.storage.pretty_json);
    }

    #[test]
    fn test_load_policy_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let policy_path = temp_dir.path().join("policy.toml");
        let mut policy = ScoringPolicy::default();
        policy.weights.security = 35;
        policy.weights.maintenance = 20;
        std::fs::write(&policy_path, policy.to_toml().unwrap()).unwrap();

        let mut config = Config::default();
        assert_eq!(config.load_policy().unwrap(), ScoringPolicy::default());

        config.scoring.policy_file = Some(policy_path);
        assert_eq!(config.load_policy().unwrap().weights.security, 35);
    }

    #[test]
    fn test_expand_path() {
        let plain = expand_path(Path::new("/var/lib/pkgrisk")).unwrap();
        assert_eq!(plain, PathBuf::from("/var/lib/pkgrisk"));

        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_path(Path::new("~/data")).unwrap(), home.join("data"));
        }
    }
}
