//! # CLI Configuration
//!
//! ## Load Order
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. Defaults            TallyConfig::default()                          │
//! │  2. TOML file           --config PATH, else <config dir>/tally.toml     │
//! │  3. Environment         TALLY_DB_PATH, TALLY_PAGE_SIZE, ...             │
//! │  4. Command line        --db (applied by main)                          │
//! │                                                                         │
//! │  Later layers win. The result is validated once at the end.            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example File
//! ```toml
//! database_path = "/var/lib/tally/tally.db"
//! page_size = 50
//! currency_symbol = "€"
//! store_scope = "store-downtown"
//! user_name = "Maria"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tally_core::MAX_PAGE_SIZE;
use thiserror::Error;
use tracing::{debug, info};

pub const CONFIG_FILE_NAME: &str = "tally.toml";

pub const DEFAULT_LOG_FILTER: &str = "info,tally=debug,sqlx=warn";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to write config: {0}")]
    Write(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

// =============================================================================
// TallyConfig
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TallyConfig {
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Report rows per page.
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    #[serde(default = "default_currency_symbol")]
    pub currency_symbol: String,

    /// Digits after the decimal point when printing money.
    #[serde(default = "default_currency_decimals")]
    pub currency_decimals: u8,

    /// Tracing filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,

    /// Confines reports and movements to one store.
    #[serde(default)]
    pub store_scope: Option<String>,

    /// Name stamped on recorded rows.
    #[serde(default)]
    pub user_name: Option<String>,
}

fn default_database_path() -> PathBuf {
    directories::ProjectDirs::from("com", "tally", "tally")
        .map(|dirs| dirs.data_dir().join("tally.db"))
        .unwrap_or_else(|| PathBuf::from("./tally.db"))
}

fn default_page_size() -> u32 {
    tally_core::DEFAULT_PAGE_SIZE
}

fn default_currency_symbol() -> String {
    "$".to_string()
}

fn default_currency_decimals() -> u8 {
    2
}

fn default_log_filter() -> String {
    DEFAULT_LOG_FILTER.to_string()
}

impl Default for TallyConfig {
    fn default() -> Self {
        TallyConfig {
            database_path: default_database_path(),
            page_size: default_page_size(),
            currency_symbol: default_currency_symbol(),
            currency_decimals: default_currency_decimals(),
            log_filter: default_log_filter(),
            store_scope: None,
            user_name: None,
        }
    }
}

impl TallyConfig {
    /// Loads configuration from file and environment.
    ///
    /// A missing file is not an error; defaults are used instead.
    pub fn load(config_path: Option<PathBuf>) -> ConfigResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading config from file");
                config = Self::from_file(&path)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&contents)?)
    }

    /// Writes the configuration as pretty TOML, creating parent directories.
    pub fn save(&self, config_path: Option<PathBuf>) -> ConfigResult<PathBuf> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| ConfigError::Write("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self).map_err(|e| ConfigError::Write(e.to_string()))?;
        std::fs::write(&path, contents).map_err(|e| ConfigError::Write(e.to_string()))?;

        info!(?path, "Config saved");
        Ok(path)
    }

    /// `<platform config dir>/tally.toml`, when the platform has one.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "tally", "tally")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    fn apply_env_overrides(&mut self) -> ConfigResult<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Applies `TALLY_*` overrides from `lookup`. An unparseable number is
    /// an error rather than a silent fallback.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> ConfigResult<()> {
        if let Some(path) = lookup("TALLY_DB_PATH") {
            debug!(path = %path, "Overriding database_path from env");
            self.database_path = PathBuf::from(path);
        }

        if let Some(size) = lookup("TALLY_PAGE_SIZE") {
            self.page_size = size.trim().parse().map_err(|_| {
                ConfigError::Invalid(format!("TALLY_PAGE_SIZE must be a whole number, got {size:?}"))
            })?;
            debug!(size = self.page_size, "Overriding page_size from env");
        }

        if let Some(symbol) = lookup("TALLY_CURRENCY_SYMBOL") {
            self.currency_symbol = symbol;
        }

        if let Some(filter) = lookup("TALLY_LOG") {
            self.log_filter = filter;
        }

        if let Some(scope) = lookup("TALLY_STORE_SCOPE") {
            debug!(scope = %scope, "Overriding store_scope from env");
            self.store_scope = Some(scope).filter(|s| !s.trim().is_empty());
        }

        if let Some(user) = lookup("TALLY_USER") {
            self.user_name = Some(user).filter(|u| !u.trim().is_empty());
        }

        Ok(())
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(ConfigError::Invalid(format!(
                "page_size must be between 1 and {}, got {}",
                MAX_PAGE_SIZE, self.page_size
            )));
        }

        if self.currency_decimals > 4 {
            return Err(ConfigError::Invalid(format!(
                "currency_decimals must be at most 4, got {}",
                self.currency_decimals
            )));
        }

        if self.database_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("database_path is empty".into()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: TallyConfig = toml::from_str(
            r#"
            page_size = 50
            currency_symbol = "€"
            "#,
        )
        .unwrap();

        assert_eq!(config.page_size, 50);
        assert_eq!(config.currency_symbol, "€");
        assert_eq!(config.currency_decimals, 2);
        assert_eq!(config.log_filter, DEFAULT_LOG_FILTER);
        assert_eq!(config.store_scope, None);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("TALLY_DB_PATH", "/tmp/t.db"),
            ("TALLY_PAGE_SIZE", "100"),
            ("TALLY_STORE_SCOPE", "s1"),
            ("TALLY_USER", "Maria"),
        ]
        .into_iter()
        .collect();

        let mut config = TallyConfig::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string())).unwrap();

        assert_eq!(config.database_path, PathBuf::from("/tmp/t.db"));
        assert_eq!(config.page_size, 100);
        assert_eq!(config.store_scope.as_deref(), Some("s1"));
        assert_eq!(config.user_name.as_deref(), Some("Maria"));
        assert_eq!(config.currency_symbol, "$");
    }

    #[test]
    fn test_bad_env_number_is_reported() {
        let mut config = TallyConfig::default();
        let err = config
            .apply_overrides(|key| (key == "TALLY_PAGE_SIZE").then(|| "lots".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        assert!(err.to_string().contains("TALLY_PAGE_SIZE"));
        assert_eq!(config.page_size, tally_core::DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn test_blank_scope_from_env_is_unscoped() {
        let mut config = TallyConfig {
            store_scope: Some("s1".into()),
            ..TallyConfig::default()
        };
        config
            .apply_overrides(|key| (key == "TALLY_STORE_SCOPE").then(|| " ".to_string()))
            .unwrap();
        assert_eq!(config.store_scope, None);
    }

    #[test]
    fn test_validate() {
        assert!(TallyConfig::default().validate().is_ok());

        let zero = TallyConfig {
            page_size: 0,
            ..TallyConfig::default()
        };
        assert!(matches!(zero.validate(), Err(ConfigError::Invalid(_))));

        let precise = TallyConfig {
            currency_decimals: 9,
            ..TallyConfig::default()
        };
        assert!(precise.validate().is_err());
    }

    #[test]
    fn test_save_then_load() {
        let dir = std::env::temp_dir().join(format!("tally-config-{}", std::process::id()));
        let path = dir.join(CONFIG_FILE_NAME);

        let config = TallyConfig {
            page_size: 40,
            user_name: Some("Sam".into()),
            ..TallyConfig::default()
        };
        config.save(Some(path.clone())).unwrap();

        let loaded = TallyConfig::from_file(&path).unwrap();
        assert_eq!(loaded, config);

        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_wrong_type_is_parse_error() {
        let err = toml::from_str::<TallyConfig>("page_size = \"many\"").unwrap_err();
        assert!(ConfigError::from(err).to_string().contains("parse"));
    }
}
