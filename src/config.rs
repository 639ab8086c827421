//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration file (config/local.toml)
//! 3. Environment variables (override)

use serde::Deserialize;
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub ilias: IliasConfig,
    pub cache: CacheConfig,
    pub logging: LoggingConfig,
}

/// Database configuration (SQLite only)
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file
    pub path: PathBuf,
}

/// Offline storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Root directory for per-user offline content
    pub root: PathBuf,
}

/// ILIAS installation the client talks to
#[derive(Debug, Clone, Deserialize)]
pub struct IliasConfig {
    /// Installation URL (e.g., "https://ilias.example.com")
    pub base_url: String,
    /// Path of the REST plugin entry point, relative to `base_url`
    pub api_path: String,
    /// Bearer token for the REST plugin
    pub access_token: Option<String>,
    /// Request timeout in seconds (default: 30)
    pub timeout_seconds: u64,
    /// User agent sent with every request
    pub user_agent: String,
}

impl IliasConfig {
    /// Full URL of the REST API root
    ///
    /// # Returns
    /// URL like "https://ilias.example.com/Customizing/.../api.php"
    pub fn api_url(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.api_path.trim_start_matches('/')
        )
    }
}

/// Object cache configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Maximum objects kept in memory (default: 10000)
    pub max_objects: u64,
    /// Object TTL in seconds (default: 3600)
    pub ttl_seconds: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

impl LoggingConfig {
    /// Default `EnvFilter` directive for the crate
    pub fn filter_directive(&self) -> String {
        format!("pegasus={}", self.level.trim().to_ascii_lowercase())
    }

    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/local.toml (if exists)
    /// 4. Environment variables (PEGASUS__*)
    ///
    /// # Errors
    /// Returns error if configuration is invalid
    pub fn load() -> Result<Self, crate::error::AppError> {
        use config::{Config, Environment, File};

        let config = Config::builder()
            .set_default("database.path", "data/pegasus.db")?
            .set_default("storage.root", "data/offline")?
            .set_default(
                "ilias.api_path",
                "/Customizing/global/plugins/Services/UIComponent/UserInterfaceHook/REST/api.php",
            )?
            .set_default("ilias.timeout_seconds", 30)?
            .set_default("ilias.user_agent", "Pegasus/0.1.0")?
            .set_default("cache.max_objects", 10000)?
            .set_default("cache.ttl_seconds", 3600)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::with_prefix("PEGASUS")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;
        app_config.validate()?;
        Ok(app_config)
    }

    pub(crate) fn validate(&self) -> Result<(), crate::error::AppError> {
        let parsed = url::Url::parse(&self.ilias.base_url).map_err(|e| {
            crate::error::AppError::Config(format!("ilias.base_url is not a valid URL: {e}"))
        })?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(crate::error::AppError::Config(
                "ilias.base_url must use http or https".to_string(),
            ));
        }
        if parsed.scheme() == "http" {
            tracing::warn!(
                base_url = %self.ilias.base_url,
                "Talking to ILIAS over plain http"
            );
        }

        if self.ilias.timeout_seconds == 0 {
            return Err(crate::error::AppError::Config(
                "ilias.timeout_seconds must be greater than 0".to_string(),
            ));
        }

        if !["pretty", "json"].contains(&self.logging.format.to_ascii_lowercase().as_str()) {
            return Err(crate::error::AppError::Config(format!(
                "logging.format must be pretty or json, got {}",
                self.logging.format
            )));
        }

        if self.cache.max_objects == 0 {
            return Err(crate::error::AppError::Config(
                "cache.max_objects must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> AppConfig {
        AppConfig {
            database: DatabaseConfig {
                path: PathBuf::from("/tmp/pegasus-test.db"),
            },
            storage: StorageConfig {
                root: PathBuf::from("/tmp/pegasus-offline"),
            },
            ilias: IliasConfig {
                base_url: "https://ilias.example.com/".to_string(),
                api_path: "/rest/api.php".to_string(),
                access_token: None,
                timeout_seconds: 30,
                user_agent: "Pegasus/test".to_string(),
            },
            cache: CacheConfig {
                max_objects: 100,
                ttl_seconds: 60,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        }
    }

    #[test]
    fn validate_accepts_https_installation() {
        let config = valid_config();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn api_url_joins_without_double_slash() {
        let config = valid_config();
        assert_eq!(
            config.ilias.api_url(),
            "https://ilias.example.com/rest/api.php"
        );
    }

    #[test]
    fn validate_rejects_non_http_scheme() {
        let mut config = valid_config();
        config.ilias.base_url = "ftp://ilias.example.com".to_string();

        let error = config
            .validate()
            .expect_err("ftp installations must be rejected");
        assert!(matches!(
            error,
            crate::error::AppError::Config(message) if message.contains("http or https")
        ));
    }

    #[test]
    fn validate_rejects_zero_timeout() {
        let mut config = valid_config();
        config.ilias.timeout_seconds = 0;

        let error = config.validate().expect_err("zero timeout must fail");
        assert!(matches!(
            error,
            crate::error::AppError::Config(message)
                if message.contains("ilias.timeout_seconds")
        ));
    }

    #[test]
    fn validate_rejects_empty_cache() {
        let mut config = valid_config();
        config.cache.max_objects = 0;

        assert!(config.validate().is_err());
    }

    #[test]
    fn logging_settings_drive_subscriber() {
        let mut config = valid_config();
        config.logging.level = "DEBUG".to_string();
        config.logging.format = "json".to_string();
        assert_eq!(config.logging.filter_directive(), "pegasus=debug");
        assert!(config.logging.is_json());
        assert!(config.validate().is_ok());

        config.logging.format = "pretty".to_string();
        assert!(!config.logging.is_json());
    }

    #[test]
    fn validate_rejects_unknown_log_format() {
        let mut config = valid_config();
        config.logging.format = "xml".to_string();
        assert!(config.validate().is_err());
    }
}
