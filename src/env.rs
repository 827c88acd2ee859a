use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::AppError;

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

pub fn load_environment() -> Result<(), Box<dyn std::error::Error>> {
    let is_production =
        dotenvy::var("APP_ENV").unwrap_or("development".to_string()) == "production";

    let env_files = if is_production {
        vec!["config/common.env", "config/prod.env", ".secrets.env"]
    } else {
        vec!["config/common.env", "config/dev.env", ".secrets.env"]
    };

    for env_file in env_files {
        load_env_file(env_file)?;
    }

    Ok(())
}

fn load_env_file(path: &str) -> Result<(), Box<dyn std::error::Error>> {
    if !Path::new(path).exists() {
        warn!("Warning: Environment file {} not found, skipping", path);
        return Ok(());
    }

    dotenvy::from_filename_override(path)?;
    info!("Loaded environment from: {}", path);
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Development,
    Production,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: Environment,
    /// Restricted pool, always required.
    pub database_url: String,
    /// Privileged pool; when unset every request runs on the restricted one.
    pub service_database_url: Option<String>,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub openai_base_url: String,
    pub openai_timeout_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let database_url = non_empty_var("DATABASE_URL")
            .ok_or_else(|| AppError::Internal("DATABASE_URL is not set".to_string()))?;

        let environment = match non_empty_var("APP_ENV").as_deref() {
            Some("production") => Environment::Production,
            _ => Environment::Development,
        };

        let openai_timeout_secs = match non_empty_var("OPENAI_TIMEOUT_SECS") {
            Some(raw) => raw.parse().map_err(|_| {
                AppError::Internal(format!("OPENAI_TIMEOUT_SECS is not a number: {}", raw))
            })?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        Ok(Self {
            environment,
            database_url,
            service_database_url: non_empty_var("SERVICE_DATABASE_URL"),
            openai_api_key: non_empty_var("OPENAI_API_KEY"),
            openai_model: non_empty_var("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.into()),
            openai_base_url: non_empty_var("OPENAI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_BASE_URL.into()),
            openai_timeout_secs,
        })
    }

    pub fn is_development(&self) -> bool {
        self.environment == Environment::Development
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    dotenvy::var(key).ok().filter(|value| !value.trim().is_empty())
}

#[cfg(test)]
pub fn test_config() -> AppConfig {
    AppConfig {
        environment: Environment::Development,
        database_url: "sqlite::memory:".to_string(),
        service_database_url: None,
        openai_api_key: None,
        openai_model: "test-model".to_string(),
        openai_base_url: DEFAULT_BASE_URL.to_string(),
        openai_timeout_secs: DEFAULT_TIMEOUT_SECS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn reads_defaults_when_only_database_is_set() {
        temp_env::with_vars(
            [
                ("DATABASE_URL", Some("sqlite://courtside.db")),
                ("SERVICE_DATABASE_URL", None),
                ("OPENAI_MODEL", None),
                ("OPENAI_BASE_URL", None),
                ("OPENAI_TIMEOUT_SECS", None),
                ("APP_ENV", None),
            ],
            || {
                let config = AppConfig::from_env().unwrap();
                assert_eq!(config.database_url, "sqlite://courtside.db");
                assert!(config.service_database_url.is_none());
                assert_eq!(config.openai_model, DEFAULT_MODEL);
                assert_eq!(config.openai_timeout_secs, DEFAULT_TIMEOUT_SECS);
                assert!(config.is_development());
            },
        );
    }

    #[test]
    #[serial]
    fn blank_service_url_is_treated_as_missing() {
        temp_env::with_vars(
            [
                ("DATABASE_URL", Some("sqlite://courtside.db")),
                ("SERVICE_DATABASE_URL", Some("  ")),
                ("APP_ENV", Some("production")),
            ],
            || {
                let config = AppConfig::from_env().unwrap();
                assert!(config.service_database_url.is_none());
                assert!(!config.is_development());
            },
        );
    }

    #[test]
    #[serial]
    fn missing_database_url_is_an_error() {
        temp_env::with_vars([("DATABASE_URL", None::<&str>)], || {
            assert!(AppConfig::from_env().is_err());
        });
    }

    #[test]
    #[serial]
    fn rejects_non_numeric_timeout() {
        temp_env::with_vars(
            [
                ("DATABASE_URL", Some("sqlite://courtside.db")),
                ("OPENAI_TIMEOUT_SECS", Some("soon")),
            ],
            || {
                assert!(AppConfig::from_env().is_err());
            },
        );
    }
}
