//! Configuration loading
//!
//! Loads layered `.env` files and environment variables prefixed with
//! `JOBWARDEN_`, producing a typed [`AppConfig`]. CLI flags override
//! whatever the environment provides.

use std::{collections::BTreeMap, env, path::PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application configuration derived from `JOBWARDEN_*` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_profile")]
    pub profile: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_format")]
    pub log_format: String,
    /// SQL authentication user applied when no `--sql-user` flag is given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sql_user: Option<String>,
    /// SQL authentication password applied when no `--sql-password` flag is given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sql_password: Option<String>,
    /// Default target owner login applied when no `--login` flag is given.
    /// Absent means dynamic resolution of the principal-id-1 login.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_login: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            profile: default_profile(),
            log_level: default_log_level(),
            log_format: default_log_format(),
            sql_user: None,
            sql_password: None,
            default_login: None,
        }
    }
}

impl AppConfig {
    /// Returns a redacted JSON representation (secrets are redacted).
    pub fn redacted_json(&self) -> serde_json::Result<String> {
        let mut config = self.clone();
        if config.sql_password.is_some() {
            config.sql_password = Some("[REDACTED]".to_string());
        }
        serde_json::to_string_pretty(&config)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !matches!(self.log_format.as_str(), "json" | "pretty") {
            return Err(ConfigError::InvalidLogFormat {
                value: self.log_format.clone(),
            });
        }
        if self.profile.is_empty() {
            return Err(ConfigError::EmptyProfile);
        }
        Ok(())
    }
}

fn default_profile() -> String {
    "local".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load environment file {path}: {source}")]
    EnvFile {
        path: PathBuf,
        source: dotenvy::Error,
    },
    #[error("log format must be 'json' or 'pretty', got '{value}'")]
    InvalidLogFormat { value: String },
    #[error("profile must not be empty; unset JOBWARDEN_PROFILE to use the default")]
    EmptyProfile,
}

/// Loads configuration using layered `.env` files and `JOBWARDEN_*` env vars.
///
/// Layering order, later wins: `.env`, `.env.local`, `.env.<profile>`,
/// `.env.<profile>.local`, process environment.
pub struct ConfigLoader {
    base_dir: PathBuf,
}

impl ConfigLoader {
    /// Creates a new loader rooted at the current working directory.
    pub fn new() -> Self {
        Self {
            base_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    /// Creates a loader rooted at the provided directory (useful for tests).
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let (mut layered, profile_hint) = self.collect_layered_env()?;

        // Overlay process environment last so it wins.
        for (key, value) in env::vars() {
            if let Some(stripped) = key.strip_prefix("JOBWARDEN_") {
                layered.insert(stripped.to_string(), value);
            }
        }

        let non_empty = |value: Option<String>| value.filter(|v| !v.is_empty());

        let profile = non_empty(layered.remove("PROFILE")).unwrap_or(profile_hint);
        let log_level = non_empty(layered.remove("LOG_LEVEL")).unwrap_or_else(default_log_level);
        let log_format = non_empty(layered.remove("LOG_FORMAT")).unwrap_or_else(default_log_format);
        let sql_user = non_empty(layered.remove("SQL_USER"));
        let sql_password = non_empty(layered.remove("SQL_PASSWORD"));
        let default_login = non_empty(layered.remove("LOGIN"));

        let config = AppConfig {
            profile,
            log_level,
            log_format,
            sql_user,
            sql_password,
            default_login,
        };
        config.validate()?;
        Ok(config)
    }

    fn collect_layered_env(&self) -> Result<(BTreeMap<String, String>, String), ConfigError> {
        let mut values = BTreeMap::new();

        self.merge_dotenv(self.base_dir.join(".env"), &mut values)?;
        self.merge_dotenv(self.base_dir.join(".env.local"), &mut values)?;

        let profile = env::var("JOBWARDEN_PROFILE")
            .ok()
            .or_else(|| values.get("PROFILE").cloned())
            .unwrap_or_else(default_profile);

        self.merge_dotenv(
            self.base_dir.join(format!(".env.{}", &profile)),
            &mut values,
        )?;
        self.merge_dotenv(
            self.base_dir.join(format!(".env.{}.local", &profile)),
            &mut values,
        )?;

        Ok((values, profile))
    }

    fn merge_dotenv(
        &self,
        path: PathBuf,
        values: &mut BTreeMap<String, String>,
    ) -> Result<(), ConfigError> {
        match dotenvy::from_path_iter(&path) {
            Ok(iter) => {
                for item in iter {
                    let (key, value) = item.map_err(|source| ConfigError::EnvFile {
                        path: path.clone(),
                        source,
                    })?;
                    if let Some(stripped) = key.strip_prefix("JOBWARDEN_") {
                        values.insert(stripped.to_string(), value);
                    }
                }
                Ok(())
            }
            Err(dotenvy::Error::Io(ref io_err))
                if io_err.kind() == std::io::ErrorKind::NotFound =>
            {
                Ok(())
            }
            Err(err) => Err(ConfigError::EnvFile { path, source: err }),
        }
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
