//! Configuration
//!
//! Layered settings: built-in defaults, then a TOML file, then
//! `LEDGER_VERIFY_*` environment variables. The hashing secret is never
//! part of the configuration; only the name of the variable holding it is.

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::LedgerError;
use crate::ledger::secret::EnvSecretProvider;

pub const DEFAULT_CONFIG_FILE: &str = "ledger-verify";
pub const DEFAULT_CHUNK_SIZE: usize = 500;
pub const DEFAULT_SECRET_ENV: &str = "LEDGER_HASH_SECRET";
pub const DEFAULT_LOG_FILTER: &str = "ledger_verify=info";
pub const ENV_PREFIX: &str = "LEDGER_VERIFY";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    pub ledger_path: Option<PathBuf>,
    pub chunk_size: usize,
    pub secret_env: String,
    pub log_filter: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            ledger_path: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
            secret_env: DEFAULT_SECRET_ENV.to_string(),
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl LedgerConfig {
    /// Load configuration. An explicit `path` must exist; otherwise
    /// `ledger-verify.toml` in the working directory is used if present.
    pub fn load(path: Option<&Path>) -> Result<Self, LedgerError> {
        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let config: Self = Config::builder()
            .set_default("chunk_size", DEFAULT_CHUNK_SIZE as i64)?
            .set_default("secret_env", DEFAULT_SECRET_ENV)?
            .set_default("log_filter", DEFAULT_LOG_FILTER)?
            .add_source(file)
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize()?;

        config.validate()?;
        debug!("Configuration loaded: {:?}", config);
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.chunk_size == 0 {
            return Err(LedgerError::ConfigError(
                "chunk_size must be at least 1".to_string(),
            ));
        }
        if self.secret_env.trim().is_empty() {
            return Err(LedgerError::ConfigError(
                "secret_env must name an environment variable".to_string(),
            ));
        }
        Ok(())
    }

    pub fn secret_provider(&self) -> EnvSecretProvider {
        EnvSecretProvider::new(self.secret_env.clone())
    }
}
