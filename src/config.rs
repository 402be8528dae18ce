use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::constants::{DEFAULT_SOURCE_URL, DEFAULT_TABLE_NAME, IN_MEMORY_STORE};
use crate::error::{EtlError, Result};
use crate::pipeline::retry::RetryPolicy;

/// Environment variables consulted by [`PipelineConfig::apply_env_overrides`].
pub const ENV_SOURCE_URL: &str = "ETL_SOURCE_URL";
pub const ENV_TABLE_NAME: &str = "ETL_TABLE_NAME";
pub const ENV_STORE_LOCATOR: &str = "ETL_STORE_LOCATOR";

/// Everything a pipeline run needs. Missing TOML keys fall back to the
/// reference configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub source_url: String,
    pub table_name: String,
    /// `":memory:"` or a path to a SQLite database file.
    pub store_locator: String,
    pub request_timeout_secs: Option<u64>,
    pub retry: RetryPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            source_url: DEFAULT_SOURCE_URL.to_string(),
            table_name: DEFAULT_TABLE_NAME.to_string(),
            store_locator: IN_MEMORY_STORE.to_string(),
            request_timeout_secs: None,
            retry: RetryPolicy::default(),
        }
    }
}

impl PipelineConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            EtlError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: PipelineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Override fields from `ETL_*` variables that are set and non-empty.
    pub fn apply_env_overrides(&mut self) {
        let var = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());
        if let Some(v) = var(ENV_SOURCE_URL) {
            self.source_url = v;
        }
        if let Some(v) = var(ENV_TABLE_NAME) {
            self.table_name = v;
        }
        if let Some(v) = var(ENV_STORE_LOCATOR) {
            self.store_locator = v;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.source_url.trim().is_empty() {
            return Err(EtlError::Config("source_url must not be empty".to_string()));
        }
        if self.table_name.trim().is_empty() {
            return Err(EtlError::Config("table_name must not be empty".to_string()));
        }
        if self.store_locator.trim().is_empty() {
            return Err(EtlError::Config("store_locator must not be empty".to_string()));
        }
        if self.retry.max_attempts == 0 {
            return Err(EtlError::Config("retry.max_attempts must be at least 1".to_string()));
        }
        Ok(())
    }
}
