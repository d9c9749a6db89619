// src/app/config.rs
//
// Application Configuration
//
// Defaults suit a desktop install; every value can be overridden through
// CARDVAULT_* environment variables.
//
// RULES:
// - An unset or blank variable keeps the default
// - A set but unparsable variable is an error, never silently ignored

use std::path::PathBuf;

use crate::error::{AppError, AppResult};
use crate::infrastructure::DEFAULT_QUOTA_BYTES;
use crate::integrations::DEFAULT_DATASET_URL;
use crate::services::{ReconciliationRules, DEFAULT_CATALOG_TTL_HOURS, DEFAULT_FRESHNESS_DAYS};

pub const ENV_DATA_DIR: &str = "CARDVAULT_DATA_DIR";
pub const ENV_QUOTA_BYTES: &str = "CARDVAULT_QUOTA_BYTES";
pub const ENV_DATASET_URL: &str = "CARDVAULT_DATASET_URL";
pub const ENV_FRESHNESS_DAYS: &str = "CARDVAULT_FRESHNESS_DAYS";
pub const ENV_CATALOG_TTL_HOURS: &str = "CARDVAULT_CATALOG_TTL_HOURS";

const APP_DIR_NAME: &str = "cardvault";

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// Directory holding the database file
    pub data_dir: PathBuf,

    /// Shared capacity of the dataset and the key-value store
    pub quota_bytes: u64,

    pub dataset_url: String,

    /// Age after which the stored dataset counts as stale
    pub freshness_days: i64,

    pub catalog_ttl_hours: i64,

    pub rules: ReconciliationRules,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            quota_bytes: DEFAULT_QUOTA_BYTES,
            dataset_url: DEFAULT_DATASET_URL.to_string(),
            freshness_days: DEFAULT_FRESHNESS_DAYS,
            catalog_ttl_hours: DEFAULT_CATALOG_TTL_HOURS,
            rules: ReconciliationRules::default(),
        }
    }
}

impl AppConfig {
    /// Defaults overridden by the process environment
    pub fn from_env() -> AppResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let read = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        if let Some(dir) = read(ENV_DATA_DIR) {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(raw) = read(ENV_QUOTA_BYTES) {
            config.quota_bytes = parse_var(ENV_QUOTA_BYTES, &raw)?;
        }
        if let Some(url) = read(ENV_DATASET_URL) {
            config.dataset_url = url;
        }
        if let Some(raw) = read(ENV_FRESHNESS_DAYS) {
            config.freshness_days = parse_positive(ENV_FRESHNESS_DAYS, &raw)?;
        }
        if let Some(raw) = read(ENV_CATALOG_TTL_HOURS) {
            config.catalog_ttl_hours = parse_positive(ENV_CATALOG_TTL_HOURS, &raw)?;
        }

        Ok(config)
    }

    pub fn freshness_window(&self) -> chrono::Duration {
        chrono::Duration::days(self.freshness_days)
    }

    pub fn catalog_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.catalog_ttl_hours)
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}

fn parse_var<T>(name: &str, raw: &str) -> AppResult<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse()
        .map_err(|e| AppError::Other(format!("Invalid {} value '{}': {}", name, raw, e)))
}

fn parse_positive(name: &str, raw: &str) -> AppResult<i64> {
    let value: i64 = parse_var(name, raw)?;
    if value <= 0 {
        return Err(AppError::Other(format!(
            "Invalid {} value '{}': must be positive",
            name, raw
        )));
    }
    Ok(value)
}
