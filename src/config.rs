use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Application-level constants
pub const APP_NAME: &str = "MedSync";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Header carrying the pre-shared API key unless overridden.
pub const DEFAULT_KEY_HEADER: &str = "x-api-key";
/// Referer sent to the pharmacy platform unless overridden.
pub const DEFAULT_REFERER: &str = "https://medsync.local";
/// Per-request timeout. The retry policy caps attempts, not wall-clock time.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_BASE_MS: u64 = 500;
pub const DEFAULT_API_ADDR: &str = "127.0.0.1:8787";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

/// Default tracing filter when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "info,medsync_lib=debug,hyper=warn,reqwest=warn"
}

/// Get the application data directory
/// ~/MedSync/ on all platforms
pub fn app_data_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(APP_NAME))
}

/// Default database location inside the data directory.
pub fn default_db_path() -> Option<PathBuf> {
    app_data_dir().map(|dir| dir.join("medsync.db"))
}

/// Connection settings for the external pharmacy platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PharmacyConfig {
    pub base_url: String,
    pub api_key: String,
    pub key_header: String,
    pub referer: String,
    /// Fallback when the create response carries no group id.
    pub group_id: Option<String>,
    pub default_prescriber_id: Option<String>,
    pub timeout_secs: u64,
    pub retry_attempts: u32,
    pub retry_base_ms: u64,
}

impl PharmacyConfig {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            key_header: DEFAULT_KEY_HEADER.to_string(),
            referer: DEFAULT_REFERER.to_string(),
            group_id: None,
            default_prescriber_id: None,
            timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            retry_base_ms: DEFAULT_RETRY_BASE_MS,
        }
    }

    /// Build from `MEDSYNC_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (environment, tests).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let base_url = get("MEDSYNC_PHARMACY_URL").ok_or(ConfigError::Missing("MEDSYNC_PHARMACY_URL"))?;
        let api_key =
            get("MEDSYNC_PHARMACY_API_KEY").ok_or(ConfigError::Missing("MEDSYNC_PHARMACY_API_KEY"))?;

        let mut config = Self::new(&base_url, &api_key);
        if let Some(header) = get("MEDSYNC_PHARMACY_KEY_HEADER") {
            config.key_header = header;
        }
        if let Some(referer) = get("MEDSYNC_PHARMACY_REFERER") {
            config.referer = referer;
        }
        config.group_id = get("MEDSYNC_PHARMACY_GROUP_ID");
        config.default_prescriber_id = get("MEDSYNC_DEFAULT_PRESCRIBER_ID");

        if let Some(raw) = get("MEDSYNC_HTTP_TIMEOUT_SECS") {
            config.timeout_secs = parse_number("MEDSYNC_HTTP_TIMEOUT_SECS", &raw)?;
            if config.timeout_secs == 0 {
                return Err(ConfigError::Invalid {
                    key: "MEDSYNC_HTTP_TIMEOUT_SECS",
                    value: raw,
                });
            }
        }
        if let Some(raw) = get("MEDSYNC_RETRY_ATTEMPTS") {
            config.retry_attempts = parse_number("MEDSYNC_RETRY_ATTEMPTS", &raw)?;
            if config.retry_attempts == 0 {
                return Err(ConfigError::Invalid {
                    key: "MEDSYNC_RETRY_ATTEMPTS",
                    value: raw,
                });
            }
        }
        if let Some(raw) = get("MEDSYNC_RETRY_BASE_MS") {
            config.retry_base_ms = parse_number("MEDSYNC_RETRY_BASE_MS", &raw)?;
        }

        Ok(config)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Settings for the local HTTP surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub db_path: PathBuf,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw_addr = lookup("MEDSYNC_API_ADDR").unwrap_or_else(|| DEFAULT_API_ADDR.to_string());
        let addr = raw_addr.parse().map_err(|_| ConfigError::Invalid {
            key: "MEDSYNC_API_ADDR",
            value: raw_addr.clone(),
        })?;

        let db_path = match lookup("MEDSYNC_DB_PATH") {
            Some(path) => PathBuf::from(path),
            None => default_db_path().ok_or(ConfigError::Missing("MEDSYNC_DB_PATH"))?,
        };

        Ok(Self { addr, db_path })
    }
}

fn parse_number<T: std::str::FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::Invalid {
        key,
        value: raw.to_string(),
    })
}
