// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration for appmgr-control.

use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

/// Default chartmuseum base URL.
pub const DEFAULT_CHART_REGISTRY_URL: &str = "http://chart-dev.dccn.ankr.com:8080";

/// Upper bound for the staleness and retention windows (100 years).
pub const MAX_WINDOW_SECS: u64 = 100 * 365 * 24 * 60 * 60;

/// Control plane configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection string; absent when running on the in-memory store.
    pub database_url: Option<String>,
    /// Maximum connections in the database pool.
    pub db_pool_limit: u32,
    /// Chart registry (chartmuseum) base URL.
    pub chart_registry_url: String,
    /// Timeout for chart registry requests.
    pub chart_registry_timeout: Duration,
    /// How long a running namespace may be absent from heartbeats before it
    /// is marked unavailable.
    pub heartbeat_staleness: Duration,
    /// How long canceled records stay visible in listings.
    pub visibility_retention: Duration,
    /// Buffer size of the command, feedback and heartbeat channels.
    pub channel_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            db_pool_limit: 10,
            chart_registry_url: DEFAULT_CHART_REGISTRY_URL.to_string(),
            chart_registry_timeout: Duration::from_secs(10),
            heartbeat_staleness: Duration::from_secs(60),
            visibility_retention: Duration::from_secs(7200),
            channel_capacity: 1024,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let database_url = std::env::var("APPMGR_DATABASE_URL").ok();

        let db_pool_limit = env_parse("APPMGR_DB_POOL_LIMIT", defaults.db_pool_limit)?;

        let chart_registry_url = std::env::var("APPMGR_CHART_REGISTRY_URL")
            .unwrap_or(defaults.chart_registry_url)
            .trim_end_matches('/')
            .to_string();

        let chart_registry_timeout = Duration::from_secs(env_parse(
            "APPMGR_CHART_REGISTRY_TIMEOUT_SECS",
            defaults.chart_registry_timeout.as_secs(),
        )?);

        let heartbeat_staleness =
            env_window("APPMGR_HEARTBEAT_STALENESS_SECS", defaults.heartbeat_staleness)?;

        let visibility_retention =
            env_window("APPMGR_VISIBILITY_RETENTION_SECS", defaults.visibility_retention)?;

        let channel_capacity =
            env_parse("APPMGR_CHANNEL_CAPACITY", defaults.channel_capacity)?;
        if channel_capacity == 0 {
            return Err(ConfigError::Invalid(
                "APPMGR_CHANNEL_CAPACITY",
                "must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            database_url,
            db_pool_limit,
            chart_registry_url,
            chart_registry_timeout,
            heartbeat_staleness,
            visibility_retention,
            channel_capacity,
        })
    }

    /// Load a `.env` file if present, then read the environment.
    pub fn load() -> Result<Self, ConfigError> {
        if let Err(e) = dotenvy::dotenv() {
            warn!("No .env file loaded: {}", e);
        }
        Self::from_env()
    }

    /// Database URL, or an error naming the missing variable.
    pub fn require_database_url(&self) -> Result<&str, ConfigError> {
        self.database_url
            .as_deref()
            .ok_or(ConfigError::MissingEnvVar("APPMGR_DATABASE_URL"))
    }
}

fn env_parse<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(name, format!("cannot parse '{}'", raw))),
        Err(_) => Ok(default),
    }
}

fn env_window(name: &'static str, default: Duration) -> Result<Duration, ConfigError> {
    let secs = env_parse(name, default.as_secs())?;
    if secs > MAX_WINDOW_SECS {
        return Err(ConfigError::Invalid(
            name,
            format!("{} seconds exceeds the maximum of {}", secs, MAX_WINDOW_SECS),
        ));
    }
    Ok(Duration::from_secs(secs))
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable is missing.
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(&'static str),
    /// An environment variable has an unusable value.
    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const VARS: &[&str] = &[
        "APPMGR_DATABASE_URL",
        "APPMGR_DB_POOL_LIMIT",
        "APPMGR_CHART_REGISTRY_URL",
        "APPMGR_CHART_REGISTRY_TIMEOUT_SECS",
        "APPMGR_HEARTBEAT_STALENESS_SECS",
        "APPMGR_VISIBILITY_RETENTION_SECS",
        "APPMGR_CHANNEL_CAPACITY",
    ];

    struct EnvGuard {
        vars: Vec<(String, Option<String>)>,
    }

    impl EnvGuard {
        fn clean() -> Self {
            let mut guard = Self { vars: Vec::new() };
            for key in VARS {
                guard.remove(key);
            }
            guard
        }

        fn set(&mut self, key: &str, value: &str) {
            let old = env::var(key).ok();
            self.vars.push((key.to_string(), old));
            // SAFETY: Tests are serialized via ENV_MUTEX, so no concurrent access
            unsafe { env::set_var(key, value) };
        }

        fn remove(&mut self, key: &str) {
            let old = env::var(key).ok();
            self.vars.push((key.to_string(), old));
            // SAFETY: Tests are serialized via ENV_MUTEX, so no concurrent access
            unsafe { env::remove_var(key) };
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for (key, value) in self.vars.drain(..).rev() {
                // SAFETY: Tests are serialized via ENV_MUTEX, so no concurrent access
                unsafe {
                    match value {
                        Some(v) => env::set_var(&key, v),
                        None => env::remove_var(&key),
                    }
                }
            }
        }
    }

    #[test]
    fn test_defaults_when_unset() {
        let _lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
        let _guard = EnvGuard::clean();

        let config = Config::from_env().unwrap();
        assert_eq!(config.database_url, None);
        assert_eq!(config.heartbeat_staleness, Duration::from_secs(60));
        assert_eq!(config.visibility_retention, Duration::from_secs(7200));
        assert_eq!(config.chart_registry_url, DEFAULT_CHART_REGISTRY_URL);
        assert!(matches!(
            config.require_database_url(),
            Err(ConfigError::MissingEnvVar("APPMGR_DATABASE_URL"))
        ));
    }

    #[test]
    fn test_overrides() {
        let _lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
        let mut guard = EnvGuard::clean();
        guard.set("APPMGR_DATABASE_URL", "postgres://localhost/appmgr");
        guard.set("APPMGR_CHART_REGISTRY_URL", "http://charts.local/");
        guard.set("APPMGR_HEARTBEAT_STALENESS_SECS", "15");
        guard.set("APPMGR_VISIBILITY_RETENTION_SECS", "30");

        let config = Config::from_env().unwrap();
        assert_eq!(config.require_database_url().unwrap(), "postgres://localhost/appmgr");
        assert_eq!(config.chart_registry_url, "http://charts.local");
        assert_eq!(config.heartbeat_staleness, Duration::from_secs(15));
        assert_eq!(config.visibility_retention, Duration::from_secs(30));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
        let mut guard = EnvGuard::clean();
        guard.set("APPMGR_DB_POOL_LIMIT", "lots");

        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid("APPMGR_DB_POOL_LIMIT", _)));

        guard.set("APPMGR_DB_POOL_LIMIT", "4");
        guard.set("APPMGR_CHANNEL_CAPACITY", "0");
        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid("APPMGR_CHANNEL_CAPACITY", _)));
    }

    #[test]
    fn test_windows_beyond_bound_are_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
        let mut guard = EnvGuard::clean();

        guard.set("APPMGR_VISIBILITY_RETENTION_SECS", &u64::MAX.to_string());
        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid("APPMGR_VISIBILITY_RETENTION_SECS", _)));

        guard.set("APPMGR_VISIBILITY_RETENTION_SECS", "7200");
        guard.set("APPMGR_HEARTBEAT_STALENESS_SECS", &(MAX_WINDOW_SECS + 1).to_string());
        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid("APPMGR_HEARTBEAT_STALENESS_SECS", _)));

        guard.set("APPMGR_HEARTBEAT_STALENESS_SECS", &MAX_WINDOW_SECS.to_string());
        let config = Config::from_env().unwrap();
        assert_eq!(config.heartbeat_staleness, Duration::from_secs(MAX_WINDOW_SECS));
    }
}
