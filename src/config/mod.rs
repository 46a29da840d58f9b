//! Configuration loading for the GBP sync service.
//!
//! Loads layered `.env` files and environment variables prefixed with
//! `GBPSYNC_`, producing a typed [`AppConfig`].

use std::{collections::BTreeMap, env, net::SocketAddr, path::PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application configuration derived from `GBPSYNC_*` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct AppConfig {
    #[serde(default = "default_profile")]
    pub profile: String,
    #[serde(default = "default_api_bind_addr")]
    pub api_bind_addr: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_format")]
    pub log_format: String,
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,
    #[serde(default = "default_db_acquire_timeout_ms")]
    pub db_acquire_timeout_ms: u64,
    /// Base URL of the business-data provider API
    #[serde(default = "default_provider_api_base")]
    pub provider_api_base: String,
    /// Static bearer credential handed to the provider client; in a full
    /// deployment the OAuth collaborator supplies tokens instead
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_token: Option<String>,
    #[serde(default = "default_provider_timeout_ms")]
    pub provider_timeout_ms: u64,
    /// Number of tenant dashboard buckets held in the aggregate cache
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
    /// Buffered progress events per subscriber before lagging
    #[serde(default = "default_progress_buffer")]
    pub progress_buffer: usize,
    #[serde(default)]
    pub executor: ExecutorConfig,
    #[serde(default)]
    pub commit_retry: CommitRetryConfig,
}

/// Sync executor (queue consumer) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct ExecutorConfig {
    /// Milliseconds between executor ticks
    #[serde(default = "default_executor_tick_ms")]
    pub tick_ms: u64,
    /// Maximum number of concurrent jobs
    #[serde(default = "default_executor_concurrency")]
    pub concurrency: usize,
    /// Maximum number of jobs to claim in one batch
    #[serde(default = "default_executor_claim_batch")]
    pub claim_batch: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            tick_ms: default_executor_tick_ms(),
            concurrency: default_executor_concurrency(),
            claim_batch: default_executor_claim_batch(),
        }
    }
}

/// Retry policy applied to the atomic commit call.
///
/// Transient commit failures are retried with exponential backoff:
/// `base_delay_ms * 2^failures`, capped at `max_delay_ms`, plus jitter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct CommitRetryConfig {
    /// Total attempts including the first (default: 4)
    #[serde(default = "default_commit_max_attempts")]
    pub max_attempts: u32,
    /// Starting backoff in milliseconds (default: 500)
    #[serde(default = "default_commit_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Backoff cap in milliseconds (default: 10000)
    #[serde(default = "default_commit_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Random factor applied to each backoff (range 0.0-1.0, default: 0.1)
    #[serde(default = "default_commit_jitter_factor")]
    pub jitter_factor: f64,
    /// Per-attempt timeout for the commit call; expiry counts as transient
    #[serde(default = "default_commit_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for CommitRetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_commit_max_attempts(),
            base_delay_ms: default_commit_base_delay_ms(),
            max_delay_ms: default_commit_max_delay_ms(),
            jitter_factor: default_commit_jitter_factor(),
            timeout_ms: default_commit_timeout_ms(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            profile: default_profile(),
            api_bind_addr: default_api_bind_addr(),
            log_level: default_log_level(),
            log_format: default_log_format(),
            database_url: default_database_url(),
            db_max_connections: default_db_max_connections(),
            db_acquire_timeout_ms: default_db_acquire_timeout_ms(),
            provider_api_base: default_provider_api_base(),
            provider_token: None,
            provider_timeout_ms: default_provider_timeout_ms(),
            cache_capacity: default_cache_capacity(),
            progress_buffer: default_progress_buffer(),
            executor: ExecutorConfig::default(),
            commit_retry: CommitRetryConfig::default(),
        }
    }
}

impl AppConfig {
    /// Parse the configured bind address.
    pub fn bind_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        self.api_bind_addr.parse()
    }

    /// Serialize the configuration with credentials redacted, for startup logs.
    pub fn redacted_json(&self) -> Result<String, serde_json::Error> {
        let mut clone = self.clone();
        if clone.provider_token.is_some() {
            clone.provider_token = Some("***".to_string());
        }
        serde_json::to_string(&clone)
    }

    /// Validate configuration bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.commit_retry.max_attempts == 0 {
            return Err(ConfigError::InvalidCommitRetryAttempts {
                value: self.commit_retry.max_attempts,
            });
        }

        if self.commit_retry.base_delay_ms > self.commit_retry.max_delay_ms {
            return Err(ConfigError::InvalidCommitRetryBounds {
                base: self.commit_retry.base_delay_ms,
                max: self.commit_retry.max_delay_ms,
            });
        }

        if self.commit_retry.jitter_factor < 0.0 || self.commit_retry.jitter_factor > 1.0 {
            return Err(ConfigError::InvalidCommitRetryJitter {
                value: self.commit_retry.jitter_factor,
            });
        }

        if self.executor.tick_ms < 100 {
            return Err(ConfigError::InvalidExecutorTick {
                value: self.executor.tick_ms,
            });
        }

        if self.executor.concurrency == 0 || self.executor.claim_batch == 0 {
            return Err(ConfigError::InvalidExecutorLimits {
                concurrency: self.executor.concurrency,
                claim_batch: self.executor.claim_batch,
            });
        }

        if self.cache_capacity == 0 {
            return Err(ConfigError::InvalidCacheCapacity);
        }

        url::Url::parse(&self.provider_api_base).map_err(|source| {
            ConfigError::InvalidProviderApiBase {
                value: self.provider_api_base.clone(),
                source,
            }
        })?;

        Ok(())
    }
}

fn default_profile() -> String {
    "dev".to_string()
}

fn default_api_bind_addr() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_database_url() -> String {
    "sqlite::memory:".to_string()
}

fn default_db_max_connections() -> u32 {
    10
}

fn default_db_acquire_timeout_ms() -> u64 {
    5000
}

fn default_provider_api_base() -> String {
    "https://mybusiness.googleapis.com/v4".to_string()
}

fn default_provider_timeout_ms() -> u64 {
    30_000
}

fn default_cache_capacity() -> usize {
    256
}

fn default_progress_buffer() -> usize {
    256
}

fn default_executor_tick_ms() -> u64 {
    5000
}

fn default_executor_concurrency() -> usize {
    4
}

fn default_executor_claim_batch() -> usize {
    10
}

fn default_commit_max_attempts() -> u32 {
    4
}

fn default_commit_base_delay_ms() -> u64 {
    500
}

fn default_commit_max_delay_ms() -> u64 {
    10_000
}

fn default_commit_jitter_factor() -> f64 {
    0.1
}

fn default_commit_timeout_ms() -> u64 {
    30_000
}

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load environment file {path}: {source}")]
    EnvFile {
        path: PathBuf,
        source: dotenvy::Error,
    },
    #[error("invalid api bind address '{value}': {source}")]
    InvalidBindAddr {
        value: String,
        source: std::net::AddrParseError,
    },
    #[error("commit retry attempts must be at least 1, got {value}")]
    InvalidCommitRetryAttempts { value: u32 },
    #[error("commit retry base delay ({base}ms) cannot be greater than max delay ({max}ms)")]
    InvalidCommitRetryBounds { base: u64, max: u64 },
    #[error("commit retry jitter factor must be between 0.0 and 1.0, got {value}")]
    InvalidCommitRetryJitter { value: f64 },
    #[error("executor tick must be at least 100ms, got {value}")]
    InvalidExecutorTick { value: u64 },
    #[error(
        "executor concurrency and claim batch must be positive, got {concurrency}/{claim_batch}"
    )]
    InvalidExecutorLimits {
        concurrency: usize,
        claim_batch: usize,
    },
    #[error("cache capacity must be at least 1")]
    InvalidCacheCapacity,
    #[error("invalid provider api base '{value}': {source}")]
    InvalidProviderApiBase {
        value: String,
        source: url::ParseError,
    },
}

/// Loads configuration using layered `.env` files and `GBPSYNC_*` env vars.
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

    /// Loads configuration, overlaying the process environment over `.env` layers.
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let (mut layered, profile_hint) = self.collect_layered_env()?;

        // Overlay process environment last so it wins.
        for (key, value) in env::vars() {
            if let Some(stripped) = key.strip_prefix("GBPSYNC_") {
                layered.insert(stripped.to_string(), value);
            }
        }

        let profile = layered
            .remove("PROFILE")
            .filter(|v| !v.is_empty())
            .unwrap_or(profile_hint);
        let api_bind_addr = layered
            .remove("API_BIND_ADDR")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(default_api_bind_addr);
        let log_level = layered
            .remove("LOG_LEVEL")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(default_log_level);
        let log_format = layered
            .remove("LOG_FORMAT")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(default_log_format);
        let database_url = layered
            .remove("DATABASE_URL")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(default_database_url);
        let db_max_connections = layered
            .remove("DB_MAX_CONNECTIONS")
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(default_db_max_connections);
        let db_acquire_timeout_ms = layered
            .remove("DB_ACQUIRE_TIMEOUT_MS")
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(default_db_acquire_timeout_ms);

        let provider_api_base = layered
            .remove("PROVIDER_API_BASE")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(default_provider_api_base);
        let provider_token = layered.remove("PROVIDER_TOKEN").filter(|v| !v.is_empty());
        let provider_timeout_ms = layered
            .remove("PROVIDER_TIMEOUT_MS")
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(default_provider_timeout_ms);

        let cache_capacity = layered
            .remove("CACHE_CAPACITY")
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(default_cache_capacity);
        let progress_buffer = layered
            .remove("PROGRESS_BUFFER")
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(default_progress_buffer);

        let executor = ExecutorConfig {
            tick_ms: layered
                .remove("EXECUTOR_TICK_MS")
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_executor_tick_ms),
            concurrency: layered
                .remove("EXECUTOR_CONCURRENCY")
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_executor_concurrency),
            claim_batch: layered
                .remove("EXECUTOR_CLAIM_BATCH")
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_executor_claim_batch),
        };

        let commit_retry = CommitRetryConfig {
            max_attempts: layered
                .remove("COMMIT_MAX_ATTEMPTS")
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_commit_max_attempts),
            base_delay_ms: layered
                .remove("COMMIT_BASE_DELAY_MS")
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_commit_base_delay_ms),
            max_delay_ms: layered
                .remove("COMMIT_MAX_DELAY_MS")
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_commit_max_delay_ms),
            jitter_factor: layered
                .remove("COMMIT_JITTER_FACTOR")
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_commit_jitter_factor),
            timeout_ms: layered
                .remove("COMMIT_TIMEOUT_MS")
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_commit_timeout_ms),
        };

        let config = AppConfig {
            profile,
            api_bind_addr,
            log_level,
            log_format,
            database_url,
            db_max_connections,
            db_acquire_timeout_ms,
            provider_api_base,
            provider_token,
            provider_timeout_ms,
            cache_capacity,
            progress_buffer,
            executor,
            commit_retry,
        };

        config.validate()?;

        match config.bind_addr() {
            Ok(_) => Ok(config),
            Err(source) => Err(ConfigError::InvalidBindAddr {
                value: config.api_bind_addr.clone(),
                source,
            }),
        }
    }

    fn collect_layered_env(&self) -> Result<(BTreeMap<String, String>, String), ConfigError> {
        let mut values = BTreeMap::new();

        self.merge_dotenv(self.base_dir.join(".env"), &mut values)?;
        self.merge_dotenv(self.base_dir.join(".env.local"), &mut values)?;

        let profile = env::var("GBPSYNC_PROFILE")
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
                    if let Some(stripped) = key.strip_prefix("GBPSYNC_") {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_pass_validation() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.bind_addr().is_ok());
    }

    #[test]
    fn redacted_json_hides_token() {
        let config = AppConfig {
            provider_token: Some("secret-token".to_string()),
            ..AppConfig::default()
        };
        let json = config.redacted_json().unwrap();
        assert!(!json.contains("secret-token"));
        assert!(json.contains("***"));
    }

    #[test]
    fn rejects_inverted_retry_bounds() {
        let config = AppConfig {
            commit_retry: CommitRetryConfig {
                base_delay_ms: 20_000,
                max_delay_ms: 10_000,
                ..CommitRetryConfig::default()
            },
            ..AppConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidCommitRetryBounds { .. })
        ));
    }

    #[test]
    fn rejects_unparseable_provider_base() {
        let config = AppConfig {
            provider_api_base: "not a url".to_string(),
            ..AppConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidProviderApiBase { .. })
        ));
    }

    #[test]
    fn rejects_zero_attempts() {
        let config = AppConfig {
            commit_retry: CommitRetryConfig {
                max_attempts: 0,
                ..CommitRetryConfig::default()
            },
            ..AppConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidCommitRetryAttempts { .. })
        ));
    }
}
