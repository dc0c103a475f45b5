// Runtime configuration

//! # Configuration
//!
//! [`CoreConfig`] holds every tunable of the runtime. It deserializes from an
//! optional TOML/JSON/YAML file and from environment variables prefixed with
//! `AGENT_CORE` (nested keys joined with `__`, e.g.
//! `AGENT_CORE__CACHE__MEMORY_MAX_ENTRIES=500`). Every field has a default so
//! an empty environment yields a working runtime.

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{AgentCoreError, Result};

/// Top-level runtime configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub orchestrator: OrchestratorConfig,

    #[serde(default)]
    pub error_handling: ErrorHandlingConfig,

    /// Tracing filter, e.g. "info" or "agent_core=debug"
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            orchestrator: OrchestratorConfig::default(),
            error_handling: ErrorHandlingConfig::default(),
            log_level: default_log_level(),
        }
    }
}

impl CoreConfig {
    /// Load configuration from the environment only
    pub fn from_env() -> Result<Self> {
        Self::load(None::<&Path>)
    }

    /// Load configuration from an optional file plus the environment
    ///
    /// Environment variables win over file values.
    pub fn load(path: Option<impl AsRef<Path>>) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(File::from(path.as_ref()));
        }

        builder = builder.add_source(
            Environment::with_prefix("AGENT_CORE")
                .prefix_separator("__")
                .separator("__"),
        );

        let config = builder
            .build()
            .map_err(|e| AgentCoreError::Configuration(format!("failed to load config: {e}")))?;

        config
            .try_deserialize()
            .map_err(|e| AgentCoreError::Configuration(format!("invalid config: {e}")))
    }
}

/// Cache tier configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Directory for the file tier
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// Maximum entries in the memory tier before LRU eviction
    #[serde(default = "default_memory_max_entries")]
    pub memory_max_entries: usize,

    /// Default TTL in seconds applied when `set` is called without one
    /// (0 means no expiry)
    #[serde(default = "default_ttl_seconds")]
    pub default_ttl_seconds: u64,

    /// Interval between background expiry sweeps, in seconds
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            memory_max_entries: default_memory_max_entries(),
            default_ttl_seconds: default_ttl_seconds(),
            cleanup_interval_seconds: default_cleanup_interval(),
        }
    }
}

impl CacheConfig {
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_seconds)
    }
}

/// Orchestrator and health-monitor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Seconds between health checks of registered agents
    #[serde(default = "default_health_interval")]
    pub health_check_interval_seconds: u64,

    /// Consecutive failed health checks before an agent is marked unhealthy
    #[serde(default = "default_unhealthy_threshold")]
    pub unhealthy_threshold: u32,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            health_check_interval_seconds: default_health_interval(),
            unhealthy_threshold: default_unhealthy_threshold(),
        }
    }
}

impl OrchestratorConfig {
    pub fn health_check_interval(&self) -> Duration {
        Duration::from_secs(self.health_check_interval_seconds)
    }
}

/// Retry and circuit-breaker defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorHandlingConfig {
    /// Retry attempts after the initial call
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay between retries, in milliseconds
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Upper bound on any single retry delay, in milliseconds
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Consecutive failures that trip a circuit breaker
    #[serde(default = "default_failure_threshold")]
    pub circuit_failure_threshold: u32,

    /// Seconds an open breaker waits before probing again
    #[serde(default = "default_recovery_timeout")]
    pub circuit_recovery_timeout_seconds: u64,
}

impl Default for ErrorHandlingConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            circuit_failure_threshold: default_failure_threshold(),
            circuit_recovery_timeout_seconds: default_recovery_timeout(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(".agent_cache")
}

fn default_memory_max_entries() -> usize {
    1000
}

fn default_ttl_seconds() -> u64 {
    3600
}

fn default_cleanup_interval() -> u64 {
    300
}

fn default_health_interval() -> u64 {
    30
}

fn default_unhealthy_threshold() -> u32 {
    3
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    60_000
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_recovery_timeout() -> u64 {
    60
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_sane() {
        let config = CoreConfig::default();
        assert_eq!(config.cache.memory_max_entries, 1000);
        assert_eq!(config.orchestrator.unhealthy_threshold, 3);
        assert_eq!(config.error_handling.max_retries, 3);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("core.toml");
        std::fs::write(&path, "log_level = \"debug\"\n[cache]\nmemory_max_entries = 7\n")
            .unwrap();

        let config = CoreConfig::load(Some(&path)).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.cache.memory_max_entries, 7);
        assert_eq!(config.error_handling.max_retries, 3);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let result = CoreConfig::load(Some("/nonexistent/core.toml"));
        assert!(matches!(result, Err(AgentCoreError::Configuration(_))));
    }
}
