//! Configuration types for fsaudit
//!
//! Values come from an optional TOML file and are then overridden by
//! command-line flags. Every section has a usable default.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for fsaudit
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Metadata (MDS) service configuration
    pub mds: MdsConfig,
    /// Remote call configuration
    pub rpc: RpcConfig,
    /// Directory summary configuration
    pub summary: SummaryConfig,
}

impl Config {
    /// Parse a TOML document
    pub fn from_toml(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| Error::Configuration(e.to_string()))
    }

    /// Reject configurations the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.mds.addrs.is_empty() {
            return Err(Error::Configuration("no mds address configured".into()));
        }
        if self.rpc.timeout_ms == 0 {
            return Err(Error::Configuration("rpc timeout must be positive".into()));
        }
        if self.summary.max_depth == 0 {
            return Err(Error::Configuration("summary max_depth must be positive".into()));
        }
        Ok(())
    }
}

/// Metadata service endpoints
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MdsConfig {
    /// MDS addresses (`host:port`), tried in order
    pub addrs: Vec<String>,
}

impl Default for MdsConfig {
    fn default() -> Self {
        Self {
            addrs: vec!["127.0.0.1:6700".to_string()],
        }
    }
}

/// Timeout and retry policy applied by the transport to every remote call
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcConfig {
    /// Per-attempt timeout (milliseconds)
    pub timeout_ms: u64,
    /// Extra attempts after the first failure
    pub retry_times: u32,
    /// Log every request/response pair at debug level
    pub verbose: bool,
}

impl RpcConfig {
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            retry_times: 1,
            verbose: false,
        }
    }
}

/// Directory walk limits
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryConfig {
    /// Deepest directory level a walk may reach before it is treated as a cycle
    pub max_depth: usize,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self { max_depth: 4096 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.mds.addrs, vec!["127.0.0.1:6700".to_string()]);
        assert_eq!(config.rpc.timeout(), Duration::from_secs(10));
        assert_eq!(config.rpc.retry_times, 1);
        assert_eq!(config.summary.max_depth, 4096);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            [mds]
            addrs = ["10.0.0.1:6700", "10.0.0.2:6700"]

            [rpc]
            retry_times = 3
            "#,
        )
        .unwrap();
        assert_eq!(config.mds.addrs.len(), 2);
        assert_eq!(config.rpc.retry_times, 3);
        assert_eq!(config.rpc.timeout_ms, 10_000);
        assert_eq!(config.summary, SummaryConfig::default());
    }

    #[test]
    fn test_validate_rejects_empty_addrs() {
        let mut config = Config::default();
        config.mds.addrs.clear();
        assert!(matches!(config.validate(), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_bad_toml() {
        assert!(Config::from_toml("[rpc\ntimeout_ms = ").is_err());
    }
}
