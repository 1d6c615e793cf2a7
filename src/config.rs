//! Runtime configuration
//!
//! Builder-style settings shared by every agent of a runtime:
//!
//! ```ignore
//! let config = RuntimeConfig::new()
//!     .with_plan_max_retries(5)
//!     .with_memory_window(40)
//!     .with_log(LogConfig::new("debug"));
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::actions::DEFAULT_PLAN_RETRIES;
use crate::logging::LogConfig;

/// Default number of memory entries sent to the LLM as history
pub const DEFAULT_MEMORY_WINDOW: usize = 50;

pub const ENV_PLAN_RETRIES: &str = "WISEAGENT_PLAN_RETRIES";
pub const ENV_MEMORY_WINDOW: &str = "WISEAGENT_MEMORY_WINDOW";
pub const ENV_LOG_DIR: &str = "WISEAGENT_LOG_DIR";
pub const ENV_LOG_JSON: &str = "WISEAGENT_LOG_JSON";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Corrective retries after an unparsable plan
    pub plan_max_retries: usize,
    /// Most recent memory entries included in LLM requests
    pub memory_window: usize,
    pub log: LogConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            plan_max_retries: DEFAULT_PLAN_RETRIES,
            memory_window: DEFAULT_MEMORY_WINDOW,
            log: LogConfig::default(),
        }
    }
}

impl RuntimeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_plan_max_retries(mut self, retries: usize) -> Self {
        self.plan_max_retries = retries;
        self
    }

    /// At least one entry is always sent
    pub fn with_memory_window(mut self, window: usize) -> Self {
        self.memory_window = window.max(1);
        self
    }

    pub fn with_log(mut self, log: LogConfig) -> Self {
        self.log = log;
        self
    }

    /// Defaults overridden by `WISEAGENT_*` environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_PLAN_RETRIES) {
            match raw.trim().parse() {
                Ok(retries) => config = config.with_plan_max_retries(retries),
                Err(_) => tracing::warn!("Ignoring invalid {}={}", ENV_PLAN_RETRIES, raw),
            }
        }
        if let Some(raw) = lookup(ENV_MEMORY_WINDOW) {
            match raw.trim().parse() {
                Ok(window) => config = config.with_memory_window(window),
                Err(_) => tracing::warn!("Ignoring invalid {}={}", ENV_MEMORY_WINDOW, raw),
            }
        }
        if let Some(dir) = lookup(ENV_LOG_DIR).filter(|d| !d.trim().is_empty()) {
            config.log = config.log.with_file_logging(PathBuf::from(dir));
        }
        if let Some(raw) = lookup(ENV_LOG_JSON) {
            let json = matches!(raw.trim().to_lowercase().as_str(), "1" | "true" | "yes");
            config.log = config.log.with_json(json);
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = RuntimeConfig::from_lookup(lookup(&[]));
        assert_eq!(config, RuntimeConfig::default());
        assert_eq!(config.plan_max_retries, 3);
        assert_eq!(config.memory_window, DEFAULT_MEMORY_WINDOW);
    }

    #[test]
    fn test_env_overrides() {
        let config = RuntimeConfig::from_lookup(lookup(&[
            (ENV_PLAN_RETRIES, "5"),
            (ENV_MEMORY_WINDOW, "0"),
            (ENV_LOG_DIR, "/var/log/agents"),
            (ENV_LOG_JSON, "true"),
        ]));
        assert_eq!(config.plan_max_retries, 5);
        assert_eq!(config.memory_window, 1);
        assert_eq!(config.log.directory, Some(PathBuf::from("/var/log/agents")));
        assert!(config.log.json);
    }

    #[test]
    fn test_invalid_values_are_ignored() {
        let config = RuntimeConfig::from_lookup(lookup(&[(ENV_PLAN_RETRIES, "many")]));
        assert_eq!(config.plan_max_retries, DEFAULT_PLAN_RETRIES);
    }
}
