//! plugcache configuration schema.
//!
//! Every section and field is optional so a partial YAML file deserializes;
//! `defaults::apply_all_defaults` fills in what the runtime needs.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlugCacheConfig {
    /// Plugin cache behaviour
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheConfig>,

    /// Where native modules are looked up
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modules: Option<ModulesConfig>,

    /// Logging configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheConfig {
    /// Lifetime for entries loaded without an explicit deadline. Unset means
    /// they stay until removed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_ttl_secs: Option<u64>,
    /// Upper bound on cached instances. Unset means unbounded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_capacity: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serialize_loads: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModulesConfig {
    /// Base directory for relative module paths.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>, // "trace" | "debug" | "info" | "warn" | "error"
    /// Directory for the rolling JSON log. Unset logs to the console only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

impl PlugCacheConfig {
    pub fn default_ttl(&self) -> Option<Duration> {
        self.cache
            .as_ref()
            .and_then(|c| c.default_ttl_secs)
            .map(Duration::from_secs)
    }

    pub fn max_capacity(&self) -> Option<u64> {
        self.cache.as_ref().and_then(|c| c.max_capacity)
    }

    pub fn serialize_loads(&self) -> bool {
        self.cache
            .as_ref()
            .and_then(|c| c.serialize_loads)
            .unwrap_or(true)
    }

    pub fn search_dir(&self) -> Option<&PathBuf> {
        self.modules.as_ref().and_then(|m| m.search_dir.as_ref())
    }

    pub fn log_level(&self) -> &str {
        self.logging
            .as_ref()
            .and_then(|l| l.level.as_deref())
            .unwrap_or(crate::defaults::DEFAULT_LOG_LEVEL)
    }

    pub fn log_dir(&self) -> Option<&PathBuf> {
        self.logging.as_ref().and_then(|l| l.dir.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_partial_yaml() {
        let yaml = "cache:\n  defaultTtlSecs: 30\nlogging:\n  level: debug\n";
        let cfg: PlugCacheConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.default_ttl(), Some(Duration::from_secs(30)));
        assert_eq!(cfg.log_level(), "debug");
        assert!(cfg.modules.is_none());
        assert!(cfg.serialize_loads());
    }

    #[test]
    fn empty_sections_are_not_serialized() {
        let yaml = serde_yaml::to_string(&PlugCacheConfig::default()).unwrap();
        assert_eq!(yaml.trim(), "{}");
    }
}
