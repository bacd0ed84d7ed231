//! Config validation with user-facing messages.

use crate::schema::PlugCacheConfig;
use thiserror::Error;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Largest accepted default TTL, one hundred years.
pub const MAX_DEFAULT_TTL_SECS: u64 = 100 * 365 * 24 * 60 * 60;

#[derive(Debug, Error)]
#[error("Config validation error at '{path}': {message}")]
pub struct ConfigValidationError {
    pub path: String,
    pub message: String,
}

/// Errors and warnings found in one pass.
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }

    fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }
}

pub fn validate(config: &PlugCacheConfig) -> ValidationReport {
    let mut report = ValidationReport::default();
    validate_cache(config, &mut report);
    validate_modules(config, &mut report);
    validate_logging(config, &mut report);
    report
}

fn validate_cache(config: &PlugCacheConfig, report: &mut ValidationReport) {
    let Some(cache) = &config.cache else { return };
    if cache.max_capacity == Some(0) {
        report.error("cache.maxCapacity", "maxCapacity must be >= 1; omit it for an unbounded cache");
    }
    if let Some(secs) = cache.default_ttl_secs.filter(|&secs| secs > MAX_DEFAULT_TTL_SECS) {
        report.error(
            "cache.defaultTtlSecs",
            format!("defaultTtlSecs {secs} exceeds the maximum of {MAX_DEFAULT_TTL_SECS} (100 years)"),
        );
    }
    if cache.default_ttl_secs == Some(0) {
        report.warn(
            "cache.defaultTtlSecs",
            "defaultTtlSecs is 0; plugins loaded without a deadline expire immediately",
        );
    }
    if cache.serialize_loads == Some(false) {
        report.warn(
            "cache.serializeLoads",
            "Concurrent loads of the same plugin will race; the last one to finish is kept",
        );
    }
}

fn validate_modules(config: &PlugCacheConfig, report: &mut ValidationReport) {
    let Some(dir) = config.search_dir() else { return };
    if !dir.is_dir() {
        report.warn(
            "modules.searchDir",
            format!("{} is not a directory; relative module paths will not resolve", dir.display()),
        );
    }
}

fn validate_logging(config: &PlugCacheConfig, report: &mut ValidationReport) {
    let Some(level) = config.logging.as_ref().and_then(|l| l.level.as_deref()) else {
        return;
    };
    if !LOG_LEVELS.contains(&level) {
        report.error(
            "logging.level",
            format!("Unknown log level '{level}'. Use one of: {}", LOG_LEVELS.join(", ")),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{CacheConfig, LoggingConfig, ModulesConfig};

    #[test]
    fn empty_config_is_valid() {
        let report = validate(&PlugCacheConfig::default());
        assert!(report.is_valid(), "errors: {:?}", report.errors);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn zero_capacity_is_error() {
        let cfg = PlugCacheConfig {
            cache: Some(CacheConfig {
                max_capacity: Some(0),
                ..Default::default()
            }),
            ..Default::default()
        };
        let report = validate(&cfg);
        assert!(!report.is_valid());
        assert_eq!(report.errors[0].path, "cache.maxCapacity");
    }

    #[test]
    fn oversized_default_ttl_is_error() {
        let cfg = PlugCacheConfig {
            cache: Some(CacheConfig {
                default_ttl_secs: Some(10_000_000_000_000),
                ..Default::default()
            }),
            ..Default::default()
        };
        let report = validate(&cfg);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].path, "cache.defaultTtlSecs");

        let at_limit = PlugCacheConfig {
            cache: Some(CacheConfig {
                default_ttl_secs: Some(MAX_DEFAULT_TTL_SECS),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(validate(&at_limit).is_valid());
    }

    #[test]
    fn unknown_level_is_error_and_missing_dir_warns() {
        let cfg = PlugCacheConfig {
            logging: Some(LoggingConfig {
                level: Some("loud".into()),
                dir: None,
            }),
            modules: Some(ModulesConfig {
                search_dir: Some("/definitely/not/here".into()),
            }),
            ..Default::default()
        };
        let report = validate(&cfg);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].message.contains("loud"));
        assert_eq!(report.warnings[0].path, "modules.searchDir");
    }
}
