//! Config defaults: fills unset fields the runtime relies on.

use crate::schema::{CacheConfig, LoggingConfig, PlugCacheConfig};

pub const DEFAULT_LOG_LEVEL: &str = "info";

pub const DEFAULT_SERIALIZE_LOADS: bool = true;

/// Apply all defaults to a freshly loaded config. Values the user set win.
pub fn apply_all_defaults(config: PlugCacheConfig) -> PlugCacheConfig {
    let config = apply_cache_defaults(config);
    apply_logging_defaults(config)
}

fn apply_cache_defaults(mut config: PlugCacheConfig) -> PlugCacheConfig {
    let cache = config.cache.get_or_insert_with(CacheConfig::default);
    if cache.serialize_loads.is_none() {
        cache.serialize_loads = Some(DEFAULT_SERIALIZE_LOADS);
    }
    config
}

fn apply_logging_defaults(mut config: PlugCacheConfig) -> PlugCacheConfig {
    let logging = config.logging.get_or_insert_with(LoggingConfig::default);
    if logging.level.is_none() {
        logging.level = Some(DEFAULT_LOG_LEVEL.to_string());
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_missing_sections() {
        let cfg = apply_all_defaults(PlugCacheConfig::default());
        assert_eq!(cfg.cache.unwrap().serialize_loads, Some(true));
        assert_eq!(cfg.logging.unwrap().level.as_deref(), Some(DEFAULT_LOG_LEVEL));
    }

    #[test]
    fn keeps_user_values() {
        let cfg = PlugCacheConfig {
            cache: Some(CacheConfig {
                serialize_loads: Some(false),
                default_ttl_secs: Some(5),
                ..Default::default()
            }),
            ..Default::default()
        };
        let cfg = apply_all_defaults(cfg);
        let cache = cfg.cache.unwrap();
        assert_eq!(cache.serialize_loads, Some(false));
        assert_eq!(cache.default_ttl_secs, Some(5));
        assert!(cache.max_capacity.is_none());
    }
}
