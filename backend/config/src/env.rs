//! Environment handling for config values.
//!
//! Two mechanisms, applied in this order by `load_and_prepare`:
//! - `${VAR}` references inside string values are substituted. Only uppercase
//!   `[A-Z_][A-Z0-9_]*` names match, and `$${VAR}` is kept as a literal `${VAR}`.
//! - `PLUGCACHE_*` variables override individual fields after parsing.

use anyhow::{bail, Context, Result};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;

use crate::schema::{CacheConfig, LoggingConfig, ModulesConfig, PlugCacheConfig};

pub const ENV_DEFAULT_TTL_SECS: &str = "PLUGCACHE_DEFAULT_TTL_SECS";
pub const ENV_MAX_CAPACITY: &str = "PLUGCACHE_MAX_CAPACITY";
pub const ENV_SERIALIZE_LOADS: &str = "PLUGCACHE_SERIALIZE_LOADS";
pub const ENV_LOG_LEVEL: &str = "PLUGCACHE_LOG_LEVEL";
pub const ENV_MODULE_DIR: &str = "PLUGCACHE_MODULE_DIR";

/// `${VAR}` or, with a leading extra `$`, its escaped form.
static VAR_REFERENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$(\$?)\{([A-Z_][A-Z0-9_]*)\}").expect("static regex"));

#[derive(Debug, thiserror::Error)]
#[error("Missing env var \"{var_name}\" referenced at config path: {config_path}")]
pub struct MissingEnvVarError {
    pub var_name: String,
    pub config_path: String,
}

/// Substitute `${VAR}` references using the process environment.
pub fn resolve_env_vars(value: &Value) -> Result<Value> {
    resolve_env_vars_with(value, &std::env::vars().collect())
}

/// Substitute `${VAR}` references from `env`. Unset or empty variables are errors.
pub fn resolve_env_vars_with(value: &Value, env: &HashMap<String, String>) -> Result<Value> {
    substitute_value(value, env, "")
}

fn substitute_value(value: &Value, env: &HashMap<String, String>, path: &str) -> Result<Value> {
    match value {
        Value::String(s) => Ok(Value::String(substitute_string(s, env, path)?)),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, v)| substitute_value(v, env, &format!("{path}[{i}]")))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (k, v) in map {
                let child = if path.is_empty() { k.clone() } else { format!("{path}.{k}") };
                out.insert(k.clone(), substitute_value(v, env, &child)?);
            }
            Ok(Value::Object(out))
        }
        other => Ok(other.clone()),
    }
}

fn substitute_string(s: &str, env: &HashMap<String, String>, path: &str) -> Result<String> {
    if !s.contains('$') {
        return Ok(s.to_string());
    }

    let mut missing: Option<MissingEnvVarError> = None;
    let replaced = VAR_REFERENCE.replace_all(s, |caps: &Captures| {
        let name = &caps[2];
        if !caps[1].is_empty() {
            return format!("${{{name}}}");
        }
        match env.get(name) {
            Some(val) if !val.is_empty() => val.clone(),
            _ => {
                missing.get_or_insert_with(|| MissingEnvVarError {
                    var_name: name.to_string(),
                    config_path: path.to_string(),
                });
                String::new()
            }
        }
    });

    if let Some(err) = missing {
        bail!(err);
    }
    Ok(replaced.into_owned())
}

/// Apply `PLUGCACHE_*` overrides from the process environment.
pub fn apply_env_overrides(config: PlugCacheConfig) -> Result<PlugCacheConfig> {
    apply_env_overrides_with(config, &std::env::vars().collect())
}

/// Apply `PLUGCACHE_*` overrides from `env`. Empty values are ignored.
pub fn apply_env_overrides_with(
    mut config: PlugCacheConfig,
    env: &HashMap<String, String>,
) -> Result<PlugCacheConfig> {
    let lookup = |key: &str| env.get(key).map(|v| v.trim()).filter(|v| !v.is_empty());

    if let Some(raw) = lookup(ENV_DEFAULT_TTL_SECS) {
        let secs = raw
            .parse::<u64>()
            .with_context(|| format!("{ENV_DEFAULT_TTL_SECS} must be a whole number of seconds, got {raw:?}"))?;
        config.cache.get_or_insert_with(CacheConfig::default).default_ttl_secs = Some(secs);
    }
    if let Some(raw) = lookup(ENV_MAX_CAPACITY) {
        let capacity = raw
            .parse::<u64>()
            .with_context(|| format!("{ENV_MAX_CAPACITY} must be a number, got {raw:?}"))?;
        config.cache.get_or_insert_with(CacheConfig::default).max_capacity = Some(capacity);
    }
    if let Some(raw) = lookup(ENV_SERIALIZE_LOADS) {
        let enabled = parse_flag(raw)
            .with_context(|| format!("{ENV_SERIALIZE_LOADS} must be true or false, got {raw:?}"))?;
        config.cache.get_or_insert_with(CacheConfig::default).serialize_loads = Some(enabled);
    }
    if let Some(raw) = lookup(ENV_LOG_LEVEL) {
        config.logging.get_or_insert_with(LoggingConfig::default).level = Some(raw.to_lowercase());
    }
    if let Some(raw) = lookup(ENV_MODULE_DIR) {
        config.modules.get_or_insert_with(ModulesConfig::default).search_dir = Some(PathBuf::from(raw));
    }

    Ok(config)
}

fn parse_flag(raw: &str) -> Result<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => bail!("unrecognised flag value"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn substitutes_nested_reference() {
        let v = json!({"modules": {"searchDir": "${HOME_DIR}/modules"}});
        let result = resolve_env_vars_with(&v, &env(&[("HOME_DIR", "/opt")])).unwrap();
        assert_eq!(result["modules"]["searchDir"], "/opt/modules");
    }

    #[test]
    fn escaped_reference_is_literal() {
        let v = json!({"note": "$${KEEP_ME}"});
        let result = resolve_env_vars_with(&v, &HashMap::new()).unwrap();
        assert_eq!(result["note"], "${KEEP_ME}");
    }

    #[test]
    fn missing_var_names_the_path() {
        let v = json!({"logging": {"dir": "${LOG_ROOT}"}});
        let err = resolve_env_vars_with(&v, &HashMap::new()).unwrap_err().to_string();
        assert!(err.contains("LOG_ROOT"));
        assert!(err.contains("logging.dir"));
    }

    #[test]
    fn overrides_replace_file_values() {
        let cfg = PlugCacheConfig {
            cache: Some(CacheConfig {
                default_ttl_secs: Some(60),
                ..Default::default()
            }),
            ..Default::default()
        };
        let vars = env(&[
            (ENV_DEFAULT_TTL_SECS, "5"),
            (ENV_SERIALIZE_LOADS, "off"),
            (ENV_LOG_LEVEL, "DEBUG"),
            (ENV_MODULE_DIR, "/srv/modules"),
            (ENV_MAX_CAPACITY, ""),
        ]);
        let cfg = apply_env_overrides_with(cfg, &vars).unwrap();

        assert_eq!(cfg.default_ttl(), Some(std::time::Duration::from_secs(5)));
        assert!(!cfg.serialize_loads());
        assert_eq!(cfg.log_level(), "debug");
        assert_eq!(cfg.search_dir(), Some(&PathBuf::from("/srv/modules")));
        assert!(cfg.max_capacity().is_none());
    }

    #[test]
    fn malformed_override_is_an_error() {
        let err = apply_env_overrides_with(
            PlugCacheConfig::default(),
            &env(&[(ENV_MAX_CAPACITY, "lots")]),
        )
        .unwrap_err();
        assert!(err.to_string().contains(ENV_MAX_CAPACITY));
    }
}
