//! Wiring from a prepared config to a live plugin cache.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use plugcache_config::PlugCacheConfig;
use plugcache_core::ModuleLoader;
use plugcache_plugins::{CacheOptions, MokaExpiringCache, PluginCache, StaticModule, StaticModuleLoader};
use tracing::debug;

/// Catalog path of the compiled-in demo module.
pub const BUILTIN_DEMO_PATH: &str = "builtin:demo";

pub fn build_cache(config: &PlugCacheConfig, loader: Arc<dyn ModuleLoader>) -> PluginCache {
    let store = MokaExpiringCache::new(config.default_ttl(), config.max_capacity());
    debug!(
        default_ttl = ?store.default_ttl(),
        max_capacity = ?config.max_capacity(),
        "Building plugin cache"
    );
    PluginCache::new(
        loader,
        Arc::new(store),
        CacheOptions {
            serialize_loads: config.serialize_loads(),
        },
    )
}

/// Loader that knows only the demo module, linked into this binary.
pub fn builtin_loader() -> StaticModuleLoader {
    let loader = StaticModuleLoader::new();
    let demo = StaticModule::from_registration(
        plugcache_demo_plugin::MODULE_NAME,
        plugcache_demo_plugin::register,
    );
    loader.register(BUILTIN_DEMO_PATH, demo.into_handle());
    loader
}

/// Relative module paths are taken from `modules.searchDir` when it is set.
pub fn resolve_module_path(config: &PlugCacheConfig, path: &Path) -> PathBuf {
    match config.search_dir() {
        Some(dir) if path.is_relative() => dir.join(path),
        _ => path.to_path_buf(),
    }
}

pub fn init_logging(config: &PlugCacheConfig) {
    match config.log_dir() {
        Some(dir) => plugcache_logging::init_logger(dir, config.log_level()),
        None => plugcache_logging::init_console_logger(config.log_level()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plugcache_config::{apply_all_defaults, CacheConfig, ModulesConfig};
    use plugcache_demo_plugin::{Greeter, GreeterPlugin, GREETER_TYPE};

    #[test]
    fn relative_paths_use_search_dir() {
        let config = PlugCacheConfig {
            modules: Some(ModulesConfig {
                search_dir: Some("/opt/modules".into()),
            }),
            ..Default::default()
        };
        assert_eq!(
            resolve_module_path(&config, Path::new("libdemo.so")),
            PathBuf::from("/opt/modules/libdemo.so")
        );
        assert_eq!(
            resolve_module_path(&config, Path::new("/tmp/libdemo.so")),
            PathBuf::from("/tmp/libdemo.so")
        );
        assert_eq!(
            resolve_module_path(&PlugCacheConfig::default(), Path::new("libdemo.so")),
            PathBuf::from("libdemo.so")
        );
    }

    #[test]
    fn builtin_demo_loads_through_configured_cache() {
        let config = apply_all_defaults(PlugCacheConfig {
            cache: Some(CacheConfig {
                default_ttl_secs: Some(60),
                ..Default::default()
            }),
            ..Default::default()
        });
        let cache = build_cache(&config, Arc::new(builtin_loader()));

        let greeter = cache
            .load_from_file::<GreeterPlugin>("greeter", BUILTIN_DEMO_PATH, GREETER_TYPE, None, false)
            .unwrap()
            .unwrap();
        assert_eq!(greeter.hello("cli"), "Hello, cli!");

        let info = cache.entry_info("greeter").unwrap();
        assert!(info.expires_at.is_some());

        let again = cache.load_cached::<GreeterPlugin>("greeter").unwrap().unwrap();
        assert_eq!(again.instance_id(), greeter.instance_id());
    }
}
