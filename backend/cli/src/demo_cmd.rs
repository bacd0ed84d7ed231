//! CLI Demo Command
//!
//! Walks a greeter module through the cache lifecycle: load, cache hit,
//! expiry, removal and clean, then prints the events that were published.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::SecondsFormat;
use plugcache_config::PlugCacheConfig;
use plugcache_core::ModuleLoader;
use plugcache_demo_plugin::{Greeter, GreeterPlugin};
use plugcache_plugins::{LoadRequest, NativeModuleLoader, PluginCache};
use tracing::info;

use crate::runtime::{build_cache, builtin_loader, resolve_module_path, BUILTIN_DEMO_PATH};
use crate::terminal_output::{note_info, note_success, note_warn, render_table};

pub struct DemoArgs {
    pub module: Option<PathBuf>,
    pub type_name: String,
    pub ttl_secs: u64,
    pub builtin: bool,
}

pub async fn run(config: &PlugCacheConfig, args: DemoArgs) -> Result<()> {
    let (loader, module_path): (Arc<dyn ModuleLoader>, PathBuf) = if args.builtin {
        (Arc::new(builtin_loader()), PathBuf::from(BUILTIN_DEMO_PATH))
    } else {
        let Some(module) = &args.module else {
            bail!("--module is required unless --builtin is given");
        };
        (Arc::new(NativeModuleLoader::new()), resolve_module_path(config, module))
    };

    let cache = build_cache(config, loader);
    let mut events = cache.subscribe();
    info!(module = %module_path.display(), type_name = %args.type_name, "Starting demo");

    let greeter = cache
        .load_from_file::<GreeterPlugin>("greeter", &module_path, &args.type_name, None, false)
        .context("Failed to load greeter")?
        .with_context(|| format!("{} does not export {}", module_path.display(), args.type_name))?;
    note_success(&format!("greeter says: {}", greeter.hello("plugcache")));

    match cache.load_cached::<GreeterPlugin>("greeter")? {
        Some(again) if again.instance_id() == greeter.instance_id() => {
            note_info("second lookup was served from the cache");
        }
        Some(_) => note_warn("second lookup returned a different instance"),
        None => note_warn("greeter was not cached"),
    }

    let ttl = Duration::from_secs(args.ttl_secs);
    let short_lived = LoadRequest::new("short-lived", args.type_name.as_str())
        .with_source(module_path.clone())
        .expires_in(chrono::Duration::from_std(ttl).context("TTL out of range")?);
    if cache.load_plugin::<GreeterPlugin>(short_lived)?.is_some() {
        note_info(&format!("short-lived loaded, expires in {}s", args.ttl_secs));
    }
    print_loaded(&cache);

    tokio::time::sleep(ttl + Duration::from_millis(250)).await;
    note_info("after the deadline:");
    print_loaded(&cache);

    cache.remove_plugin("greeter");
    if cache.load_cached::<GreeterPlugin>("greeter")?.is_none() {
        note_info("greeter removed; a lookup without a source now finds nothing");
    }

    let reloaded = cache
        .load_from_file::<GreeterPlugin>("greeter", &module_path, &args.type_name, None, false)?
        .context("greeter did not reload")?;
    note_info(&format!(
        "reloaded greeter is instance #{} (was #{})",
        reloaded.instance_id(),
        greeter.instance_id()
    ));

    let cleaned = cache.clean();
    note_success(&format!("clean removed {cleaned} plugin(s)"));
    print_loaded(&cache);

    println!("\nEvents:");
    while let Ok(event) = events.try_recv() {
        println!("  {}", serde_json::to_string(&event)?);
    }
    Ok(())
}

fn print_loaded(cache: &PluginCache) {
    let names = cache.get_loaded_plugins();
    if names.is_empty() {
        println!("  (no plugins loaded)\n");
        return;
    }
    let rows: Vec<Vec<String>> = names
        .iter()
        .filter_map(|name| cache.entry_info(name))
        .map(|info| {
            vec![
                info.name,
                info.type_name,
                info.generation.to_string(),
                info.expires_at
                    .map(|at| at.to_rfc3339_opts(SecondsFormat::Millis, true))
                    .unwrap_or_else(|| "never".to_string()),
            ]
        })
        .collect();
    println!("{}", render_table(&["Plugin", "Type", "Gen", "Expires"], &rows));
}
