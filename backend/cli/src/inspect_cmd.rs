//! CLI Inspect Command
//!
//! Opens a native module and lists the types it exports.

use std::path::Path;

use anyhow::{Context, Result};
use plugcache_config::PlugCacheConfig;
use plugcache_core::{Module, ModuleLoader, CORE_VERSION, MODULE_ABI_VERSION};
use plugcache_plugins::NativeModuleLoader;

use crate::runtime::resolve_module_path;
use crate::terminal_output::{note_success, note_warn, render_table};

pub fn run(config: &PlugCacheConfig, path: &Path) -> Result<()> {
    let path = resolve_module_path(config, path);
    let loader = NativeModuleLoader::new();
    let module = loader
        .load_from_file(&path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    note_success(&format!(
        "{} (ABI v{MODULE_ABI_VERSION}, plugcache-core {CORE_VERSION})",
        module.name()
    ));

    let types = module.type_names();
    if types.is_empty() {
        note_warn("module registers no types");
        return Ok(());
    }
    let rows: Vec<Vec<String>> = types.into_iter().map(|t| vec![t]).collect();
    println!("{}", render_table(&["Type"], &rows));
    Ok(())
}
