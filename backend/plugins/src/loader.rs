//! Native Module Loader
//!
//! Opens shared libraries with `libloading`, checks the exported
//! [`ModuleDeclaration`] against this host, and runs the module's registration
//! into a [`StaticModule`]. Byte buffers are staged in a temp file first.
//!
//! Libraries are never unmapped: instances handed out by the cache point into
//! library code and may outlive every handle to the module.

use std::io::Write;
use std::mem::ManuallyDrop;
use std::path::Path;
use std::sync::Arc;

use dashmap::DashMap;
use libloading::{Library, Symbol};
use plugcache_core::{
    DECLARATION_SYMBOL, Module, ModuleDeclaration, ModuleHandle, ModuleLoader, PluginError,
    PluginObject, PluginResult,
};
use sha2::{Digest, Sha256};
use tempfile::TempPath;
use tracing::{debug, info};

use crate::registry::StaticModule;

/// A module backed by a mapped shared library.
pub struct NativeModule {
    types: StaticModule,
    _library: ManuallyDrop<Library>,
    /// Staging file for modules loaded from bytes.
    _backing: Option<TempPath>,
}

impl Module for NativeModule {
    fn name(&self) -> &str {
        self.types.name()
    }

    fn type_names(&self) -> Vec<String> {
        self.types.type_names()
    }

    fn instantiate(&self, type_name: &str) -> Option<PluginObject> {
        self.types.instantiate(type_name)
    }
}

/// Loads native modules and reuses already-opened libraries.
#[derive(Default)]
pub struct NativeModuleLoader {
    /// Keyed by canonical path, or `sha256:<digest>` for byte buffers.
    modules: DashMap<String, Arc<NativeModule>>,
}

impl NativeModuleLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn loaded_count(&self) -> usize {
        self.modules.len()
    }

    pub fn list_loaded(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.modules.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }

    fn cached(&self, key: &str) -> Option<ModuleHandle> {
        self.modules.get(key).map(|entry| {
            debug!(key = %key, "Reusing opened module");
            Arc::clone(entry.value()) as ModuleHandle
        })
    }

    fn remember(&self, key: String, module: NativeModule) -> ModuleHandle {
        let module = Arc::new(module);
        self.modules.insert(key, Arc::clone(&module));
        module
    }
}

impl ModuleLoader for NativeModuleLoader {
    fn load_from_file(&self, path: &Path) -> PluginResult<ModuleHandle> {
        let canonical = path
            .canonicalize()
            .map_err(|e| PluginError::load(path.display(), e))?;
        let key = canonical.to_string_lossy().into_owned();
        if let Some(module) = self.cached(&key) {
            return Ok(module);
        }

        let module = open_module(&canonical, None)?;
        Ok(self.remember(key, module))
    }

    fn load_from_bytes(&self, bytes: &[u8]) -> PluginResult<ModuleHandle> {
        let origin = format!("{} byte buffer", bytes.len());
        if bytes.is_empty() {
            return Err(PluginError::load(origin, "buffer is empty"));
        }
        let key = format!("sha256:{}", hex::encode(Sha256::digest(bytes)));
        if let Some(module) = self.cached(&key) {
            return Ok(module);
        }

        let mut staged = tempfile::Builder::new()
            .prefix("plugcache-")
            .suffix(std::env::consts::DLL_SUFFIX)
            .tempfile()
            .map_err(|e| PluginError::load(&origin, e))?;
        staged
            .write_all(bytes)
            .and_then(|_| staged.flush())
            .map_err(|e| PluginError::load(&origin, e))?;
        let staged = staged.into_temp_path();
        let path = staged.to_path_buf();

        let module = open_module(&path, Some(staged))?;
        Ok(self.remember(key, module))
    }
}

fn open_module(path: &Path, backing: Option<TempPath>) -> PluginResult<NativeModule> {
    let origin = path.display().to_string();
    debug!(path = %origin, "Opening shared library");

    // SAFETY: running a library's initializers is inherent to loading it; the
    // caller chose to trust this path.
    let library = unsafe { Library::new(path) }.map_err(|e| PluginError::load(&origin, e))?;

    // SAFETY: the symbol is declared by `declare_module!` as a
    // `ModuleDeclaration` static; the version check below rejects modules
    // built against a different layout before anything else is used.
    let declaration: ModuleDeclaration = unsafe {
        let symbol: Symbol<*const ModuleDeclaration> = library
            .get(DECLARATION_SYMBOL)
            .map_err(|e| PluginError::load(&origin, format!("not a plugcache module: {e}")))?;
        **symbol
    };

    if let Some(reason) = declaration.incompatibility() {
        return Err(PluginError::AbiMismatch {
            module: origin,
            message: reason,
        });
    }

    let types = StaticModule::from_registration(declaration.module_name, declaration.register);
    info!(
        module = %types.name(),
        path = %origin,
        types = ?types.type_names(),
        "Loaded native module"
    );

    Ok(NativeModule {
        types,
        _library: ManuallyDrop::new(library),
        _backing: backing,
    })
}
