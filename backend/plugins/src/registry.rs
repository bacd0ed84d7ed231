//! Compiled-in modules: factory tables keyed by qualified type name.
//!
//! `StaticModule` is also what native modules register into, so both paths
//! share one instantiation routine.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use plugcache_core::{
    Module, ModuleHandle, ModuleLoader, ModuleRegistrar, PluginError, PluginObject, PluginResult,
    TypeFactory,
};
use tracing::{debug, warn};

pub struct StaticModule {
    name: String,
    factories: HashMap<String, TypeFactory>,
}

impl StaticModule {
    pub fn builder(name: impl Into<String>) -> StaticModuleBuilder {
        StaticModuleBuilder {
            name: name.into(),
            factories: HashMap::new(),
        }
    }

    /// Build a module by running a registration function, as a native module would.
    pub fn from_registration(name: impl Into<String>, register: fn(&mut dyn ModuleRegistrar)) -> Self {
        let mut builder = Self::builder(name);
        register(&mut builder);
        builder.build()
    }

    pub fn into_handle(self) -> ModuleHandle {
        Arc::new(self)
    }
}

impl Module for StaticModule {
    fn name(&self) -> &str {
        &self.name
    }

    fn type_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    fn instantiate(&self, type_name: &str) -> Option<PluginObject> {
        let factory = self.factories.get(type_name)?;
        Some(factory())
    }
}

pub struct StaticModuleBuilder {
    name: String,
    factories: HashMap<String, TypeFactory>,
}

impl StaticModuleBuilder {
    pub fn with_type(mut self, type_name: impl Into<String>, factory: TypeFactory) -> Self {
        self.register_type(&type_name.into(), factory);
        self
    }

    pub fn build(self) -> StaticModule {
        debug!(module = %self.name, types = self.factories.len(), "Module registered");
        StaticModule {
            name: self.name,
            factories: self.factories,
        }
    }
}

impl ModuleRegistrar for StaticModuleBuilder {
    fn register_type(&mut self, type_name: &str, factory: TypeFactory) {
        if self.factories.insert(type_name.to_string(), factory).is_some() {
            warn!(module = %self.name, type_name = %type_name, "Type registered twice; keeping the last factory");
        }
    }
}

/// `ModuleLoader` over a fixed catalog of compiled-in modules.
///
/// Paths are matched literally against the catalog. Byte buffers are
/// rejected: there is nothing to map them onto.
#[derive(Default)]
pub struct StaticModuleLoader {
    catalog: DashMap<PathBuf, ModuleHandle>,
}

impl StaticModuleLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, path: impl Into<PathBuf>, module: ModuleHandle) -> &Self {
        self.catalog.insert(path.into(), module);
        self
    }
}

impl ModuleLoader for StaticModuleLoader {
    fn load_from_file(&self, path: &Path) -> PluginResult<ModuleHandle> {
        self.catalog
            .get(path)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| PluginError::load(path.display(), "no compiled-in module at this path"))
    }

    fn load_from_bytes(&self, bytes: &[u8]) -> PluginResult<ModuleHandle> {
        Err(PluginError::load(
            format!("{} byte buffer", bytes.len()),
            "compiled-in loader cannot load module images",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plugcache_core::into_object;

    fn register_numbers(registrar: &mut dyn ModuleRegistrar) {
        registrar.register_type("numbers::Answer", || into_object(42u32));
        registrar.register_type("numbers::Zero", || into_object(0u32));
    }

    #[test]
    fn instantiates_registered_types_only() {
        let module = StaticModule::from_registration("numbers", register_numbers);
        assert_eq!(module.type_names(), vec!["numbers::Answer", "numbers::Zero"]);

        let answer = module.instantiate("numbers::Answer").unwrap();
        assert_eq!(*answer.downcast::<u32>().unwrap(), 42);
        assert!(module.instantiate("numbers::Missing").is_none());
    }

    #[test]
    fn each_instantiation_is_a_new_object() {
        let module = StaticModule::builder("numbers")
            .with_type("numbers::Answer", || into_object(42u32))
            .build();
        let a = module.instantiate("numbers::Answer").unwrap();
        let b = module.instantiate("numbers::Answer").unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn catalog_loader_resolves_known_paths() {
        let loader = StaticModuleLoader::new();
        let module = StaticModule::from_registration("numbers", register_numbers).into_handle();
        loader.register("/builtin/numbers", Arc::clone(&module));

        let resolved = loader.load_from_file(Path::new("/builtin/numbers")).unwrap();
        assert_eq!(resolved.name(), "numbers");

        let err = loader.load_from_file(Path::new("/builtin/other")).err().unwrap();
        assert!(err.is_load_failure());
        assert!(loader.load_from_bytes(b"\x7fELF").is_err());
    }
}
