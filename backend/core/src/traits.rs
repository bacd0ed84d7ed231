use std::path::Path;
use std::sync::Arc;

use crate::error::PluginResult;
use crate::types::PluginObject;

/// Shared handle to a resolved module.
pub type ModuleHandle = Arc<dyn Module>;

/// Constructor for one named type inside a module.
pub type TypeFactory = fn() -> PluginObject;

/// A unit of loadable code that can construct named types.
pub trait Module: Send + Sync {
    /// Module name as declared by its author.
    fn name(&self) -> &str;

    /// Qualified names of every type this module can construct.
    fn type_names(&self) -> Vec<String>;

    /// Construct `type_name`, or `None` if the module does not export it.
    fn instantiate(&self, type_name: &str) -> Option<PluginObject>;
}

/// Resolves modules from files or in-memory images.
pub trait ModuleLoader: Send + Sync {
    /// Load a module from a path on disk.
    fn load_from_file(&self, path: &Path) -> PluginResult<ModuleHandle>;

    /// Load a module from a byte buffer.
    fn load_from_bytes(&self, bytes: &[u8]) -> PluginResult<ModuleHandle>;
}

/// Sink a module's registration function fills with its type factories.
pub trait ModuleRegistrar {
    fn register_type(&mut self, type_name: &str, factory: TypeFactory);
}
