//! `plugcache-core`: shared vocabulary for the plugcache plugin cache.
//!
//! Provides:
//! - `PluginError`, the error taxonomy every crate returns
//! - Cache-key derivation and the `PluginSource` / `PluginObject` data model
//! - `Module`, `ModuleLoader` and `ModuleRegistrar`, the collaborator seams
//! - The native module ABI and `declare_module!`

pub mod abi;
pub mod error;
pub mod traits;
pub mod types;

pub use abi::{ModuleDeclaration, CORE_VERSION, DECLARATION_SYMBOL, MODULE_ABI_VERSION};
pub use error::{PluginError, PluginResult};
pub use traits::{Module, ModuleHandle, ModuleLoader, ModuleRegistrar, TypeFactory};
pub use types::{
    cache_key, into_object, plugin_name_from_key, validate_name, PluginObject, PluginSource,
    CACHE_KEY_PREFIX,
};
