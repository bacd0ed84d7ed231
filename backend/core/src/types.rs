use std::any::Any;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{PluginError, PluginResult};
use crate::traits::ModuleHandle;

/// Prefix shared by every cache key.
pub const CACHE_KEY_PREFIX: &str = "plugin:";

/// A type-erased plugin instance as produced by a module and held by the cache.
pub type PluginObject = Arc<dyn Any + Send + Sync>;

/// Derive the cache key for a plugin name.
pub fn cache_key(name: &str) -> String {
    format!("{CACHE_KEY_PREFIX}{name}")
}

/// Reverse of [`cache_key`]. Returns `None` for keys outside the plugin namespace.
pub fn plugin_name_from_key(key: &str) -> Option<&str> {
    key.strip_prefix(CACHE_KEY_PREFIX)
}

/// Reject names that cannot identify a plugin slot.
pub fn validate_name(name: &str) -> PluginResult<()> {
    if name.trim().is_empty() {
        return Err(PluginError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Wrap a value as a [`PluginObject`].
///
/// Trait-object capabilities go through a sized alias, e.g.
/// `into_object::<Box<dyn Greeter>>(Box::new(MyGreeter))`.
pub fn into_object<T: Any + Send + Sync>(value: T) -> PluginObject {
    Arc::new(value)
}

/// Where a plugin's module comes from.
#[derive(Clone, Default)]
pub enum PluginSource {
    /// Shared library on disk.
    File(PathBuf),
    /// Raw module image held in memory.
    Bytes(Vec<u8>),
    /// A module that is already resolved.
    Module(ModuleHandle),
    /// No source: only a cached instance can satisfy the request.
    #[default]
    Absent,
}

impl PluginSource {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::File(_) => "file",
            Self::Bytes(_) => "bytes",
            Self::Module(_) => "module",
            Self::Absent => "absent",
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    /// Short human-readable description for logs and errors.
    pub fn describe(&self) -> String {
        match self {
            Self::File(path) => format!("file {}", path.display()),
            Self::Bytes(bytes) => format!("{} byte buffer", bytes.len()),
            Self::Module(module) => format!("module {}", module.name()),
            Self::Absent => "no source".to_string(),
        }
    }
}

impl fmt::Debug for PluginSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => f.debug_tuple("File").field(path).finish(),
            Self::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
            Self::Module(module) => f.debug_tuple("Module").field(&module.name()).finish(),
            Self::Absent => f.write_str("Absent"),
        }
    }
}

impl From<PathBuf> for PluginSource {
    fn from(path: PathBuf) -> Self {
        Self::File(path)
    }
}

impl From<&Path> for PluginSource {
    fn from(path: &Path) -> Self {
        Self::File(path.to_path_buf())
    }
}

impl From<Vec<u8>> for PluginSource {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<ModuleHandle> for PluginSource {
    fn from(module: ModuleHandle) -> Self {
        Self::Module(module)
    }
}

impl<T: Into<PluginSource>> From<Option<T>> for PluginSource {
    fn from(source: Option<T>) -> Self {
        source.map(Into::into).unwrap_or_default()
    }
}
