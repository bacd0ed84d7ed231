use std::fmt::Display;

use thiserror::Error;

/// Top-level error type for plugin loading and caching.
///
/// Instantiation failures are deliberately absent: a module that cannot
/// produce the requested type yields `Ok(None)`, not an error.
#[derive(Debug, Error)]
pub enum PluginError {
    #[error("invalid plugin name: {0:?}")]
    InvalidName(String),

    #[error("failed to load module from {origin}: {message}")]
    Load { origin: String, message: String },

    #[error("module {module} is incompatible: {message}")]
    AbiMismatch { module: String, message: String },

    #[error("plugin {name:?} is not a {expected}")]
    TypeMismatch {
        name: String,
        expected: &'static str,
    },

    #[error("cache store error: {0}")]
    Store(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PluginError {
    /// Build a [`PluginError::Load`] from any displayable origin and cause.
    pub fn load(origin: impl Display, cause: impl Display) -> Self {
        Self::Load {
            origin: origin.to_string(),
            message: cause.to_string(),
        }
    }

    /// True for failures that happened while resolving a module from its source.
    pub fn is_load_failure(&self) -> bool {
        matches!(self, Self::Load { .. } | Self::AbiMismatch { .. })
    }
}

pub type PluginResult<T> = std::result::Result<T, PluginError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_error_message_names_origin() {
        let err = PluginError::load("file /tmp/missing.so", "No such file or directory");
        assert_eq!(
            err.to_string(),
            "failed to load module from file /tmp/missing.so: No such file or directory"
        );
        assert!(err.is_load_failure());
    }

    #[test]
    fn type_mismatch_is_not_a_load_failure() {
        let err = PluginError::TypeMismatch {
            name: "demo".into(),
            expected: "u32",
        };
        assert!(!err.is_load_failure());
        assert!(err.to_string().contains("u32"));
    }
}
