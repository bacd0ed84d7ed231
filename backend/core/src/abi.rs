//! Module ABI
//!
//! A native module is a shared library exporting one static,
//! [`DECLARATION_SYMBOL`], of type [`ModuleDeclaration`]. The host checks the
//! ABI and core versions before calling `register`. Modules and host must be
//! built by the same compiler: `register` uses the Rust calling convention
//! and trait objects cross the boundary.
//!
//! ```rust,ignore
//! use plugcache_core::{declare_module, into_object, ModuleRegistrar};
//!
//! pub struct Shout;
//!
//! fn register(registrar: &mut dyn ModuleRegistrar) {
//!     registrar.register_type("shout::Shout", || into_object(Shout));
//! }
//!
//! declare_module!("shout", register);
//! ```

use crate::traits::ModuleRegistrar;

/// Bumped whenever [`ModuleDeclaration`] or the registration contract changes.
pub const MODULE_ABI_VERSION: u32 = 1;

/// Version of `plugcache-core` a module was compiled against.
pub const CORE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Exported symbol name, NUL-terminated for symbol lookup.
pub const DECLARATION_SYMBOL: &[u8] = b"plugcache_module_declaration\0";

#[derive(Clone, Copy)]
pub struct ModuleDeclaration {
    pub abi_version: u32,
    pub core_version: &'static str,
    pub module_name: &'static str,
    pub register: fn(&mut dyn ModuleRegistrar),
}

impl ModuleDeclaration {
    /// Explain why this declaration cannot be used by the running host, if it can't.
    pub fn incompatibility(&self) -> Option<String> {
        if self.abi_version != MODULE_ABI_VERSION {
            return Some(format!(
                "module ABI v{} but host expects v{}",
                self.abi_version, MODULE_ABI_VERSION
            ));
        }
        if self.core_version != CORE_VERSION {
            return Some(format!(
                "built against plugcache-core {} but host runs {}",
                self.core_version, CORE_VERSION
            ));
        }
        None
    }
}

/// Export a [`ModuleDeclaration`] from a `cdylib` crate.
#[macro_export]
macro_rules! declare_module {
    ($name:expr, $register:path) => {
        #[doc(hidden)]
        #[allow(non_upper_case_globals)]
        #[unsafe(no_mangle)]
        pub static plugcache_module_declaration: $crate::abi::ModuleDeclaration =
            $crate::abi::ModuleDeclaration {
                abi_version: $crate::abi::MODULE_ABI_VERSION,
                core_version: $crate::abi::CORE_VERSION,
                module_name: $name,
                register: $register,
            };
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_: &mut dyn ModuleRegistrar) {}

    #[test]
    fn current_declaration_is_compatible() {
        let decl = ModuleDeclaration {
            abi_version: MODULE_ABI_VERSION,
            core_version: CORE_VERSION,
            module_name: "noop",
            register: noop,
        };
        assert!(decl.incompatibility().is_none());
    }

    #[test]
    fn abi_bump_is_reported() {
        let decl = ModuleDeclaration {
            abi_version: MODULE_ABI_VERSION + 1,
            core_version: CORE_VERSION,
            module_name: "future",
            register: noop,
        };
        assert!(decl.incompatibility().unwrap().contains("ABI"));
    }

    #[test]
    fn core_version_skew_is_reported() {
        let decl = ModuleDeclaration {
            abi_version: MODULE_ABI_VERSION,
            core_version: "0.0.0-old",
            module_name: "stale",
            register: noop,
        };
        assert!(decl.incompatibility().unwrap().contains("0.0.0-old"));
    }
}
