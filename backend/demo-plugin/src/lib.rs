//! Example plugcache module.
//!
//! Built as a `cdylib` it is loadable by the native loader; as an `rlib` the
//! host links it to share the [`Greeter`] capability and type names.

use std::sync::atomic::{AtomicU64, Ordering};

use plugcache_core::{declare_module, into_object, ModuleRegistrar};

pub const MODULE_NAME: &str = "demo-plugin";

pub const GREETER_TYPE: &str = "demo_plugin::DemoGreeter";
pub const SHOUTING_GREETER_TYPE: &str = "demo_plugin::ShoutingGreeter";

/// Capability exported by this module.
pub trait Greeter: Send + Sync {
    fn hello(&self, who: &str) -> String;

    /// Identifies the instance, so callers can tell a cached instance from a fresh one.
    fn instance_id(&self) -> u64;
}

/// What the host downcasts to.
pub type GreeterPlugin = Box<dyn Greeter>;

static NEXT_INSTANCE: AtomicU64 = AtomicU64::new(1);

fn next_id() -> u64 {
    NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed)
}

pub struct DemoGreeter {
    id: u64,
}

impl Greeter for DemoGreeter {
    fn hello(&self, who: &str) -> String {
        format!("Hello, {who}!")
    }

    fn instance_id(&self) -> u64 {
        self.id
    }
}

pub struct ShoutingGreeter {
    id: u64,
}

impl Greeter for ShoutingGreeter {
    fn hello(&self, who: &str) -> String {
        format!("HELLO, {}!", who.to_uppercase())
    }

    fn instance_id(&self) -> u64 {
        self.id
    }
}

pub fn register(registrar: &mut dyn ModuleRegistrar) {
    registrar.register_type(GREETER_TYPE, || {
        into_object::<GreeterPlugin>(Box::new(DemoGreeter { id: next_id() }))
    });
    registrar.register_type(SHOUTING_GREETER_TYPE, || {
        into_object::<GreeterPlugin>(Box::new(ShoutingGreeter { id: next_id() }))
    });
}

declare_module!(MODULE_NAME, register);
