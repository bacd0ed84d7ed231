pub mod cache;
pub mod event_bus;
pub mod expiring;
pub mod loader;
pub mod registry;
pub mod tracking;

pub use cache::{CacheOptions, LoadRequest, PluginCache, PluginEntryInfo};
pub use event_bus::EventBus;
pub use expiring::{CachedPlugin, EvictionCause, EvictionListener, ExpiringCache, MokaExpiringCache, ttl_until};
pub use loader::{NativeModule, NativeModuleLoader};
pub use registry::{StaticModule, StaticModuleBuilder, StaticModuleLoader};
pub use tracking::TrackingSet;
