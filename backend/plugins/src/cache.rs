//! Plugin cache
//!
//! Coordinates load-or-reuse for named plugin instances on top of an
//! [`ExpiringCache`], and keeps a [`TrackingSet`] of names that are believed
//! to be cached. Expirations reach the tracking set two ways: the store's
//! eviction listener (when it has one) and a reconciliation pass before every
//! read of the loaded set.

use std::any::{Any, type_name};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use plugcache_core::{
    ModuleHandle, ModuleLoader, PluginError, PluginObject, PluginResult, PluginSource, cache_key,
    plugin_name_from_key, validate_name,
};
use plugcache_logging::PluginEvent;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::event_bus::EventBus;
use crate::expiring::{CachedPlugin, EvictionCause, ExpiringCache, MokaExpiringCache};
use crate::tracking::TrackingSet;

/// Behavioural switches for [`PluginCache`].
#[derive(Debug, Clone)]
pub struct CacheOptions {
    /// Run loads for the same name one at a time, re-checking the cache once
    /// the lock is held. Off reproduces last-writer-wins on concurrent misses.
    pub serialize_loads: bool,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            serialize_loads: true,
        }
    }
}

/// One `load_plugin` call.
#[derive(Debug, Clone)]
pub struct LoadRequest {
    pub name: String,
    /// Qualified name of the type to instantiate from the module.
    pub type_name: String,
    pub source: PluginSource,
    /// Absolute deadline. `None` applies the store's default policy.
    pub expires_at: Option<DateTime<Utc>>,
    /// Skip the cache read and always resolve and instantiate.
    pub force_reload: bool,
}

impl LoadRequest {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            source: PluginSource::Absent,
            expires_at: None,
            force_reload: false,
        }
    }

    pub fn with_source(mut self, source: impl Into<PluginSource>) -> Self {
        self.source = source.into();
        self
    }

    pub fn expires_at(mut self, deadline: DateTime<Utc>) -> Self {
        self.expires_at = Some(deadline);
        self
    }

    pub fn expires_in(self, ttl: chrono::Duration) -> Self {
        self.expires_at(Utc::now() + ttl)
    }

    pub fn force_reload(mut self, force: bool) -> Self {
        self.force_reload = force;
        self
    }
}

/// Metadata about a cached plugin, without the instance itself.
#[derive(Debug, Clone, Serialize)]
pub struct PluginEntryInfo {
    pub name: String,
    pub type_name: String,
    pub generation: u64,
    pub loaded_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

pub struct PluginCache {
    loader: Arc<dyn ModuleLoader>,
    store: Arc<dyn ExpiringCache>,
    tracking: Arc<TrackingSet>,
    events: Arc<EventBus>,
    load_locks: DashMap<String, Arc<Mutex<()>>>,
    next_generation: AtomicU64,
    options: CacheOptions,
    active_eviction: bool,
}

impl PluginCache {
    pub fn new(
        loader: Arc<dyn ModuleLoader>,
        store: Arc<dyn ExpiringCache>,
        options: CacheOptions,
    ) -> Self {
        let tracking = Arc::new(TrackingSet::new());
        let events = Arc::new(EventBus::new());

        let listener_tracking = Arc::clone(&tracking);
        let listener_events = Arc::clone(&events);
        let active_eviction = store.set_eviction_listener(Box::new(
            move |key: &str, entry: &CachedPlugin, cause: EvictionCause| {
                let Some(name) = plugin_name_from_key(key) else {
                    return;
                };
                if listener_tracking.remove_generation(name, entry.generation) {
                    listener_events.publish(PluginEvent::Evicted {
                        name: name.to_string(),
                        cause: cause.to_string(),
                    });
                }
            },
        ));
        debug!(active_eviction, serialize_loads = options.serialize_loads, "Plugin cache ready");

        Self {
            loader,
            store,
            tracking,
            events,
            load_locks: DashMap::new(),
            next_generation: AtomicU64::new(0),
            options,
            active_eviction,
        }
    }

    /// Cache backed by an unbounded moka store with no default expiration.
    pub fn in_memory(loader: Arc<dyn ModuleLoader>) -> Self {
        Self::new(
            loader,
            Arc::new(MokaExpiringCache::default()),
            CacheOptions::default(),
        )
    }

    /// Whether the store pushes evictions, as opposed to relying on
    /// reconciliation alone.
    pub fn has_active_eviction(&self) -> bool {
        self.active_eviction
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PluginEvent> {
        self.events.subscribe()
    }

    /// Return the cached instance for `request.name`, or load, instantiate and
    /// cache a new one.
    ///
    /// - `Ok(None)`: no cached instance and no source, or the module does not
    ///   export `request.type_name`.
    /// - `Err(Load | AbiMismatch)`: a source was given but could not be loaded.
    /// - `Err(TypeMismatch)`: the instance is not a `T`. Nothing is cached.
    pub fn load_plugin<T: Any + Send + Sync>(
        &self,
        request: LoadRequest,
    ) -> PluginResult<Option<Arc<T>>> {
        validate_name(&request.name)?;
        let key = cache_key(&request.name);

        if !request.force_reload {
            if let Some(hit) = self.cached::<T>(&request.name, &key)? {
                return Ok(Some(hit));
            }
        }

        if request.source.is_absent() {
            debug!(plugin = %request.name, "Not cached and no source given");
            return Ok(None);
        }

        if !self.options.serialize_loads {
            return self.load_uncached(request, key);
        }

        let lock = self.load_lock(&request.name);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        if !request.force_reload {
            if let Some(hit) = self.cached::<T>(&request.name, &key)? {
                debug!(plugin = %request.name, "Loaded by a concurrent caller");
                return Ok(Some(hit));
            }
        }
        self.load_uncached(request, key)
    }

    pub fn load_from_file<T: Any + Send + Sync>(
        &self,
        name: &str,
        path: impl Into<PathBuf>,
        type_name: &str,
        expires_at: Option<DateTime<Utc>>,
        force_reload: bool,
    ) -> PluginResult<Option<Arc<T>>> {
        self.load_plugin(Self::request(name, type_name, PluginSource::File(path.into()), expires_at, force_reload))
    }

    pub fn load_from_bytes<T: Any + Send + Sync>(
        &self,
        name: &str,
        bytes: Vec<u8>,
        type_name: &str,
        expires_at: Option<DateTime<Utc>>,
        force_reload: bool,
    ) -> PluginResult<Option<Arc<T>>> {
        self.load_plugin(Self::request(name, type_name, PluginSource::Bytes(bytes), expires_at, force_reload))
    }

    pub fn load_from_module<T: Any + Send + Sync>(
        &self,
        name: &str,
        module: ModuleHandle,
        type_name: &str,
        expires_at: Option<DateTime<Utc>>,
        force_reload: bool,
    ) -> PluginResult<Option<Arc<T>>> {
        self.load_plugin(Self::request(name, type_name, PluginSource::Module(module), expires_at, force_reload))
    }

    /// Memory-only lookup: the cached instance or `None`, never a load.
    pub fn load_cached<T: Any + Send + Sync>(&self, name: &str) -> PluginResult<Option<Arc<T>>> {
        self.load_plugin(LoadRequest::new(name, ""))
    }

    /// Names currently cached, after reconciling with the store. The result is
    /// a snapshot; entries may expire right after it is taken.
    pub fn get_loaded_plugins(&self) -> BTreeSet<String> {
        self.sync_plugins();
        self.tracking.names()
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.store.contains(&cache_key(name))
    }

    pub fn entry_info(&self, name: &str) -> Option<PluginEntryInfo> {
        self.store.get(&cache_key(name)).map(|entry| PluginEntryInfo {
            name: name.to_string(),
            type_name: entry.type_name,
            generation: entry.generation,
            loaded_at: entry.loaded_at,
            expires_at: entry.expires_at,
        })
    }

    /// Drop `name` from the cache and the tracking set. Absent names are a no-op.
    pub fn remove_plugin(&self, name: &str) {
        let was_cached = self.store.remove(&cache_key(name));
        let was_tracked = self.tracking.remove(name);
        // A lock still shared is held by an in-flight load; leave it to that caller.
        self.load_locks
            .remove_if(name, |_, lock| Arc::strong_count(lock) == 1);
        if was_cached || was_tracked {
            self.events.publish(PluginEvent::Removed {
                name: name.to_string(),
            });
        }
    }

    pub fn remove_plugins<I, S>(&self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for name in names {
            self.remove_plugin(name.as_ref());
        }
    }

    /// Remove every cached plugin. Returns how many were removed.
    pub fn clean(&self) -> usize {
        self.sync_plugins();
        let names = self.tracking.names();
        let count = names.len();
        self.remove_plugins(&names);
        info!(count, "Plugin cache cleaned");
        self.events.publish(PluginEvent::Cleaned { count });
        count
    }

    /// Drop tracked names whose entries are gone from the store. Returns how
    /// many were dropped.
    fn sync_plugins(&self) -> usize {
        self.store.run_pending_tasks();

        // Generation-guarded so a reload racing this pass stays tracked.
        let mut pruned = 0;
        for (name, generation) in self.tracking.snapshot() {
            if !self.store.contains(&cache_key(&name)) && self.tracking.remove_generation(&name, generation) {
                debug!(plugin = %name, "Pruned expired plugin from tracking");
                pruned += 1;
            }
        }
        if pruned > 0 {
            debug!(pruned, tracked = self.tracking.len(), "Tracking reconciled");
        }
        pruned
    }

    fn request(
        name: &str,
        type_name: &str,
        source: PluginSource,
        expires_at: Option<DateTime<Utc>>,
        force_reload: bool,
    ) -> LoadRequest {
        LoadRequest {
            name: name.to_string(),
            type_name: type_name.to_string(),
            source,
            expires_at,
            force_reload,
        }
    }

    fn cached<T: Any + Send + Sync>(&self, name: &str, key: &str) -> PluginResult<Option<Arc<T>>> {
        let Some(entry) = self.store.get(key) else {
            return Ok(None);
        };
        let instance = downcast::<T>(name, entry.object)?;
        self.events.publish(PluginEvent::CacheHit {
            name: name.to_string(),
            generation: entry.generation,
        });
        Ok(Some(instance))
    }

    fn load_lock(&self, name: &str) -> Arc<Mutex<()>> {
        Arc::clone(self.load_locks.entry(name.to_string()).or_default().value())
    }

    fn load_uncached<T: Any + Send + Sync>(
        &self,
        request: LoadRequest,
        key: String,
    ) -> PluginResult<Option<Arc<T>>> {
        let LoadRequest {
            name,
            type_name,
            source,
            expires_at,
            ..
        } = request;
        let origin = source.describe();

        let module = match self.resolve_module(source) {
            Ok(Some(module)) => module,
            Ok(None) => return Ok(None),
            Err(e) => {
                warn!(plugin = %name, origin = %origin, error = %e, "Module load failed");
                self.events.publish(PluginEvent::LoadFailed {
                    name,
                    origin,
                    error: e.to_string(),
                });
                return Err(e);
            }
        };

        let Some(object) = module.instantiate(&type_name) else {
            warn!(
                plugin = %name,
                module = %module.name(),
                type_name = %type_name,
                "Module did not produce an instance"
            );
            return Ok(None);
        };
        drop(module);

        let instance = downcast::<T>(&name, Arc::clone(&object))?;

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed) + 1;
        let entry = CachedPlugin {
            object,
            type_name: type_name.clone(),
            generation,
            loaded_at: Utc::now(),
            expires_at,
        };
        self.store.set(key, entry, expires_at)?;
        self.tracking.insert(&name, generation);

        info!(plugin = %name, type_name = %type_name, origin = %origin, generation, "Plugin loaded");
        self.events.publish(PluginEvent::Loaded {
            name,
            type_name,
            origin,
            generation,
            expires_at,
        });
        Ok(Some(instance))
    }

    fn resolve_module(&self, source: PluginSource) -> PluginResult<Option<ModuleHandle>> {
        match source {
            PluginSource::File(path) => self.loader.load_from_file(&path).map(Some),
            PluginSource::Bytes(bytes) => self.loader.load_from_bytes(&bytes).map(Some),
            PluginSource::Module(module) => Ok(Some(module)),
            PluginSource::Absent => Ok(None),
        }
    }
}

fn downcast<T: Any + Send + Sync>(name: &str, object: PluginObject) -> PluginResult<Arc<T>> {
    object.downcast::<T>().map_err(|_| PluginError::TypeMismatch {
        name: name.to_string(),
        expected: type_name::<T>(),
    })
}
