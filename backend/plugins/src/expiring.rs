//! Expiring cache store.
//!
//! `ExpiringCache` is the key/value seam the plugin cache writes through.
//! `MokaExpiringCache` backs it with `moka::sync::Cache`, per-entry absolute
//! deadlines, and an eviction listener that reports expirations as they are
//! collected. Reads never return an expired entry, but moka collects expired
//! entries on a timer wheel with roughly one-second granularity, so the
//! listener can fire up to about a second after the deadline.

use std::fmt;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use moka::notification::RemovalCause;
use moka::sync::Cache;
use moka::Expiry;
use plugcache_core::{PluginObject, PluginResult};

/// A cached plugin instance plus the bookkeeping needed to reconcile it.
#[derive(Clone)]
pub struct CachedPlugin {
    pub object: PluginObject,
    pub type_name: String,
    /// Stamp that distinguishes successive loads of the same name.
    pub generation: u64,
    pub loaded_at: DateTime<Utc>,
    /// Effective deadline. Filled in by the store when it applies a default TTL.
    pub expires_at: Option<DateTime<Utc>>,
}

impl fmt::Debug for CachedPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedPlugin")
            .field("type_name", &self.type_name)
            .field("generation", &self.generation)
            .field("loaded_at", &self.loaded_at)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

/// Why a store dropped an entry on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionCause {
    Expired,
    Capacity,
}

impl fmt::Display for EvictionCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Expired => f.write_str("expired"),
            Self::Capacity => f.write_str("capacity"),
        }
    }
}

/// Callback for entries the store drops without being asked to.
pub type EvictionListener = Box<dyn Fn(&str, &CachedPlugin, EvictionCause) + Send + Sync>;

/// Key/value store with optional absolute-deadline expiration.
///
/// Implementations may call the eviction listener synchronously from inside
/// any of these methods.
pub trait ExpiringCache: Send + Sync {
    /// Insert or replace `key`. `expires_at: None` applies the store's default policy.
    fn set(
        &self,
        key: String,
        entry: CachedPlugin,
        expires_at: Option<DateTime<Utc>>,
    ) -> PluginResult<()>;

    fn get(&self, key: &str) -> Option<CachedPlugin>;

    /// Remove `key`. Returns whether a live entry was removed.
    fn remove(&self, key: &str) -> bool;

    fn contains(&self, key: &str) -> bool;

    /// Flush deferred maintenance such as collecting expired entries.
    fn run_pending_tasks(&self) {}

    /// Install the eviction callback. Returns `false` if the store cannot push
    /// evictions, in which case callers must reconcile by polling.
    fn set_eviction_listener(&self, _listener: EvictionListener) -> bool {
        false
    }
}

/// Longest lifetime the store will schedule. Longer TTLs are clamped to it.
pub const MAX_TTL: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// Time remaining until `deadline`, zero if it has passed.
pub fn ttl_until(deadline: DateTime<Utc>) -> Duration {
    (deadline - Utc::now())
        .to_std()
        .unwrap_or(Duration::ZERO)
        .min(MAX_TTL)
}

/// `now + ttl`, or `None` if it is not representable.
fn deadline_after(ttl: Duration) -> Option<DateTime<Utc>> {
    let ttl = chrono::Duration::from_std(ttl).ok()?;
    Utc::now().checked_add_signed(ttl)
}

#[derive(Clone)]
struct Slot {
    entry: CachedPlugin,
    ttl: Option<Duration>,
}

struct DeadlineExpiry;

impl Expiry<String, Slot> for DeadlineExpiry {
    fn expire_after_create(&self, _key: &String, slot: &Slot, _created_at: Instant) -> Option<Duration> {
        slot.ttl
    }

    fn expire_after_update(
        &self,
        _key: &String,
        slot: &Slot,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        slot.ttl
    }
}

type ListenerSlot = Arc<RwLock<Option<EvictionListener>>>;

/// `ExpiringCache` on top of `moka::sync::Cache`.
pub struct MokaExpiringCache {
    cache: Cache<String, Slot>,
    default_ttl: Option<Duration>,
    listener: ListenerSlot,
}

impl MokaExpiringCache {
    /// `default_ttl: None` keeps entries without a deadline until removed.
    pub fn new(default_ttl: Option<Duration>, max_capacity: Option<u64>) -> Self {
        let default_ttl = default_ttl.map(|ttl| ttl.min(MAX_TTL));
        let listener: ListenerSlot = Arc::new(RwLock::new(None));
        let notify = Arc::clone(&listener);

        let mut builder = Cache::<String, Slot>::builder()
            .expire_after(DeadlineExpiry)
            .eviction_listener(move |key: Arc<String>, slot: Slot, cause: RemovalCause| {
                let cause = match cause {
                    RemovalCause::Expired => EvictionCause::Expired,
                    RemovalCause::Size => EvictionCause::Capacity,
                    // Explicit removals and reload overwrites are driven by the caller.
                    RemovalCause::Explicit | RemovalCause::Replaced => return,
                };
                if let Ok(guard) = notify.read() {
                    if let Some(listener) = guard.as_ref() {
                        listener(key.as_str(), &slot.entry, cause);
                    }
                }
            });
        if let Some(capacity) = max_capacity {
            builder = builder.max_capacity(capacity);
        }

        Self {
            cache: builder.build(),
            default_ttl,
            listener,
        }
    }

    pub fn default_ttl(&self) -> Option<Duration> {
        self.default_ttl
    }
}

impl Default for MokaExpiringCache {
    fn default() -> Self {
        Self::new(None, None)
    }
}

impl ExpiringCache for MokaExpiringCache {
    fn set(
        &self,
        key: String,
        mut entry: CachedPlugin,
        expires_at: Option<DateTime<Utc>>,
    ) -> PluginResult<()> {
        let ttl = match expires_at {
            Some(deadline) => Some(ttl_until(deadline)),
            None => self.default_ttl,
        };
        entry.expires_at = match expires_at {
            Some(deadline) => Some(deadline),
            None => ttl.and_then(deadline_after),
        };
        self.cache.insert(key, Slot { entry, ttl });
        Ok(())
    }

    fn get(&self, key: &str) -> Option<CachedPlugin> {
        self.cache.get(key).map(|slot| slot.entry)
    }

    fn remove(&self, key: &str) -> bool {
        self.cache.remove(key).is_some()
    }

    fn contains(&self, key: &str) -> bool {
        self.cache.contains_key(key)
    }

    fn run_pending_tasks(&self) {
        self.cache.run_pending_tasks();
    }

    fn set_eviction_listener(&self, listener: EvictionListener) -> bool {
        match self.listener.write() {
            Ok(mut slot) => {
                *slot = Some(listener);
                true
            }
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn entry(generation: u64) -> CachedPlugin {
        CachedPlugin {
            object: Arc::new(generation),
            type_name: "u64".into(),
            generation,
            loaded_at: Utc::now(),
            expires_at: None,
        }
    }

    #[test]
    fn entries_without_deadline_persist() {
        let store = MokaExpiringCache::default();
        store.set("plugin:a".into(), entry(1), None).unwrap();
        store.run_pending_tasks();
        assert!(store.contains("plugin:a"));
        assert_eq!(store.get("plugin:a").unwrap().generation, 1);
    }

    #[test]
    fn past_deadline_is_never_served() {
        let store = MokaExpiringCache::default();
        let deadline = Utc::now() - chrono::Duration::seconds(5);
        store.set("plugin:old".into(), entry(1), Some(deadline)).unwrap();
        std::thread::sleep(Duration::from_millis(20));
        assert!(store.get("plugin:old").is_none());
        assert!(!store.contains("plugin:old"));
    }

    #[test]
    fn default_ttl_sets_effective_deadline() {
        let store = MokaExpiringCache::new(Some(Duration::from_secs(60)), None);
        store.set("plugin:a".into(), entry(1), None).unwrap();
        let stored = store.get("plugin:a").unwrap();
        let remaining = stored.expires_at.unwrap() - Utc::now();
        assert!(remaining > chrono::Duration::seconds(50));
    }

    #[test]
    fn expiry_is_reported_but_explicit_removal_is_not() {
        let store = MokaExpiringCache::default();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        assert!(store.set_eviction_listener(Box::new(
            move |key: &str, entry: &CachedPlugin, cause: EvictionCause| {
                sink.lock().unwrap().push((key.to_string(), entry.generation, cause));
            },
        )));

        let soon = Utc::now() + chrono::Duration::milliseconds(30);
        store.set("plugin:short".into(), entry(7), Some(soon)).unwrap();
        store.set("plugin:kept".into(), entry(8), None).unwrap();
        assert!(store.remove("plugin:kept"));
        assert!(!store.remove("plugin:kept"));

        // Expired entries are collected on moka's timer wheel, not at the deadline.
        let give_up = Instant::now() + Duration::from_secs(5);
        while seen.lock().unwrap().is_empty() && Instant::now() < give_up {
            std::thread::sleep(Duration::from_millis(50));
            store.run_pending_tasks();
        }

        let seen = seen.lock().unwrap();
        assert_eq!(
            seen.as_slice(),
            &[("plugin:short".to_string(), 7, EvictionCause::Expired)]
        );
    }

    #[test]
    fn huge_default_ttl_is_clamped_instead_of_overflowing() {
        let store = MokaExpiringCache::new(Some(Duration::from_secs(10_000_000_000_000)), None);
        assert_eq!(store.default_ttl(), Some(MAX_TTL));

        store.set("plugin:a".into(), entry(1), None).unwrap();
        let stored = store.get("plugin:a").unwrap();
        assert!(stored.expires_at.unwrap() > Utc::now() + chrono::Duration::days(365 * 99));
    }

    #[test]
    fn far_deadline_is_kept_as_given() {
        let store = MokaExpiringCache::default();
        let far = Utc::now() + chrono::Duration::days(365 * 1000);
        store.set("plugin:far".into(), entry(1), Some(far)).unwrap();
        assert_eq!(store.get("plugin:far").unwrap().expires_at, Some(far));
    }

    #[test]
    fn replacing_an_entry_is_not_an_eviction() {
        let store = MokaExpiringCache::default();
        let count = Arc::new(Mutex::new(0usize));
        let sink = Arc::clone(&count);
        store.set_eviction_listener(Box::new(
            move |_: &str, _: &CachedPlugin, _: EvictionCause| *sink.lock().unwrap() += 1,
        ));

        store.set("plugin:a".into(), entry(1), None).unwrap();
        store.set("plugin:a".into(), entry(2), None).unwrap();
        store.run_pending_tasks();

        assert_eq!(*count.lock().unwrap(), 0);
        assert_eq!(store.get("plugin:a").unwrap().generation, 2);
    }
}
