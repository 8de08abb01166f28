//! [`CacheManager`]: debounced, concurrency-safe flushing of registered
//! [`ICacheable`] objects.

use crate::store::LocalCacheStore;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

/// Default debounce interval between `markDirty()` and the flush it triggers.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(5000);

/// A cacheable participant in a [`CacheManager`]: typically a `Database` or
/// a `VirtualView`. `flush_to_cache` writes its current dirty state through
/// the supplied store; errors are isolated per-cacheable by the manager.
pub trait ICacheable: Send + Sync {
    /// A stable prefix identifying this cacheable's entries within the store
    /// (e.g. a `tenantId:dbId` composite key).
    fn cache_prefix(&self) -> String;

    /// Returns `true` if this cacheable has state that hasn't been written
    /// to the cache store yet.
    fn has_dirty_state(&self) -> bool;

    /// Writes all dirty state through `store`. Called from the debounce
    /// timer or from [`CacheManager::dispose`].
    fn flush_to_cache(&self, store: &dyn LocalCacheStore) -> Result<(), String>;

    /// Clears the dirty flag after a successful flush.
    fn clear_dirty(&self);
}

struct Registered {
    cacheable: Arc<dyn ICacheable>,
}

/// Schedules debounced flushes for every registered [`ICacheable`].
///
/// `mark_dirty()` arms a timer (default 5 seconds) if one isn't already
/// running; additional `mark_dirty()` calls while a flush is in flight are
/// merged into the next cycle rather than queuing another flush. A flush
/// failure in one cacheable is logged and does not prevent the others from
/// flushing.
pub struct CacheManager {
    store: Arc<dyn LocalCacheStore>,
    debounce: Duration,
    cacheables: RwLock<HashMap<String, Registered>>,
    flush_lock: Mutex<()>,
    pending: Arc<Notify>,
    timer_handle: Mutex<Option<JoinHandle<()>>>,
    disposed: std::sync::atomic::AtomicBool,
}

impl CacheManager {
    /// Creates a manager over `store` with the given debounce interval.
    pub fn new(store: Arc<dyn LocalCacheStore>, debounce: Duration) -> Arc<Self> {
        Arc::new(Self {
            store,
            debounce,
            cacheables: RwLock::new(HashMap::new()),
            flush_lock: Mutex::new(()),
            pending: Arc::new(Notify::new()),
            timer_handle: Mutex::new(None),
            disposed: std::sync::atomic::AtomicBool::new(false),
        })
    }

    /// Creates a manager with the spec default debounce interval (5000 ms).
    pub fn with_default_debounce(store: Arc<dyn LocalCacheStore>) -> Arc<Self> {
        Self::new(store, DEFAULT_DEBOUNCE)
    }

    /// Registers a cacheable. Re-registering the same prefix replaces the
    /// previous registration.
    pub fn register(self: &Arc<Self>, cacheable: Arc<dyn ICacheable>) {
        let prefix = cacheable.cache_prefix();
        self.cacheables.write().insert(prefix, Registered { cacheable });
    }

    /// Deregisters a cacheable by its prefix.
    pub fn unregister(&self, prefix: &str) {
        self.cacheables.write().remove(prefix);
    }

    /// Signals that some cacheable has new dirty state, arming the debounce
    /// timer if one isn't already pending.
    pub fn mark_dirty(self: &Arc<Self>) {
        if self.disposed.load(std::sync::atomic::Ordering::SeqCst) {
            return;
        }

        let mut handle = self.timer_handle.lock();
        if handle.is_some() {
            // A timer is already scheduled; the next fire will pick up
            // whatever became dirty since it was armed.
            return;
        }

        let this = Arc::clone(self);
        let debounce = self.debounce;
        *handle = Some(tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            this.timer_handle.lock().take();
            this.flush_all().await;
        }));
    }

    /// Flushes every dirty cacheable now, waiting if a flush is already in
    /// progress rather than running two at once.
    pub async fn flush_all(&self) {
        let _guard = self.flush_lock.lock();
        let cacheables: Vec<Arc<dyn ICacheable>> = self
            .cacheables
            .read()
            .values()
            .map(|r| Arc::clone(&r.cacheable))
            .collect();

        for cacheable in cacheables {
            if !cacheable.has_dirty_state() {
                continue;
            }
            match cacheable.flush_to_cache(self.store.as_ref()) {
                Ok(()) => cacheable.clear_dirty(),
                Err(message) => {
                    tracing::warn!(prefix = %cacheable.cache_prefix(), error = %message, "cache flush failed");
                }
            }
        }
    }

    /// Stops the debounce timer and flushes synchronously. After this call
    /// the manager no longer schedules flushes on `mark_dirty()`.
    pub async fn dispose(&self) {
        self.disposed.store(true, std::sync::atomic::Ordering::SeqCst);
        if let Some(handle) = self.timer_handle.lock().take() {
            handle.abort();
        }
        self.flush_all().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryCacheStore;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct TestCacheable {
        prefix: String,
        dirty: AtomicBool,
        fail: bool,
    }

    impl ICacheable for TestCacheable {
        fn cache_prefix(&self) -> String {
            self.prefix.clone()
        }

        fn has_dirty_state(&self) -> bool {
            self.dirty.load(Ordering::SeqCst)
        }

        fn flush_to_cache(&self, store: &dyn LocalCacheStore) -> Result<(), String> {
            if self.fail {
                return Err("boom".to_string());
            }
            store.put("db-meta", &self.prefix, b"flushed").map_err(|e| e.to_string())
        }

        fn clear_dirty(&self) {
            self.dirty.store(false, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn flush_all_flushes_only_dirty_cacheables() {
        let store: Arc<dyn LocalCacheStore> = Arc::new(MemoryCacheStore::new());
        let manager = CacheManager::new(Arc::clone(&store), Duration::from_millis(50));

        let dirty = Arc::new(TestCacheable {
            prefix: "a".to_string(),
            dirty: AtomicBool::new(true),
            fail: false,
        });
        let clean = Arc::new(TestCacheable {
            prefix: "b".to_string(),
            dirty: AtomicBool::new(false),
            fail: false,
        });
        manager.register(dirty.clone());
        manager.register(clean.clone());

        manager.flush_all().await;

        assert_eq!(store.get("db-meta", "a").unwrap(), Some(b"flushed".to_vec()));
        assert_eq!(store.get("db-meta", "b").unwrap(), None);
        assert!(!dirty.has_dirty_state());
    }

    #[tokio::test]
    async fn one_cacheable_failure_does_not_block_others() {
        let store: Arc<dyn LocalCacheStore> = Arc::new(MemoryCacheStore::new());
        let manager = CacheManager::new(Arc::clone(&store), Duration::from_millis(50));

        let failing = Arc::new(TestCacheable {
            prefix: "fail".to_string(),
            dirty: AtomicBool::new(true),
            fail: true,
        });
        let ok = Arc::new(TestCacheable {
            prefix: "ok".to_string(),
            dirty: AtomicBool::new(true),
            fail: false,
        });
        manager.register(failing.clone());
        manager.register(ok.clone());

        manager.flush_all().await;

        assert!(failing.has_dirty_state(), "failed flush must not clear dirty state");
        assert!(!ok.has_dirty_state());
        assert_eq!(store.get("db-meta", "ok").unwrap(), Some(b"flushed".to_vec()));
    }

    #[tokio::test]
    async fn mark_dirty_schedules_a_debounced_flush() {
        let store: Arc<dyn LocalCacheStore> = Arc::new(MemoryCacheStore::new());
        let manager = CacheManager::new(Arc::clone(&store), Duration::from_millis(20));

        let cacheable = Arc::new(TestCacheable {
            prefix: "a".to_string(),
            dirty: AtomicBool::new(true),
            fail: false,
        });
        manager.register(cacheable.clone());

        manager.mark_dirty();
        assert_eq!(store.get("db-meta", "a").unwrap(), None, "flush should be debounced, not immediate");

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(store.get("db-meta", "a").unwrap(), Some(b"flushed".to_vec()));
    }

    #[tokio::test]
    async fn dispose_flushes_synchronously_and_stops_future_timers() {
        let store: Arc<dyn LocalCacheStore> = Arc::new(MemoryCacheStore::new());
        let manager = CacheManager::new(Arc::clone(&store), Duration::from_millis(5000));

        let cacheable = Arc::new(TestCacheable {
            prefix: "a".to_string(),
            dirty: AtomicBool::new(true),
            fail: false,
        });
        manager.register(cacheable.clone());

        manager.dispose().await;
        assert_eq!(store.get("db-meta", "a").unwrap(), Some(b"flushed".to_vec()));

        manager.mark_dirty();
        assert!(manager.timer_handle.lock().is_none(), "disposed manager must not arm a new timer");
    }
}
