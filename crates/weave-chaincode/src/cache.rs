//! Discovery result cache
//!
//! Time-to-live store from a discovery query key to the endorsers resolved
//! for it. The lock is internal: callers only see `get`, `put` and
//! `invalidate`. Hits take the shared lock; inserts, invalidation and the
//! background sweep take the exclusive one.

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use weave_core::Endorser;

/// Resolved endorser set, shared between the cache and its readers
pub type DiscoveryResult = Arc<[Endorser]>;

/// Expiry used when `now + ttl` cannot be represented (about 30 years)
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

fn expiry(now: Instant, ttl: Duration) -> Instant {
    now.checked_add(ttl)
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}

/// Cache configuration
#[derive(Clone, Debug)]
pub struct CacheConfig {
    /// Lifetime of an entry since it was written or last read
    pub ttl: Duration,

    /// How often the background sweep drops expired entries
    pub sweep_interval: Duration,

    /// Whether a hit pushes the entry's expiry back by `ttl`
    pub extend_on_hit: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::with_ttl(Duration::from_secs(300))
    }
}

impl CacheConfig {
    /// Config with the given TTL; sweeps at half the TTL, at most every minute
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            sweep_interval: (ttl / 2).clamp(Duration::from_millis(10), Duration::from_secs(60)),
            extend_on_hit: true,
        }
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval.max(Duration::from_millis(10));
        self
    }

    pub fn with_extend_on_hit(mut self, enabled: bool) -> Self {
        self.extend_on_hit = enabled;
        self
    }
}

struct CacheEntry {
    value: DiscoveryResult,
    ttl: Duration,
    expires_at: Mutex<Instant>,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        *self.expires_at.lock() <= now
    }
}

struct CacheInner {
    entries: RwLock<HashMap<String, CacheEntry>>,
    config: CacheConfig,
}

impl CacheInner {
    fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        before - entries.len()
    }
}

/// Concurrency-safe TTL cache of discovery results
pub struct DiscoveryCache {
    inner: Arc<CacheInner>,
    sweeper: Option<JoinHandle<()>>,
}

impl DiscoveryCache {
    /// Create an empty cache.
    ///
    /// When called inside a tokio runtime, a sweep task is spawned on it and
    /// stops once the cache is dropped. Outside a runtime, expired entries are
    /// only skipped by reads and removed by `purge_expired`.
    pub fn new(config: CacheConfig) -> Self {
        let inner = Arc::new(CacheInner {
            entries: RwLock::new(HashMap::new()),
            config,
        });

        let sweeper = match tokio::runtime::Handle::try_current() {
            Ok(handle) => Some(handle.spawn(sweep(Arc::downgrade(&inner)))),
            Err(_) => {
                tracing::debug!("No tokio runtime, discovery cache expiry is lazy");
                None
            }
        };

        Self { inner, sweeper }
    }

    pub fn ttl(&self) -> Duration {
        self.inner.config.ttl
    }

    /// Cached value for `key`, if present and not expired
    pub fn get(&self, key: &str) -> Option<DiscoveryResult> {
        let now = Instant::now();
        let entries = self.inner.entries.read();
        let entry = entries.get(key)?;

        let mut expires_at = entry.expires_at.lock();
        if *expires_at <= now {
            return None;
        }
        if self.inner.config.extend_on_hit {
            *expires_at = expiry(now, entry.ttl);
        }
        Some(entry.value.clone())
    }

    /// Insert or overwrite with the cache TTL
    pub fn put(&self, key: impl Into<String>, value: DiscoveryResult) {
        self.put_with_ttl(key, value, self.inner.config.ttl);
    }

    /// Insert or overwrite with an explicit TTL
    pub fn put_with_ttl(&self, key: impl Into<String>, value: DiscoveryResult, ttl: Duration) {
        let entry = CacheEntry {
            value,
            ttl,
            expires_at: Mutex::new(expiry(Instant::now(), ttl)),
        };
        self.inner.entries.write().insert(key.into(), entry);
    }

    /// Remove one entry; returns whether it was present
    pub fn invalidate(&self, key: &str) -> bool {
        self.inner.entries.write().remove(key).is_some()
    }

    /// Remove every entry
    pub fn clear(&self) {
        self.inner.entries.write().clear();
    }

    /// Drop expired entries now; returns how many were removed
    pub fn purge_expired(&self) -> usize {
        self.inner.purge_expired()
    }

    /// Stored entries, expired-but-unswept ones included
    pub fn len(&self) -> usize {
        self.inner.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for DiscoveryCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl Drop for DiscoveryCache {
    fn drop(&mut self) {
        if let Some(sweeper) = self.sweeper.take() {
            sweeper.abort();
        }
    }
}

async fn sweep(inner: Weak<CacheInner>) {
    let period = match inner.upgrade() {
        Some(inner) => inner.config.sweep_interval,
        None => return,
    };
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let Some(inner) = inner.upgrade() else {
            break;
        };
        let removed = inner.purge_expired();
        if removed > 0 {
            tracing::trace!(removed, "Swept expired discovery results");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(identity: &str) -> DiscoveryResult {
        Arc::from(vec![Endorser::new(identity.as_bytes(), "Org1MSP", "peer:7051")])
    }

    #[test]
    fn test_put_get_invalidate_without_runtime() {
        let cache = DiscoveryCache::new(CacheConfig::with_ttl(Duration::from_secs(60)));
        assert!(cache.is_empty());

        cache.put("k", result("peer0"));
        assert_eq!(cache.get("k").unwrap().len(), 1);
        assert!(cache.get("other").is_none());

        assert!(cache.invalidate("k"));
        assert!(!cache.invalidate("k"));
        assert!(cache.get("k").is_none());
    }

    #[test]
    fn test_put_overwrites() {
        let cache = DiscoveryCache::default();
        cache.put("k", result("peer0"));
        cache.put("k", Arc::from(Vec::new()));

        assert_eq!(cache.len(), 1);
        assert!(cache.get("k").unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_not_served() {
        let cache = DiscoveryCache::new(
            CacheConfig::with_ttl(Duration::from_secs(1)).with_sweep_interval(Duration::from_secs(3600)),
        );
        cache.put("k", result("peer0"));

        tokio::time::advance(Duration::from_millis(1500)).await;
        assert!(cache.get("k").is_none());
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.purge_expired(), 1);
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_sweep_evicts() {
        let cache = DiscoveryCache::new(
            CacheConfig::with_ttl(Duration::from_secs(1)).with_sweep_interval(Duration::from_millis(500)),
        );
        cache.put("a", result("peer0"));
        cache.put_with_ttl("b", result("peer1"), Duration::from_secs(3600));

        tokio::time::sleep(Duration::from_secs(3)).await;

        assert_eq!(cache.len(), 1);
        assert!(cache.get("b").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_hit_extends_expiry() {
        let cache = DiscoveryCache::new(CacheConfig::with_ttl(Duration::from_secs(1)));
        cache.put("k", result("peer0"));

        tokio::time::advance(Duration::from_millis(800)).await;
        assert!(cache.get("k").is_some());
        tokio::time::advance(Duration::from_millis(700)).await;
        assert!(cache.get("k").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_hit_does_not_extend_when_disabled() {
        let cache = DiscoveryCache::new(
            CacheConfig::with_ttl(Duration::from_secs(1)).with_extend_on_hit(false),
        );
        cache.put("k", result("peer0"));

        tokio::time::advance(Duration::from_millis(800)).await;
        assert!(cache.get("k").is_some());
        tokio::time::advance(Duration::from_millis(700)).await;
        assert!(cache.get("k").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unbounded_ttl_saturates() {
        let cache = DiscoveryCache::new(CacheConfig::with_ttl(Duration::MAX));
        cache.put("k", result("peer0"));
        cache.put_with_ttl("m", result("peer1"), Duration::from_secs(u64::MAX));

        tokio::time::advance(Duration::from_secs(86_400 * 365)).await;
        assert!(cache.get("k").is_some());
        assert!(cache.get("m").is_some());
        assert_eq!(cache.purge_expired(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_readers_and_writers() {
        let cache = Arc::new(DiscoveryCache::default());
        let mut handles = Vec::new();

        for i in 0..16 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move {
                for j in 0..200 {
                    let key = format!("k{}", j % 4);
                    if (i + j) % 3 == 0 {
                        cache.put(key, result("peer0"));
                    } else if (i + j) % 7 == 0 {
                        cache.invalidate(&key);
                    } else if let Some(v) = cache.get(&key) {
                        assert_eq!(v.len(), 1);
                    }
                }
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }
        assert!(cache.len() <= 4);
    }
}
