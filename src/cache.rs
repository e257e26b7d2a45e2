//! Per-category pools of pre-fetched image URLs.
//!
//! Every pool lives in one map behind a single fair `tokio::sync::RwLock`.
//! Category cardinality is small, so one coarse lock keeps eviction simple
//! and rules out lock-ordering problems between categories.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::debug;

use crate::category::Category;
use crate::replenish::ReplenishHandle;

#[derive(Debug, Clone)]
pub struct CacheSettings {
    /// Largest batch requested from the store per reload.
    pub capacity: usize,
    /// How long a pool stays fresh after a reload.
    pub expiration: Duration,
    /// Minimum spacing between two sweeps.
    pub sweep_interval: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            capacity: 20,
            expiration: Duration::from_secs(30 * 60),
            sweep_interval: Duration::from_secs(5 * 60),
        }
    }
}

#[derive(Debug)]
struct CachePool {
    urls: VecDeque<String>,
    refreshed_at: u64,
}

impl CachePool {
    fn is_fresh(&self, now: u64, expiration_ms: u64) -> bool {
        now.saturating_sub(self.refreshed_at) < expiration_ms && !self.urls.is_empty()
    }
}

pub struct CacheStore {
    settings: CacheSettings,
    pools: RwLock<HashMap<&'static str, CachePool>>,
    last_sweep: AtomicU64,
    replenish: ReplenishHandle,
}

impl CacheStore {
    pub fn new(settings: CacheSettings, replenish: ReplenishHandle) -> Self {
        Self {
            settings,
            pools: RwLock::new(HashMap::new()),
            last_sweep: AtomicU64::new(0),
            replenish,
        }
    }

    pub fn capacity(&self) -> usize {
        self.settings.capacity
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    fn expiration_ms(&self) -> u64 {
        self.settings.expiration.as_millis() as u64
    }

    /// Pop the front URL of a fresh pool.
    ///
    /// `None` means the pool is missing, empty or stale and the caller has to
    /// reload. A hit that leaves fewer than half of `capacity` URLs behind
    /// submits a background replenish without waiting for it.
    pub async fn try_take(&self, category: &'static Category, now: u64) -> Option<String> {
        let expiration_ms = self.expiration_ms();
        let (url, remaining) = {
            let mut pools = self.pools.write().await;
            let pool = pools.get_mut(category.key)?;
            if !pool.is_fresh(now, expiration_ms) {
                return None;
            }
            let url = pool.urls.pop_front()?;
            (url, pool.urls.len())
        };

        if remaining < self.settings.capacity / 2 {
            self.replenish.submit(category);
        }
        Some(url)
    }

    /// Install a freshly sampled batch, discarding whatever the pool held.
    pub async fn replace(&self, category: &'static Category, urls: Vec<String>, now: u64) {
        if urls.is_empty() {
            return;
        }

        let count = urls.len();
        self.pools.write().await.insert(
            category.key,
            CachePool {
                urls: urls.into(),
                refreshed_at: now,
            },
        );
        debug!(category = category.key, count, "pool replaced");
    }

    /// Evict stale pools, at most once per sweep interval.
    ///
    /// Returns the number of pools removed.
    pub async fn sweep(&self, now: u64) -> usize {
        let interval_ms = self.settings.sweep_interval.as_millis() as u64;
        let last = self.last_sweep.load(Ordering::Acquire);
        if now.saturating_sub(last) < interval_ms {
            return 0;
        }
        if self
            .last_sweep
            .compare_exchange(last, now, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            // Another request claimed this sweep.
            return 0;
        }

        let expiration_ms = self.expiration_ms();
        let mut pools = self.pools.write().await;
        let initial_count = pools.len();
        pools.retain(|_, pool| now.saturating_sub(pool.refreshed_at) < expiration_ms);

        let removed = initial_count - pools.len();
        if removed > 0 {
            debug!(removed, "swept stale pools");
        }
        removed
    }

    /// Remaining URLs per cached category.
    pub async fn snapshot(&self) -> BTreeMap<String, usize> {
        self.pools
            .read()
            .await
            .iter()
            .map(|(key, pool)| (key.to_string(), pool.urls.len()))
            .collect()
    }

    pub async fn len(&self, category: &Category) -> Option<usize> {
        self.pools
            .read()
            .await
            .get(category.key)
            .map(|pool| pool.urls.len())
    }
}
