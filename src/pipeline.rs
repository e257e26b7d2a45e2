//! The cache-first fetch path.
//!
//! A request is served from the category's pool when it is fresh. On a miss
//! every retried attempt reloads the pool from the store and then takes from
//! it, so pool bookkeeping (trimming, replenish triggering) only ever happens
//! in [`CacheStore::try_take`]. A pool that other requests drain between the
//! reload and the take counts as a failed attempt.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::cache::CacheStore;
use crate::category::{Category, CategoryRegistry};
use crate::clock::Clock;
use crate::error::{FetchError, StoreError};
use crate::metrics::MetricsCollector;
use crate::retry::{with_retry, RetryPolicy};
use crate::store::ImageStore;

pub struct FetchPipeline {
    registry: CategoryRegistry,
    cache: Arc<CacheStore>,
    store: Arc<dyn ImageStore>,
    clock: Arc<dyn Clock>,
    metrics: MetricsCollector,
    retry: RetryPolicy,
    store_timeout: Duration,
}

impl FetchPipeline {
    pub fn new(
        registry: CategoryRegistry,
        cache: Arc<CacheStore>,
        store: Arc<dyn ImageStore>,
        clock: Arc<dyn Clock>,
        metrics: MetricsCollector,
        retry: RetryPolicy,
        store_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            cache,
            store,
            clock,
            metrics,
            retry,
            store_timeout,
        }
    }

    pub fn registry(&self) -> &CategoryRegistry {
        &self.registry
    }

    /// A random image URL for the category `key`.
    pub async fn fetch_url(&self, key: &str) -> Result<String, FetchError> {
        let category = self.registry.resolve(key)?;

        if let Some(url) = self.cache.try_take(category, self.clock.now_ms()).await {
            return Ok(url);
        }

        debug!(category = category.key, "cache miss, reloading");
        self.metrics.record_cache_miss(category.key).await;
        with_retry(&self.retry, "reload", || self.reload_and_take(category)).await
    }

    /// Reload the pool, then take from it through the regular cache path.
    async fn reload_and_take(&self, category: &'static Category) -> Result<String, FetchError> {
        self.reload(category).await?;

        match self.cache.try_take(category, self.clock.now_ms()).await {
            Some(url) => Ok(url),
            None => {
                warn!(category = category.key, "pool gone right after reload");
                Err(FetchError::EmptySample {
                    collection: category.collection.to_string(),
                })
            }
        }
    }

    /// One reload attempt: connect, sample and install the batch.
    ///
    /// Returns the number of URLs installed.
    pub async fn reload(&self, category: &'static Category) -> Result<usize, FetchError> {
        let timeout = self.store_timeout;
        let count = self.cache.capacity();

        let urls = tokio::time::timeout(timeout, async {
            self.store.connect().await?;
            self.store.sample(category.collection, count).await
        })
        .await
        .map_err(|_| StoreError::Timeout(timeout))??;

        if urls.is_empty() {
            return Err(FetchError::EmptySample {
                collection: category.collection.to_string(),
            });
        }

        let installed = urls.len();
        self.cache.replace(category, urls, self.clock.now_ms()).await;
        self.metrics.record_reload(category.key).await;
        Ok(installed)
    }

    /// Best-effort background reload, run by the replenish workers.
    pub async fn replenish(&self, category: &'static Category) {
        match self.reload(category).await {
            Ok(installed) => info!(category = category.key, installed, "pool replenished"),
            Err(err) => warn!(category = category.key, error = %err, "replenish failed"),
        }
    }
}
