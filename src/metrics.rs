use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::RwLock;

/// Counters kept per category.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CategoryMetrics {
    pub requests: u64,
    pub errors: u64,
    pub cache_misses: u64,
    pub reloads: u64,
    pub total_response_ms: u64,
}

impl CategoryMetrics {
    pub fn avg_response_ms(&self) -> f64 {
        if self.requests == 0 {
            0.0
        } else {
            self.total_response_ms as f64 / self.requests as f64
        }
    }

    fn absorb(&mut self, other: &CategoryMetrics) {
        self.requests += other.requests;
        self.errors += other.errors;
        self.cache_misses += other.cache_misses;
        self.reloads += other.reloads;
        self.total_response_ms += other.total_response_ms;
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryReport {
    #[serde(flatten)]
    pub counters: CategoryMetrics,
    pub avg_response_ms: f64,
}

impl From<&CategoryMetrics> for CategoryReport {
    fn from(metrics: &CategoryMetrics) -> Self {
        Self {
            counters: metrics.clone(),
            avg_response_ms: metrics.avg_response_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsReport {
    pub categories: BTreeMap<String, CategoryReport>,
    pub total: CategoryReport,
}

#[derive(Debug, Clone, Default)]
pub struct MetricsCollector {
    categories: Arc<RwLock<HashMap<String, CategoryMetrics>>>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record_request(&self, category: &str, elapsed: Duration, success: bool) {
        let mut categories = self.categories.write().await;
        let metrics = categories.entry(category.to_string()).or_default();

        metrics.requests += 1;
        metrics.total_response_ms += elapsed.as_millis() as u64;
        if !success {
            metrics.errors += 1;
        }
    }

    pub async fn record_cache_miss(&self, category: &str) {
        let mut categories = self.categories.write().await;
        categories.entry(category.to_string()).or_default().cache_misses += 1;
    }

    pub async fn record_reload(&self, category: &str) {
        let mut categories = self.categories.write().await;
        categories.entry(category.to_string()).or_default().reloads += 1;
    }

    pub async fn get_category_metrics(&self, category: &str) -> Option<CategoryMetrics> {
        self.categories.read().await.get(category).cloned()
    }

    pub async fn get_global_metrics(&self) -> CategoryMetrics {
        let categories = self.categories.read().await;
        let mut global = CategoryMetrics::default();
        for metrics in categories.values() {
            global.absorb(metrics);
        }
        global
    }

    pub async fn report(&self) -> MetricsReport {
        let categories = self.categories.read().await;
        let mut total = CategoryMetrics::default();
        let per_category = categories
            .iter()
            .map(|(key, metrics)| {
                total.absorb(metrics);
                (key.clone(), CategoryReport::from(metrics))
            })
            .collect();

        MetricsReport {
            categories: per_category,
            total: CategoryReport::from(&total),
        }
    }
}
