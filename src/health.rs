use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use crate::admission::AdmissionGate;
use crate::cache::CacheStore;
use crate::store::ImageStore;

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: String,
    pub timestamp: u64,
    pub version: String,
    pub uptime_seconds: u64,
    pub cache: BTreeMap<String, usize>,
    pub available_permits: usize,
    pub dependencies: DependencyStatus,
}

#[derive(Debug, Serialize)]
pub struct DependencyStatus {
    pub store: ServiceStatus,
}

#[derive(Debug, Serialize)]
pub struct ServiceStatus {
    pub status: String,
    pub response_time_ms: u64,
    pub error: Option<String>,
}

pub struct HealthChecker {
    store: Arc<dyn ImageStore>,
    cache: Arc<CacheStore>,
    admission: AdmissionGate,
    started_at: Instant,
    probe_timeout: Duration,
}

impl HealthChecker {
    pub fn new(
        store: Arc<dyn ImageStore>,
        cache: Arc<CacheStore>,
        admission: AdmissionGate,
        probe_timeout: Duration,
    ) -> Self {
        Self {
            store,
            cache,
            admission,
            started_at: Instant::now(),
            probe_timeout,
        }
    }

    pub async fn check_health(&self) -> HealthStatus {
        let store_status = self.check_store().await;

        let overall_status = if store_status.status == "healthy" {
            "healthy"
        } else {
            // Cached pools can still be served without the store
            "degraded"
        };

        HealthStatus {
            status: overall_status.to_string(),
            timestamp: SystemTime::now()
                .duration_since(SystemTime::UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: self.started_at.elapsed().as_secs(),
            cache: self.cache.snapshot().await,
            available_permits: self.admission.available(),
            dependencies: DependencyStatus {
                store: store_status,
            },
        }
    }

    async fn check_store(&self) -> ServiceStatus {
        let start = Instant::now();
        let result = tokio::time::timeout(self.probe_timeout, self.store.ping()).await;
        let response_time_ms = start.elapsed().as_millis() as u64;

        let error = match result {
            Ok(Ok(())) => None,
            Ok(Err(err)) => Some(err.to_string()),
            Err(_) => Some(format!(
                "{} did not answer within {:?}",
                self.store.name(),
                self.probe_timeout
            )),
        };

        ServiceStatus {
            status: if error.is_none() { "healthy" } else { "unavailable" }.to_string(),
            response_time_ms,
            error,
        }
    }
}
