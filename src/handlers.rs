use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::admission::AdmissionGate;
use crate::cache::CacheStore;
use crate::category::CategoryRegistry;
use crate::clock::Clock;
use crate::config::ServiceSettings;
use crate::error::{ApiError, FetchError};
use crate::health::HealthChecker;
use crate::metrics::MetricsCollector;
use crate::middleware::ClientIp;
use crate::pipeline::FetchPipeline;
use crate::rate_limiter::RateLimiter;
use crate::replenish;
use crate::response::{ConfigResponse, ImageResponse};
use crate::store::ImageStore;
use crate::style::apply_style;
use crate::validation::ImageQuery;

/// Shared application state
pub type SharedState = Arc<AppState>;

/// Every service the handlers need, constructed once at startup.
pub struct AppState {
    pub settings: ServiceSettings,
    pub registry: CategoryRegistry,
    pub cache: Arc<CacheStore>,
    pub pipeline: Arc<FetchPipeline>,
    pub rate_limiter: RateLimiter,
    pub admission: AdmissionGate,
    pub metrics: MetricsCollector,
    pub health: HealthChecker,
    pub clock: Arc<dyn Clock>,
    workers: Vec<JoinHandle<()>>,
}

impl AppState {
    /// Wire the services together and start the replenish workers.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(
        settings: ServiceSettings,
        store: Arc<dyn ImageStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let registry = CategoryRegistry::default();
        let metrics = MetricsCollector::new();
        let admission = AdmissionGate::new(settings.max_connections, settings.admission_timeout);

        let (handle, queue) = replenish::channel(settings.max_connections);
        let cache = Arc::new(CacheStore::new(settings.cache(), handle));
        let pipeline = Arc::new(FetchPipeline::new(
            registry,
            Arc::clone(&cache),
            Arc::clone(&store),
            Arc::clone(&clock),
            metrics.clone(),
            settings.retry(),
            settings.store_timeout,
        ));
        let workers = queue.spawn_workers(Arc::clone(&pipeline), settings.replenish_workers);

        let health = HealthChecker::new(
            store,
            Arc::clone(&cache),
            admission.clone(),
            settings.store_timeout,
        );

        Self {
            rate_limiter: RateLimiter::new(settings.rate_limit),
            settings,
            registry,
            cache,
            pipeline,
            admission,
            metrics,
            health,
            clock,
            workers,
        }
    }
}

impl Drop for AppState {
    fn drop(&mut self) {
        for worker in &self.workers {
            worker.abort();
        }
    }
}

/// `GET /`: redirect to (or describe) a random image of the requested type.
pub async fn random_image(
    State(state): State<SharedState>,
    client: Option<Extension<ClientIp>>,
    query: Result<Query<ImageQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let client_id = client
        .map(|Extension(ClientIp(ip))| ip)
        .unwrap_or_else(|| "unknown".to_string());

    state
        .admission
        .with_permit(serve_image(&state, client_id, query))
        .await?
}

async fn serve_image(
    state: &AppState,
    client_id: String,
    query: Result<Query<ImageQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let started = Instant::now();
    let now = state.clock.now_ms();

    state.cache.sweep(now).await;

    if !state.rate_limiter.admit(&client_id, now) {
        return Err(ApiError::RateLimited {
            retry_after_secs: state.rate_limiter.retry_after_secs(now),
        });
    }

    let remaining = state.rate_limiter.remaining(&client_id, now);

    let Query(query) = query.map_err(|rejection| ApiError::InvalidRequest(rejection.body_text()))?;
    let request = query.into_request()?;

    let result = resolve_and_fetch(state, &request.category, request.style.as_deref()).await;
    let metrics_key = match &result {
        Err(ApiError::Fetch(FetchError::UnknownCategory { .. })) => "unknown",
        _ => request.category.as_str(),
    };
    state
        .metrics
        .record_request(metrics_key, started.elapsed(), result.is_ok())
        .await;

    let url = result?;
    debug!(client = %client_id, category = %request.category, url = %url, "serving image");

    let mut response = if request.wants_json {
        Json(ImageResponse::ok(url, &request.category)).into_response()
    } else {
        let location = HeaderValue::try_from(url.as_str()).map_err(|_| {
            ApiError::Internal("stored image URL is not a valid Location header".to_string())
        })?;
        let mut response = (StatusCode::SEE_OTHER, [(header::LOCATION, location)]).into_response();
        let headers = response.headers_mut();
        headers.insert(header::REFERRER_POLICY, HeaderValue::from_static("no-referrer"));
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
        response
    };

    let headers = response.headers_mut();
    headers.insert("x-ratelimit-limit", HeaderValue::from(state.rate_limiter.quota()));
    headers.insert("x-ratelimit-remaining", HeaderValue::from(remaining));
    Ok(response)
}

async fn resolve_and_fetch(
    state: &AppState,
    key: &str,
    style: Option<&str>,
) -> Result<String, ApiError> {
    let category = state.registry.resolve(key)?;
    if style.is_some() && !category.style_capable {
        return Err(ApiError::StyleUnsupported(category.key.to_string()));
    }

    let url = state.pipeline.fetch_url(category.key).await?;
    Ok(match style {
        Some(style) => apply_style(&url, style, category),
        None => url,
    })
}

/// `GET /status`
pub async fn health_check(State(state): State<SharedState>) -> impl IntoResponse {
    let health = state.health.check_health().await;
    (StatusCode::OK, Json(health))
}

/// `GET /metrics`
pub async fn metrics_report(State(state): State<SharedState>) -> impl IntoResponse {
    Json(state.metrics.report().await)
}

/// `GET /config`
pub async fn current_config(State(state): State<SharedState>) -> impl IntoResponse {
    Json(ConfigResponse::current(
        state.settings.clone(),
        state.registry.keys(),
    ))
}

/// Periodic housekeeping: prune idle rate-limit windows and log a summary.
pub async fn run_maintenance(state: SharedState, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    ticker.tick().await;
    loop {
        ticker.tick().await;
        let pruned = state.rate_limiter.prune_idle(state.clock.now_ms());
        let total = state.metrics.get_global_metrics().await;
        tracing::info!(
            requests = total.requests,
            errors = total.errors,
            cache_misses = total.cache_misses,
            reloads = total.reloads,
            avg_response_ms = total.avg_response_ms(),
            rate_limited_clients = state.rate_limiter.tracked_clients(),
            pruned_clients = pruned,
            "metrics summary"
        );
    }
}
