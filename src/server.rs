use crate::clock::SystemClock;
use crate::config::Config;
use crate::error::{ApiError, FetchError};
use crate::handlers::{current_config, health_check, metrics_report, random_image, run_maintenance, AppState, SharedState};
use crate::middleware::logging_middleware;
use crate::retry::with_retry;
use crate::store::ImageStore;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{middleware, Router};
use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

const MAINTENANCE_INTERVAL: Duration = Duration::from_secs(60);

/// Build the router over already-constructed state.
pub fn create_app(state: SharedState) -> Router {
    Router::new()
        .route("/", get(random_image))
        .route("/status", get(health_check))
        .route("/metrics", get(metrics_report))
        .route("/config", get(current_config))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(CatchPanicLayer::custom(handle_panic))
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(middleware::from_fn(logging_middleware)),
        )
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    tracing::error!(panic = %detail, "handler panicked");
    ApiError::Internal("request handler panicked".to_string()).into_response()
}

pub struct Server {
    state: SharedState,
    bind_addr: SocketAddr,
}

impl Server {
    /// Connect to the store (with retry) and build the application state.
    pub async fn new(config: Config, store: Arc<dyn ImageStore>) -> Result<Self, FetchError> {
        let settings = config.settings();

        with_retry(&settings.retry(), "startup connect", || async {
            store.connect().await.map_err(FetchError::from)
        })
        .await?;
        tracing::info!(store = store.name(), "backing store connected");

        let state = Arc::new(AppState::new(settings, store, Arc::new(SystemClock)));
        Ok(Self {
            state,
            bind_addr: config.bind_addr,
        })
    }

    pub async fn run(self) -> Result<(), std::io::Error> {
        let listener = tokio::net::TcpListener::bind(self.bind_addr).await?;

        tracing::info!("imagepool listening on {}", self.bind_addr);
        tracing::info!("Health check available at /status");

        let maintenance = tokio::spawn(run_maintenance(Arc::clone(&self.state), MAINTENANCE_INTERVAL));
        let app = create_app(self.state);

        // Run server with graceful shutdown
        let served = axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
            .with_graceful_shutdown(shutdown_signal())
            .await;

        maintenance.abort();
        served
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn test_panic_becomes_internal_error() {
        let response = handle_panic(Box::new("boom"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
