pub mod admission;
pub mod cache;
pub mod category;
pub mod clock;
pub mod config;
pub mod config_validator;
pub mod error;
pub mod handlers;
pub mod health;
pub mod metrics;
pub mod middleware;
pub mod pipeline;
pub mod rate_limiter;
pub mod redis_store;
pub mod replenish;
pub mod response;
pub mod retry;
pub mod seed;
pub mod server;
pub mod store;
pub mod style;
pub mod validation;

pub use config::Config;
pub use error::{ApiError, FetchError, StoreError};
pub use handlers::{AppState, SharedState};
pub use server::create_app;
pub use store::ImageStore;
