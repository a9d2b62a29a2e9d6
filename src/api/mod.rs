use axum::{
    Router, middleware,
    routing::get,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::db::Store;
use crate::services::FeedService;

mod error;
pub mod feeds;
mod observability;
mod system;
mod types;

pub use error::ApiError;
pub use types::*;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,

    pub store: Store,

    pub feeds: Arc<dyn FeedService>,

    pub start_time: std::time::Instant,

    pub prometheus_handle: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        store: Store,
        feeds: Arc<dyn FeedService>,
        prometheus_handle: Option<PrometheusHandle>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            store,
            feeds,
            start_time: std::time::Instant::now(),
            prometheus_handle,
        })
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/feeds", get(feeds::get_feed).post(feeds::create_feed))
        .route("/health", get(system::health))
        .route("/metrics", get(observability::get_metrics))
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(observability::logging_middleware))
}
