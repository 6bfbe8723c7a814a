use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{get, post},
};

use crate::app_state::AppState;

use super::handlers;

pub fn build_router(state: Arc<AppState>) -> Router {
    let capture_routes = Router::new()
        .route("/start", post(handlers::start))
        .route("/stop", post(handlers::stop))
        .route("/source", post(handlers::source_select));

    let frame_routes = Router::new()
        .route("/", get(handlers::frames))
        .route("/latest", get(handlers::latest_frame))
        .route("/{index}", get(handlers::frame));

    Router::new()
        .route("/health", get(handlers::health))
        .route("/status", get(handlers::status))
        .route("/stream", get(handlers::stream))
        .nest("/capture", capture_routes)
        .nest("/frames", frame_routes)
        .layer(middleware::from_fn(super::middleware::trace_requests))
        .with_state(state)
}
