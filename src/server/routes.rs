// src/server/routes.rs
//! Axum router configuration for the relay broker

use crate::registry::{URI_BASE, URI_COMPONENTS};
use crate::server::ServerState;
use crate::server::handlers;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Largest accepted submission body (30 MiB)
pub const MAX_SUBMIT_BODY: usize = 30 * 1024 * 1024;

/// Create the main application router
pub fn create_router(state: Arc<ServerState>) -> Router {
    let api = Router::new()
        .route("/login", get(handlers::login))
        .route("/refresh", get(handlers::refresh))
        .route("/status", get(handlers::status))
        .route("/version", get(handlers::version))
        .route(
            URI_COMPONENTS,
            post(handlers::submit_components).get(handlers::poll_job),
        )
        .layer(DefaultBodyLimit::max(MAX_SUBMIT_BODY))
        .with_state(state);

    Router::new()
        .nest(URI_BASE, api)
        .layer(TraceLayer::new_for_http())
}
