use super::handlers;
use super::state::ReceiverState;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

/// Largest accepted request body
pub const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Create the receiver router with all routes
pub fn create_router(state: ReceiverState) -> Router {
    Router::new()
        // Connectivity probe target
        .route("/", get(handlers::banner))
        .route("/health", get(handlers::health_check))
        // Recording uploads
        .route("/api/upload", post(handlers::receive_upload))
        .route("/api/uploads", get(handlers::list_uploads))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .with_state(state)
}
