//! Read API route definitions.

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

use super::handlers::{self, AppState};

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/products", get(handlers::list_products))
        .route("/products/:product_id", get(handlers::get_product))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
