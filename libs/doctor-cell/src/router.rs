// libs/doctor-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn doctor_routes(state: Arc<AppConfig>) -> Router {
    // Directory and reviews are public reading
    let public_routes = Router::new()
        .route("/", get(handlers::list_doctors))
        .route("/{slug}", get(handlers::get_doctor))
        .route("/{slug}/reviews", get(handlers::get_doctor_reviews));

    let protected_routes = Router::new()
        .route("/", post(handlers::create_doctor))
        .route("/{slug}/reviews", post(handlers::create_review))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
