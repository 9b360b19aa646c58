// libs/patient-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn patient_routes(state: Arc<AppConfig>) -> Router {
    let protected_routes = Router::new()
        .route("/signup-profile", post(handlers::signup_profile))
        .route("/guest", post(handlers::create_guest))
        .route("/search", get(handlers::search_patients))
        .route("/{patient_id}", get(handlers::get_patient))
        .route("/{patient_id}", put(handlers::update_patient))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new().merge(protected_routes).with_state(state)
}
