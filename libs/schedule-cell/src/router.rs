// libs/schedule-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn schedule_routes(state: Arc<AppConfig>) -> Router {
    // Availability is browsable without an account
    let public_routes = Router::new()
        .route("/available", get(handlers::get_available_schedules))
        .route("/doctors/{slug}/available", get(handlers::get_doctor_schedule));

    let protected_routes = Router::new()
        .route("/book/{slot_id}", post(handlers::book_slot))
        .route("/my", get(handlers::get_my_appointments))
        // Admin panel
        .route("/", get(handlers::list_appointments))
        .route("/shifts", post(handlers::create_shift))
        .route("/new-requests-count", get(handlers::new_requests_count))
        .route("/patients/{patient_id}", get(handlers::get_patient_appointments))
        .route("/toggle-day", post(handlers::toggle_day))
        .route("/{slot_id}/confirm", post(handlers::confirm_slot))
        .route("/{slot_id}/cancel", post(handlers::cancel_slot))
        .route("/{slot_id}", put(handlers::edit_slot))
        .route("/{slot_id}", delete(handlers::delete_slot))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
