use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};

use doctor_cell::router::doctor_routes;
use patient_cell::router::patient_routes;
use schedule_cell::router::schedule_routes;
use triage_cell::router::triage_routes;
use shared_config::AppConfig;

pub fn create_router(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(|| async { "VitaMed Clinic API is running!" }))
        .nest("/schedules", schedule_routes(state.clone()))
        .nest("/doctors", doctor_routes(state.clone()))
        .nest("/patients", patient_routes(state.clone()))
        .nest("/triage", triage_routes(state.clone()))
}
