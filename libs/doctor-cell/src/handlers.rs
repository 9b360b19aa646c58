// libs/doctor-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::extractor::require_admin;

use crate::models::{CreateDoctorRequest, CreateReviewRequest, DoctorError};
use crate::services::doctor::DoctorService;
use crate::services::review::ReviewService;

fn map_doctor_error(e: DoctorError) -> AppError {
    match e {
        DoctorError::NotFound => AppError::NotFound("Doctor not found".to_string()),
        DoctorError::ReviewNotAllowed => AppError::Permission(
            "Reviews are open only to patients with a completed appointment".to_string(),
        ),
        DoctorError::ValidationError(msg) => AppError::ValidationError(msg),
        DoctorError::DatabaseError(msg) => AppError::Database(msg),
    }
}

#[axum::debug_handler]
pub async fn list_doctors(State(state): State<Arc<AppConfig>>) -> Result<Json<Value>, AppError> {
    let service = DoctorService::new(&state);
    let doctors = service
        .list_doctors(&state.supabase_anon_key)
        .await
        .map_err(map_doctor_error)?;

    Ok(Json(json!({ "doctors": doctors })))
}

#[axum::debug_handler]
pub async fn get_doctor(
    State(state): State<Arc<AppConfig>>,
    Path(slug): Path<String>,
) -> Result<Json<Value>, AppError> {
    let service = DoctorService::new(&state);
    let doctor = service
        .get_by_slug(&slug, &state.supabase_anon_key)
        .await
        .map_err(map_doctor_error)?;

    Ok(Json(json!({ "doctor": doctor })))
}

#[axum::debug_handler]
pub async fn create_doctor(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateDoctorRequest>,
) -> Result<Json<Value>, AppError> {
    require_admin(&user)?;
    let token = auth.token();

    let service = DoctorService::new(&state);
    let doctor = service
        .create_doctor(request, token)
        .await
        .map_err(map_doctor_error)?;

    Ok(Json(json!({
        "success": true,
        "doctor": doctor
    })))
}

#[axum::debug_handler]
pub async fn get_doctor_reviews(
    State(state): State<Arc<AppConfig>>,
    Path(slug): Path<String>,
) -> Result<Json<Value>, AppError> {
    let service = ReviewService::new(&state);
    let reviews = service
        .doctor_reviews(&slug, &state.supabase_anon_key)
        .await
        .map_err(map_doctor_error)?;

    Ok(Json(json!({
        "reviews": reviews.reviews,
        "average_rating": reviews.aggregate.average_rating,
        "count": reviews.aggregate.count
    })))
}

#[axum::debug_handler]
pub async fn create_review(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(slug): Path<String>,
    Json(request): Json<CreateReviewRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    let service = ReviewService::new(&state);
    let review = service
        .create_review(&slug, &user, request, token)
        .await
        .map_err(map_doctor_error)?;

    Ok(Json(json!({
        "success": true,
        "review": review
    })))
}
