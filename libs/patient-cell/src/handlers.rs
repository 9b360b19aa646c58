// libs/patient-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::extractor::require_admin;

use crate::models::{
    CreateGuestRequest, PatientError, PatientSearchQuery, SignupProfileRequest,
    UpdatePatientRequest,
};
use crate::services::patient::PatientService;

fn map_patient_error(e: PatientError) -> AppError {
    match e {
        PatientError::NotFound => AppError::NotFound("Patient not found".to_string()),
        PatientError::ValidationError(msg) => AppError::ValidationError(msg),
        PatientError::DatabaseError(msg) => AppError::Database(msg),
    }
}

fn require_admin_or_self(user: &User, id: Uuid) -> Result<(), AppError> {
    if user.id == id.to_string() {
        return Ok(());
    }
    require_admin(user)
}

#[axum::debug_handler]
pub async fn signup_profile(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<SignupProfileRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    let service = PatientService::new(&state);
    let patient = service
        .signup_profile(&user, request, token)
        .await
        .map_err(map_patient_error)?;

    Ok(Json(json!({
        "success": true,
        "patient": patient
    })))
}

#[axum::debug_handler]
pub async fn create_guest(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateGuestRequest>,
) -> Result<Json<Value>, AppError> {
    require_admin(&user)?;
    let token = auth.token();

    let service = PatientService::new(&state);
    let patient = service
        .create_guest(request, token)
        .await
        .map_err(map_patient_error)?;

    Ok(Json(json!({
        "success": true,
        "patient": patient
    })))
}

#[axum::debug_handler]
pub async fn search_patients(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(query): Query<PatientSearchQuery>,
) -> Result<Json<Value>, AppError> {
    require_admin(&user)?;
    let token = auth.token();

    let service = PatientService::new(&state);
    let results = service
        .search(&query.q, token)
        .await
        .map_err(map_patient_error)?;

    Ok(Json(json!({ "results": results })))
}

#[axum::debug_handler]
pub async fn get_patient(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    require_admin_or_self(&user, patient_id)?;
    let token = auth.token();

    let service = PatientService::new(&state);
    let patient = service
        .get_patient(patient_id, token)
        .await
        .map_err(map_patient_error)?;

    Ok(Json(json!({ "patient": patient })))
}

#[axum::debug_handler]
pub async fn update_patient(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(patient_id): Path<Uuid>,
    Json(request): Json<UpdatePatientRequest>,
) -> Result<Json<Value>, AppError> {
    require_admin_or_self(&user, patient_id)?;
    let token = auth.token();

    let service = PatientService::new(&state);
    let patient = service
        .update_patient(patient_id, request, token)
        .await
        .map_err(map_patient_error)?;

    Ok(Json(json!({
        "success": true,
        "patient": patient
    })))
}
