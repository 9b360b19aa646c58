// libs/schedule-cell/src/handlers.rs
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
    CreateShiftRequest, EditSlotRequest, ScheduleError, ScheduleSearchQuery, ToggleDayRequest,
};
use crate::services::booking::BookingService;
use crate::services::generation::SlotGenerationService;
use crate::services::query::ScheduleQueryService;

fn map_schedule_error(e: ScheduleError) -> AppError {
    match e {
        ScheduleError::NotFound => AppError::NotFound("Slot not found".to_string()),
        ScheduleError::SlotTaken => AppError::Conflict("Slot is no longer available".to_string()),
        ScheduleError::DoctorNotFound => AppError::NotFound("Doctor not found".to_string()),
        ScheduleError::DuplicateSlot => {
            AppError::Conflict("Schedule already has slots at one of these times".to_string())
        }
        ScheduleError::InvalidShift(msg) => AppError::BadRequest(msg),
        ScheduleError::ValidationError(msg) => AppError::ValidationError(msg),
        ScheduleError::DatabaseError(msg) => AppError::Database(msg),
    }
}

// ==============================================================================
// PUBLIC AVAILABILITY HANDLERS
// ==============================================================================

#[derive(Debug, serde::Deserialize)]
pub struct AvailabilityQuery {
    pub doctor_id: Option<Uuid>,
}

#[axum::debug_handler]
pub async fn get_available_schedules(
    State(state): State<Arc<AppConfig>>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<Value>, AppError> {
    let service = ScheduleQueryService::new(&state);
    let schedules = service
        .available_grouped(query.doctor_id, &state.supabase_anon_key)
        .await
        .map_err(map_schedule_error)?;

    Ok(Json(json!({ "doctors": schedules })))
}

#[axum::debug_handler]
pub async fn get_doctor_schedule(
    State(state): State<Arc<AppConfig>>,
    Path(slug): Path<String>,
) -> Result<Json<Value>, AppError> {
    let service = ScheduleQueryService::new(&state);
    let schedule = service
        .available_for_doctor_slug(&slug, &state.supabase_anon_key)
        .await
        .map_err(map_schedule_error)?;

    Ok(Json(json!({ "schedule": schedule })))
}

// ==============================================================================
// PATIENT HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn book_slot(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(slot_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    let service = BookingService::new(&state);
    let slot = service
        .book(slot_id, &user, token)
        .await
        .map_err(map_schedule_error)?;

    Ok(Json(json!({
        "success": true,
        "slot": slot,
        "message": "Appointment request submitted"
    })))
}

#[axum::debug_handler]
pub async fn get_my_appointments(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    let service = ScheduleQueryService::new(&state);
    let history = service
        .patient_history(&user.id, token)
        .await
        .map_err(map_schedule_error)?;

    Ok(Json(json!({
        "upcoming": history.upcoming,
        "past": history.past
    })))
}

/// Admin view of any patient's appointment history. Same split as the
/// patient's own view.
#[axum::debug_handler]
pub async fn get_patient_appointments(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    require_admin(&user)?;
    let token = auth.token();

    let service = ScheduleQueryService::new(&state);
    let history = service
        .patient_history(&patient_id.to_string(), token)
        .await
        .map_err(map_schedule_error)?;

    Ok(Json(json!({
        "upcoming": history.upcoming,
        "past": history.past
    })))
}

// ==============================================================================
// ADMIN HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_shift(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateShiftRequest>,
) -> Result<Json<Value>, AppError> {
    require_admin(&user)?;
    let token = auth.token();

    let service = SlotGenerationService::new(&state);
    let slots = service
        .create_shift(request, token)
        .await
        .map_err(map_schedule_error)?;

    Ok(Json(json!({
        "success": true,
        "created": slots.len(),
        "slots": slots
    })))
}

#[axum::debug_handler]
pub async fn list_appointments(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(query): Query<ScheduleSearchQuery>,
) -> Result<Json<Value>, AppError> {
    require_admin(&user)?;
    let token = auth.token();

    let service = ScheduleQueryService::new(&state);
    let appointments = service
        .admin_list(&query, token)
        .await
        .map_err(map_schedule_error)?;

    Ok(Json(json!({ "appointments": appointments })))
}

#[axum::debug_handler]
pub async fn new_requests_count(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_admin(&user)?;
    let token = auth.token();

    let service = ScheduleQueryService::new(&state);
    let count = service
        .new_requests_count(token)
        .await
        .map_err(map_schedule_error)?;

    Ok(Json(json!({ "count": count })))
}

#[axum::debug_handler]
pub async fn confirm_slot(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(slot_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    require_admin(&user)?;
    let token = auth.token();

    let service = BookingService::new(&state);
    let slot = service
        .confirm(slot_id, token)
        .await
        .map_err(map_schedule_error)?;

    Ok(Json(json!({
        "success": true,
        "slot": slot
    })))
}

#[axum::debug_handler]
pub async fn cancel_slot(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(slot_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    require_admin(&user)?;
    let token = auth.token();

    let service = BookingService::new(&state);
    let slot = service
        .cancel(slot_id, token)
        .await
        .map_err(map_schedule_error)?;

    Ok(Json(json!({
        "success": true,
        "slot": slot,
        "message": "Appointment cancelled, slot released"
    })))
}

#[axum::debug_handler]
pub async fn edit_slot(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(slot_id): Path<Uuid>,
    Json(request): Json<EditSlotRequest>,
) -> Result<Json<Value>, AppError> {
    require_admin(&user)?;
    let token = auth.token();

    let service = BookingService::new(&state);
    let slot = service
        .admin_edit(slot_id, request, token)
        .await
        .map_err(map_schedule_error)?;

    Ok(Json(json!({
        "success": true,
        "slot": slot
    })))
}

#[axum::debug_handler]
pub async fn delete_slot(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(slot_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    require_admin(&user)?;
    let token = auth.token();

    let service = BookingService::new(&state);
    service
        .delete_slot(slot_id, token)
        .await
        .map_err(map_schedule_error)?;

    Ok(Json(json!({
        "success": true,
        "message": "Slot deleted"
    })))
}

#[axum::debug_handler]
pub async fn toggle_day(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<ToggleDayRequest>,
) -> Result<Json<Value>, AppError> {
    require_admin(&user)?;
    let token = auth.token();

    let service = BookingService::new(&state);
    let result = service
        .toggle_day(request, token)
        .await
        .map_err(map_schedule_error)?;

    Ok(Json(json!({
        "success": true,
        "affected": result.affected,
        "message": result.message
    })))
}
