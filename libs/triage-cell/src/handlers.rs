// libs/triage-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use tracing::error;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{AnalyzeRequest, TriageError};
use crate::services::triage::TriageService;

fn map_triage_error(e: TriageError) -> AppError {
    match e {
        TriageError::ValidationError(msg) => AppError::ValidationError(msg),
        TriageError::ExternalService(msg) => {
            // The caller gets a generic retry message, the detail goes to the log.
            error!("Triage AI call failed: {}", msg);
            AppError::ExternalService(
                "The triage assistant is temporarily unavailable, please try again later".to_string(),
            )
        }
        TriageError::DatabaseError(msg) => AppError::Database(msg),
    }
}

#[axum::debug_handler]
pub async fn analyze_symptoms(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    let service = TriageService::new(&state).map_err(|e| AppError::Internal(e.to_string()))?;
    let analysis = service
        .analyze(&user, &request.symptoms, token)
        .await
        .map_err(map_triage_error)?;

    Ok(Json(json!({
        "success": true,
        "analysis": analysis
    })))
}

#[axum::debug_handler]
pub async fn my_analyses(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    let service = TriageService::new(&state).map_err(|e| AppError::Internal(e.to_string()))?;
    let analyses = service
        .history(&user, token)
        .await
        .map_err(map_triage_error)?;

    Ok(Json(json!({ "analyses": analyses })))
}
