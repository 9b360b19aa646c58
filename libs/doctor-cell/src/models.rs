// libs/doctor-cell/src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

// ==============================================================================
// CORE DOCTOR MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doctor {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub patronymic: Option<String>,
    pub specialization: String,
    /// Year the doctor started practicing; the public profile shows the
    /// derived experience string, not this raw value.
    pub practice_start_year: i32,
    pub slug: String,
    pub bio: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Doctor {
    pub fn full_name(&self) -> String {
        match &self.patronymic {
            Some(p) => format!("{} {} {}", self.last_name, self.first_name, p),
            None => format!("{} {}", self.last_name, self.first_name),
        }
    }
}

/// Directory payload: the stored row plus computed display fields.
#[derive(Debug, Clone, Serialize)]
pub struct DoctorProfile {
    #[serde(flatten)]
    pub doctor: Doctor,
    pub experience_display: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateDoctorRequest {
    pub first_name: String,
    pub last_name: String,
    pub patronymic: Option<String>,
    pub specialization: String,
    pub practice_start_year: i32,
    pub bio: Option<String>,
}

// ==============================================================================
// REVIEW MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub rating: i32,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateReviewRequest {
    pub rating: i32,
    pub comment: String,
}

pub const MAX_COMMENT_LENGTH: usize = 1000;

#[derive(Debug, Clone, Serialize)]
pub struct ReviewAggregate {
    pub average_rating: f64,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct DoctorReviews {
    pub reviews: Vec<Review>,
    pub aggregate: ReviewAggregate,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug)]
pub enum DoctorError {
    #[error("Doctor not found")]
    NotFound,

    #[error("A review requires a completed appointment with this doctor")]
    ReviewNotAllowed,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}
