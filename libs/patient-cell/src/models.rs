// libs/patient-cell/src/models.rs
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
}

/// A row in the users table. Inactive rows are guest records pre-created by
/// an admin, waiting to be claimed at signup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    pub role: String,
    pub first_name: String,
    pub last_name: String,
    pub patronymic: Option<String>,
    pub email: Option<String>,
    pub phone: String,
    pub gender: Option<Gender>,
    pub birth_date: Option<NaiveDate>,
    pub promo_subscribed: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Patient {
    pub fn display_text(&self) -> String {
        format!("{} {}, {}", self.last_name, self.first_name, self.phone)
    }
}

/// Extra profile fields collected when the identity collaborator finishes a
/// signup.
#[derive(Debug, Clone, Deserialize)]
pub struct SignupProfileRequest {
    pub first_name: String,
    pub last_name: String,
    pub patronymic: Option<String>,
    pub phone: String,
    pub gender: Option<Gender>,
    pub birth_date: Option<NaiveDate>,
    #[serde(default)]
    pub promo_subscribed: bool,
}

/// Admin pre-creation of a passwordless guest record.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateGuestRequest {
    pub first_name: String,
    pub last_name: String,
    pub patronymic: Option<String>,
    pub phone: String,
    pub gender: Option<Gender>,
    pub birth_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdatePatientRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub patronymic: Option<String>,
    pub phone: Option<String>,
    pub gender: Option<Gender>,
    pub birth_date: Option<NaiveDate>,
    pub promo_subscribed: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PatientSearchQuery {
    pub q: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PatientSearchResult {
    pub id: Uuid,
    pub text: String,
}

#[derive(Error, Debug)]
pub enum PatientError {
    #[error("Patient not found")]
    NotFound,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}
