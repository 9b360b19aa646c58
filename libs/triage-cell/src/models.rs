// libs/triage-cell/src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// One stored triage exchange. Append-only: rows are never edited.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymptomAnalysis {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub query: String,
    /// Advisory text shown to the patient, with the machine-readable
    /// recommendation trailer already stripped.
    pub response: String,
    pub recommended_specialty: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalyzeRequest {
    pub symptoms: String,
}

#[derive(Error, Debug)]
pub enum TriageError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("AI service error: {0}")]
    ExternalService(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}
