// libs/schedule-cell/src/models.rs
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc, NaiveDate, NaiveTime};
use std::fmt;
use thiserror::Error;

// ==============================================================================
// CORE SCHEDULE MODELS
// ==============================================================================

/// One 30-minute bookable unit of a doctor's calendar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Slot {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub status: SlotStatus,
    pub patient_id: Option<Uuid>,
    pub medical_report: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SlotStatus {
    Available,
    Booked,
    Confirmed,
    Completed,
    Cancelled,
    Closed,
}

impl SlotStatus {
    /// Booked and confirmed slots belong to their occupant and are skipped
    /// by bulk open/close actions.
    pub fn is_occupied(&self) -> bool {
        matches!(self, SlotStatus::Booked | SlotStatus::Confirmed)
    }
}

impl fmt::Display for SlotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotStatus::Available => write!(f, "available"),
            SlotStatus::Booked => write!(f, "booked"),
            SlotStatus::Confirmed => write!(f, "confirmed"),
            SlotStatus::Completed => write!(f, "completed"),
            SlotStatus::Cancelled => write!(f, "cancelled"),
            SlotStatus::Closed => write!(f, "closed"),
        }
    }
}

/// Doctor fields the schedule views need; deserialized from the doctors table,
/// extra columns are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorSummary {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub patronymic: Option<String>,
    pub specialization: String,
    pub slug: String,
}

impl DoctorSummary {
    pub fn full_name(&self) -> String {
        match &self.patronymic {
            Some(p) => format!("{} {} {}", self.last_name, self.first_name, p),
            None => format!("{} {}", self.last_name, self.first_name),
        }
    }
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

/// An admin-entered work shift, expanded into 30-minute slots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateShiftRequest {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

/// Direct full-row edit of a slot, admin panel only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditSlotRequest {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub status: SlotStatus,
    pub patient_id: Option<Uuid>,
    pub medical_report: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToggleDayRequest {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub action: ToggleAction,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ToggleAction {
    Open,
    Close,
}

impl ToggleAction {
    pub fn target_status(&self) -> SlotStatus {
        match self {
            ToggleAction::Open => SlotStatus::Available,
            ToggleAction::Close => SlotStatus::Closed,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScheduleSearchQuery {
    pub doctor_id: Option<Uuid>,
    pub date: Option<NaiveDate>,
    pub status: Option<SlotStatus>,
}

// ==============================================================================
// RESPONSE MODELS
// ==============================================================================

/// Slots of one doctor for one date, ordered by start time.
#[derive(Debug, Clone, Serialize)]
pub struct DaySlots {
    pub date: NaiveDate,
    pub slots: Vec<Slot>,
}

/// Availability grouped doctor -> date -> ordered slots.
#[derive(Debug, Clone, Serialize)]
pub struct DoctorSchedule {
    pub doctor: DoctorSummary,
    pub days: Vec<DaySlots>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AppointmentEntry {
    #[serde(flatten)]
    pub slot: Slot,
    pub doctor_name: String,
    pub specialization: String,
}

/// A patient's appointments split into upcoming and past.
#[derive(Debug, Clone, Serialize)]
pub struct AppointmentHistory {
    pub upcoming: Vec<AppointmentEntry>,
    pub past: Vec<AppointmentEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToggleDayResponse {
    pub affected: usize,
    pub message: String,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("Slot not found")]
    NotFound,

    #[error("Slot is no longer available")]
    SlotTaken,

    #[error("Doctor not found")]
    DoctorNotFound,

    #[error("Shift already has slots at one of the generated start times")]
    DuplicateSlot,

    #[error("Invalid shift: {0}")]
    InvalidShift(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}
