// libs/schedule-cell/src/services/generation.rs
use chrono::{Duration, NaiveDate, NaiveTime, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info};

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{CreateShiftRequest, ScheduleError, Slot, SlotStatus};

/// Length of one bookable unit. Shifts are tiled in these steps.
pub const SLOT_MINUTES: i64 = 30;

/// Expand a work shift into contiguous (start, end) pairs tiling [start, end).
///
/// Each pair spans exactly SLOT_MINUTES and chains onto the previous one, so
/// slot[i].1 == slot[i + 1].0. A shift whose span is not a multiple of
/// SLOT_MINUTES still emits a final slot starting before the shift end.
pub fn expand_shift(date: NaiveDate, start: NaiveTime, end: NaiveTime) -> Vec<(NaiveTime, NaiveTime)> {
    let mut slots = Vec::new();
    let mut cursor = date.and_time(start);
    let shift_end = date.and_time(end);

    while cursor < shift_end {
        let slot_end = cursor + Duration::minutes(SLOT_MINUTES);
        slots.push((cursor.time(), slot_end.time()));
        cursor = slot_end;
    }

    slots
}

pub struct SlotGenerationService {
    supabase: SupabaseClient,
}

impl SlotGenerationService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// Materialize an admin-entered shift as available slot rows.
    ///
    /// The rows go out as one batch insert: if any generated start time
    /// collides with an existing slot for the doctor, the unique constraint
    /// on (doctor_id, date, start_time) fails the whole batch and nothing
    /// is committed.
    pub async fn create_shift(
        &self,
        request: CreateShiftRequest,
        auth_token: &str,
    ) -> Result<Vec<Slot>, ScheduleError> {
        if request.start_time >= request.end_time {
            return Err(ScheduleError::InvalidShift(
                "Shift start must be before shift end".to_string(),
            ));
        }

        let pairs = expand_shift(request.date, request.start_time, request.end_time);
        debug!(
            "Expanding shift for doctor {} on {} into {} slots",
            request.doctor_id,
            request.date,
            pairs.len()
        );

        let now = Utc::now();
        let rows: Vec<Value> = pairs
            .into_iter()
            .map(|(start, end)| {
                json!({
                    "doctor_id": request.doctor_id,
                    "date": request.date,
                    "start_time": start.format("%H:%M:%S").to_string(),
                    "end_time": end.format("%H:%M:%S").to_string(),
                    "status": SlotStatus::Available.to_string(),
                    "patient_id": null,
                    "created_at": now.to_rfc3339(),
                    "updated_at": now.to_rfc3339()
                })
            })
            .collect();

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/schedule_slots",
            Some(auth_token),
            Some(Value::Array(rows)),
            Some(headers),
        ).await.map_err(|e| {
            let msg = e.to_string();
            if msg.contains("Conflict") || msg.contains("duplicate key") {
                ScheduleError::DuplicateSlot
            } else {
                ScheduleError::DatabaseError(msg)
            }
        })?;

        let slots: Vec<Slot> = result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<std::result::Result<Vec<Slot>, _>>()
            .map_err(|e| ScheduleError::DatabaseError(format!("Failed to parse created slots: {}", e)))?;

        info!(
            "Created {} slots for doctor {} on {}",
            slots.len(),
            request.doctor_id,
            request.date
        );
        Ok(slots)
    }
}
