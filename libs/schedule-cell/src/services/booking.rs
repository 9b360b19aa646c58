// libs/schedule-cell/src/services/booking.rs
use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::User;
use notification_cell::{ChatNotifier, EmailMessage, EmailService};

use crate::models::{
    DoctorSummary, EditSlotRequest, ScheduleError, Slot, SlotStatus,
    ToggleDayRequest, ToggleDayResponse,
};
use crate::services::transitions::{plan_admin_edit, plan_confirm, SideEffect};

pub struct BookingService {
    supabase: SupabaseClient,
    email: EmailService,
    chat: ChatNotifier,
}

impl BookingService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            email: EmailService::new(config),
            chat: ChatNotifier::new(config),
        }
    }

    /// Constructor with injectable notifiers, used by tests.
    pub fn with_notifiers(config: &AppConfig, email: EmailService, chat: ChatNotifier) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            email,
            chat,
        }
    }

    /// Claim an available slot for the calling patient.
    ///
    /// The claim is one conditional update filtered on the expected prior
    /// status, so two racing patients cannot both win: the loser's update
    /// matches zero rows and comes back empty.
    pub async fn book(&self, slot_id: Uuid, user: &User, auth_token: &str) -> Result<Slot, ScheduleError> {
        debug!("Booking slot {} for user {}", slot_id, user.id);

        let path = format!(
            "/rest/v1/schedule_slots?id=eq.{}&status=eq.{}",
            slot_id,
            SlotStatus::Available
        );
        let body = json!({
            "status": SlotStatus::Booked.to_string(),
            "patient_id": user.id,
            "updated_at": Utc::now().to_rfc3339()
        });

        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            Some(auth_token),
            Some(body),
            Some(representation_headers()),
        ).await.map_err(|e| ScheduleError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            // Lost the race, or the id never existed. Look again to tell
            // the two apart.
            return match self.get_slot(slot_id, auth_token).await {
                Ok(_) => Err(ScheduleError::SlotTaken),
                Err(e) => Err(e),
            };
        }

        let slot: Slot = serde_json::from_value(result[0].clone())
            .map_err(|e| ScheduleError::DatabaseError(format!("Failed to parse booked slot: {}", e)))?;

        info!("Slot {} booked by {}", slot.id, user.id);

        // Best-effort: a failed notification never rolls the booking back.
        if let Err(e) = self.notify_booking(&slot, auth_token).await {
            warn!("Booking notification failed for slot {}: {}", slot.id, e);
        }

        Ok(slot)
    }

    /// Admin confirmation. Idempotent with respect to the email: confirming
    /// an already-confirmed slot re-sends nothing.
    pub async fn confirm(&self, slot_id: Uuid, auth_token: &str) -> Result<Slot, ScheduleError> {
        let prior = self.get_slot(slot_id, auth_token).await?;
        let plan = plan_confirm(&prior);

        if !plan.apply {
            debug!("Slot {} already confirmed, nothing to do", slot_id);
            return Ok(prior);
        }

        let updated = self.patch_slot(slot_id, json!({
            "status": SlotStatus::Confirmed.to_string(),
            "updated_at": Utc::now().to_rfc3339()
        }), auth_token).await?;

        info!("Slot {} confirmed", slot_id);
        self.dispatch_effects(&plan.effects, &updated, auth_token).await;

        Ok(updated)
    }

    /// Admin override: release the slot back to available and clear the
    /// occupant, whatever state it was in.
    pub async fn cancel(&self, slot_id: Uuid, auth_token: &str) -> Result<Slot, ScheduleError> {
        let _prior = self.get_slot(slot_id, auth_token).await?;

        let updated = self.patch_slot(slot_id, json!({
            "status": SlotStatus::Available.to_string(),
            "patient_id": null,
            "updated_at": Utc::now().to_rfc3339()
        }), auth_token).await?;

        info!("Slot {} cancelled and released", slot_id);
        Ok(updated)
    }

    /// Direct admin edit of slot fields, with the occupant/report/email
    /// rules resolved by the transition planner.
    pub async fn admin_edit(
        &self,
        slot_id: Uuid,
        edit: EditSlotRequest,
        auth_token: &str,
    ) -> Result<Slot, ScheduleError> {
        let prior = self.get_slot(slot_id, auth_token).await?;
        let plan = plan_admin_edit(&prior, &edit, Utc::now());

        let updated = self.patch_slot(slot_id, json!({
            "doctor_id": edit.doctor_id,
            "date": edit.date,
            "start_time": edit.start_time.format("%H:%M:%S").to_string(),
            "end_time": edit.end_time.format("%H:%M:%S").to_string(),
            "status": plan.status.to_string(),
            "patient_id": plan.patient_id,
            "medical_report": plan.medical_report,
            "completed_at": plan.completed_at.map(|t| t.to_rfc3339()),
            "updated_at": Utc::now().to_rfc3339()
        }), auth_token).await?;

        info!("Slot {} edited, status {}", slot_id, updated.status);
        self.dispatch_effects(&plan.effects, &updated, auth_token).await;

        Ok(updated)
    }

    /// The only physical deletion path: explicit single-slot removal.
    pub async fn delete_slot(&self, slot_id: Uuid, auth_token: &str) -> Result<(), ScheduleError> {
        let _slot = self.get_slot(slot_id, auth_token).await?;

        let path = format!("/rest/v1/schedule_slots?id=eq.{}", slot_id);
        let _: Vec<Value> = self.supabase.request_with_headers(
            Method::DELETE,
            &path,
            Some(auth_token),
            None,
            Some(representation_headers()),
        ).await.map_err(|e| ScheduleError::DatabaseError(e.to_string()))?;

        info!("Slot {} deleted", slot_id);
        Ok(())
    }

    /// Bulk open/close of a doctor's day. Occupied slots (booked/confirmed)
    /// are left untouched; zero affected rows is an informational no-op.
    pub async fn toggle_day(
        &self,
        request: ToggleDayRequest,
        auth_token: &str,
    ) -> Result<ToggleDayResponse, ScheduleError> {
        let target = request.action.target_status();
        let path = format!(
            "/rest/v1/schedule_slots?doctor_id=eq.{}&date=eq.{}&status=not.in.({},{})",
            request.doctor_id,
            request.date,
            SlotStatus::Booked,
            SlotStatus::Confirmed
        );

        let mut body = json!({
            "status": target.to_string(),
            "updated_at": Utc::now().to_rfc3339()
        });
        // Reopening can hit completed/cancelled slots that still reference
        // their former occupant. An available slot never carries one.
        if target == SlotStatus::Available {
            body["patient_id"] = Value::Null;
        }

        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            Some(auth_token),
            Some(body),
            Some(representation_headers()),
        ).await.map_err(|e| ScheduleError::DatabaseError(e.to_string()))?;

        let affected = result.len();
        let message = if affected == 0 {
            format!("No slots to {} for {}", action_verb(target), request.date)
        } else {
            format!("{} slots set to {}", affected, target)
        };

        info!(
            "Toggle day for doctor {} on {}: {} rows -> {}",
            request.doctor_id, request.date, affected, target
        );
        Ok(ToggleDayResponse { affected, message })
    }

    pub async fn get_slot(&self, slot_id: Uuid, auth_token: &str) -> Result<Slot, ScheduleError> {
        let path = format!("/rest/v1/schedule_slots?id=eq.{}", slot_id);
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await.map_err(|e| ScheduleError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(ScheduleError::NotFound);
        }

        serde_json::from_value(result[0].clone())
            .map_err(|e| ScheduleError::DatabaseError(format!("Failed to parse slot: {}", e)))
    }

    // ==========================================================================
    // PRIVATE HELPERS
    // ==========================================================================

    async fn patch_slot(&self, slot_id: Uuid, body: Value, auth_token: &str) -> Result<Slot, ScheduleError> {
        let path = format!("/rest/v1/schedule_slots?id=eq.{}", slot_id);

        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            Some(auth_token),
            Some(body),
            Some(representation_headers()),
        ).await.map_err(|e| ScheduleError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(ScheduleError::NotFound);
        }

        serde_json::from_value(result[0].clone())
            .map_err(|e| ScheduleError::DatabaseError(format!("Failed to parse updated slot: {}", e)))
    }

    async fn dispatch_effects(&self, effects: &[SideEffect], slot: &Slot, auth_token: &str) {
        for effect in effects {
            match effect {
                SideEffect::ConfirmationEmail { patient_id } => {
                    if let Err(e) = self.send_confirmation_email(*patient_id, slot, auth_token).await {
                        warn!("Confirmation email failed for slot {}: {}", slot.id, e);
                    }
                }
                SideEffect::BookingNotification { .. } => {
                    if let Err(e) = self.notify_booking(slot, auth_token).await {
                        warn!("Booking notification failed for slot {}: {}", slot.id, e);
                    }
                }
            }
        }
    }

    async fn send_confirmation_email(
        &self,
        patient_id: Uuid,
        slot: &Slot,
        auth_token: &str,
    ) -> anyhow::Result<()> {
        if !self.email.is_configured() {
            return Ok(());
        }

        let Some(patient) = self.fetch_user_row(patient_id, auth_token).await? else {
            debug!("Occupant {} not found, skipping confirmation email", patient_id);
            return Ok(());
        };

        let Some(email) = patient["email"].as_str().filter(|e| !e.is_empty()) else {
            debug!("Occupant {} has no email, skipping confirmation email", patient_id);
            return Ok(());
        };

        let doctor = self.fetch_doctor(slot.doctor_id, auth_token).await?;
        let first_name = patient["first_name"].as_str().unwrap_or("пациент");

        let text_body = format!(
            "Здравствуйте, {}!\n\nВаша запись подтверждена.\nВрач: {} ({})\nДата: {}\nВремя: {}\n\nЖдём вас в клинике.",
            first_name,
            doctor.full_name(),
            doctor.specialization,
            slot.date.format("%d.%m.%Y"),
            slot.start_time.format("%H:%M"),
        );
        let html_body = format!(
            "<p>Здравствуйте, {}!</p><p>Ваша запись подтверждена.</p>\
             <p>Врач: {} ({})<br>Дата: {}<br>Время: {}</p><p>Ждём вас в клинике.</p>",
            first_name,
            doctor.full_name(),
            doctor.specialization,
            slot.date.format("%d.%m.%Y"),
            slot.start_time.format("%H:%M"),
        );

        self.email.send(&EmailMessage {
            to: email.to_string(),
            subject: "Ваша запись подтверждена".to_string(),
            html_body,
            text_body,
        }).await
    }

    async fn notify_booking(&self, slot: &Slot, auth_token: &str) -> anyhow::Result<()> {
        if !self.chat.is_configured() {
            return Ok(());
        }
        let Some(patient_id) = slot.patient_id else {
            return Ok(());
        };

        let doctor = self.fetch_doctor(slot.doctor_id, auth_token).await?;
        let patient = self.fetch_user_row(patient_id, auth_token).await?;

        let (patient_name, patient_phone) = match &patient {
            Some(row) => (
                format!(
                    "{} {}",
                    row["last_name"].as_str().unwrap_or(""),
                    row["first_name"].as_str().unwrap_or("")
                )
                .trim()
                .to_string(),
                row["phone"].as_str().unwrap_or("—").to_string(),
            ),
            None => (patient_id.to_string(), "—".to_string()),
        };

        let text = format!(
            "Новая запись: {}, {}\nВрач: {} ({})\nДата: {}, время: {}",
            patient_name,
            patient_phone,
            doctor.full_name(),
            doctor.specialization,
            slot.date.format("%d.%m.%Y"),
            slot.start_time.format("%H:%M"),
        );

        self.chat.send(&text).await
    }

    async fn fetch_doctor(&self, doctor_id: Uuid, auth_token: &str) -> Result<DoctorSummary, anyhow::Error> {
        let path = format!("/rest/v1/doctors?id=eq.{}", doctor_id);
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await?;

        if result.is_empty() {
            anyhow::bail!("Doctor {} not found", doctor_id);
        }

        Ok(serde_json::from_value(result[0].clone())?)
    }

    async fn fetch_user_row(&self, user_id: Uuid, auth_token: &str) -> anyhow::Result<Option<Value>> {
        let path = format!("/rest/v1/users?id=eq.{}", user_id);
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await?;

        Ok(result.into_iter().next())
    }
}

fn representation_headers() -> reqwest::header::HeaderMap {
    let mut headers = reqwest::header::HeaderMap::new();
    headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));
    headers
}

fn action_verb(target: SlotStatus) -> &'static str {
    match target {
        SlotStatus::Closed => "close",
        _ => "open",
    }
}
