// libs/schedule-cell/src/services/query.rs
use std::collections::BTreeMap;

use chrono::{Local, NaiveDate, NaiveTime};
use reqwest::Method;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{
    AppointmentEntry, AppointmentHistory, DaySlots, DoctorSchedule, DoctorSummary,
    ScheduleError, ScheduleSearchQuery, Slot, SlotStatus,
};

pub struct ScheduleQueryService {
    supabase: SupabaseClient,
}

impl ScheduleQueryService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// Public availability: every doctor's open slots from today on, grouped
    /// doctor -> date. The per-minute cutoff for today's slots applies only
    /// to the single-doctor view below.
    pub async fn available_grouped(
        &self,
        doctor_id: Option<Uuid>,
        auth_token: &str,
    ) -> Result<Vec<DoctorSchedule>, ScheduleError> {
        let today = Local::now().date_naive();

        let mut path = format!(
            "/rest/v1/schedule_slots?status=eq.{}&date=gte.{}&order=date.asc,start_time.asc",
            SlotStatus::Available,
            today
        );
        if let Some(doctor_id) = doctor_id {
            path.push_str(&format!("&doctor_id=eq.{}", doctor_id));
        }
        let slots = self.fetch_slots(&path, auth_token).await?;

        let doctors = self.fetch_doctors_for(&slots, auth_token).await?;
        Ok(group_by_doctor(slots, doctors))
    }

    /// Availability for one doctor, addressed by profile slug.
    pub async fn available_for_doctor_slug(
        &self,
        slug: &str,
        auth_token: &str,
    ) -> Result<DoctorSchedule, ScheduleError> {
        let path = format!("/rest/v1/doctors?slug=eq.{}", urlencoding::encode(slug));
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await.map_err(|e| ScheduleError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(ScheduleError::DoctorNotFound);
        }
        let doctor: DoctorSummary = serde_json::from_value(result[0].clone())
            .map_err(|e| ScheduleError::DatabaseError(format!("Failed to parse doctor: {}", e)))?;

        let today = Local::now().date_naive();
        let now = Local::now().time();
        let path = format!(
            "/rest/v1/schedule_slots?doctor_id=eq.{}&status=eq.{}&date=gte.{}&order=date.asc,start_time.asc",
            doctor.id,
            SlotStatus::Available,
            today
        );
        let slots = self.fetch_slots(&path, auth_token).await?;
        let slots: Vec<Slot> = slots
            .into_iter()
            .filter(|s| is_still_bookable(s, today, now))
            .collect();

        let days = group_by_day(slots);
        Ok(DoctorSchedule { doctor, days })
    }

    /// The calling patient's appointments, split into upcoming and past.
    pub async fn patient_history(
        &self,
        patient_id: &str,
        auth_token: &str,
    ) -> Result<AppointmentHistory, ScheduleError> {
        debug!("Fetching appointment history for patient {}", patient_id);

        let path = format!(
            "/rest/v1/schedule_slots?patient_id=eq.{}&status=in.({},{},{},{})&order=date.asc,start_time.asc",
            patient_id,
            SlotStatus::Booked,
            SlotStatus::Confirmed,
            SlotStatus::Completed,
            SlotStatus::Cancelled
        );
        let slots = self.fetch_slots(&path, auth_token).await?;
        let doctors = self.fetch_doctors_for(&slots, auth_token).await?;

        let entries: Vec<AppointmentEntry> = slots
            .into_iter()
            .map(|slot| to_entry(slot, &doctors))
            .collect();

        let today = Local::now().date_naive();
        Ok(split_history(entries, today))
    }

    /// Admin listing with optional filters, ordered by doctor surname then
    /// date then start time so one doctor's appointments read as a block.
    pub async fn admin_list(
        &self,
        query: &ScheduleSearchQuery,
        auth_token: &str,
    ) -> Result<Vec<AppointmentEntry>, ScheduleError> {
        let mut path = String::from("/rest/v1/schedule_slots?order=date.asc,start_time.asc");
        if let Some(doctor_id) = query.doctor_id {
            path.push_str(&format!("&doctor_id=eq.{}", doctor_id));
        }
        if let Some(date) = query.date {
            path.push_str(&format!("&date=eq.{}", date));
        }
        if let Some(status) = query.status {
            path.push_str(&format!("&status=eq.{}", status));
        }

        let slots = self.fetch_slots(&path, auth_token).await?;
        let doctors = self.fetch_doctors_for(&slots, auth_token).await?;

        let mut entries: Vec<AppointmentEntry> = slots
            .into_iter()
            .map(|slot| to_entry(slot, &doctors))
            .collect();

        entries.sort_by(|a, b| {
            let surname_a = a.doctor_name.split_whitespace().next().unwrap_or("");
            let surname_b = b.doctor_name.split_whitespace().next().unwrap_or("");
            surname_a
                .cmp(surname_b)
                .then(a.slot.date.cmp(&b.slot.date))
                .then(a.slot.start_time.cmp(&b.slot.start_time))
        });

        Ok(entries)
    }

    /// Count of booked slots awaiting admin confirmation, shown as the
    /// admin panel badge.
    pub async fn new_requests_count(&self, auth_token: &str) -> Result<usize, ScheduleError> {
        let path = format!(
            "/rest/v1/schedule_slots?select=id&status=eq.{}",
            SlotStatus::Booked
        );
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await.map_err(|e| ScheduleError::DatabaseError(e.to_string()))?;

        Ok(result.len())
    }

    // ==========================================================================
    // PRIVATE HELPERS
    // ==========================================================================

    async fn fetch_slots(&self, path: &str, auth_token: &str) -> Result<Vec<Slot>, ScheduleError> {
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            path,
            Some(auth_token),
            None,
        ).await.map_err(|e| ScheduleError::DatabaseError(e.to_string()))?;

        result
            .into_iter()
            .map(|v| {
                serde_json::from_value(v)
                    .map_err(|e| ScheduleError::DatabaseError(format!("Failed to parse slot: {}", e)))
            })
            .collect()
    }

    async fn fetch_doctors_for(
        &self,
        slots: &[Slot],
        auth_token: &str,
    ) -> Result<BTreeMap<Uuid, DoctorSummary>, ScheduleError> {
        let mut ids: Vec<Uuid> = slots.iter().map(|s| s.doctor_id).collect();
        ids.sort();
        ids.dedup();
        if ids.is_empty() {
            return Ok(BTreeMap::new());
        }

        let id_list = ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(",");
        let path = format!("/rest/v1/doctors?id=in.({})", id_list);

        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await.map_err(|e| ScheduleError::DatabaseError(e.to_string()))?;

        let mut doctors = BTreeMap::new();
        for row in result {
            let doctor: DoctorSummary = serde_json::from_value(row)
                .map_err(|e| ScheduleError::DatabaseError(format!("Failed to parse doctor: {}", e)))?;
            doctors.insert(doctor.id, doctor);
        }
        Ok(doctors)
    }
}

/// Today's slots are bookable only while their start time is still ahead.
fn is_still_bookable(slot: &Slot, today: NaiveDate, now: NaiveTime) -> bool {
    slot.date > today || (slot.date == today && slot.start_time > now)
}

fn to_entry(slot: Slot, doctors: &BTreeMap<Uuid, DoctorSummary>) -> AppointmentEntry {
    let (doctor_name, specialization) = match doctors.get(&slot.doctor_id) {
        Some(d) => (d.full_name(), d.specialization.clone()),
        None => (slot.doctor_id.to_string(), String::new()),
    };
    AppointmentEntry {
        slot,
        doctor_name,
        specialization,
    }
}

fn group_by_day(slots: Vec<Slot>) -> Vec<DaySlots> {
    let mut by_date: BTreeMap<NaiveDate, Vec<Slot>> = BTreeMap::new();
    for slot in slots {
        by_date.entry(slot.date).or_default().push(slot);
    }
    by_date
        .into_iter()
        .map(|(date, mut slots)| {
            slots.sort_by_key(|s| s.start_time);
            DaySlots { date, slots }
        })
        .collect()
}

fn group_by_doctor(slots: Vec<Slot>, doctors: BTreeMap<Uuid, DoctorSummary>) -> Vec<DoctorSchedule> {
    let mut by_doctor: BTreeMap<Uuid, Vec<Slot>> = BTreeMap::new();
    for slot in slots {
        by_doctor.entry(slot.doctor_id).or_default().push(slot);
    }

    let mut schedules: Vec<DoctorSchedule> = by_doctor
        .into_iter()
        .filter_map(|(doctor_id, slots)| {
            doctors.get(&doctor_id).map(|doctor| DoctorSchedule {
                doctor: doctor.clone(),
                days: group_by_day(slots),
            })
        })
        .collect();

    schedules.sort_by(|a, b| {
        a.doctor
            .last_name
            .cmp(&b.doctor.last_name)
            .then(a.doctor.first_name.cmp(&b.doctor.first_name))
    });
    schedules
}

/// Completed and cancelled appointments, plus anything dated before today,
/// go to the past list, newest first. The rest stays upcoming, soonest first.
fn split_history(entries: Vec<AppointmentEntry>, today: NaiveDate) -> AppointmentHistory {
    let mut upcoming = Vec::new();
    let mut past = Vec::new();

    for entry in entries {
        let settled = matches!(
            entry.slot.status,
            SlotStatus::Completed | SlotStatus::Cancelled
        );
        if settled || entry.slot.date < today {
            past.push(entry);
        } else {
            upcoming.push(entry);
        }
    }

    upcoming.sort_by(|a, b| {
        a.slot
            .date
            .cmp(&b.slot.date)
            .then(a.slot.start_time.cmp(&b.slot.start_time))
    });
    past.sort_by(|a, b| {
        b.slot
            .date
            .cmp(&a.slot.date)
            .then(b.slot.start_time.cmp(&a.slot.start_time))
    });

    AppointmentHistory { upcoming, past }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn slot(date: &str, start: &str, status: SlotStatus) -> Slot {
        Slot {
            id: Uuid::new_v4(),
            doctor_id: Uuid::new_v4(),
            date: date.parse().unwrap(),
            start_time: start.parse().unwrap(),
            end_time: "23:59:59".parse().unwrap(),
            status,
            patient_id: None,
            medical_report: None,
            completed_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn entry(date: &str, start: &str, status: SlotStatus) -> AppointmentEntry {
        AppointmentEntry {
            slot: slot(date, start, status),
            doctor_name: "Иванов Иван".to_string(),
            specialization: "Терапевт".to_string(),
        }
    }

    #[test]
    fn test_today_slot_with_passed_start_is_not_bookable() {
        let today: NaiveDate = "2026-03-10".parse().unwrap();
        let now: NaiveTime = "12:00:00".parse().unwrap();

        let passed = slot("2026-03-10", "11:30:00", SlotStatus::Available);
        let ahead = slot("2026-03-10", "12:30:00", SlotStatus::Available);
        let tomorrow = slot("2026-03-11", "09:00:00", SlotStatus::Available);

        assert!(!is_still_bookable(&passed, today, now));
        assert!(is_still_bookable(&ahead, today, now));
        assert!(is_still_bookable(&tomorrow, today, now));
    }

    #[test]
    fn test_slot_starting_exactly_now_is_not_bookable() {
        let today: NaiveDate = "2026-03-10".parse().unwrap();
        let now: NaiveTime = "12:00:00".parse().unwrap();

        let boundary = slot("2026-03-10", "12:00:00", SlotStatus::Available);
        assert!(!is_still_bookable(&boundary, today, now));
    }

    #[test]
    fn test_split_history_by_status_and_date() {
        let today: NaiveDate = "2026-03-10".parse().unwrap();
        let entries = vec![
            entry("2026-03-12", "09:00:00", SlotStatus::Booked),
            entry("2026-03-10", "15:00:00", SlotStatus::Confirmed),
            entry("2026-03-01", "09:00:00", SlotStatus::Completed),
            // completed today still counts as past
            entry("2026-03-10", "09:00:00", SlotStatus::Completed),
            // stale booked slot from last week
            entry("2026-03-03", "10:00:00", SlotStatus::Booked),
        ];

        let history = split_history(entries, today);

        assert_eq!(history.upcoming.len(), 2);
        assert_eq!(history.past.len(), 3);
        // upcoming soonest first
        assert_eq!(history.upcoming[0].slot.date, "2026-03-10".parse::<NaiveDate>().unwrap());
        // past newest first
        assert_eq!(history.past[0].slot.date, "2026-03-10".parse::<NaiveDate>().unwrap());
        assert_eq!(history.past[2].slot.date, "2026-03-01".parse::<NaiveDate>().unwrap());
    }

    #[test]
    fn test_cancelled_appointment_is_past_even_when_dated_ahead() {
        let today: NaiveDate = "2026-03-10".parse().unwrap();
        let entries = vec![
            entry("2026-03-12", "09:00:00", SlotStatus::Cancelled),
            entry("2026-03-12", "10:00:00", SlotStatus::Booked),
        ];

        let history = split_history(entries, today);

        assert_eq!(history.upcoming.len(), 1);
        assert_eq!(history.upcoming[0].slot.status, SlotStatus::Booked);
        assert_eq!(history.past.len(), 1);
        assert_eq!(history.past[0].slot.status, SlotStatus::Cancelled);
    }

    #[test]
    fn test_group_by_day_orders_slots_within_day() {
        let mut a = slot("2026-03-10", "10:00:00", SlotStatus::Available);
        let mut b = slot("2026-03-10", "09:00:00", SlotStatus::Available);
        let doctor_id = Uuid::new_v4();
        a.doctor_id = doctor_id;
        b.doctor_id = doctor_id;

        let days = group_by_day(vec![a, b]);
        assert_eq!(days.len(), 1);
        assert_eq!(days[0].slots[0].start_time, "09:00:00".parse::<NaiveTime>().unwrap());
    }
}
