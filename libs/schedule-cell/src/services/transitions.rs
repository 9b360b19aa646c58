// libs/schedule-cell/src/services/transitions.rs
//
// Pure transition planning. Services compute a plan here, persist it, then
// dispatch the side effects the plan names. Nothing in this module touches
// the database or the notifiers, which keeps every rule unit-testable.
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{EditSlotRequest, Slot, SlotStatus};

/// Side effects a transition asks the caller to dispatch after persisting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SideEffect {
    /// Confirmation email to the occupant. Skipped silently downstream when
    /// the occupant has no email address.
    ConfirmationEmail { patient_id: Uuid },
    /// Chat message to the clinic channel about a fresh booking.
    BookingNotification { patient_id: Uuid },
}

#[derive(Debug, Clone)]
pub struct ConfirmPlan {
    /// False when the slot is already confirmed: nothing to write, no email.
    pub apply: bool,
    pub effects: Vec<SideEffect>,
}

/// Confirm is idempotent: re-confirming an already-confirmed slot writes
/// nothing and must not re-send the email.
pub fn plan_confirm(prior: &Slot) -> ConfirmPlan {
    if prior.status == SlotStatus::Confirmed {
        return ConfirmPlan { apply: false, effects: vec![] };
    }

    let effects = match prior.patient_id {
        Some(patient_id) => vec![SideEffect::ConfirmationEmail { patient_id }],
        None => vec![],
    };

    ConfirmPlan { apply: true, effects }
}

/// The resolved field values an admin edit should persist, plus its effects.
#[derive(Debug, Clone)]
pub struct EditPlan {
    pub status: SlotStatus,
    pub patient_id: Option<Uuid>,
    pub medical_report: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub effects: Vec<SideEffect>,
}

/// Resolve a direct admin edit against the prior persisted state.
///
/// Rules, in order:
/// 1. An available slot cannot hold an occupant.
/// 2. Attaching a report closes the visit: status becomes completed and the
///    completion timestamp is stamped, whatever status was submitted.
/// 3. Entering confirmed (from a non-confirmed status, or with a different
///    occupant than before) fires the same single confirmation email as the
///    confirm endpoint.
pub fn plan_admin_edit(prior: &Slot, edit: &EditSlotRequest, now: DateTime<Utc>) -> EditPlan {
    let mut status = edit.status;
    let mut patient_id = edit.patient_id;
    let mut completed_at = prior.completed_at;

    if status == SlotStatus::Available {
        patient_id = None;
    }

    if edit.medical_report.is_some() && status != SlotStatus::Completed {
        status = SlotStatus::Completed;
    }
    if edit.medical_report.is_some() && prior.completed_at.is_none() {
        completed_at = Some(now);
    }

    let mut effects = Vec::new();
    if status == SlotStatus::Confirmed {
        let entered_confirmed = prior.status != SlotStatus::Confirmed;
        let occupant_changed = patient_id != prior.patient_id;
        if let Some(pid) = patient_id {
            if entered_confirmed || occupant_changed {
                effects.push(SideEffect::ConfirmationEmail { patient_id: pid });
            }
        }
    }

    EditPlan {
        status,
        patient_id,
        medical_report: edit.medical_report.clone(),
        completed_at,
        effects,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};

    fn slot(status: SlotStatus, patient_id: Option<Uuid>) -> Slot {
        Slot {
            id: Uuid::new_v4(),
            doctor_id: Uuid::new_v4(),
            date: NaiveDate::from_ymd_opt(2025, 4, 1).unwrap(),
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
            status,
            patient_id,
            medical_report: None,
            completed_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn edit_of(slot: &Slot) -> EditSlotRequest {
        EditSlotRequest {
            doctor_id: slot.doctor_id,
            date: slot.date,
            start_time: slot.start_time,
            end_time: slot.end_time,
            status: slot.status,
            patient_id: slot.patient_id,
            medical_report: slot.medical_report.clone(),
        }
    }

    #[test]
    fn confirm_on_booked_slot_sends_one_email() {
        let patient = Uuid::new_v4();
        let plan = plan_confirm(&slot(SlotStatus::Booked, Some(patient)));

        assert!(plan.apply);
        assert_eq!(plan.effects, vec![SideEffect::ConfirmationEmail { patient_id: patient }]);
    }

    #[test]
    fn confirm_is_idempotent() {
        let plan = plan_confirm(&slot(SlotStatus::Confirmed, Some(Uuid::new_v4())));

        assert!(!plan.apply);
        assert!(plan.effects.is_empty());
    }

    #[test]
    fn confirm_without_occupant_skips_email() {
        let plan = plan_confirm(&slot(SlotStatus::Available, None));

        assert!(plan.apply);
        assert!(plan.effects.is_empty());
    }

    #[test]
    fn edit_to_available_clears_occupant() {
        let prior = slot(SlotStatus::Booked, Some(Uuid::new_v4()));
        let mut edit = edit_of(&prior);
        edit.status = SlotStatus::Available;

        let plan = plan_admin_edit(&prior, &edit, Utc::now());

        assert_eq!(plan.status, SlotStatus::Available);
        assert_eq!(plan.patient_id, None);
    }

    #[test]
    fn attaching_report_forces_completed_with_timestamp() {
        let prior = slot(SlotStatus::Booked, Some(Uuid::new_v4()));
        let mut edit = edit_of(&prior);
        edit.medical_report = Some("reports/visit-42.pdf".to_string());
        // Status submitted in the same edit is ignored in favor of completed.
        edit.status = SlotStatus::Booked;

        let now = Utc::now();
        let plan = plan_admin_edit(&prior, &edit, now);

        assert_eq!(plan.status, SlotStatus::Completed);
        assert_eq!(plan.completed_at, Some(now));
    }

    #[test]
    fn edit_entering_confirmed_fires_email() {
        let patient = Uuid::new_v4();
        let prior = slot(SlotStatus::Booked, Some(patient));
        let mut edit = edit_of(&prior);
        edit.status = SlotStatus::Confirmed;

        let plan = plan_admin_edit(&prior, &edit, Utc::now());

        assert_eq!(plan.effects, vec![SideEffect::ConfirmationEmail { patient_id: patient }]);
    }

    #[test]
    fn edit_keeping_confirmed_same_occupant_sends_nothing() {
        let patient = Uuid::new_v4();
        let prior = slot(SlotStatus::Confirmed, Some(patient));
        let edit = edit_of(&prior);

        let plan = plan_admin_edit(&prior, &edit, Utc::now());

        assert!(plan.effects.is_empty());
    }

    #[test]
    fn edit_swapping_occupant_on_confirmed_slot_fires_email() {
        let prior = slot(SlotStatus::Confirmed, Some(Uuid::new_v4()));
        let replacement = Uuid::new_v4();
        let mut edit = edit_of(&prior);
        edit.patient_id = Some(replacement);

        let plan = plan_admin_edit(&prior, &edit, Utc::now());

        assert_eq!(plan.effects, vec![SideEffect::ConfirmationEmail { patient_id: replacement }]);
    }
}
