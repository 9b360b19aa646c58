pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::{Slot, SlotStatus, CreateShiftRequest, EditSlotRequest, ToggleDayRequest};
