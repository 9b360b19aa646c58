pub mod doctor;
pub mod review;
pub mod slug;
