pub mod booking;
pub mod generation;
pub mod query;
pub mod transitions;
