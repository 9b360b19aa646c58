pub mod normalize;
pub mod patient;
