pub mod services;

pub use services::chat::ChatNotifier;
pub use services::email::{EmailMessage, EmailService};
