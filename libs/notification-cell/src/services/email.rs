// libs/notification-cell/src/services/email.rs
use anyhow::{Result, anyhow};
use reqwest::{Client, header};
use serde_json::json;
use tracing::{debug, warn};

use shared_config::AppConfig;

#[derive(Debug, Clone)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html_body: String,
    pub text_body: String,
}

/// Templated email delivery through the transactional email HTTP API.
///
/// Single attempt, no retries. Callers on transition paths treat failures
/// as non-fatal: the transition has already been persisted.
pub struct EmailService {
    client: Client,
    api_url: String,
    api_key: String,
    from: String,
}

impl EmailService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            api_url: config.email_api_url.clone(),
            api_key: config.email_api_key.clone(),
            from: config.email_from.clone(),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.api_url.is_empty() && !self.api_key.is_empty()
    }

    pub async fn send(&self, message: &EmailMessage) -> Result<()> {
        if !self.is_configured() {
            warn!("Email service not configured, dropping message to {}", message.to);
            return Ok(());
        }

        debug!("Sending email '{}' to {}", message.subject, message.to);

        let body = json!({
            "from": self.from,
            "to": [message.to],
            "subject": message.subject,
            "html": message.html_body,
            "text": message.text_body,
        });

        let response = self.client.post(&self.api_url)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.api_key))
            .header(header::CONTENT_TYPE, "application/json")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow!("Email API error ({}): {}", status, error_text));
        }

        Ok(())
    }
}
