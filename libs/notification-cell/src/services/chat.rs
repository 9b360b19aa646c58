// libs/notification-cell/src/services/chat.rs
use anyhow::{Result, anyhow};
use reqwest::Client;
use serde_json::json;
use tracing::{debug, warn};

use shared_config::AppConfig;

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Single formatted message into the clinic's Telegram channel.
///
/// Fired after a successful booking. Best-effort: a delivery failure never
/// rolls the booking back.
pub struct ChatNotifier {
    client: Client,
    api_base: String,
    bot_token: String,
    chat_id: String,
}

impl ChatNotifier {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_api_base(config, TELEGRAM_API_BASE)
    }

    pub fn with_api_base(config: &AppConfig, api_base: &str) -> Self {
        Self {
            client: Client::new(),
            api_base: api_base.to_string(),
            bot_token: config.telegram_bot_token.clone(),
            chat_id: config.telegram_chat_id.clone(),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.bot_token.is_empty() && !self.chat_id.is_empty()
    }

    pub async fn send(&self, text: &str) -> Result<()> {
        if !self.is_configured() {
            warn!("Chat notifier not configured, dropping message");
            return Ok(());
        }

        debug!("Sending chat notification ({} chars)", text.len());

        let url = format!("{}/bot{}/sendMessage", self.api_base, self.bot_token);
        let response = self.client.post(&url)
            .json(&json!({
                "chat_id": self.chat_id,
                "text": text,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow!("Telegram API error ({}): {}", status, error_text));
        }

        Ok(())
    }
}
