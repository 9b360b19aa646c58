// libs/triage-cell/src/services/triage.rs
use std::env;

use anyhow::{anyhow, Result};
use chrono::Utc;
use reqwest::{header, Client, Method};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::User;

use crate::models::{SymptomAnalysis, TriageError};

const OPENAI_API_BASE: &str = "https://api.openai.com";

/// Marker line the model is instructed to finish with. Parsed out of the
/// response before display and stored separately.
pub const SPECIALIST_PREFIX: &str = "РЕКОМЕНДУЕМЫЙ СПЕЦИАЛИСТ:";

const SYSTEM_PROMPT: &str = "Ты — медицинский ассистент клиники. Пациент описывает свои симптомы. \
Дай короткий доброжелательный совет на русском языке: что это может означать, \
насколько срочно стоит обратиться к врачу, что можно сделать до приёма. \
Не ставь диагноз и не назначай лечение. \
Последней строкой ответа обязательно напиши ровно в таком формате: \
РЕКОМЕНДУЕМЫЙ СПЕЦИАЛИСТ: <название специальности врача>";

/// Split the recommendation trailer off an AI reply.
///
/// The trailer may not be the literal last line (models sometimes append
/// whitespace), so the last line carrying the prefix wins. Returns the text
/// without the trailer and the extracted specialty, if any.
pub fn split_recommendation(text: &str) -> (String, Option<String>) {
    let mut specialty = None;
    let mut kept: Vec<&str> = Vec::new();

    for line in text.lines() {
        match line.trim().strip_prefix(SPECIALIST_PREFIX) {
            Some(rest) => specialty = Some(rest.trim().to_string()),
            None => kept.push(line),
        }
    }

    let cleaned = kept.join("\n").trim().to_string();
    (cleaned, specialty.filter(|s| !s.is_empty()))
}

pub struct TriageService {
    supabase: SupabaseClient,
    http_client: Client,
    api_base: String,
    openai_api_key: String,
}

impl TriageService {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let openai_api_key = env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow!("OPENAI_API_KEY environment variable not set"))?;
        Ok(Self::with_api_base(config, OPENAI_API_BASE, &openai_api_key))
    }

    pub fn with_api_base(config: &AppConfig, api_base: &str, api_key: &str) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            http_client: Client::new(),
            api_base: api_base.to_string(),
            openai_api_key: api_key.to_string(),
        }
    }

    /// Run one triage exchange: ask the model, strip the trailer, persist
    /// the record. A failed AI call persists nothing.
    pub async fn analyze(
        &self,
        user: &User,
        symptoms: &str,
        auth_token: &str,
    ) -> Result<SymptomAnalysis, TriageError> {
        let symptoms = symptoms.trim();
        if symptoms.is_empty() {
            return Err(TriageError::ValidationError(
                "Symptom description must not be empty".to_string(),
            ));
        }

        debug!("Running symptom triage for user {}", user.id);
        let raw = self
            .ask_model(symptoms)
            .await
            .map_err(|e| TriageError::ExternalService(e.to_string()))?;

        let (response, specialty) = split_recommendation(&raw);
        if specialty.is_none() {
            warn!("Triage reply carried no specialty trailer");
        }

        let row = json!({
            "patient_id": user.id,
            "query": symptoms,
            "response": response,
            "recommended_specialty": specialty,
            "created_at": Utc::now().to_rfc3339()
        });

        let mut headers = header::HeaderMap::new();
        headers.insert("Prefer", header::HeaderValue::from_static("return=representation"));

        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/symptom_analyses",
            Some(auth_token),
            Some(row),
            Some(headers),
        ).await.map_err(|e| TriageError::DatabaseError(e.to_string()))?;

        let analysis: SymptomAnalysis = result
            .into_iter()
            .next()
            .ok_or_else(|| TriageError::DatabaseError("Insert returned no row".to_string()))
            .and_then(|v| {
                serde_json::from_value(v).map_err(|e| {
                    TriageError::DatabaseError(format!("Failed to parse analysis: {}", e))
                })
            })?;

        info!(
            "Triage analysis {} stored, specialty: {:?}",
            analysis.id, analysis.recommended_specialty
        );
        Ok(analysis)
    }

    /// The caller's past triage exchanges, newest first.
    pub async fn history(&self, user: &User, auth_token: &str) -> Result<Vec<SymptomAnalysis>, TriageError> {
        let path = format!(
            "/rest/v1/symptom_analyses?patient_id=eq.{}&order=created_at.desc",
            user.id
        );
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await.map_err(|e| TriageError::DatabaseError(e.to_string()))?;

        result
            .into_iter()
            .map(|v| {
                serde_json::from_value(v).map_err(|e| {
                    TriageError::DatabaseError(format!("Failed to parse analysis: {}", e))
                })
            })
            .collect()
    }

    async fn ask_model(&self, symptoms: &str) -> Result<String> {
        let prompt = json!({
            "model": "gpt-4o",
            "messages": [
                {
                    "role": "system",
                    "content": SYSTEM_PROMPT
                },
                {
                    "role": "user",
                    "content": symptoms
                }
            ],
            "temperature": 0.5
        });

        let url = format!("{}/v1/chat/completions", self.api_base);
        let response = self.http_client.post(&url)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.openai_api_key))
            .header(header::CONTENT_TYPE, "application/json")
            .json(&prompt)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(anyhow!("OpenAI API error: {}", error_text));
        }

        let ai_response: Value = response.json().await?;
        let content = ai_response["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| anyhow!("Invalid OpenAI response format"))?;

        Ok(content.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailer_is_stripped_and_extracted() {
        let reply = "Похоже на обычную простуду.\nПейте больше жидкости.\nРЕКОМЕНДУЕМЫЙ СПЕЦИАЛИСТ: Терапевт";
        let (text, specialty) = split_recommendation(reply);

        assert_eq!(text, "Похоже на обычную простуду.\nПейте больше жидкости.");
        assert_eq!(specialty.as_deref(), Some("Терапевт"));
    }

    #[test]
    fn trailing_whitespace_after_trailer_is_tolerated() {
        let reply = "Совет.\n  РЕКОМЕНДУЕМЫЙ СПЕЦИАЛИСТ: Невролог  \n\n";
        let (text, specialty) = split_recommendation(reply);

        assert_eq!(text, "Совет.");
        assert_eq!(specialty.as_deref(), Some("Невролог"));
    }

    #[test]
    fn reply_without_trailer_passes_through() {
        let reply = "Обратитесь к врачу.";
        let (text, specialty) = split_recommendation(reply);

        assert_eq!(text, "Обратитесь к врачу.");
        assert_eq!(specialty, None);
    }

    #[test]
    fn empty_specialty_counts_as_missing() {
        let reply = "Совет.\nРЕКОМЕНДУЕМЫЙ СПЕЦИАЛИСТ:";
        let (_, specialty) = split_recommendation(reply);

        assert_eq!(specialty, None);
    }
}
