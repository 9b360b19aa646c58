// libs/patient-cell/src/services/patient.rs
use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Map, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::User;

use crate::models::{
    CreateGuestRequest, Patient, PatientError, PatientSearchResult, SignupProfileRequest,
    UpdatePatientRequest,
};
use crate::services::normalize::{normalize_name, normalize_phone};

pub const SEARCH_MIN_CHARS: usize = 2;
pub const SEARCH_LIMIT: usize = 20;

pub struct PatientService {
    supabase: SupabaseClient,
}

impl PatientService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// Fill in profile fields after the identity collaborator completes a
    /// signup.
    ///
    /// If the phone collides with an inactive guest record, that record is
    /// claimed: re-keyed to the caller's identity, updated in place, and
    /// activated. Otherwise a fresh active row is created.
    pub async fn signup_profile(
        &self,
        user: &User,
        request: SignupProfileRequest,
        auth_token: &str,
    ) -> Result<Patient, PatientError> {
        let phone = normalize_phone(&request.phone)?;
        if request.birth_date.is_none() {
            return Err(PatientError::ValidationError(
                "Birth date is required for patients".to_string(),
            ));
        }
        if request.first_name.trim().is_empty() || request.last_name.trim().is_empty() {
            return Err(PatientError::ValidationError(
                "First and last name are required".to_string(),
            ));
        }

        let fields = json!({
            "id": user.id,
            "role": "patient",
            "first_name": normalize_name(&request.first_name),
            "last_name": normalize_name(&request.last_name),
            "patronymic": request.patronymic.as_deref().map(normalize_name),
            "email": user.email,
            "phone": phone,
            "gender": request.gender,
            "birth_date": request.birth_date,
            "promo_subscribed": request.promo_subscribed,
            "is_active": true,
            "updated_at": Utc::now().to_rfc3339()
        });

        // Claim a matching guest record if one is waiting.
        let claim_path = format!(
            "/rest/v1/users?phone=eq.{}&is_active=eq.false",
            urlencoding::encode(&phone)
        );
        let claimed: Vec<Value> = self.supabase.request_with_headers(
            Method::PATCH,
            &claim_path,
            Some(auth_token),
            Some(fields.clone()),
            Some(representation_headers()),
        ).await.map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        if let Some(row) = claimed.into_iter().next() {
            info!("Guest record claimed at signup for user {}", user.id);
            return parse_patient(row);
        }

        let mut row = fields;
        row["created_at"] = json!(Utc::now().to_rfc3339());

        let created: Vec<Value> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/users",
            Some(auth_token),
            Some(row),
            Some(representation_headers()),
        ).await.map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        info!("Patient profile created for user {}", user.id);
        created
            .into_iter()
            .next()
            .ok_or_else(|| PatientError::DatabaseError("Insert returned no row".to_string()))
            .and_then(parse_patient)
    }

    /// Admin pre-creation of an inactive, passwordless guest record.
    pub async fn create_guest(
        &self,
        request: CreateGuestRequest,
        auth_token: &str,
    ) -> Result<Patient, PatientError> {
        let phone = normalize_phone(&request.phone)?;
        if request.first_name.trim().is_empty() || request.last_name.trim().is_empty() {
            return Err(PatientError::ValidationError(
                "First and last name are required".to_string(),
            ));
        }

        let now = Utc::now();
        let row = json!({
            "id": Uuid::new_v4(),
            "role": "patient",
            "first_name": normalize_name(&request.first_name),
            "last_name": normalize_name(&request.last_name),
            "patronymic": request.patronymic.as_deref().map(normalize_name),
            "email": null,
            "phone": phone,
            "gender": request.gender,
            "birth_date": request.birth_date,
            "promo_subscribed": false,
            "is_active": false,
            "created_at": now.to_rfc3339(),
            "updated_at": now.to_rfc3339()
        });

        let created: Vec<Value> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/users",
            Some(auth_token),
            Some(row),
            Some(representation_headers()),
        ).await.map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        let patient = created
            .into_iter()
            .next()
            .ok_or_else(|| PatientError::DatabaseError("Insert returned no row".to_string()))
            .and_then(parse_patient)?;

        info!("Guest record {} created", patient.id);
        Ok(patient)
    }

    /// Admin quick lookup by name or phone fragment.
    pub async fn search(
        &self,
        query: &str,
        auth_token: &str,
    ) -> Result<Vec<PatientSearchResult>, PatientError> {
        let query = query.trim();
        if query.chars().count() < SEARCH_MIN_CHARS {
            return Err(PatientError::ValidationError(format!(
                "Search query must be at least {} characters",
                SEARCH_MIN_CHARS
            )));
        }

        let needle = urlencoding::encode(query).into_owned();
        let path = format!(
            "/rest/v1/users?or=(first_name.ilike.*{n}*,last_name.ilike.*{n}*,phone.ilike.*{n}*)&limit={limit}",
            n = needle,
            limit = SEARCH_LIMIT
        );
        debug!("Patient search: '{}'", query);

        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await.map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        result
            .into_iter()
            .map(|v| {
                let patient = parse_patient(v)?;
                Ok(PatientSearchResult {
                    id: patient.id,
                    text: patient.display_text(),
                })
            })
            .collect()
    }

    pub async fn get_patient(&self, id: Uuid, auth_token: &str) -> Result<Patient, PatientError> {
        let path = format!("/rest/v1/users?id=eq.{}", id);
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await.map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        result
            .into_iter()
            .next()
            .ok_or(PatientError::NotFound)
            .and_then(parse_patient)
    }

    /// Partial profile update with the same normalization as signup.
    pub async fn update_patient(
        &self,
        id: Uuid,
        request: UpdatePatientRequest,
        auth_token: &str,
    ) -> Result<Patient, PatientError> {
        let mut fields = Map::new();
        if let Some(first_name) = &request.first_name {
            fields.insert("first_name".to_string(), json!(normalize_name(first_name)));
        }
        if let Some(last_name) = &request.last_name {
            fields.insert("last_name".to_string(), json!(normalize_name(last_name)));
        }
        if let Some(patronymic) = &request.patronymic {
            fields.insert("patronymic".to_string(), json!(normalize_name(patronymic)));
        }
        if let Some(phone) = &request.phone {
            fields.insert("phone".to_string(), json!(normalize_phone(phone)?));
        }
        if let Some(gender) = request.gender {
            fields.insert("gender".to_string(), json!(gender));
        }
        if let Some(birth_date) = request.birth_date {
            fields.insert("birth_date".to_string(), json!(birth_date));
        }
        if let Some(promo) = request.promo_subscribed {
            fields.insert("promo_subscribed".to_string(), json!(promo));
        }
        if fields.is_empty() {
            return self.get_patient(id, auth_token).await;
        }
        fields.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!("/rest/v1/users?id=eq.{}", id);
        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            Some(auth_token),
            Some(Value::Object(fields)),
            Some(representation_headers()),
        ).await.map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        result
            .into_iter()
            .next()
            .ok_or(PatientError::NotFound)
            .and_then(parse_patient)
    }
}

fn parse_patient(row: Value) -> Result<Patient, PatientError> {
    serde_json::from_value(row)
        .map_err(|e| PatientError::DatabaseError(format!("Failed to parse patient: {}", e)))
}

fn representation_headers() -> reqwest::header::HeaderMap {
    let mut headers = reqwest::header::HeaderMap::new();
    headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));
    headers
}
