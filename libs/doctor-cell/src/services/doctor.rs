// libs/doctor-cell/src/services/doctor.rs
use chrono::{Datelike, Local, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info};

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{CreateDoctorRequest, Doctor, DoctorError, DoctorProfile};
use crate::services::slug::{dedup_slug, slugify};

/// Russian plural form for full years of practice.
pub fn experience_display(years: i64) -> String {
    let years = years.max(0);
    let tail = years % 100;
    let unit = if (11..=14).contains(&tail) {
        "лет"
    } else {
        match tail % 10 {
            1 => "год",
            2..=4 => "года",
            _ => "лет",
        }
    };
    format!("{} {}", years, unit)
}

pub struct DoctorService {
    supabase: SupabaseClient,
}

impl DoctorService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn create_doctor(
        &self,
        request: CreateDoctorRequest,
        auth_token: &str,
    ) -> Result<Doctor, DoctorError> {
        if request.first_name.trim().is_empty() || request.last_name.trim().is_empty() {
            return Err(DoctorError::ValidationError(
                "Doctor name must not be empty".to_string(),
            ));
        }
        let current_year = Local::now().year();
        if request.practice_start_year < 1900 || request.practice_start_year > current_year {
            return Err(DoctorError::ValidationError(format!(
                "practice_start_year must be between 1900 and {}",
                current_year
            )));
        }

        let base = slugify(&format!("{} {}", request.last_name, request.first_name));
        if base.is_empty() {
            return Err(DoctorError::ValidationError(
                "Doctor name yields an empty slug".to_string(),
            ));
        }
        let slug = self.free_slug(&base, auth_token).await?;
        debug!("Assigned slug '{}' to new doctor", slug);

        let now = Utc::now();
        let row = json!({
            "first_name": request.first_name.trim(),
            "last_name": request.last_name.trim(),
            "patronymic": request.patronymic.as_deref().map(str::trim),
            "specialization": request.specialization,
            "practice_start_year": request.practice_start_year,
            "slug": slug,
            "bio": request.bio,
            "created_at": now.to_rfc3339(),
            "updated_at": now.to_rfc3339()
        });

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/doctors",
            Some(auth_token),
            Some(row),
            Some(headers),
        ).await.map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

        let doctor: Doctor = result
            .into_iter()
            .next()
            .ok_or_else(|| DoctorError::DatabaseError("Insert returned no row".to_string()))
            .and_then(|v| {
                serde_json::from_value(v)
                    .map_err(|e| DoctorError::DatabaseError(format!("Failed to parse doctor: {}", e)))
            })?;

        info!("Created doctor {} ({})", doctor.full_name(), doctor.slug);
        Ok(doctor)
    }

    pub async fn list_doctors(&self, auth_token: &str) -> Result<Vec<DoctorProfile>, DoctorError> {
        let path = "/rest/v1/doctors?order=last_name.asc,first_name.asc";
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            path,
            Some(auth_token),
            None,
        ).await.map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

        result
            .into_iter()
            .map(|v| {
                let doctor: Doctor = serde_json::from_value(v)
                    .map_err(|e| DoctorError::DatabaseError(format!("Failed to parse doctor: {}", e)))?;
                Ok(profile(doctor))
            })
            .collect()
    }

    pub async fn get_by_slug(&self, slug: &str, auth_token: &str) -> Result<DoctorProfile, DoctorError> {
        let doctor = self.fetch_by_slug(slug, auth_token).await?;
        Ok(profile(doctor))
    }

    pub(crate) async fn fetch_by_slug(&self, slug: &str, auth_token: &str) -> Result<Doctor, DoctorError> {
        let path = format!("/rest/v1/doctors?slug=eq.{}", urlencoding::encode(slug));
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await.map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

        result
            .into_iter()
            .next()
            .ok_or(DoctorError::NotFound)
            .and_then(|v| {
                serde_json::from_value(v)
                    .map_err(|e| DoctorError::DatabaseError(format!("Failed to parse doctor: {}", e)))
            })
    }

    /// Fetch every slug starting with the base, then pick the first free one.
    async fn free_slug(&self, base: &str, auth_token: &str) -> Result<String, DoctorError> {
        let path = format!(
            "/rest/v1/doctors?select=slug&slug=like.{}*",
            urlencoding::encode(base)
        );
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await.map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

        let taken: Vec<String> = result
            .into_iter()
            .filter_map(|v| v["slug"].as_str().map(str::to_string))
            .collect();

        Ok(dedup_slug(base, &taken))
    }
}

fn profile(doctor: Doctor) -> DoctorProfile {
    let years = (Local::now().year() - doctor.practice_start_year) as i64;
    DoctorProfile {
        experience_display: experience_display(years),
        doctor,
    }
}
