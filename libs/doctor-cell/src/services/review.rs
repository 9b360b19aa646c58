// libs/doctor-cell/src/services/review.rs
use std::collections::HashSet;

use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::User;

use crate::models::{
    CreateReviewRequest, DoctorError, DoctorReviews, Review, ReviewAggregate, MAX_COMMENT_LENGTH,
};
use crate::services::doctor::DoctorService;

pub struct ReviewService {
    supabase: SupabaseClient,
    doctors: DoctorService,
}

impl ReviewService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            doctors: DoctorService::new(config),
        }
    }

    /// Create a review for the doctor behind `slug`, authored by the caller.
    ///
    /// Gated on a completed visit: without at least one completed slot for
    /// this (doctor, patient) pair the review row is never created.
    pub async fn create_review(
        &self,
        slug: &str,
        user: &User,
        request: CreateReviewRequest,
        auth_token: &str,
    ) -> Result<Review, DoctorError> {
        if !(1..=5).contains(&request.rating) {
            return Err(DoctorError::ValidationError(
                "Rating must be between 1 and 5".to_string(),
            ));
        }
        if request.comment.chars().count() > MAX_COMMENT_LENGTH {
            return Err(DoctorError::ValidationError(format!(
                "Comment must be at most {} characters",
                MAX_COMMENT_LENGTH
            )));
        }

        let doctor = self.doctors.fetch_by_slug(slug, auth_token).await?;

        if !self.has_completed_visit(doctor.id, &user.id, auth_token).await? {
            debug!(
                "Review rejected: no completed visit for patient {} with doctor {}",
                user.id, doctor.id
            );
            return Err(DoctorError::ReviewNotAllowed);
        }

        let row = json!({
            "doctor_id": doctor.id,
            "patient_id": user.id,
            "rating": request.rating,
            "comment": request.comment,
            "created_at": Utc::now().to_rfc3339()
        });

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/reviews",
            Some(auth_token),
            Some(row),
            Some(headers),
        ).await.map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

        let review: Review = result
            .into_iter()
            .next()
            .ok_or_else(|| DoctorError::DatabaseError("Insert returned no row".to_string()))
            .and_then(|v| {
                serde_json::from_value(v)
                    .map_err(|e| DoctorError::DatabaseError(format!("Failed to parse review: {}", e)))
            })?;

        info!("Review {} created for doctor {}", review.id, doctor.id);
        Ok(review)
    }

    /// Reviews plus aggregate for a doctor. The aggregate re-applies the
    /// completed-visit gate at read time: rows whose author has no completed
    /// slot with the doctor are excluded even if they exist.
    pub async fn doctor_reviews(&self, slug: &str, auth_token: &str) -> Result<DoctorReviews, DoctorError> {
        let doctor = self.doctors.fetch_by_slug(slug, auth_token).await?;

        let path = format!(
            "/rest/v1/reviews?doctor_id=eq.{}&order=created_at.desc",
            doctor.id
        );
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await.map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

        let all: Vec<Review> = result
            .into_iter()
            .map(|v| {
                serde_json::from_value(v)
                    .map_err(|e| DoctorError::DatabaseError(format!("Failed to parse review: {}", e)))
            })
            .collect::<Result<_, _>>()?;

        let completed = self.completed_patients(doctor.id, auth_token).await?;
        let reviews: Vec<Review> = all
            .into_iter()
            .filter(|r| completed.contains(&r.patient_id))
            .collect();

        Ok(DoctorReviews {
            aggregate: aggregate(&reviews),
            reviews,
        })
    }

    async fn has_completed_visit(
        &self,
        doctor_id: Uuid,
        patient_id: &str,
        auth_token: &str,
    ) -> Result<bool, DoctorError> {
        let path = format!(
            "/rest/v1/schedule_slots?select=id&doctor_id=eq.{}&patient_id=eq.{}&status=eq.completed&limit=1",
            doctor_id, patient_id
        );
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await.map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

        Ok(!result.is_empty())
    }

    async fn completed_patients(
        &self,
        doctor_id: Uuid,
        auth_token: &str,
    ) -> Result<HashSet<Uuid>, DoctorError> {
        let path = format!(
            "/rest/v1/schedule_slots?select=patient_id&doctor_id=eq.{}&status=eq.completed",
            doctor_id
        );
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await.map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

        Ok(result
            .into_iter()
            .filter_map(|v| {
                v["patient_id"]
                    .as_str()
                    .and_then(|s| Uuid::parse_str(s).ok())
            })
            .collect())
    }
}

fn aggregate(reviews: &[Review]) -> ReviewAggregate {
    let count = reviews.len();
    let average_rating = if count == 0 {
        0.0
    } else {
        reviews.iter().map(|r| r.rating as f64).sum::<f64>() / count as f64
    };
    ReviewAggregate {
        average_rating,
        count,
    }
}
