use axum::extract::{Extension, Path, State};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use doctor_cell::handlers;
use doctor_cell::models::{CreateDoctorRequest, CreateReviewRequest};
use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::test_utils::{MockSupabaseRows, TestConfig, TestUser};

fn auth_header() -> TypedHeader<Authorization<Bearer>> {
    TypedHeader(Authorization::bearer("test-token").unwrap())
}

fn user_extension(test_user: &TestUser) -> Extension<User> {
    Extension(test_user.to_user())
}

fn review_row(doctor_id: &Uuid, patient_id: &Uuid, rating: i32) -> serde_json::Value {
    json!({
        "id": Uuid::new_v4().to_string(),
        "doctor_id": doctor_id.to_string(),
        "patient_id": patient_id.to_string(),
        "rating": rating,
        "comment": "Отличный врач",
        "created_at": "2026-01-15T10:00:00Z"
    })
}

async fn mount_doctor(mock_server: &MockServer, doctor_id: &Uuid, slug: &str) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .and(query_param("slug", format!("eq.{}", slug)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseRows::doctor_row(&doctor_id.to_string(), "Иванова", "Анна", slug)
        ])))
        .mount(mock_server)
        .await;
}

// ==============================================================================
// REVIEW GATE
// ==============================================================================

#[tokio::test]
async fn test_review_without_completed_visit_is_rejected() {
    let mock_server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();
    let patient = TestUser::patient("patient@example.com");

    mount_doctor(&mock_server, &doctor_id, "ivanova-anna").await;

    // No completed visit on record for this pair.
    Mock::given(method("GET"))
        .and(path("/rest/v1/schedule_slots"))
        .and(query_param("status", "eq.completed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    // The review row must never be written.
    Mock::given(method("POST"))
        .and(path("/rest/v1/reviews"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
        .expect(0)
        .mount(&mock_server)
        .await;

    let state = TestConfig::with_supabase_url(&mock_server.uri()).to_arc();
    let result = handlers::create_review(
        State(state),
        auth_header(),
        user_extension(&patient),
        Path("ivanova-anna".to_string()),
        axum::Json(CreateReviewRequest {
            rating: 5,
            comment: "Отличный врач".to_string(),
        }),
    )
    .await;

    assert!(matches!(result, Err(AppError::Permission(_))));
}

#[tokio::test]
async fn test_review_with_completed_visit_is_created() {
    let mock_server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();
    let patient = TestUser::patient("patient@example.com");
    let patient_id: Uuid = patient.id.parse().unwrap();

    mount_doctor(&mock_server, &doctor_id, "ivanova-anna").await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/schedule_slots"))
        .and(query_param("patient_id", format!("eq.{}", patient.id)))
        .and(query_param("status", "eq.completed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": Uuid::new_v4().to_string()}
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/reviews"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            review_row(&doctor_id, &patient_id, 5)
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let state = TestConfig::with_supabase_url(&mock_server.uri()).to_arc();
    let body = handlers::create_review(
        State(state),
        auth_header(),
        user_extension(&patient),
        Path("ivanova-anna".to_string()),
        axum::Json(CreateReviewRequest {
            rating: 5,
            comment: "Отличный врач".to_string(),
        }),
    )
    .await
    .unwrap()
    .0;

    assert_eq!(body["success"], true);
    assert_eq!(body["review"]["rating"], 5);
}

#[tokio::test]
async fn test_review_rating_out_of_range_is_rejected() {
    let state = TestConfig::default().to_arc();
    let patient = TestUser::patient("patient@example.com");

    let result = handlers::create_review(
        State(state),
        auth_header(),
        user_extension(&patient),
        Path("ivanova-anna".to_string()),
        axum::Json(CreateReviewRequest {
            rating: 6,
            comment: "?".to_string(),
        }),
    )
    .await;

    assert!(matches!(result, Err(AppError::ValidationError(_))));
}

#[tokio::test]
async fn test_review_aggregate_skips_authors_without_completed_visit() {
    let mock_server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();
    let vetted = Uuid::new_v4();
    let unvetted = Uuid::new_v4();

    mount_doctor(&mock_server, &doctor_id, "ivanova-anna").await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/reviews"))
        .and(query_param("doctor_id", format!("eq.{}", doctor_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            review_row(&doctor_id, &vetted, 5),
            review_row(&doctor_id, &unvetted, 1)
        ])))
        .mount(&mock_server)
        .await;

    // Only one of the two authors actually completed a visit.
    Mock::given(method("GET"))
        .and(path("/rest/v1/schedule_slots"))
        .and(query_param("status", "eq.completed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"patient_id": vetted.to_string()}
        ])))
        .mount(&mock_server)
        .await;

    let state = TestConfig::with_supabase_url(&mock_server.uri()).to_arc();
    let body = handlers::get_doctor_reviews(State(state), Path("ivanova-anna".to_string()))
        .await
        .unwrap()
        .0;

    assert_eq!(body["count"], 1);
    assert_eq!(body["average_rating"], 5.0);
}

// ==============================================================================
// DOCTOR CREATION
// ==============================================================================

#[tokio::test]
async fn test_create_doctor_dedups_slug() {
    let mock_server = MockServer::start().await;
    let admin = TestUser::admin("admin@example.com");
    let doctor_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .and(query_param("select", "slug"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"slug": "ivanova-anna"}
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/doctors"))
        .and(body_partial_json(json!({"slug": "ivanova-anna-2"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseRows::doctor_row(&doctor_id.to_string(), "Иванова", "Анна", "ivanova-anna-2")
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let state = TestConfig::with_supabase_url(&mock_server.uri()).to_arc();
    let body = handlers::create_doctor(
        State(state),
        auth_header(),
        user_extension(&admin),
        axum::Json(CreateDoctorRequest {
            first_name: "Анна".to_string(),
            last_name: "Иванова".to_string(),
            patronymic: None,
            specialization: "Терапевт".to_string(),
            practice_start_year: 2015,
            bio: None,
        }),
    )
    .await
    .unwrap()
    .0;

    assert_eq!(body["success"], true);
    assert_eq!(body["doctor"]["slug"], "ivanova-anna-2");
}

#[tokio::test]
async fn test_create_doctor_requires_admin() {
    let state = TestConfig::default().to_arc();
    let patient = TestUser::patient("patient@example.com");

    let result = handlers::create_doctor(
        State(state),
        auth_header(),
        user_extension(&patient),
        axum::Json(CreateDoctorRequest {
            first_name: "Анна".to_string(),
            last_name: "Иванова".to_string(),
            patronymic: None,
            specialization: "Терапевт".to_string(),
            practice_start_year: 2015,
            bio: None,
        }),
    )
    .await;

    assert!(matches!(result, Err(AppError::Permission(_))));
}
