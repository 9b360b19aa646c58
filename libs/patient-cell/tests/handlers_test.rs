use axum::extract::{Extension, Query, State};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use patient_cell::handlers;
use patient_cell::models::{PatientSearchQuery, SignupProfileRequest};
use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::test_utils::{MockSupabaseRows, TestConfig, TestUser};

fn auth_header() -> TypedHeader<Authorization<Bearer>> {
    TypedHeader(Authorization::bearer("test-token").unwrap())
}

fn user_extension(test_user: &TestUser) -> Extension<User> {
    Extension(test_user.to_user())
}

fn signup_request(phone: &str) -> SignupProfileRequest {
    serde_json::from_value(json!({
        "first_name": "Иван",
        "last_name": "Петров",
        "phone": phone,
        "gender": "male",
        "birth_date": "1990-05-20",
        "promo_subscribed": true
    }))
    .unwrap()
}

// ==============================================================================
// SIGNUP PROFILE
// ==============================================================================

#[tokio::test]
async fn test_signup_claims_waiting_guest_record() {
    let mock_server = MockServer::start().await;
    let patient = TestUser::patient("ivan@example.com");

    // The guest row exists: the conditional update matches and claims it.
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/users"))
        .and(query_param("phone", "eq.+79991234567"))
        .and(query_param("is_active", "eq.false"))
        .and(body_partial_json(json!({
            "id": patient.id,
            "phone": "+79991234567",
            "first_name": "иван",
            "last_name": "петров",
            "is_active": true
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseRows::user_row(&patient.id, "петров", "иван", "+79991234567")
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    // No duplicate row may be created.
    Mock::given(method("POST"))
        .and(path("/rest/v1/users"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
        .expect(0)
        .mount(&mock_server)
        .await;

    let state = TestConfig::with_supabase_url(&mock_server.uri()).to_arc();
    let body = handlers::signup_profile(
        State(state),
        auth_header(),
        user_extension(&patient),
        axum::Json(signup_request("8 (999) 123-45-67")),
    )
    .await
    .unwrap()
    .0;

    assert_eq!(body["success"], true);
    assert_eq!(body["patient"]["phone"], "+79991234567");
}

#[tokio::test]
async fn test_signup_creates_row_when_no_guest_matches() {
    let mock_server = MockServer::start().await;
    let patient = TestUser::patient("ivan@example.com");

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/users"))
        .and(body_partial_json(json!({
            "id": patient.id,
            "phone": "+79991234567",
            "is_active": true
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseRows::user_row(&patient.id, "петров", "иван", "+79991234567")
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let state = TestConfig::with_supabase_url(&mock_server.uri()).to_arc();
    let body = handlers::signup_profile(
        State(state),
        auth_header(),
        user_extension(&patient),
        axum::Json(signup_request("9991234567")),
    )
    .await
    .unwrap()
    .0;

    assert_eq!(body["success"], true);
}

#[tokio::test]
async fn test_signup_rejects_malformed_phone() {
    let state = TestConfig::default().to_arc();
    let patient = TestUser::patient("ivan@example.com");

    let result = handlers::signup_profile(
        State(state),
        auth_header(),
        user_extension(&patient),
        axum::Json(signup_request("123")),
    )
    .await;

    assert!(matches!(result, Err(AppError::ValidationError(_))));
}

// ==============================================================================
// ADMIN SEARCH
// ==============================================================================

#[tokio::test]
async fn test_search_requires_two_characters() {
    let state = TestConfig::default().to_arc();
    let admin = TestUser::admin("admin@example.com");

    let result = handlers::search_patients(
        State(state),
        auth_header(),
        user_extension(&admin),
        Query(PatientSearchQuery { q: "и".to_string() }),
    )
    .await;

    assert!(matches!(result, Err(AppError::ValidationError(_))));
}

#[tokio::test]
async fn test_search_requires_admin() {
    let state = TestConfig::default().to_arc();
    let patient = TestUser::patient("patient@example.com");

    let result = handlers::search_patients(
        State(state),
        auth_header(),
        user_extension(&patient),
        Query(PatientSearchQuery {
            q: "иванов".to_string(),
        }),
    )
    .await;

    assert!(matches!(result, Err(AppError::Permission(_))));
}

#[tokio::test]
async fn test_search_returns_display_rows() {
    let mock_server = MockServer::start().await;
    let admin = TestUser::admin("admin@example.com");
    let id_a = Uuid::new_v4();
    let id_b = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .and(query_param("limit", "20"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseRows::user_row(&id_a.to_string(), "петров", "иван", "+79991234567"),
            MockSupabaseRows::user_row(&id_b.to_string(), "петрова", "анна", "+79997654321")
        ])))
        .mount(&mock_server)
        .await;

    let state = TestConfig::with_supabase_url(&mock_server.uri()).to_arc();
    let body = handlers::search_patients(
        State(state),
        auth_header(),
        user_extension(&admin),
        Query(PatientSearchQuery {
            q: "петр".to_string(),
        }),
    )
    .await
    .unwrap()
    .0;

    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["text"], "петров иван, +79991234567");
}
