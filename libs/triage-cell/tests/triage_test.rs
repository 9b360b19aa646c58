use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use shared_utils::test_utils::{TestConfig, TestUser};
use triage_cell::models::TriageError;
use triage_cell::services::triage::TriageService;

fn openai_reply(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-test",
        "choices": [
            {
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": content
                },
                "finish_reason": "stop"
            }
        ]
    })
}

fn analysis_row(patient_id: &str, response: &str, specialty: &str) -> serde_json::Value {
    json!({
        "id": Uuid::new_v4().to_string(),
        "patient_id": patient_id,
        "query": "болит горло и температура",
        "response": response,
        "recommended_specialty": specialty,
        "created_at": "2026-02-01T12:00:00Z"
    })
}

#[tokio::test]
async fn test_analyze_strips_trailer_and_stores_record() {
    let mock_server = MockServer::start().await;
    let patient = TestUser::patient("patient@example.com");
    let user = patient.to_user();

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(openai_reply(
            "Похоже на ангину. Обратитесь к врачу.\nРЕКОМЕНДУЕМЫЙ СПЕЦИАЛИСТ: Отоларинголог",
        )))
        .expect(1)
        .mount(&mock_server)
        .await;

    // The stored row must carry the cleaned text and the specialty apart.
    Mock::given(method("POST"))
        .and(path("/rest/v1/symptom_analyses"))
        .and(body_partial_json(json!({
            "response": "Похоже на ангину. Обратитесь к врачу.",
            "recommended_specialty": "Отоларинголог"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            analysis_row(&patient.id, "Похоже на ангину. Обратитесь к врачу.", "Отоларинголог")
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = TestConfig::with_supabase_url(&mock_server.uri()).to_app_config();
    let service = TriageService::with_api_base(&config, &mock_server.uri(), "test-openai-key");

    let analysis = service
        .analyze(&user, "болит горло и температура", "test-token")
        .await
        .unwrap();

    assert_eq!(analysis.recommended_specialty.as_deref(), Some("Отоларинголог"));
    assert!(!analysis.response.contains("РЕКОМЕНДУЕМЫЙ СПЕЦИАЛИСТ"));
}

#[tokio::test]
async fn test_ai_failure_persists_nothing() {
    let mock_server = MockServer::start().await;
    let patient = TestUser::patient("patient@example.com");
    let user = patient.to_user();

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream error"))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/symptom_analyses"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
        .expect(0)
        .mount(&mock_server)
        .await;

    let config = TestConfig::with_supabase_url(&mock_server.uri()).to_app_config();
    let service = TriageService::with_api_base(&config, &mock_server.uri(), "test-openai-key");

    let result = service.analyze(&user, "кружится голова", "test-token").await;
    assert!(matches!(result, Err(TriageError::ExternalService(_))));
}

#[tokio::test]
async fn test_empty_symptoms_rejected_before_ai_call() {
    let mock_server = MockServer::start().await;
    let patient = TestUser::patient("patient@example.com");
    let user = patient.to_user();

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(openai_reply("x")))
        .expect(0)
        .mount(&mock_server)
        .await;

    let config = TestConfig::with_supabase_url(&mock_server.uri()).to_app_config();
    let service = TriageService::with_api_base(&config, &mock_server.uri(), "test-openai-key");

    let result = service.analyze(&user, "   ", "test-token").await;
    assert!(matches!(result, Err(TriageError::ValidationError(_))));
}
