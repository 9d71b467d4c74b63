//! HTTP client behavior against a mock OpenAI-compatible server.

use council::client::HealthStatus;
use council::models::{ApiError, TiersConfig};
use council::{
    Completion, ConsensusOrchestrator, CouncilError, Judge, LLMClient, Message,
    OrchestratorSettings, RosterSelector, Tier,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn completion_body(content: &str) -> serde_json::Value {
    json!({
        "id": "gen-1",
        "model": "openai/gpt-4o-mini",
        "choices": [
            { "index": 0, "message": { "role": "assistant", "content": content } }
        ],
        "usage": { "prompt_tokens": 12, "completion_tokens": 7, "total_tokens": 19 }
    })
}

#[tokio::test]
async fn test_complete_sends_bearer_and_max_tokens() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "openai/gpt-4o-mini",
            "max_tokens": 500,
            "messages": [{ "role": "user", "content": "Capital of France?" }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("Paris.")))
        .expect(1)
        .mount(&server)
        .await;

    let client = LLMClient::new("sk-test", server.uri(), 10, 3, None).unwrap();
    let response = client
        .complete(
            "openai/gpt-4o-mini",
            vec![Message::user("Capital of France?")],
            Some(500),
        )
        .await
        .unwrap();

    assert_eq!(response.content, "Paris.");
    assert_eq!(response.model, "openai/gpt-4o-mini");
    assert_eq!(response.input_tokens, 12);
    assert_eq!(response.output_tokens, 7);
    assert_eq!(client.total_tokens(), (12, 7));
    assert_eq!(client.rate_limiter().stats().total_requests, 1);
}

#[tokio::test]
async fn test_auth_failure_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({ "error": { "message": "No auth credentials found" } })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = LLMClient::new("sk-bad", server.uri(), 10, 3, None).unwrap();
    let err = client
        .complete("openai/gpt-4o", vec![Message::user("hi")], None)
        .await
        .unwrap_err();

    assert!(matches!(err, CouncilError::Api(ApiError::AuthenticationFailed)));
}

#[tokio::test]
async fn test_unknown_model_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let client = LLMClient::new("sk-test", server.uri(), 10, 3, None).unwrap();
    let err = client
        .complete("nobody/nothing", vec![Message::user("hi")], None)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        CouncilError::Api(ApiError::ModelNotFound(ref model)) if model == "nobody/nothing"
    ));
}

#[tokio::test]
async fn test_server_error_retried_then_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("recovered")))
        .mount(&server)
        .await;

    let client = LLMClient::new("sk-test", server.uri(), 10, 2, None).unwrap();
    let response = client
        .complete("openai/gpt-4o-mini", vec![Message::user("hi")], None)
        .await
        .unwrap();

    assert_eq!(response.content, "recovered");
}

#[tokio::test]
async fn test_api_error_message_extracted() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(json!({ "error": { "message": "context too long" } })),
        )
        .mount(&server)
        .await;

    let client = LLMClient::new("sk-test", server.uri(), 10, 1, None).unwrap();
    let err = client
        .complete("openai/gpt-4o-mini", vec![Message::user("hi")], None)
        .await
        .unwrap_err();

    match err {
        CouncilError::Api(ApiError::ApiError { status, message }) => {
            assert_eq!(status, 400);
            assert_eq!(message, "context too long");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_missing_content_is_invalid_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
        .mount(&server)
        .await;

    let client = LLMClient::new("sk-test", server.uri(), 10, 1, None).unwrap();
    let err = client
        .complete("openai/gpt-4o-mini", vec![Message::user("hi")], None)
        .await
        .unwrap_err();

    assert!(matches!(err, CouncilError::Api(ApiError::InvalidResponse(_))));
}

#[tokio::test]
async fn test_client_error_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(400))
        .expect(1)
        .mount(&server)
        .await;

    let client = LLMClient::new("sk-test", server.uri(), 10, 3, None).unwrap();
    let err = client
        .complete("openai/gpt-4o-mini", vec![Message::user("hi")], None)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        CouncilError::Api(ApiError::ApiError { status: 400, .. })
    ));
}

#[tokio::test]
async fn test_rate_limited_with_garbage_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "NaN"))
        .expect(1)
        .mount(&server)
        .await;

    let client = LLMClient::new("sk-test", server.uri(), 10, 1, None).unwrap();
    let err = client
        .complete("openai/gpt-4o-mini", vec![Message::user("hi")], None)
        .await
        .unwrap_err();

    assert!(matches!(err, CouncilError::RateLimited { retry_after: None }));
    assert_eq!(client.rate_limiter().stats().total_429s, 1);
}

#[tokio::test]
async fn test_rate_limited_with_negative_retry_after_then_recovers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "-1"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("after 429")))
        .mount(&server)
        .await;

    let client = LLMClient::new("sk-test", server.uri(), 10, 2, None).unwrap();
    let response = client
        .complete("openai/gpt-4o-mini", vec![Message::user("hi")], None)
        .await
        .unwrap();

    assert_eq!(response.content, "after 429");
    assert_eq!(client.rate_limiter().stats().total_requests, 2);
}

#[tokio::test]
async fn test_negative_reset_header_on_success_is_ignored() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(completion_body("fine"))
                .insert_header("x-ratelimit-remaining-requests", "0")
                .insert_header("x-ratelimit-reset-requests", "-30"),
        )
        .mount(&server)
        .await;

    let client = LLMClient::new("sk-test", server.uri(), 10, 1, None).unwrap();
    let response = client
        .complete("openai/gpt-4o-mini", vec![Message::user("hi")], None)
        .await
        .unwrap();

    assert_eq!(response.content, "fine");
    assert_eq!(
        client.rate_limiter().wait_if_needed("openai/gpt-4o-mini").await,
        Duration::ZERO
    );
}

#[tokio::test]
async fn test_rate_limited_judge_surfaces_as_judge_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({ "model": "m1" })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(completion_body("Paris."))
                .insert_header("x-ratelimit-reset-requests", "-1"),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({ "model": "judge/model" })))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "-1"))
        .mount(&server)
        .await;

    let client = LLMClient::new("sk-test", server.uri(), 10, 1, None).unwrap();
    let tiers = TiersConfig {
        lite: Some(vec!["m1".to_string()]),
        ..Default::default()
    };
    let orchestrator = ConsensusOrchestrator::new(
        Arc::new(client),
        RosterSelector::from_config(&tiers).unwrap(),
        Judge::new("judge/model"),
        OrchestratorSettings::default(),
    );

    let err = orchestrator
        .synthesize("Capital of France?", Tier::Lite)
        .await
        .unwrap_err();

    match err {
        CouncilError::JudgeFailed { model, source } => {
            assert_eq!(model, "judge/model");
            assert!(matches!(*source, CouncilError::RateLimited { retry_after: None }));
        }
        other => panic!("expected JudgeFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn test_health_check_reports_status() {
    let healthy = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/models"))
        .and(header("authorization", "Bearer sk-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
        .mount(&healthy)
        .await;

    let client = LLMClient::new("sk-test", healthy.uri(), 10, 1, None).unwrap();
    let result = client.health_check().await;
    assert_eq!(result.status, HealthStatus::Healthy);
    assert!(result.latency_ms.is_some());
    assert!(result.error.is_none());

    let failing = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/models"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&failing)
        .await;

    let client = LLMClient::new("sk-test", failing.uri(), 10, 1, None).unwrap();
    let result = client.health_check().await;
    assert_eq!(result.status, HealthStatus::Unhealthy);
    assert_eq!(result.error.as_deref(), Some("HTTP 503"));
}
