//! HTTP-level tests for the chat completions gateway backend.

use heatline::client::{Client, ClientError, StreamingClient};
use heatline::model::{AdvisoryQuery, ChatRequest, LocationType, RiskLevel, ZoneContext};
use heatline::options::{HttpTransport, ModelOptions, TransportOptions};
use heatline::providers::gateway::{GatewayClient, CHAT_SYSTEM_PROMPT};
use heatline::session::{SessionState, StreamConsumer, StreamSession};
use heatline::zones::zone_by_id;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Default)]
struct Collect {
    text: String,
    errors: Vec<String>,
    done: usize,
}

impl StreamConsumer for Collect {
    fn on_delta(&mut self, text: &str) {
        self.text.push_str(text);
    }

    fn on_done(&mut self) {
        self.done += 1;
    }

    fn on_error(&mut self, error: &ClientError) {
        self.errors.push(error.to_string());
    }
}

fn client(server: &MockServer) -> GatewayClient {
    GatewayClient::new(
        ModelOptions::default(),
        TransportOptions::new(HttpTransport::new("gw-key").with_base_url(format!("{}/v1", server.uri()))),
    )
    .unwrap()
}

fn completion(content: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "choices": [{"index": 0, "message": {"role": "assistant", "content": content}}]
    }))
}

#[tokio::test]
async fn test_chat_stream_sends_system_and_zone_messages() {
    let server = MockServer::start().await;
    let body = [
        format!("data: {}\n\n", json!({"choices": [{"delta": {"role": "assistant"}}]})),
        format!("data: {}\n\n", json!({"choices": [{"delta": {"content": "Avoid noon."}}]})),
        "data: [DONE]\n\n".to_string(),
    ]
    .concat();

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({
            "model": "google/gemini-3-flash-preview",
            "temperature": 0.5,
            "stream": true
        })))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .expect(1)
        .mount(&server)
        .await;

    let zone = ZoneContext::from(zone_by_id("zone-8").unwrap());
    let request = ChatRequest::new("When should I commute?").with_zone(zone);
    let mut collect = Collect::default();

    let state = StreamSession::new()
        .run(&client(&server), &request, &mut collect)
        .await;

    assert_eq!(state, SessionState::Completed);
    assert_eq!(collect.text, "Avoid noon.");
    assert_eq!(collect.done, 1);

    let requests = server.received_requests().await.unwrap();
    let sent: serde_json::Value = requests[0].body_json().unwrap();
    let messages = sent["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[0]["content"], CHAT_SYSTEM_PROMPT);
    assert_eq!(messages[1]["role"], "system");
    assert!(messages[1]["content"]
        .as_str()
        .unwrap()
        .starts_with("Current zone context - The user is viewing: Transit Hub Central."));
    assert_eq!(messages[2], json!({"role": "user", "content": "When should I commute?"}));
}

#[tokio::test]
async fn test_gateway_rate_limit_uses_fixed_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(429)
                .set_body_json(json!({"error": {"message": "too many requests", "type": "rate_limit"}})),
        )
        .mount(&server)
        .await;

    let mut collect = Collect::default();
    let state = StreamSession::new()
        .run(&client(&server), &ChatRequest::new("hi"), &mut collect)
        .await;

    assert_eq!(state, SessionState::Failed);
    assert_eq!(collect.errors, vec!["Rate limit exceeded. Please try again later."]);
    assert_eq!(collect.done, 1);

    let err = client(&server)
        .advisory_for("Manila", LocationType::Urban)
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::RateLimited(_)));
}

#[tokio::test]
async fn test_advisory_from_fenced_completion() {
    let server = MockServer::start().await;
    let advisory = json!({
        "riskLevel": "EXTREME",
        "predictedHeatSummary": "Heat index peaks at 51°C around 2 PM.",
        "recommendations": (1..=5)
            .map(|i| json!({"id": i, "text": format!("Tip {}", i), "icon": "🚨"}))
            .collect::<Vec<_>>(),
        "rationale": "Dense pavement and humidity trap heat.",
        "confidenceScore": 0.9,
        "usedFallback": false
    });

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({"temperature": 0.3})))
        .respond_with(completion(&format!("```json\n{}\n```", advisory)))
        .expect(1)
        .mount(&server)
        .await;

    let query = AdvisoryQuery::new("Binondo", LocationType::Urban).with_readings(38.0, 72.0, 48.0);
    let result = client(&server).request_advisory(&query).await.unwrap();

    assert_eq!(result.risk_level, RiskLevel::Extreme);
    assert!(!result.used_fallback);
    assert_eq!(result.confidence_score, 0.9);

    let requests = server.received_requests().await.unwrap();
    let sent: serde_json::Value = requests[0].body_json().unwrap();
    assert!(sent.get("stream").is_none());
    assert!(sent["messages"][1]["content"]
        .as_str()
        .unwrap()
        .contains("- Heat Index: 48°C"));
}

#[tokio::test]
async fn test_advisory_prose_completion_falls_back() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(completion("Sorry, I can only answer in prose today."))
        .mount(&server)
        .await;

    let advisory = client(&server)
        .advisory_for("Quezon City", LocationType::Campus)
        .await
        .unwrap();

    assert!(advisory.used_fallback);
    assert_eq!(advisory.risk_level, RiskLevel::High);
    assert_eq!(advisory.confidence_score, 0.6);
}

#[tokio::test]
async fn test_advisory_gateway_failure_is_conservative() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let advisory = client(&server)
        .advisory_for("Pasay", LocationType::Coastal)
        .await
        .unwrap();

    assert!(advisory.used_fallback);
    assert_eq!(advisory.risk_level, RiskLevel::Moderate);
    assert_eq!(advisory.confidence_score, 0.3);
    assert_eq!(advisory.error.as_deref(), Some("AI gateway error: 500"));
}
