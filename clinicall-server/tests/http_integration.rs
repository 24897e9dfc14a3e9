//! HTTP integration tests for the Clinicall REST API
//!
//! Router tests run against a scripted `CallLifecycle` fake. The end-to-end
//! tests wire the real `VapiClient` to a wiremock stand-in for the calling
//! service.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use clinicall_core::{
    AnalysisResult, CallError, CallHandle, CallLifecycle, CallRequest, ClinicallConfig,
    VapiClient, VapiConfig,
};
use clinicall_server::http::{build_router, HttpState};
use serde_json::json;
use tower::ServiceExt;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Records initiated requests and answers fetches with a fixed status.
struct FakeCalls {
    initiated: Mutex<Vec<CallRequest>>,
    fetch_status: &'static str,
}

impl FakeCalls {
    fn new(fetch_status: &'static str) -> Arc<Self> {
        Arc::new(Self {
            initiated: Mutex::new(Vec::new()),
            fetch_status,
        })
    }
}

#[async_trait]
impl CallLifecycle for FakeCalls {
    async fn initiate_call(&self, request: &CallRequest) -> Result<CallHandle, CallError> {
        request.validate()?;
        self.initiated.lock().unwrap().push(request.clone());
        Ok(CallHandle {
            id: "fake-call-1".to_string(),
        })
    }

    async fn fetch_analysis(&self, call_id: &str) -> Result<AnalysisResult, CallError> {
        if self.fetch_status != "completed" {
            return Err(CallError::NotReady {
                status: self.fetch_status.to_string(),
            });
        }
        Ok(AnalysisResult {
            call_id: call_id.to_string(),
            timestamp: None,
            duration_seconds: Some(42.0),
            status: "completed".to_string(),
            customer_phone: Some("+15551234567".to_string()),
            main_topics: vec!["braces".to_string()],
            customer_preferences: vec![],
            customer_questions: vec![],
            action_items: vec![],
            overall_sentiment: Some("positive".to_string()),
            appointment_confirmed: true,
            transcript: vec![],
        })
    }

    fn name(&self) -> &str {
        "fake"
    }
}

fn test_config() -> ClinicallConfig {
    let mut config = ClinicallConfig::default();
    config.vapi = VapiConfig {
        api_key: "test-api-key".to_string(),
        assistant_id: "asst-123".to_string(),
        phone_number_id: "pn-456".to_string(),
        timeout_seconds: 5,
        ..VapiConfig::default()
    };
    config
}

fn state_with(calls: Arc<dyn CallLifecycle>) -> Arc<HttpState> {
    Arc::new(HttpState {
        config: test_config(),
        calls,
    })
}

fn clinic_form() -> serde_json::Value {
    json!({
        "phone_number": "+15551234567",
        "clinic_name": "Northside Dental",
        "doctor_name": "Dr. Ruiz",
        "speciality": "Orthodontics",
        "procedures": ["Braces", "Whitening"]
    })
}

async fn send(
    state: Arc<HttpState>,
    req: Request<Body>,
) -> (StatusCode, serde_json::Value) {
    let resp = build_router(state).oneshot(req).await.unwrap();
    let status = resp.status();
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap_or(json!(null));
    (status, json)
}

fn post_json(uri: &str, body: &serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

// ===========================================================================
// Router tests against the fake
// ===========================================================================

#[tokio::test]
async fn test_version_endpoint() {
    let (status, body) = send(state_with(FakeCalls::new("completed")), get("/version")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["version"].is_string());
    assert_eq!(body["protocol"], "clinicall/1");
}

#[tokio::test]
async fn test_health_endpoint_reports_backend() {
    let (status, body) = send(state_with(FakeCalls::new("completed")), get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["backend"], "fake");
    assert_eq!(body["vapi_configured"], true);
}

#[tokio::test]
async fn test_place_call_passes_form_variables() {
    let fake = FakeCalls::new("completed");
    let (status, body) = send(state_with(fake.clone()), post_json("/calls", &clinic_form())).await;

    assert_eq!(status, StatusCode::OK, "body: {:?}", body);
    assert_eq!(body["call_id"], "fake-call-1");

    let initiated = fake.initiated.lock().unwrap();
    assert_eq!(initiated.len(), 1);
    let req = &initiated[0];
    assert_eq!(req.assistant_id, "asst-123");
    assert_eq!(req.phone_number_id, "pn-456");
    assert_eq!(req.customer_number, "+15551234567");
    assert_eq!(req.variables["procedures"], "Braces, Whitening");
    assert_eq!(req.variables["clinicName"], "Northside Dental");
}

#[tokio::test]
async fn test_place_call_with_schedule() {
    let fake = FakeCalls::new("completed");
    let mut form = clinic_form();
    form["scheduled_at"] = json!("2026-10-17T14:30:00Z");

    let (status, body) = send(state_with(fake.clone()), post_json("/calls", &form)).await;
    assert_eq!(status, StatusCode::OK, "body: {:?}", body);
    assert!(body["scheduled_at"].is_string());

    let initiated = fake.initiated.lock().unwrap();
    assert!(initiated[0].scheduled_at.is_some());
}

#[tokio::test]
async fn test_place_call_missing_fields_is_bad_request() {
    let fake = FakeCalls::new("completed");
    let form = json!({
        "phone_number": "+15551234567",
        "clinic_name": "Northside Dental",
        "procedures": []
    });

    let (status, body) = send(state_with(fake.clone()), post_json("/calls", &form)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");
    assert_eq!(body["error"], "Please fill in all fields");
    assert!(fake.initiated.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_place_call_without_phone_number_id_is_bad_request() {
    let mut config = test_config();
    config.vapi.phone_number_id = String::new();
    let state = Arc::new(HttpState {
        config,
        calls: FakeCalls::new("completed"),
    });

    let (status, body) = send(state, post_json("/calls", &clinic_form())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("phone number id"));
}

#[tokio::test]
async fn test_analysis_endpoint_returns_result() {
    let (status, body) = send(
        state_with(FakeCalls::new("completed")),
        get("/calls/call-xyz/analysis"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["call_id"], "call-xyz");
    assert_eq!(body["duration_seconds"], 42.0);
    assert_eq!(body["appointment_confirmed"], true);
    assert_eq!(body["main_topics"], json!(["braces"]));
}

#[tokio::test]
async fn test_analysis_endpoint_not_ready_is_conflict() {
    let (status, body) = send(
        state_with(FakeCalls::new("in-progress")),
        get("/calls/call-xyz/analysis"),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["call_status"], "in-progress");
    assert_eq!(body["status"], "error");
}

// ===========================================================================
// End-to-end: router -> VapiClient -> wiremock calling service
// ===========================================================================

async fn vapi_state(mock_server: &MockServer) -> Arc<HttpState> {
    let config = test_config();
    let client = VapiClient::with_base_url(config.vapi.clone(), mock_server.uri())
        .expect("Failed to create client");
    Arc::new(HttpState {
        config,
        calls: Arc::new(client),
    })
}

#[tokio::test]
async fn test_end_to_end_place_call() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/call"))
        .and(header("authorization", "Bearer test-api-key"))
        .and(body_partial_json(json!({
            "assistantId": "asst-123",
            "phoneNumberId": "pn-456",
            "customer": { "number": "+15551234567" },
            "assistantOverrides": {
                "variableValues": { "procedures": "Braces, Whitening" }
            }
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": "vapi-call-9" })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let (status, body) = send(vapi_state(&mock_server).await, post_json("/calls", &clinic_form())).await;
    assert_eq!(status, StatusCode::OK, "body: {:?}", body);
    assert_eq!(body["call_id"], "vapi-call-9");
}

#[tokio::test]
async fn test_end_to_end_service_rejection_is_bad_gateway() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/call"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "message": "Invalid Key. Hot tip, you may be using the private key instead of the public key, or vice versa."
        })))
        .mount(&mock_server)
        .await;

    let (status, body) = send(vapi_state(&mock_server).await, post_json("/calls", &clinic_form())).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["service_status"], 401);
    assert!(body["error"].as_str().unwrap().contains("Invalid Key"));
}

#[tokio::test]
async fn test_end_to_end_analysis() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/call/vapi-call-9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "vapi-call-9",
            "status": "completed",
            "startedAt": "2026-10-16T10:00:00.000Z",
            "endedAt": "2026-10-16T10:02:05.000Z",
            "destination": { "number": "+15551234567" },
            "messages": [
                { "role": "assistant", "message": "Hello", "secondsFromStart": 2.5 },
                { "role": "user", "message": "Hi", "secondsFromStart": 3.0 }
            ]
        })))
        .mount(&mock_server)
        .await;

    let (status, body) = send(
        vapi_state(&mock_server).await,
        get("/calls/vapi-call-9/analysis"),
    )
    .await;

    assert_eq!(status, StatusCode::OK, "body: {:?}", body);
    assert_eq!(body["duration_seconds"], 125.0);
    assert_eq!(body["customer_phone"], "+15551234567");
    assert_eq!(body["main_topics"], json!([]));
    assert!(body["overall_sentiment"].is_null());
    assert_eq!(body["appointment_confirmed"], false);
    assert_eq!(
        body["transcript"][0],
        json!({ "role": "assistant", "content": "Hello", "offset_seconds": 2.5 })
    );
    assert_eq!(body["transcript"][1]["role"], "user");
}

#[tokio::test]
async fn test_end_to_end_analysis_not_found_is_bad_gateway() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "message": "Couldn't Get Call. Call Not Found."
        })))
        .mount(&mock_server)
        .await;

    let (status, body) = send(
        vapi_state(&mock_server).await,
        get("/calls/nope/analysis"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["service_status"], 404);
}

#[tokio::test]
async fn test_end_to_end_analysis_keeps_encoded_id_in_one_segment() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/call/..%2Fassistant"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "in-progress"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let (status, body) = send(
        vapi_state(&mock_server).await,
        get("/calls/..%2Fassistant/analysis"),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT, "body: {:?}", body);
    assert_eq!(body["call_status"], "in-progress");

    let requests = mock_server.received_requests().await.unwrap();
    assert!(requests.iter().all(|r| r.url.path() != "/assistant"));
}
