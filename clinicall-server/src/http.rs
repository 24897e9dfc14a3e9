//! Clinicall HTTP API
//!
//! Axum server that places clinic calls and serves their analysis. Each
//! endpoint has a thin axum handler that delegates to a pure inner function,
//! so the logic is testable without axum dispatch.
//!
//! Endpoints:
//! - GET  /health              — health check with credential status
//! - GET  /version             — server version info
//! - POST /calls               — place an outbound clinic call
//! - GET  /calls/:id/analysis  — analysis of a completed call

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use clinicall_core::{CallError, CallLifecycle, CallRequest, ClinicallConfig};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::broadcast;

/// Shared state for all HTTP handlers
#[derive(Clone)]
pub struct HttpState {
    pub config: ClinicallConfig,
    pub calls: Arc<dyn CallLifecycle>,
}

/// Build the Axum router with all endpoints
pub fn build_router(state: Arc<HttpState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        .route("/calls", post(place_call_handler))
        .route("/calls/:id/analysis", get(analysis_handler))
        .with_state(state)
}

/// Start the HTTP server on the configured address.
/// Gracefully shuts down when the broadcast shutdown signal fires.
pub async fn start_http_server(
    state: Arc<HttpState>,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let addr = format!("{}:{}", state.config.http.host, state.config.http.port);

    let app = build_router(state);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Clinicall HTTP API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server shutting down...");
        })
        .await?;

    Ok(())
}

// ============================================================================
// Request / Response DTOs
// ============================================================================

/// Fields collected by the clinic call form.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct ClinicCallForm {
    pub phone_number: String,
    pub clinic_name: String,
    pub doctor_name: String,
    pub speciality: String,
    pub procedures: Vec<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
}

impl ClinicCallForm {
    fn procedures(&self) -> Vec<&str> {
        self.procedures
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .collect()
    }

    /// Every text field filled and at least one procedure.
    pub fn is_complete(&self) -> bool {
        [
            &self.phone_number,
            &self.clinic_name,
            &self.doctor_name,
            &self.speciality,
        ]
        .iter()
        .all(|f| !f.trim().is_empty())
            && !self.procedures().is_empty()
    }

    /// Script variables handed to the assistant.
    pub fn variables(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("clinicName".to_string(), self.clinic_name.trim().to_string()),
            ("doctorName".to_string(), self.doctor_name.trim().to_string()),
            ("speciality".to_string(), self.speciality.trim().to_string()),
            ("procedures".to_string(), self.procedures().join(", ")),
        ])
    }

    pub fn into_call_request(self, config: &ClinicallConfig) -> CallRequest {
        let variables = self.variables();
        let request = CallRequest::new(
            config.vapi.assistant_id.as_str(),
            config.vapi.phone_number_id.as_str(),
            self.phone_number.trim(),
        )
        .with_variables(variables);

        match self.scheduled_at {
            Some(at) => request.scheduled_at(at),
            None => request,
        }
    }
}

/// Standard HTTP error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub status: String,
}

impl ErrorResponse {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            error: msg.into(),
            status: "error".to_string(),
        }
    }
}

// ============================================================================
// Inner (directly testable) business logic functions
// ============================================================================

/// Inner health check — reports whether credentials are configured (no IO).
pub fn health_inner(config: &ClinicallConfig, backend: &str) -> (StatusCode, serde_json::Value) {
    (
        StatusCode::OK,
        serde_json::json!({
            "status": "healthy",
            "version": env!("CARGO_PKG_VERSION"),
            "backend": backend,
            "vapi_configured": config.vapi.is_complete(),
        }),
    )
}

/// Inner version — returns version info (pure, no IO).
pub fn version_inner() -> serde_json::Value {
    serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "protocol": "clinicall/1",
    })
}

/// Inner place-call — validates the form and initiates the call.
pub async fn place_call_inner(
    calls: &dyn CallLifecycle,
    config: &ClinicallConfig,
    req: ClinicCallForm,
) -> (StatusCode, serde_json::Value) {
    if !req.is_complete() {
        return (
            StatusCode::BAD_REQUEST,
            serde_json::json!(ErrorResponse::new("Please fill in all fields")),
        );
    }

    let request = req.into_call_request(config);

    match calls.initiate_call(&request).await {
        Ok(handle) => {
            tracing::info!(call_id = %handle.id, "Call initiated");
            (
                StatusCode::OK,
                serde_json::json!({
                    "call_id": handle.id,
                    "scheduled_at": request.scheduled_at,
                }),
            )
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to initiate call");
            error_to_http(&e)
        }
    }
}

/// Inner analysis — fetches and projects the call record.
pub async fn analysis_inner(
    calls: &dyn CallLifecycle,
    call_id: &str,
) -> (StatusCode, serde_json::Value) {
    match calls.fetch_analysis(call_id).await {
        Ok(analysis) => match serde_json::to_value(&analysis) {
            Ok(body) => (StatusCode::OK, body),
            Err(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                serde_json::json!(ErrorResponse::new(e.to_string())),
            ),
        },
        Err(e) => {
            match &e {
                CallError::NotReady { status } => {
                    tracing::info!(call_id = %call_id, call_status = %status, "Call not ready for analysis")
                }
                _ => tracing::error!(call_id = %call_id, error = %e, "Failed to get call analysis"),
            }
            error_to_http(&e)
        }
    }
}

// ============================================================================
// Axum handler wrappers (thin — delegate to inner functions)
// ============================================================================

pub async fn health_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = health_inner(&state.config, state.calls.name());
    (status, Json(body))
}

pub async fn version_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(version_inner()))
}

pub async fn place_call_handler(
    State(state): State<Arc<HttpState>>,
    Json(req): Json<ClinicCallForm>,
) -> impl IntoResponse {
    let (status, body) = place_call_inner(state.calls.as_ref(), &state.config, req).await;
    (status, Json(body))
}

pub async fn analysis_handler(
    State(state): State<Arc<HttpState>>,
    Path(call_id): Path<String>,
) -> impl IntoResponse {
    let (status, body) = analysis_inner(state.calls.as_ref(), &call_id).await;
    (status, Json(body))
}

// ============================================================================
// Helpers
// ============================================================================

/// Map a call-lifecycle failure onto an HTTP status and error body.
pub fn error_to_http(e: &CallError) -> (StatusCode, serde_json::Value) {
    let status = match e {
        CallError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
        CallError::NotReady { .. } => StatusCode::CONFLICT,
        CallError::CallInitiation { .. } | CallError::AnalysisFetch { .. } => {
            StatusCode::BAD_GATEWAY
        }
        CallError::InvalidBaseUrl(_) | CallError::ClientBuild(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    let mut body = serde_json::json!(ErrorResponse::new(e.to_string()));
    if let Some(obj) = body.as_object_mut() {
        if let CallError::NotReady { status } = e {
            obj.insert("call_status".to_string(), serde_json::json!(status));
        }
        if let Some(code) = e.service_status() {
            obj.insert("service_status".to_string(), serde_json::json!(code));
        }
    }
    (status, body)
}

// ============================================================================
// Unit Tests — call inner functions directly
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn complete_form() -> ClinicCallForm {
        ClinicCallForm {
            phone_number: " +15551234567 ".to_string(),
            clinic_name: "Northside Dental".to_string(),
            doctor_name: "Dr. Ruiz".to_string(),
            speciality: "Orthodontics".to_string(),
            procedures: vec!["Braces".to_string(), "  ".to_string(), "Whitening".to_string()],
            scheduled_at: None,
        }
    }

    #[test]
    fn test_version_inner_pure() {
        let v = version_inner();
        assert!(v["version"].is_string(), "version must be string");
        assert_eq!(v["protocol"], "clinicall/1");
    }

    #[test]
    fn test_health_inner_reports_missing_credentials() {
        let (status, body) = health_inner(&ClinicallConfig::default(), "vapi");
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["backend"], "vapi");
        assert_eq!(body["vapi_configured"], false);
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn test_form_variables_join_procedures() {
        let vars = complete_form().variables();
        assert_eq!(vars["clinicName"], "Northside Dental");
        assert_eq!(vars["doctorName"], "Dr. Ruiz");
        assert_eq!(vars["speciality"], "Orthodontics");
        assert_eq!(vars["procedures"], "Braces, Whitening");
    }

    #[test]
    fn test_form_incomplete_without_procedures() {
        let mut form = complete_form();
        form.procedures = vec!["   ".to_string()];
        assert!(!form.is_complete());
        assert!(complete_form().is_complete());
    }

    #[test]
    fn test_form_incomplete_with_blank_field() {
        let mut form = complete_form();
        form.doctor_name = "  ".to_string();
        assert!(!form.is_complete());
    }

    #[test]
    fn test_into_call_request_uses_configured_ids() {
        let mut config = ClinicallConfig::default();
        config.vapi.assistant_id = "asst-1".to_string();
        config.vapi.phone_number_id = "pn-1".to_string();

        let req = complete_form().into_call_request(&config);
        assert_eq!(req.assistant_id, "asst-1");
        assert_eq!(req.phone_number_id, "pn-1");
        assert_eq!(req.customer_number, "+15551234567");
        assert_eq!(req.variables.len(), 4);
        assert_eq!(req.scheduled_at, None);
    }

    #[test]
    fn test_error_to_http_status_mapping() {
        let (s, body) = error_to_http(&CallError::NotReady {
            status: "ringing".to_string(),
        });
        assert_eq!(s, StatusCode::CONFLICT);
        assert_eq!(body["call_status"], "ringing");
        assert_eq!(body["status"], "error");

        let (s, _) = error_to_http(&CallError::InvalidArgument("x".to_string()));
        assert_eq!(s, StatusCode::BAD_REQUEST);

        let (s, body) = error_to_http(&CallError::CallInitiation {
            status: Some(401),
            message: "Invalid Key".to_string(),
        });
        assert_eq!(s, StatusCode::BAD_GATEWAY);
        assert_eq!(body["service_status"], 401);
        assert!(body["error"].as_str().unwrap().contains("Invalid Key"));

        let (s, body) = error_to_http(&CallError::AnalysisFetch {
            status: None,
            message: "connection refused".to_string(),
        });
        assert_eq!(s, StatusCode::BAD_GATEWAY);
        assert!(body.get("service_status").is_none());
    }
}
