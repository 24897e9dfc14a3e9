//! Call-lifecycle client for the external calling service.
//!
//! Two operations, each a single HTTP round trip:
//! - **initiate_call** — `POST /call`, returns the created call's id
//! - **fetch_analysis** — `GET /call/{id}`, projects a completed call into an
//!   [`AnalysisResult`]
//!
//! No retries, no polling, no caching. Callers poll `fetch_analysis` until
//! it stops returning [`CallError::NotReady`].

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::SecondsFormat;
use reqwest::{Client, Response, StatusCode, Url};
use serde::{Deserialize, Serialize};

use crate::config::VapiConfig;
use crate::error::CallError;
use crate::models::{AnalysisResult, CallHandle, CallRequest};

// ============================================================================
// CallLifecycle trait
// ============================================================================

/// Place outbound calls and read their analysis.
#[async_trait]
pub trait CallLifecycle: Send + Sync {
    /// Create an outbound call and return its handle.
    async fn initiate_call(&self, request: &CallRequest) -> Result<CallHandle, CallError>;

    /// Fetch a call and project it. Fails with `NotReady` until the call
    /// has completed.
    async fn fetch_analysis(&self, call_id: &str) -> Result<AnalysisResult, CallError>;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

// ============================================================================
// Wire structs (private)
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateCallBody<'a> {
    assistant_id: &'a str,
    phone_number_id: &'a str,
    customer: CustomerBody<'a>,
    assistant_overrides: AssistantOverrides<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    schedule_plan: Option<SchedulePlan>,
}

#[derive(Debug, Serialize)]
struct CustomerBody<'a> {
    number: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AssistantOverrides<'a> {
    variable_values: &'a BTreeMap<String, String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SchedulePlan {
    earliest_at: String,
}

impl<'a> From<&'a CallRequest> for CreateCallBody<'a> {
    fn from(req: &'a CallRequest) -> Self {
        Self {
            assistant_id: &req.assistant_id,
            phone_number_id: &req.phone_number_id,
            customer: CustomerBody {
                number: &req.customer_number,
            },
            assistant_overrides: AssistantOverrides {
                variable_values: &req.variables,
            },
            schedule_plan: req.scheduled_at.map(|at| SchedulePlan {
                earliest_at: at.to_rfc3339_opts(SecondsFormat::Millis, true),
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CreatedCall {
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ServiceErrorBody {
    message: Option<serde_json::Value>,
}

/// Pull the service's `message` out of an error body. The service sends
/// either a string or a list of validation strings.
fn service_error_message(status: StatusCode, body: &str) -> String {
    let message = serde_json::from_str::<ServiceErrorBody>(body)
        .ok()
        .and_then(|b| b.message)
        .and_then(|m| match m {
            serde_json::Value::String(s) if !s.is_empty() => Some(s),
            serde_json::Value::Array(items) => {
                let parts: Vec<String> = items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect();
                (!parts.is_empty()).then(|| parts.join("; "))
            }
            _ => None,
        });

    message.unwrap_or_else(|| {
        status
            .canonical_reason()
            .map(str::to_string)
            .unwrap_or_else(|| status.to_string())
    })
}

/// Split a non-2xx response into (status, message).
async fn rejection(response: Response) -> (u16, String) {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    (status.as_u16(), service_error_message(status, &body))
}

// ============================================================================
// VapiClient
// ============================================================================

/// Call-lifecycle client for the Vapi REST API.
///
/// `Debug` goes through [`VapiConfig`]'s, which never prints the api key.
#[derive(Debug, Clone)]
pub struct VapiClient {
    client: Client,
    config: VapiConfig,
    base_url: Url,
}

impl VapiClient {
    pub fn new(config: VapiConfig) -> Result<Self, CallError> {
        let base_url = config.base_url.clone();
        Self::with_base_url(config, base_url)
    }

    /// Create a client with a custom base URL (for testing / integration)
    pub fn with_base_url(config: VapiConfig, base_url: String) -> Result<Self, CallError> {
        if config.api_key.is_empty() {
            tracing::warn!("Calling service api key is empty; requests will be rejected");
        }

        let base_url = Url::parse(base_url.trim())
            .map_err(|e| CallError::InvalidBaseUrl(format!("{}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(CallError::InvalidBaseUrl(base_url.to_string()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(CallError::ClientBuild)?;

        Ok(Self {
            client,
            config,
            base_url,
        })
    }

    /// Append path segments to the base URL. Each segment is percent-encoded
    /// on its own, so `/`, `?` and `#` inside an id stay inside that segment.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Start a request with the configured assistant and default phone number.
    pub fn request_for(&self, customer_number: impl Into<String>) -> CallRequest {
        CallRequest::new(
            self.config.assistant_id.clone(),
            self.config.phone_number_id.clone(),
            customer_number,
        )
    }

    pub fn config(&self) -> &VapiConfig {
        &self.config
    }

    async fn create_call(&self, request: &CallRequest) -> Result<CallHandle, CallError> {
        request.validate()?;

        let url = self.endpoint(&["call"]);
        let body = CreateCallBody::from(request);

        tracing::debug!(
            customer = %request.customer_number,
            scheduled = request.scheduled_at.is_some(),
            variables = request.variables.len(),
            "Creating outbound call"
        );

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| CallError::CallInitiation {
                status: None,
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            let (status, message) = rejection(response).await;
            return Err(CallError::CallInitiation {
                status: Some(status),
                message,
            });
        }

        let created: CreatedCall = response.json().await.map_err(|e| CallError::CallInitiation {
            status: None,
            message: format!("invalid response: {}", e),
        })?;

        match created.id {
            Some(id) if !id.is_empty() => Ok(CallHandle { id }),
            _ => Err(CallError::CallInitiation {
                status: None,
                message: "response did not contain a call id".to_string(),
            }),
        }
    }

    /// Fetch the raw call object. Field interpretation is left to
    /// [`AnalysisResult::from_call_json`].
    async fn get_call(&self, call_id: &str) -> Result<serde_json::Value, CallError> {
        let url = self.endpoint(&["call", call_id]);

        tracing::debug!(call_id = %call_id, "Fetching call record");

        let response = self
            .client
            .get(url)
            .bearer_auth(&self.config.api_key)
            .send()
            .await
            .map_err(|e| CallError::AnalysisFetch {
                status: None,
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            let (status, message) = rejection(response).await;
            return Err(CallError::AnalysisFetch {
                status: Some(status),
                message,
            });
        }

        response.json().await.map_err(|e| CallError::AnalysisFetch {
            status: None,
            message: format!("invalid response: {}", e),
        })
    }
}

#[async_trait]
impl CallLifecycle for VapiClient {
    async fn initiate_call(&self, request: &CallRequest) -> Result<CallHandle, CallError> {
        self.create_call(request).await
    }

    async fn fetch_analysis(&self, call_id: &str) -> Result<AnalysisResult, CallError> {
        let call_id = call_id.trim();
        if call_id.is_empty() {
            return Err(CallError::InvalidArgument(
                "Call ID is required for analysis".to_string(),
            ));
        }

        if call_id == "." || call_id == ".." {
            return Err(CallError::InvalidArgument(format!(
                "'{}' is not a valid call id",
                call_id
            )));
        }

        let mut analysis = AnalysisResult::from_call_json(self.get_call(call_id).await?)?;
        if analysis.call_id.is_empty() {
            analysis.call_id = call_id.to_string();
        }
        Ok(analysis)
    }

    fn name(&self) -> &str {
        "vapi"
    }
}

// ============================================================================
// TESTS
// ============================================================================
