use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::call::{CallMessage, CallRecord};
use crate::error::CallError;

/// Normalized view of a completed call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub call_id: String,
    /// When the call started.
    pub timestamp: Option<DateTime<Utc>>,
    pub duration_seconds: Option<f64>,
    pub status: String,
    pub customer_phone: Option<String>,
    pub main_topics: Vec<String>,
    pub customer_preferences: Vec<String>,
    pub customer_questions: Vec<String>,
    pub action_items: Vec<String>,
    pub overall_sentiment: Option<String>,
    pub appointment_confirmed: bool,
    pub transcript: Vec<TranscriptEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub role: String,
    pub content: Option<String>,
    pub offset_seconds: Option<f64>,
}

impl From<CallMessage> for TranscriptEntry {
    fn from(msg: CallMessage) -> Self {
        Self {
            role: msg.role.unwrap_or_default(),
            content: msg.message,
            offset_seconds: msg.seconds_from_start,
        }
    }
}

impl AnalysisResult {
    /// Project a raw call object as returned by the service.
    ///
    /// `status` is read before anything else, so a call that has not
    /// completed reports `NotReady` however its other fields look. Only a
    /// body that is not a JSON object fails with `AnalysisFetch`.
    pub fn from_call_json(value: serde_json::Value) -> Result<Self, CallError> {
        let status = match value.as_object() {
            Some(call) => call.get("status").cloned(),
            None => {
                return Err(CallError::AnalysisFetch {
                    status: None,
                    message: "invalid response: expected a call object".to_string(),
                })
            }
        };

        match status {
            Some(serde_json::Value::String(s)) if s == CallRecord::COMPLETED => {}
            Some(serde_json::Value::String(s)) => return Err(CallError::NotReady { status: s }),
            Some(serde_json::Value::Null) | None => {
                return Err(CallError::NotReady {
                    status: "unknown".to_string(),
                })
            }
            Some(other) => {
                return Err(CallError::NotReady {
                    status: other.to_string(),
                })
            }
        }

        let record: CallRecord =
            serde_json::from_value(value).map_err(|e| CallError::AnalysisFetch {
                status: None,
                message: format!("invalid response: {}", e),
            })?;
        Self::from_record(record)
    }

    /// Project a call record into an analysis.
    ///
    /// Fails with `NotReady` unless the status is exactly `completed`. Every
    /// structured field falls back to empty / `false` / `None` when missing.
    pub fn from_record(record: CallRecord) -> Result<Self, CallError> {
        if !record.is_completed() {
            return Err(CallError::NotReady {
                status: record.status.unwrap_or_else(|| "unknown".to_string()),
            });
        }

        let duration_seconds = match (record.started_at, record.ended_at) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds() as f64 / 1000.0),
            _ => None,
        };

        let customer_phone = record
            .destination
            .and_then(|d| d.number)
            .or_else(|| record.customer.and_then(|c| c.number));

        let data = record.structured_data.unwrap_or_default();

        Ok(Self {
            call_id: record.id.unwrap_or_default(),
            timestamp: record.started_at,
            duration_seconds,
            status: CallRecord::COMPLETED.to_string(),
            customer_phone,
            main_topics: data.main_topics.unwrap_or_default(),
            customer_preferences: data.customer_preferences.unwrap_or_default(),
            customer_questions: data.customer_questions.unwrap_or_default(),
            action_items: data.action_items.unwrap_or_default(),
            overall_sentiment: data.overall_sentiment.filter(|s| !s.is_empty()),
            appointment_confirmed: data.appointment_confirmed.unwrap_or(false),
            transcript: record
                .messages
                .unwrap_or_default()
                .into_iter()
                .map(TranscriptEntry::from)
                .collect(),
        })
    }
}
