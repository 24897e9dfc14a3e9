use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::CallError;

/// Parameters for one outbound call. Built fresh per call, never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct CallRequest {
    pub assistant_id: String,
    pub phone_number_id: String,
    /// E.164 number to dial. Format is left to the calling service.
    pub customer_number: String,
    /// Substitutions for the assistant's script.
    pub variables: BTreeMap<String, String>,
    /// Earliest dispatch time; `None` dials immediately.
    pub scheduled_at: Option<DateTime<Utc>>,
}

impl CallRequest {
    pub fn new(
        assistant_id: impl Into<String>,
        phone_number_id: impl Into<String>,
        customer_number: impl Into<String>,
    ) -> Self {
        Self {
            assistant_id: assistant_id.into(),
            phone_number_id: phone_number_id.into(),
            customer_number: customer_number.into(),
            variables: BTreeMap::new(),
            scheduled_at: None,
        }
    }

    pub fn with_variable(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(key.into(), value.into());
        self
    }

    pub fn with_variables<I, K, V>(mut self, variables: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.variables
            .extend(variables.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn scheduled_at(mut self, at: DateTime<Utc>) -> Self {
        self.scheduled_at = Some(at);
        self
    }

    /// Local checks run before any network call.
    pub fn validate(&self) -> Result<(), CallError> {
        if self.phone_number_id.trim().is_empty() {
            return Err(CallError::InvalidArgument(
                "phone number id is required".to_string(),
            ));
        }
        if self.customer_number.trim().is_empty() {
            return Err(CallError::InvalidArgument(
                "customer number is required".to_string(),
            ));
        }
        Ok(())
    }
}

/// Service-assigned identifier of a created call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallHandle {
    pub id: String,
}

// ============================================================================
// Call record as returned by GET /call/{id}
// ============================================================================

/// The subset of the calling service's call object that analysis reads.
/// Every field may be absent, `null`, or of an unexpected type; such
/// values decode to `None` instead of failing the record.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallRecord {
    #[serde(default, deserialize_with = "lenient")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient")]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient")]
    pub destination: Option<PartyNumber>,
    #[serde(default, deserialize_with = "lenient")]
    pub customer: Option<PartyNumber>,
    #[serde(default, deserialize_with = "lenient")]
    pub structured_data: Option<StructuredData>,
    #[serde(default, deserialize_with = "lenient")]
    pub messages: Option<Vec<CallMessage>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PartyNumber {
    #[serde(default, deserialize_with = "lenient")]
    pub number: Option<String>,
}

/// Fields the assistant extracted from the conversation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredData {
    #[serde(default, deserialize_with = "lenient_strings")]
    pub main_topics: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient_strings")]
    pub customer_preferences: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient_strings")]
    pub customer_questions: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient_strings")]
    pub action_items: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient")]
    pub overall_sentiment: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub appointment_confirmed: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallMessage {
    #[serde(default, deserialize_with = "lenient")]
    pub role: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub message: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub seconds_from_start: Option<f64>,
}

/// Decode a field as `T`, or `None` when it has the wrong shape.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// Decode a list of strings, keeping only the string entries.
fn lenient_strings<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Array(items) => Some(
            items
                .into_iter()
                .filter_map(|item| match item {
                    serde_json::Value::String(s) => Some(s),
                    _ => None,
                })
                .collect(),
        ),
        _ => None,
    })
}

impl CallRecord {
    pub const COMPLETED: &'static str = "completed";

    pub fn is_completed(&self) -> bool {
        self.status.as_deref() == Some(Self::COMPLETED)
    }
}
