use thiserror::Error;

/// Failures of the call lifecycle.
///
/// `status` on the two service variants is the HTTP code when the calling
/// service answered with a non-2xx response, and `None` when the request
/// never got a usable answer (connection refused, timeout, undecodable body).
#[derive(Error, Debug)]
pub enum CallError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Failed to make outbound call: {message}")]
    CallInitiation { status: Option<u16>, message: String },

    #[error("Call analysis not available: call status is {status}")]
    NotReady { status: String },

    #[error("Failed to get call details: {message}")]
    AnalysisFetch { status: Option<u16>, message: String },

    #[error("Invalid calling service base URL: {0}")]
    InvalidBaseUrl(String),

    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
}

impl CallError {
    /// HTTP status returned by the calling service, if it answered at all.
    pub fn service_status(&self) -> Option<u16> {
        match self {
            CallError::CallInitiation { status, .. } | CallError::AnalysisFetch { status, .. } => {
                *status
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_ready_message_carries_status() {
        let e = CallError::NotReady {
            status: "in-progress".to_string(),
        };
        assert_eq!(
            e.to_string(),
            "Call analysis not available: call status is in-progress"
        );
    }

    #[test]
    fn test_service_status_only_for_service_failures() {
        let rejected = CallError::CallInitiation {
            status: Some(400),
            message: "bad number".to_string(),
        };
        let unreachable = CallError::AnalysisFetch {
            status: None,
            message: "connection refused".to_string(),
        };
        assert_eq!(rejected.service_status(), Some(400));
        assert_eq!(unreachable.service_status(), None);
        assert_eq!(
            CallError::InvalidArgument("x".to_string()).service_status(),
            None
        );
    }
}
