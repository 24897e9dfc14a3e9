pub mod client;
pub mod config;
pub mod error;
pub mod models;

pub use client::{CallLifecycle, VapiClient};
pub use config::{ClinicallConfig, HttpConfig, VapiConfig};
pub use error::CallError;
pub use models::{AnalysisResult, CallHandle, CallRecord, CallRequest, TranscriptEntry};
