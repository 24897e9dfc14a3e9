use std::fmt;

use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;

/// Default base URL of the external calling service.
pub const DEFAULT_VAPI_BASE_URL: &str = "https://api.vapi.ai";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ClinicallConfig {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub vapi: VapiConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServiceConfig {
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Credentials and ids for the calling service.
///
/// Missing values deserialize to empty strings. Nothing here refuses to
/// start; the service itself rejects requests that lack a field.
#[derive(Deserialize, Clone)]
#[serde(default)]
pub struct VapiConfig {
    pub base_url: String,
    pub api_key: String,
    pub assistant_id: String,
    pub phone_number_id: String,
    pub timeout_seconds: u64,
}

impl Default for VapiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_VAPI_BASE_URL.to_string(),
            api_key: String::new(),
            assistant_id: String::new(),
            phone_number_id: String::new(),
            timeout_seconds: 30,
        }
    }
}

impl fmt::Debug for VapiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let api_key = if self.api_key.is_empty() { "" } else { "<redacted>" };
        f.debug_struct("VapiConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &api_key)
            .field("assistant_id", &self.assistant_id)
            .field("phone_number_id", &self.phone_number_id)
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

impl VapiConfig {
    /// Fill empty credentials from the conventional `VAPI_*` variables.
    pub fn with_env_fallbacks<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let fields = [
            (&mut self.api_key, "VAPI_API_KEY"),
            (&mut self.assistant_id, "VAPI_ASSISTANT_ID"),
            (&mut self.phone_number_id, "VAPI_PHONE_NUMBER_ID"),
        ];
        for (field, var) in fields {
            if field.is_empty() {
                if let Some(value) = lookup(var) {
                    *field = value;
                }
            }
        }
        self
    }

    /// True when the api key, assistant id and phone number id are all set.
    pub fn is_complete(&self) -> bool {
        !self.api_key.is_empty() && !self.assistant_id.is_empty() && !self.phone_number_id.is_empty()
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8780,
        }
    }
}

impl ClinicallConfig {
    /// Load from an optional TOML file, then `CLINICALL_*` environment
    /// variables (`CLINICALL_VAPI__API_KEY` sets `vapi.api_key`).
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix("CLINICALL")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;
        let mut config: Self = s.try_deserialize()?;
        config.vapi = config.vapi.with_env_fallbacks(|k| std::env::var(k).ok());
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from_str(contents, FileFormat::Toml))
            .build()?
            .try_deserialize()
    }
}
