//! Explicit configuration, read once at startup and handed to the services.

use crate::error::{PlaycallError, Result};

pub const GEMINI_API_KEY: &str = "GEMINI_API_KEY";
pub const GEMINI_MODEL: &str = "GEMINI_MODEL";
pub const GEMINI_API_BASE: &str = "GEMINI_API_BASE";
pub const ELEVEN_LABS_API_KEY: &str = "ELEVEN_LABS_API_KEY";
pub const VOICE_ID: &str = "PLAYCALL_VOICE_ID";
pub const DEBUG: &str = "PLAYCALL_DEBUG";
pub const UPLOAD_ENDPOINT: &str = "PLAYCALL_UPLOAD_ENDPOINT";
pub const MAX_SIZE_MB: &str = "PLAYCALL_MAX_SIZE_MB";
pub const MAX_DURATION_SECS: &str = "PLAYCALL_MAX_DURATION_SECS";

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_base: String,
    pub model: String,
    pub api_key: Option<String>,
}

impl GeminiConfig {
    pub fn require_key(&self) -> Result<&str> {
        require(&self.api_key, GEMINI_API_KEY)
    }
}

#[derive(Debug, Clone)]
pub struct SpeechConfig {
    pub api_base: String,
    pub model_id: String,
    pub voice_id: String,
    pub api_key: Option<String>,
}

impl SpeechConfig {
    pub fn require_key(&self) -> Result<&str> {
        require(&self.api_key, ELEVEN_LABS_API_KEY)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UploadLimits {
    pub max_size_mb: f64,
    pub max_duration_secs: f64,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_size_mb: 10.0,
            max_duration_secs: 16.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub gemini: GeminiConfig,
    pub speech: SpeechConfig,
    pub limits: UploadLimits,
    pub upload_endpoint: Option<String>,
    pub debug: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let defaults = UploadLimits::default();

        Ok(Self {
            gemini: GeminiConfig {
                api_base: get(GEMINI_API_BASE)
                    .unwrap_or_else(|| "https://generativelanguage.googleapis.com".to_string()),
                model: get(GEMINI_MODEL).unwrap_or_else(|| "gemini-2.0-flash-exp".to_string()),
                api_key: get(GEMINI_API_KEY),
            },
            speech: SpeechConfig {
                api_base: "https://api.elevenlabs.io".to_string(),
                model_id: "eleven_monolingual_v1".to_string(),
                voice_id: get(VOICE_ID).unwrap_or_else(|| "JBFqnCBsd6RMkjVDRZzb".to_string()),
                api_key: get(ELEVEN_LABS_API_KEY),
            },
            limits: UploadLimits {
                max_size_mb: parse_number(get(MAX_SIZE_MB), MAX_SIZE_MB)?
                    .unwrap_or(defaults.max_size_mb),
                max_duration_secs: parse_number(get(MAX_DURATION_SECS), MAX_DURATION_SECS)?
                    .unwrap_or(defaults.max_duration_secs),
            },
            upload_endpoint: get(UPLOAD_ENDPOINT),
            debug: get(DEBUG).is_some_and(|value| value.trim().eq_ignore_ascii_case("true")),
        })
    }
}

fn require<'a>(value: &'a Option<String>, env_var: &str) -> Result<&'a str> {
    value.as_deref().ok_or_else(|| PlaycallError::MissingApiKey {
        env_var: env_var.to_string(),
    })
}

fn parse_number(value: Option<String>, key: &str) -> Result<Option<f64>> {
    value
        .map(|raw| match raw.trim().parse::<f64>() {
            Ok(number) if number.is_finite() && number > 0.0 => Ok(number),
            _ => Err(PlaycallError::validation(format!(
                "{key} must be a positive number, got {raw:?}"
            ))),
        })
        .transpose()
}
