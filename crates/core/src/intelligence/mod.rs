//! Commentary-service boundary: a video reference and its duration in, a raw
//! timecode array out. Normalization happens later, in the store.

mod extract;
mod gemini;
mod prompts;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::types::VideoReference;

pub use extract::{extract_timecodes, timecodes_from_text};
pub use gemini::GeminiCommentary;

#[derive(Debug, thiserror::Error)]
pub enum CommentaryError {
    #[error("Missing API key: {env_var} environment variable is not set")]
    MissingApiKey { env_var: String },

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Commentary service returned HTTP {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Could not read video for upload: {0}")]
    VideoRead(#[from] std::io::Error),

    #[error("Failed to extract timecodes: {reason}")]
    Extraction { reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommentaryRequest {
    pub video: VideoReference,
    pub duration_seconds: f64,
}

#[async_trait]
pub trait CommentaryService: Send + Sync {
    /// Raw timecode array as produced by the service, not yet validated.
    async fn generate(&self, request: &CommentaryRequest) -> Result<Value, CommentaryError>;
}

/// Canned commentary for debug mode; never touches the network.
#[derive(Debug, Default, Clone)]
pub struct ScriptedCommentary {
    timecodes: Option<Value>,
}

impl ScriptedCommentary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timecodes(timecodes: Value) -> Self {
        Self {
            timecodes: Some(timecodes),
        }
    }

    fn default_timecodes() -> Value {
        json!([
            {"time": "00:00", "text": "Maroon team explodes off the mark!", "excitementLevel": 2},
            {"time": "00:03", "text": "Dribbling masterclass! Blue team scrambling!", "excitementLevel": 4},
            {"time": "00:06", "text": "He shoots! Is it going in?!", "excitementLevel": 5},
        ])
    }
}

#[async_trait]
impl CommentaryService for ScriptedCommentary {
    async fn generate(&self, _request: &CommentaryRequest) -> Result<Value, CommentaryError> {
        Ok(self
            .timecodes
            .clone()
            .unwrap_or_else(Self::default_timecodes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_commentary_is_well_formed() {
        let request = CommentaryRequest {
            video: VideoReference::local("clip.mp4"),
            duration_seconds: 9.0,
        };
        let timecodes = ScriptedCommentary::new().generate(&request).await.unwrap();
        let (entries, warnings) = crate::store::normalize(&timecodes).into_result().unwrap();
        assert_eq!(entries.len(), 3);
        assert!(warnings.is_empty());
    }
}
