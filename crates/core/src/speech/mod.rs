//! Speech-synthesis boundary: text in, playable audio out.

mod elevenlabs;
mod silent;

use std::{io::Cursor, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;

use crate::types::DeliveryStyle;

pub use elevenlabs::ElevenLabsSpeech;
pub use silent::SilentSpeech;

#[derive(Debug, thiserror::Error)]
pub enum SpeechError {
    #[error("Missing API key: {env_var} environment variable is not set")]
    MissingApiKey { env_var: String },

    #[error("Speech service rejected the credentials (HTTP {status})")]
    Unauthorized { status: u16 },

    #[error("Speech service is unreachable: {0}")]
    Unreachable(#[source] reqwest::Error),

    #[error("Speech request failed (HTTP {status}): {reason}")]
    Rejected { status: u16, reason: String },

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Could not render audio: {0}")]
    Render(String),
}

impl SpeechError {
    /// Fatal errors mean no entry can succeed; anything else only loses one line.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SpeechError::MissingApiKey { .. }
                | SpeechError::Unauthorized { .. }
                | SpeechError::Unreachable(_)
        )
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SpeechRequest<'a> {
    pub text: &'a str,
    pub voice_id: &'a str,
    pub style: DeliveryStyle,
}

/// A resolved, playable audio unit for one commentary entry.
#[derive(Debug, Clone, PartialEq)]
pub struct NarrationResource {
    pub audio: Bytes,
    pub content_type: String,
}

impl NarrationResource {
    pub fn new(audio: impl Into<Bytes>, content_type: impl Into<String>) -> Self {
        Self {
            audio: audio.into(),
            content_type: content_type.into(),
        }
    }

    /// Exact length for WAV payloads; other codecs need a decoder and return `None`.
    pub fn wav_duration(&self) -> Option<Duration> {
        let reader = hound::WavReader::new(Cursor::new(self.audio.as_ref())).ok()?;
        let spec = reader.spec();
        if spec.sample_rate == 0 {
            return None;
        }
        Some(Duration::from_secs_f64(
            reader.duration() as f64 / spec.sample_rate as f64,
        ))
    }

    pub fn file_extension(&self) -> &'static str {
        match self.content_type.as_str() {
            "audio/wav" | "audio/x-wav" | "audio/wave" => "wav",
            "audio/ogg" => "ogg",
            _ => "mp3",
        }
    }
}

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, request: &SpeechRequest<'_>) -> Result<NarrationResource, SpeechError>;
}

const WORDS_PER_SECOND: f64 = 2.6;

/// Rough spoken length of `text` at the given delivery rate.
pub fn estimate_speech_duration(text: &str, style: DeliveryStyle) -> Duration {
    let words = text.split_whitespace().count().max(1) as f64;
    let rate = if style.rate > 0.0 { style.rate as f64 } else { 1.0 };
    Duration::from_secs_f64((words / WORDS_PER_SECOND / rate).max(0.5))
}
