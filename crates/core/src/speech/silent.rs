use std::io::Cursor;

use async_trait::async_trait;

use super::{
    NarrationResource, SpeechError, SpeechRequest, SpeechSynthesizer, estimate_speech_duration,
};

const SAMPLE_RATE: u32 = 8_000;

/// Debug stand-in: silent WAV as long as the line would take to say.
#[derive(Debug, Default, Clone)]
pub struct SilentSpeech;

impl SilentSpeech {
    pub fn new() -> Self {
        Self
    }

    fn render(seconds: f64) -> Result<Vec<u8>, hound::Error> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: SAMPLE_RATE,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut buffer = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut buffer, spec)?;
            let samples = (seconds * SAMPLE_RATE as f64).round() as u32;
            for _ in 0..samples {
                writer.write_sample(0i16)?;
            }
            writer.finalize()?;
        }
        Ok(buffer.into_inner())
    }
}

#[async_trait]
impl SpeechSynthesizer for SilentSpeech {
    async fn synthesize(&self, request: &SpeechRequest<'_>) -> Result<NarrationResource, SpeechError> {
        let seconds = estimate_speech_duration(request.text, request.style).as_secs_f64();
        let audio = Self::render(seconds).map_err(|e| SpeechError::Render(e.to_string()))?;
        Ok(NarrationResource::new(audio, "audio/wav"))
    }
}

#[cfg(test)]
mod tests {
    use crate::types::DeliveryStyle;

    use super::*;

    #[tokio::test]
    async fn renders_wav_matching_estimated_length() {
        let request = SpeechRequest {
            text: "He shoots! Is it going in?!",
            voice_id: "ignored",
            style: DeliveryStyle::NEUTRAL,
        };
        let resource = SilentSpeech::new().synthesize(&request).await.unwrap();
        assert_eq!(resource.content_type, "audio/wav");

        let expected = estimate_speech_duration(request.text, request.style).as_secs_f64();
        let actual = resource.wav_duration().unwrap().as_secs_f64();
        assert!((expected - actual).abs() < 0.01, "{expected} vs {actual}");
    }
}
