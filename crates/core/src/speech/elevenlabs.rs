use async_trait::async_trait;
use reqwest::StatusCode;

use super::{NarrationResource, SpeechError, SpeechRequest, SpeechSynthesizer};
use crate::config::{ELEVEN_LABS_API_KEY, SpeechConfig};

pub struct ElevenLabsSpeech {
    client: reqwest::Client,
    api_base: String,
    model_id: String,
    api_key: Option<String>,
}

impl ElevenLabsSpeech {
    pub fn new(client: reqwest::Client, config: &SpeechConfig) -> Self {
        Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            model_id: config.model_id.clone(),
            api_key: config.api_key.clone(),
        }
    }

    fn endpoint(&self, voice_id: &str) -> String {
        format!("{}/v1/text-to-speech/{}", self.api_base, voice_id)
    }
}

#[async_trait]
impl SpeechSynthesizer for ElevenLabsSpeech {
    async fn synthesize(&self, request: &SpeechRequest<'_>) -> Result<NarrationResource, SpeechError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| SpeechError::MissingApiKey {
                env_var: ELEVEN_LABS_API_KEY.to_string(),
            })?;

        let response = self
            .client
            .post(self.endpoint(request.voice_id))
            .header("Content-Type", "application/json")
            .header("Accept", "audio/mpeg")
            .header("xi-api-key", api_key)
            .json(&serde_json::json!({
                "text": request.text,
                "model_id": self.model_id,
                "voice_settings": {
                    "stability": 0.75,
                    "similarity_boost": 0.75,
                },
            }))
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    SpeechError::Unreachable(e)
                } else {
                    SpeechError::HttpError(e)
                }
            })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(SpeechError::Unauthorized {
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            let reason = response.text().await.unwrap_or_default();
            return Err(SpeechError::Rejected {
                status: status.as_u16(),
                reason,
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("audio/mpeg")
            .to_string();
        let audio = response.bytes().await?;

        Ok(NarrationResource::new(audio, content_type))
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        stub_http::{self, StubServer, closed_base_url},
        types::DeliveryStyle,
    };

    use super::*;

    fn config(api_key: Option<&str>) -> SpeechConfig {
        SpeechConfig {
            api_base: "https://api.elevenlabs.io/".to_string(),
            model_id: "eleven_monolingual_v1".to_string(),
            voice_id: "voice".to_string(),
            api_key: api_key.map(str::to_string),
        }
    }

    #[test]
    fn builds_voice_endpoint() {
        let speech = ElevenLabsSpeech::new(reqwest::Client::new(), &config(Some("k")));
        assert_eq!(
            speech.endpoint("JBFqnCBsd6RMkjVDRZzb"),
            "https://api.elevenlabs.io/v1/text-to-speech/JBFqnCBsd6RMkjVDRZzb"
        );
    }

    #[tokio::test]
    async fn missing_key_is_fatal_before_any_request() {
        let speech = ElevenLabsSpeech::new(reqwest::Client::new(), &config(None));
        let err = speech
            .synthesize(&SpeechRequest {
                text: "Goal!",
                voice_id: "voice",
                style: DeliveryStyle::NEUTRAL,
            })
            .await
            .unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(err, SpeechError::MissingApiKey { .. }));
    }

    fn stub_speech(base: &str) -> ElevenLabsSpeech {
        let config = SpeechConfig {
            api_base: base.to_string(),
            ..config(Some("k"))
        };
        ElevenLabsSpeech::new(stub_http::client(), &config)
    }

    async fn say(speech: &ElevenLabsSpeech) -> Result<NarrationResource, SpeechError> {
        speech
            .synthesize(&SpeechRequest {
                text: "Goal!",
                voice_id: "voice",
                style: DeliveryStyle::NEUTRAL,
            })
            .await
    }

    #[tokio::test]
    async fn audio_body_becomes_the_resource() {
        let server = StubServer::start(vec![(200, "ID3audio".to_string())]).await;
        let resource = say(&stub_speech(&server.base_url)).await.unwrap();
        assert_eq!(resource.audio.as_ref(), b"ID3audio");
        assert!(server.finish().await[0].starts_with("POST /v1/text-to-speech/voice "));
    }

    #[tokio::test]
    async fn rejected_credentials_are_fatal() {
        for status in [401, 403] {
            let server = StubServer::start(vec![(status, "{}".to_string())]).await;
            let err = say(&stub_speech(&server.base_url)).await.unwrap_err();
            assert!(matches!(err, SpeechError::Unauthorized { status: s } if s == status));
            assert!(err.is_fatal());
        }
    }

    #[tokio::test]
    async fn server_error_only_loses_the_line() {
        let server = StubServer::start(vec![(500, "overloaded".to_string())]).await;
        let err = say(&stub_speech(&server.base_url)).await.unwrap_err();
        assert!(matches!(err, SpeechError::Rejected { status: 500, ref reason } if reason == "overloaded"));
        assert!(!err.is_fatal());
    }

    #[tokio::test]
    async fn unreachable_service_is_fatal() {
        let err = say(&stub_speech(&closed_base_url().await)).await.unwrap_err();
        assert!(matches!(err, SpeechError::Unreachable(_)));
        assert!(err.is_fatal());
    }
}
