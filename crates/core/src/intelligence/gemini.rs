use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use serde_json::{Value, json};
use tokio::fs;
use tracing::{debug, warn};

use super::{
    CommentaryError, CommentaryRequest, CommentaryService, extract_timecodes,
    prompts::{
        COMMENTATOR_INSTRUCTION, REFINE_INSTRUCTION, key_moments_prompt, refine_prompt,
        set_timecodes_declaration,
    },
};
use crate::{
    config::{GEMINI_API_KEY, GeminiConfig},
    types::VideoReference,
};

/// Two-pass Gemini client: describe the key moments, then refine them.
/// A failed refinement falls back to the first pass.
pub struct GeminiCommentary {
    client: reqwest::Client,
    api_base: String,
    model: String,
    api_key: Option<String>,
}

impl GeminiCommentary {
    pub fn new(client: reqwest::Client, config: &GeminiConfig) -> Self {
        Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.api_base, self.model
        )
    }

    async fn call(&self, api_key: &str, body: &Value) -> Result<Value, CommentaryError> {
        let response = self
            .client
            .post(self.endpoint())
            .header("Content-Type", "application/json")
            .header("x-goog-api-key", api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(CommentaryError::Api {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let response = response.json::<Value>().await?;
        debug!(%response, "generateContent response");
        Ok(response)
    }

    /// Remote videos are referenced by URI; local files are sent inline.
    async fn video_part(video: &VideoReference) -> Result<Value, CommentaryError> {
        match video {
            VideoReference::Remote { uri, mime_type } => Ok(json!({
                "fileData": {"mimeType": mime_type, "fileUri": uri},
            })),
            VideoReference::Local { path, mime_type } => {
                let bytes = fs::read(path).await?;
                Ok(json!({
                    "inlineData": {"mimeType": mime_type, "data": STANDARD.encode(bytes)},
                }))
            }
        }
    }

    fn request_body(instruction: &str, parts: Vec<Value>) -> Value {
        json!({
            "systemInstruction": {"parts": [{"text": instruction}]},
            "contents": [{"role": "user", "parts": parts}],
            "generationConfig": {"temperature": 0.7},
            "tools": [{"functionDeclarations": [set_timecodes_declaration()]}],
        })
    }

    async fn refine(
        &self,
        api_key: &str,
        duration_seconds: f64,
        initial: &Value,
    ) -> Result<Value, CommentaryError> {
        let body = Self::request_body(
            REFINE_INSTRUCTION,
            vec![json!({"text": refine_prompt(duration_seconds, initial)})],
        );
        let response = self.call(api_key, &body).await?;
        extract_timecodes(&response)
    }
}

#[async_trait]
impl CommentaryService for GeminiCommentary {
    async fn generate(&self, request: &CommentaryRequest) -> Result<Value, CommentaryError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| CommentaryError::MissingApiKey {
                env_var: GEMINI_API_KEY.to_string(),
            })?;

        let body = Self::request_body(
            COMMENTATOR_INSTRUCTION,
            vec![
                json!({"text": key_moments_prompt(request.duration_seconds)}),
                Self::video_part(&request.video).await?,
            ],
        );
        let initial = extract_timecodes(&self.call(api_key, &body).await?)?;

        match self
            .refine(api_key, request.duration_seconds, &initial)
            .await
        {
            Ok(refined) => Ok(refined),
            Err(e) => {
                warn!(error = %e, "refinement pass failed, using first-pass commentary");
                Ok(initial)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stub_http::{self, StubServer};

    fn config(api_key: Option<&str>) -> GeminiConfig {
        GeminiConfig {
            api_base: "https://generativelanguage.googleapis.com/".to_string(),
            model: "gemini-2.0-flash-exp".to_string(),
            api_key: api_key.map(str::to_string),
        }
    }

    #[test]
    fn builds_generate_content_endpoint() {
        let gemini = GeminiCommentary::new(reqwest::Client::new(), &config(Some("k")));
        assert_eq!(
            gemini.endpoint(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash-exp:generateContent"
        );
    }

    #[tokio::test]
    async fn remote_video_is_referenced_by_uri() {
        let part = GeminiCommentary::video_part(&VideoReference::remote("https://cdn/x/clip.mp4"))
            .await
            .unwrap();
        assert_eq!(part["fileData"]["fileUri"], "https://cdn/x/clip.mp4");
        assert_eq!(part["fileData"]["mimeType"], "video/mp4");
    }

    #[tokio::test]
    async fn local_video_is_sent_inline() {
        let file = tempfile::Builder::new().suffix(".webm").tempfile().unwrap();
        std::fs::write(file.path(), b"webm").unwrap();

        let part = GeminiCommentary::video_part(&VideoReference::local(file.path()))
            .await
            .unwrap();
        assert_eq!(part["inlineData"]["mimeType"], "video/webm");
        assert_eq!(part["inlineData"]["data"], STANDARD.encode(b"webm"));
    }

    #[tokio::test]
    async fn missing_key_fails_before_reading_video() {
        let gemini = GeminiCommentary::new(reqwest::Client::new(), &config(None));
        let request = CommentaryRequest {
            video: VideoReference::local("/does/not/exist.mp4"),
            duration_seconds: 6.0,
        };
        assert!(matches!(
            gemini.generate(&request).await,
            Err(CommentaryError::MissingApiKey { .. })
        ));
    }

    fn text_response(text: &str) -> String {
        json!({"candidates": [{"content": {"parts": [{"text": text}]}}]}).to_string()
    }

    fn stub_config(base: &str) -> GeminiConfig {
        GeminiConfig {
            api_base: base.to_string(),
            model: "stub-model".to_string(),
            api_key: Some("k".to_string()),
        }
    }

    fn remote_request() -> CommentaryRequest {
        CommentaryRequest {
            video: VideoReference::remote("https://cdn/x/clip.mp4"),
            duration_seconds: 6.0,
        }
    }

    #[tokio::test]
    async fn refined_commentary_replaces_the_first_pass() {
        let server = StubServer::start(vec![
            (200, text_response(r#"[{"time": "00:00", "text": "draft"}]"#)),
            (200, text_response(r#"[{"time": "00:01", "text": "polished"}]"#)),
        ])
        .await;
        let gemini = GeminiCommentary::new(stub_http::client(), &stub_config(&server.base_url));

        let timecodes = gemini.generate(&remote_request()).await.unwrap();
        assert_eq!(timecodes, json!([{"time": "00:01", "text": "polished"}]));

        let requests = server.finish().await;
        assert_eq!(requests.len(), 2);
        assert!(requests[0].starts_with("POST /v1beta/models/stub-model:generateContent"));
    }

    #[tokio::test]
    async fn failed_refinement_keeps_the_first_pass() {
        let server = StubServer::start(vec![
            (200, text_response(r#"[{"time": "00:00", "text": "draft"}]"#)),
            (500, r#"{"error": "overloaded"}"#.to_string()),
        ])
        .await;
        let gemini = GeminiCommentary::new(stub_http::client(), &stub_config(&server.base_url));

        let timecodes = gemini.generate(&remote_request()).await.unwrap();
        assert_eq!(timecodes, json!([{"time": "00:00", "text": "draft"}]));
        assert_eq!(server.finish().await.len(), 2);
    }

    #[tokio::test]
    async fn failed_first_pass_is_an_error() {
        let server = StubServer::start(vec![(403, r#"{"error": "denied"}"#.to_string())]).await;
        let gemini = GeminiCommentary::new(stub_http::client(), &stub_config(&server.base_url));

        let err = gemini.generate(&remote_request()).await.unwrap_err();
        assert!(matches!(err, CommentaryError::Api { status: 403, .. }));
        assert_eq!(server.finish().await.len(), 1);
    }
}
