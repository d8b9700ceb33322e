use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use common::{Error, OracleClient, OracleRequest, Result};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// REST client for the Gemini `generateContent` endpoint.
///
/// Requests structured JSON output: the prompt plus the decision schema are
/// sent in one call and the first candidate's text is returned verbatim.
pub struct GeminiClient {
    api_key: String,
    model: String,
    base_url: String,
    http: Client,
}

impl GeminiClient {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = Client::builder()
            .use_rustls_tls()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

#[async_trait]
impl OracleClient for GeminiClient {
    async fn submit(&self, request: &OracleRequest) -> Result<String> {
        let body = GenerateRequest::new(request);
        debug!(model = %self.model, prompt_len = request.prompt.len(), "Submitting prompt to Gemini");

        let resp = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = resp.status();
        let text = resp.text().await.map_err(transport_error)?;

        if !status.is_success() {
            return Err(Error::OracleUnavailable(format!(
                "HTTP {status}: {}",
                text.chars().take(300).collect::<String>()
            )));
        }
        extract_text(&text)
    }

    fn name(&self) -> &str {
        &self.model
    }
}

fn transport_error(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::OracleTimeout(e.to_string())
    } else {
        Error::OracleUnavailable(e.to_string())
    }
}

/// Pull the generated text out of a `generateContent` response body.
/// Multiple parts of the first candidate are concatenated.
pub fn extract_text(body: &str) -> Result<String> {
    let resp: GenerateResponse = serde_json::from_str(body)
        .map_err(|e| Error::OracleUnavailable(format!("unexpected response body: {e}")))?;

    let text: String = resp
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|content| content.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        let reason = resp
            .prompt_feedback
            .and_then(|f| f.block_reason)
            .unwrap_or_else(|| "empty candidate".to_string());
        return Err(Error::OracleUnavailable(format!("no text returned: {reason}")));
    }
    Ok(text)
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig<'a>,
}

impl<'a> GenerateRequest<'a> {
    fn new(request: &'a OracleRequest) -> Self {
        Self {
            contents: vec![Content {
                role: "user",
                parts: vec![Part {
                    text: &request.prompt,
                }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
                response_schema: &request.schema,
                temperature: 0.2,
            },
        }
    }
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'a str,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig<'a> {
    response_mime_type: &'a str,
    response_schema: &'a Value,
    temperature: f32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_body_carries_prompt_and_schema() {
        let req = OracleRequest {
            prompt: "decide".into(),
            schema: json!({"type": "OBJECT"}),
        };
        let body = serde_json::to_value(GenerateRequest::new(&req)).unwrap();
        assert_eq!(body["contents"][0]["parts"][0]["text"], "decide");
        assert_eq!(
            body["generationConfig"]["responseMimeType"],
            "application/json"
        );
        assert_eq!(body["generationConfig"]["responseSchema"]["type"], "OBJECT");
    }

    #[test]
    fn extracts_candidate_text() {
        let body = json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "{\"action\":"}, {"text": "\"HOLD\"}"}]},
                "finishReason": "STOP"
            }]
        })
        .to_string();
        assert_eq!(extract_text(&body).unwrap(), r#"{"action":"HOLD"}"#);
    }

    #[test]
    fn blocked_prompt_is_unavailable() {
        let body = json!({"promptFeedback": {"blockReason": "SAFETY"}}).to_string();
        match extract_text(&body) {
            Err(Error::OracleUnavailable(msg)) => assert!(msg.contains("SAFETY")),
            other => panic!("expected OracleUnavailable, got {other:?}"),
        }
    }

    #[test]
    fn garbage_body_is_unavailable() {
        assert!(matches!(
            extract_text("<html>502</html>"),
            Err(Error::OracleUnavailable(_))
        ));
    }

    #[test]
    fn endpoint_joins_model() {
        let client = GeminiClient::new(
            "k",
            "gemini-2.5-flash",
            "https://example.test/v1beta/",
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(
            client.endpoint(),
            "https://example.test/v1beta/models/gemini-2.5-flash:generateContent"
        );
        assert_eq!(client.name(), "gemini-2.5-flash");
    }
}
