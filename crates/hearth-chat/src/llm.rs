//! Text generation backend and helpers for reading generative output.
//!
//! Both the intent parser and the generative reranker expect free text that
//! may carry a `Reasoning:` section followed by a JSON payload, possibly
//! wrapped in Markdown code fences.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

use hearth_core::config::GeminiConfig;

use crate::error::ChatError;

/// A generative model that turns a prompt into free text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, ChatError>;
}

// ---------------------------------------------------------------------------
// GeminiGenerator - generateContent calls
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct GeminiGenerator {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl GeminiGenerator {
    pub fn new(api_key: impl Into<String>, config: &GeminiConfig) -> Result<Self, ChatError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ChatError::Generation(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.chat_model.clone(),
            temperature: config.temperature,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl TextGenerator for GeminiGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, ChatError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );
        let body = GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
            },
        };

        let resp = match self.client.post(&url).json(&body).send().await {
            Ok(r) => r,
            Err(e) if e.is_timeout() => {
                return Err(ChatError::Generation("generation request timed out".to_string()));
            }
            Err(e) if e.is_connect() => {
                return Err(ChatError::Generation(format!("generation connect error: {}", e)));
            }
            Err(e) => return Err(ChatError::Generation(e.to_string())),
        };

        let status = resp.status();
        if status != StatusCode::OK {
            let text = resp.text().await.unwrap_or_default();
            return Err(ChatError::Generation(format!(
                "generation API returned {}: {}",
                status, text
            )));
        }

        let parsed: GenerateResponse = resp
            .json()
            .await
            .map_err(|e| ChatError::Generation(format!("Invalid generation response: {}", e)))?;

        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(ChatError::Generation("Empty generation returned".to_string()));
        }
        debug!(model = %self.model, chars = text.len(), "Generated text via Gemini");
        Ok(text)
    }
}

// ---------------------------------------------------------------------------
// Output extraction
// ---------------------------------------------------------------------------

static CODE_FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```[a-zA-Z]*").expect("Invalid code fence regex"));

static REASONING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)Reasoning:(.*?)(?:JSON:|\z)").expect("Invalid reasoning regex")
});

static JSON_OBJECT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{.*\}").expect("Invalid JSON object regex"));

static JSON_ARRAY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\[.*\]").expect("Invalid JSON array regex"));

/// Remove Markdown code fence markers, keeping their contents.
pub fn strip_code_fences(text: &str) -> String {
    CODE_FENCE_RE.replace_all(text, "").into_owned()
}

/// The trimmed text after `Reasoning:` up to `JSON:` or the end.
pub fn extract_reasoning(text: &str) -> Option<String> {
    REASONING_RE
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// The outermost `{ ... }` span, first brace to last brace.
pub fn extract_json_object(text: &str) -> Option<&str> {
    JSON_OBJECT_RE.find(text).map(|m| m.as_str())
}

/// The outermost `[ ... ]` span, first bracket to last bracket.
pub fn extract_json_array(text: &str) -> Option<&str> {
    JSON_ARRAY_RE.find(text).map(|m| m.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> GeminiConfig {
        GeminiConfig {
            base_url: server.uri(),
            timeout_secs: 5,
            ..GeminiConfig::default()
        }
    }

    // ---- Extraction ----

    #[test]
    fn test_extract_reasoning_and_json() {
        let text = "Reasoning:\nUser wants a beach house.\n\nJSON:\n{\"type\": \"search\"}";
        assert_eq!(
            extract_reasoning(text).as_deref(),
            Some("User wants a beach house.")
        );
        assert_eq!(extract_json_object(text), Some("{\"type\": \"search\"}"));
    }

    #[test]
    fn test_extract_reasoning_without_json_label() {
        assert_eq!(
            extract_reasoning("reasoning: just chatting").as_deref(),
            Some("just chatting")
        );
        assert!(extract_reasoning("no label here").is_none());
    }

    #[test]
    fn test_extract_json_array_spans_nested_objects() {
        let text = "Here: [{\"id\": \"a\"}, {\"id\": \"b\"}] done";
        assert_eq!(
            extract_json_array(text),
            Some("[{\"id\": \"a\"}, {\"id\": \"b\"}]")
        );
        assert!(extract_json_array("nothing").is_none());
    }

    #[test]
    fn test_strip_code_fences() {
        let fenced = "```json\n{\"type\": \"booking\"}\n```";
        let stripped = strip_code_fences(fenced);
        assert_eq!(stripped.trim(), "{\"type\": \"booking\"}");
    }

    // ---- GeminiGenerator ----

    #[tokio::test]
    async fn test_gemini_generate_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
            .and(query_param("key", "test-key"))
            .and(body_partial_json(json!({"generationConfig": {"temperature": 0.7}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{
                    "content": {"parts": [{"text": "Reasoning: hi\n"}, {"text": "JSON: {}"}]}
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let generator = GeminiGenerator::new("test-key", &config_for(&server)).unwrap();
        let text = generator.generate("hello").await.unwrap();
        assert_eq!(text, "Reasoning: hi\nJSON: {}");
    }

    #[tokio::test]
    async fn test_gemini_generate_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("quota exceeded"))
            .mount(&server)
            .await;

        let generator = GeminiGenerator::new("k", &config_for(&server)).unwrap();
        let err = generator.generate("hello").await.unwrap_err();
        match err {
            ChatError::Generation(msg) => {
                assert!(msg.contains("429"));
                assert!(msg.contains("quota exceeded"));
            }
            other => panic!("expected Generation, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_gemini_generate_no_candidates() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"candidates": []})))
            .mount(&server)
            .await;

        let generator = GeminiGenerator::new("k", &config_for(&server)).unwrap();
        assert!(matches!(
            generator.generate("hello").await,
            Err(ChatError::Generation(_))
        ));
    }

    #[tokio::test]
    async fn test_gemini_generate_connect_error() {
        let config = GeminiConfig {
            base_url: "http://127.0.0.1:1".to_string(),
            timeout_secs: 2,
            ..GeminiConfig::default()
        };
        let generator = GeminiGenerator::new("k", &config).unwrap();
        assert!(matches!(
            generator.generate("hello").await,
            Err(ChatError::Generation(_))
        ));
    }
}
