use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header::HeaderMap, Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::configuration::{LlmModelType, LlmSettings};

const OPENAI_API_URL: &str = "https://api.openai.com/v1";
const ANTHROPIC_API_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const OLLAMA_API_URL: &str = "http://localhost:11434";
const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com";
const HUGGING_FACE_API_URL: &str = "https://api-inference.huggingface.co";
const GEMINI_SAFETY_CATEGORIES: [&str; 5] = [
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
    "HARM_CATEGORY_CIVIC_INTEGRITY",
];
const MAX_TOKENS: u32 = 4096;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("rate limited")]
    RateLimited { retry_after: Option<Duration> },

    #[error("LLM returned empty content")]
    EmptyContent,
}

/// One completed call.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmReply {
    pub content: String,
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

#[async_trait]
pub trait LlmBackend: Send + Sync {
    async fn invoke(&self, prompt: &str) -> Result<LlmReply, LlmError>;
}

/// Wait requested by a 429 response: `retry-after` seconds, else `retry-after-ms`.
pub fn retry_delay(headers: &HeaderMap) -> Option<Duration> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<f64>().ok())
            .filter(|v| v.is_finite() && *v >= 0.0)
    };

    header("retry-after")
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
        .or_else(|| {
            header("retry-after-ms").and_then(|ms| Duration::try_from_secs_f64(ms / 1000.0).ok())
        })
}

async fn check_status(response: Response) -> Result<Response, LlmError> {
    let status = response.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(LlmError::RateLimited {
            retry_after: retry_delay(response.headers()),
        });
    }
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(LlmError::Api {
            status: status.as_u16(),
            message,
        });
    }
    Ok(response)
}

fn http_client(settings: &LlmSettings) -> Result<Client, LlmError> {
    Ok(Client::builder()
        .timeout(Duration::from_secs(settings.request_timeout_secs))
        .build()?)
}

pub fn build_backend(settings: &LlmSettings, api_key: &str) -> Result<Box<dyn LlmBackend>, LlmError> {
    let client = http_client(settings)?;
    let backend: Box<dyn LlmBackend> = match settings.model_type {
        LlmModelType::OpenAi => Box::new(OpenAiBackend {
            client,
            base_url: settings
                .api_url
                .clone()
                .unwrap_or_else(|| OPENAI_API_URL.to_string()),
            api_key: api_key.to_string(),
            model: settings.model.clone(),
            temperature: settings.temperature,
        }),
        LlmModelType::Claude => Box::new(AnthropicBackend {
            client,
            base_url: settings
                .api_url
                .clone()
                .unwrap_or_else(|| ANTHROPIC_API_URL.to_string()),
            api_key: api_key.to_string(),
            model: settings.model.clone(),
            temperature: settings.temperature,
        }),
        LlmModelType::Ollama => Box::new(OllamaBackend {
            client,
            base_url: settings
                .api_url
                .clone()
                .unwrap_or_else(|| OLLAMA_API_URL.to_string()),
            model: settings.model.clone(),
            temperature: settings.temperature,
        }),
        LlmModelType::Gemini => Box::new(GeminiBackend {
            client,
            base_url: settings
                .api_url
                .clone()
                .unwrap_or_else(|| GEMINI_API_URL.to_string()),
            api_key: api_key.to_string(),
            model: settings.model.clone(),
            temperature: settings.temperature,
        }),
        LlmModelType::HuggingFace => Box::new(OpenAiBackend {
            client,
            base_url: format!(
                "{}/models/{}/v1",
                settings
                    .api_url
                    .as_deref()
                    .unwrap_or(HUGGING_FACE_API_URL)
                    .trim_end_matches('/'),
                settings.model
            ),
            api_key: api_key.to_string(),
            model: settings.model.clone(),
            temperature: settings.temperature,
        }),
    };
    log::info!("Using {:?} backend with model {}", settings.model_type, settings.model);
    Ok(backend)
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

/// Any server speaking the OpenAI chat completions protocol.
pub struct OpenAiBackend {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    model: Option<String>,
    choices: Vec<OpenAiChoice>,
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

#[async_trait]
impl LlmBackend for OpenAiBackend {
    async fn invoke(&self, prompt: &str) -> Result<LlmReply, LlmError> {
        let request = OpenAiRequest {
            model: &self.model,
            temperature: self.temperature,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url.trim_end_matches('/')))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;
        let response: OpenAiResponse = check_status(response).await?.json().await?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(LlmError::EmptyContent)?;
        let (input_tokens, output_tokens) = response
            .usage
            .map(|u| (u.prompt_tokens, u.completion_tokens))
            .unwrap_or_default();

        Ok(LlmReply {
            content,
            model: response.model.unwrap_or_else(|| self.model.clone()),
            input_tokens,
            output_tokens,
        })
    }
}

/// Anthropic messages API.
pub struct AnthropicBackend {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    model: Option<String>,
    content: Vec<ContentBlock>,
    usage: Option<AnthropicUsage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u64,
    output_tokens: u64,
}

#[async_trait]
impl LlmBackend for AnthropicBackend {
    async fn invoke(&self, prompt: &str) -> Result<LlmReply, LlmError> {
        let request = AnthropicRequest {
            model: &self.model,
            max_tokens: MAX_TOKENS,
            temperature: self.temperature,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url.trim_end_matches('/')))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await?;
        let response: AnthropicResponse = check_status(response).await?.json().await?;

        let content = response
            .content
            .into_iter()
            .find(|block| block.block_type == "text")
            .and_then(|block| block.text)
            .filter(|text| !text.trim().is_empty())
            .ok_or(LlmError::EmptyContent)?;
        let (input_tokens, output_tokens) = response
            .usage
            .map(|u| (u.input_tokens, u.output_tokens))
            .unwrap_or_default();

        Ok(LlmReply {
            content,
            model: response.model.unwrap_or_else(|| self.model.clone()),
            input_tokens,
            output_tokens,
        })
    }
}

/// Local Ollama server.
pub struct OllamaBackend {
    client: Client,
    base_url: String,
    model: String,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    stream: bool,
    messages: Vec<ChatMessage<'a>>,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    model: Option<String>,
    message: Option<OllamaMessage>,
    #[serde(default)]
    prompt_eval_count: u64,
    #[serde(default)]
    eval_count: u64,
}

#[derive(Debug, Deserialize)]
struct OllamaMessage {
    content: String,
}

#[async_trait]
impl LlmBackend for OllamaBackend {
    async fn invoke(&self, prompt: &str) -> Result<LlmReply, LlmError> {
        let request = OllamaRequest {
            model: &self.model,
            stream: false,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            options: OllamaOptions {
                temperature: self.temperature,
            },
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url.trim_end_matches('/')))
            .json(&request)
            .send()
            .await?;
        let response: OllamaResponse = check_status(response).await?.json().await?;

        let content = response
            .message
            .map(|m| m.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(LlmError::EmptyContent)?;

        Ok(LlmReply {
            content,
            model: response.model.unwrap_or_else(|| self.model.clone()),
            input_tokens: response.prompt_eval_count,
            output_tokens: response.eval_count,
        })
    }
}

/// Google Gemini `generateContent`.
pub struct GeminiBackend {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest<'a> {
    contents: Vec<GeminiContent<'a>>,
    generation_config: GeminiGenerationConfig,
    safety_settings: Vec<GeminiSafetySetting>,
}

#[derive(Debug, Serialize)]
struct GeminiContent<'a> {
    role: &'a str,
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Debug, Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct GeminiGenerationConfig {
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct GeminiSafetySetting {
    category: &'static str,
    threshold: &'static str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    usage_metadata: Option<GeminiUsage>,
    model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiReplyContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiReplyContent {
    #[serde(default)]
    parts: Vec<GeminiReplyPart>,
}

#[derive(Debug, Deserialize)]
struct GeminiReplyPart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsage {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
}

#[async_trait]
impl LlmBackend for GeminiBackend {
    async fn invoke(&self, prompt: &str) -> Result<LlmReply, LlmError> {
        let request = GeminiRequest {
            contents: vec![GeminiContent {
                role: "user",
                parts: vec![GeminiPart { text: prompt }],
            }],
            generation_config: GeminiGenerationConfig {
                temperature: self.temperature,
            },
            safety_settings: GEMINI_SAFETY_CATEGORIES
                .into_iter()
                .map(|category| GeminiSafetySetting {
                    category,
                    threshold: "BLOCK_NONE",
                })
                .collect(),
        };

        let response = self
            .client
            .post(format!(
                "{}/v1beta/models/{}:generateContent",
                self.base_url.trim_end_matches('/'),
                self.model
            ))
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;
        let response: GeminiResponse = check_status(response).await?.json().await?;

        let content: String = response
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| content.parts.into_iter().filter_map(|part| part.text).collect())
            .unwrap_or_default();
        if content.trim().is_empty() {
            return Err(LlmError::EmptyContent);
        }
        let (input_tokens, output_tokens) = response
            .usage_metadata
            .map(|u| (u.prompt_token_count, u.candidates_token_count))
            .unwrap_or_default();

        Ok(LlmReply {
            content,
            model: response.model_version.unwrap_or_else(|| self.model.clone()),
            input_tokens,
            output_tokens,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use reqwest::header::{HeaderMap, HeaderValue};
    use serde_json::json;
    use wiremock::{
        matchers::{body_partial_json, header, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    use super::{build_backend, retry_delay, LlmError};
    use crate::configuration::{LlmModelType, LlmSettings};

    fn settings(model_type: LlmModelType, server: &MockServer) -> LlmSettings {
        LlmSettings {
            model_type,
            model: "test-model".to_string(),
            api_url: Some(server.uri()),
            ..Default::default()
        }
    }

    #[test]
    fn retry_delay_prefers_seconds_header() {
        let mut headers = HeaderMap::new();
        headers.insert("retry-after-ms", HeaderValue::from_static("1500"));
        assert_eq!(retry_delay(&headers), Some(Duration::from_millis(1500)));

        headers.insert("retry-after", HeaderValue::from_static("7"));
        assert_eq!(retry_delay(&headers), Some(Duration::from_secs(7)));
    }

    #[test]
    fn retry_delay_ignores_garbage() {
        let mut headers = HeaderMap::new();
        assert_eq!(retry_delay(&headers), None);

        headers.insert("retry-after", HeaderValue::from_static("soon"));
        assert_eq!(retry_delay(&headers), None);
    }

    #[test]
    fn retry_delay_rejects_values_beyond_duration() {
        let mut headers = HeaderMap::new();
        headers.insert("retry-after", HeaderValue::from_static("1e30"));
        assert_eq!(retry_delay(&headers), None);

        headers.insert("retry-after-ms", HeaderValue::from_static("250"));
        assert_eq!(retry_delay(&headers), Some(Duration::from_millis(250)));
    }

    #[tokio::test]
    async fn openai_backend_parses_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "model": "gpt-4o-mini-2024-07-18",
                "choices": [{"message": {"role": "assistant", "content": "Score: 8"}}],
                "usage": {"prompt_tokens": 12, "completion_tokens": 3, "total_tokens": 15}
            })))
            .mount(&server)
            .await;

        let backend = build_backend(&settings(LlmModelType::OpenAi, &server), "sk-test").unwrap();
        let reply = backend.invoke("hello").await.unwrap();

        assert_eq!(reply.content, "Score: 8");
        assert_eq!(reply.model, "gpt-4o-mini-2024-07-18");
        assert_eq!((reply.input_tokens, reply.output_tokens), (12, 3));
    }

    #[tokio::test]
    async fn anthropic_backend_sends_version_header() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "key"))
            .and(header("anthropic-version", "2023-06-01"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "model": "claude",
                "content": [{"type": "text", "text": "Projects"}],
                "usage": {"input_tokens": 5, "output_tokens": 1}
            })))
            .mount(&server)
            .await;

        let backend = build_backend(&settings(LlmModelType::Claude, &server), "key").unwrap();
        let reply = backend.invoke("which section?").await.unwrap();

        assert_eq!(reply.content, "Projects");
        assert_eq!(reply.output_tokens, 1);
    }

    #[tokio::test]
    async fn ollama_backend_reads_eval_counts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "model": "llama3",
                "message": {"role": "assistant", "content": "Yes"},
                "prompt_eval_count": 40,
                "eval_count": 2
            })))
            .mount(&server)
            .await;

        let backend = build_backend(&settings(LlmModelType::Ollama, &server), "").unwrap();
        let reply = backend.invoke("hi").await.unwrap();

        assert_eq!(reply.model, "llama3");
        assert_eq!((reply.input_tokens, reply.output_tokens), (40, 2));
    }

    #[tokio::test]
    async fn gemini_backend_joins_parts_and_reads_usage() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/test-model:generateContent"))
            .and(header("x-goog-api-key", "g-key"))
            .and(body_partial_json(json!({
                "contents": [{"role": "user", "parts": [{"text": "hi"}]}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"role": "model", "parts": [{"text": "Score: "}, {"text": "9"}]}}],
                "usageMetadata": {"promptTokenCount": 20, "candidatesTokenCount": 4, "totalTokenCount": 24},
                "modelVersion": "gemini-1.5-flash-002"
            })))
            .mount(&server)
            .await;

        let backend = build_backend(&settings(LlmModelType::Gemini, &server), "g-key").unwrap();
        let reply = backend.invoke("hi").await.unwrap();

        assert_eq!(reply.content, "Score: 9");
        assert_eq!(reply.model, "gemini-1.5-flash-002");
        assert_eq!((reply.input_tokens, reply.output_tokens), (20, 4));
    }

    #[tokio::test]
    async fn gemini_without_candidates_is_empty() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "promptFeedback": {"blockReason": "OTHER"}
            })))
            .mount(&server)
            .await;

        let backend = build_backend(&settings(LlmModelType::Gemini, &server), "g-key").unwrap();

        assert!(matches!(
            backend.invoke("hi").await.unwrap_err(),
            LlmError::EmptyContent
        ));
    }

    #[tokio::test]
    async fn hugging_face_backend_targets_the_model_repo() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/test-model/v1/chat/completions"))
            .and(header("authorization", "Bearer hf-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "Experience"}}],
                "usage": {"prompt_tokens": 9, "completion_tokens": 1}
            })))
            .mount(&server)
            .await;

        let backend = build_backend(&settings(LlmModelType::HuggingFace, &server), "hf-token").unwrap();
        let reply = backend.invoke("which section?").await.unwrap();

        assert_eq!(reply.content, "Experience");
        assert_eq!(reply.model, "test-model");
    }

    #[tokio::test]
    async fn rate_limit_carries_retry_after() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "3"))
            .mount(&server)
            .await;

        let backend = build_backend(&settings(LlmModelType::OpenAi, &server), "k").unwrap();
        let err = backend.invoke("hi").await.unwrap_err();

        assert!(matches!(
            err,
            LlmError::RateLimited { retry_after: Some(d) } if d == Duration::from_secs(3)
        ));
    }

    #[tokio::test]
    async fn server_error_is_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let backend = build_backend(&settings(LlmModelType::OpenAi, &server), "k").unwrap();
        let err = backend.invoke("hi").await.unwrap_err();

        assert!(matches!(err, LlmError::Api { status: 500, ref message } if message == "boom"));
    }

    #[tokio::test]
    async fn empty_content_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"content": "  "}}]
            })))
            .mount(&server)
            .await;

        let backend = build_backend(&settings(LlmModelType::OpenAi, &server), "k").unwrap();

        assert!(matches!(
            backend.invoke("hi").await.unwrap_err(),
            LlmError::EmptyContent
        ));
    }
}
