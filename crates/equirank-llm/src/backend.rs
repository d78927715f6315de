//! Model backend trait and concrete implementations.
//!
//! Backends:
//!   OpenAiCompatibleBackend — chat-completions protocol; serves Qwen
//!                             (DashScope), Volcano Ark, OpenAI and a local
//!                             Ollama through its `/v1` endpoint
//!   AnthropicBackend        — Anthropic Messages API
//!   GeminiBackend           — Google Gemini generateContent API
//!
//! `MockBackend` is a scripted in-process backend for tests.

use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ── Error ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Backend unavailable: {0}")]
    Unavailable(String),
    #[error("API error [{status}]: {message}")]
    ApiError { status: u16, message: String },
    #[error("Response too short ({len} chars)")]
    ResponseTooShort { len: usize },
    #[error("All model services unavailable after {attempts} attempts")]
    ServiceUnavailable { attempts: usize },
}

// ── Backend kinds ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BackendKind {
    #[serde(rename = "qwen")]
    Qwen,
    #[serde(rename = "volc")]
    Volc,
    #[serde(rename = "openai")]
    OpenAi,
    #[serde(rename = "anthropic")]
    Anthropic,
    #[serde(rename = "gemini")]
    Gemini,
    #[serde(rename = "ollama")]
    Ollama,
}

impl BackendKind {
    pub const ALL: [BackendKind; 6] = [
        BackendKind::Qwen,
        BackendKind::Volc,
        BackendKind::OpenAi,
        BackendKind::Anthropic,
        BackendKind::Gemini,
        BackendKind::Ollama,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Qwen      => "qwen",
            BackendKind::Volc      => "volc",
            BackendKind::OpenAi    => "openai",
            BackendKind::Anthropic => "anthropic",
            BackendKind::Gemini    => "gemini",
            BackendKind::Ollama    => "ollama",
        }
    }

    /// Remote services need an API key; a backend without one is not offered.
    pub fn requires_credential(&self) -> bool {
        !matches!(self, BackendKind::Ollama)
    }

    pub fn is_local(&self) -> bool {
        matches!(self, BackendKind::Ollama)
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            BackendKind::Qwen      => "https://dashscope.aliyuncs.com/compatible-mode/v1",
            BackendKind::Volc      => "https://ark.cn-beijing.volces.com/api/v3",
            BackendKind::OpenAi    => "https://api.openai.com/v1",
            BackendKind::Anthropic => "https://api.anthropic.com",
            BackendKind::Gemini    => "https://generativelanguage.googleapis.com",
            BackendKind::Ollama    => "http://localhost:11434/v1",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            BackendKind::Qwen      => "qwen-max",
            BackendKind::Volc      => "doubao-pro-128k",
            BackendKind::OpenAi    => "gpt-3.5-turbo",
            BackendKind::Anthropic => "claude-3-5-haiku-latest",
            BackendKind::Gemini    => "gemini-1.5-flash",
            BackendKind::Ollama    => "qwen2.5:7b",
        }
    }

    /// Lower runs first.
    pub fn default_priority(&self) -> u32 {
        match self {
            BackendKind::Qwen      => 1,
            BackendKind::Volc      => 2,
            BackendKind::OpenAi    => 3,
            BackendKind::Anthropic => 4,
            BackendKind::Gemini    => 5,
            BackendKind::Ollama    => 6,
        }
    }

    /// Environment variable consulted when the config has no key.
    pub fn api_key_env(&self) -> &'static str {
        match self {
            BackendKind::Qwen      => "EQUIRANK_QWEN_API_KEY",
            BackendKind::Volc      => "EQUIRANK_VOLC_API_KEY",
            BackendKind::OpenAi    => "EQUIRANK_OPENAI_API_KEY",
            BackendKind::Anthropic => "EQUIRANK_ANTHROPIC_API_KEY",
            BackendKind::Gemini    => "EQUIRANK_GEMINI_API_KEY",
            BackendKind::Ollama    => "EQUIRANK_OLLAMA_API_KEY",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = LlmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase();
        BackendKind::ALL
            .into_iter()
            .find(|k| k.as_str() == key)
            .ok_or_else(|| LlmError::Unavailable(format!("unknown backend '{s}'")))
    }
}

// ── Request / Response ────────────────────────────────────────────────────────

/// Per-call overrides; unset fields use the backend's configured values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SamplingParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRequest {
    pub prompt: String,
    #[serde(default)]
    pub params: SamplingParams,
}

impl ModelRequest {
    pub fn new(prompt: impl Into<String>, params: SamplingParams) -> Self {
        Self { prompt: prompt.into(), params }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelResponse {
    pub text: String,
    pub backend: BackendKind,
    pub model: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

// ── Trait ─────────────────────────────────────────────────────────────────────

#[async_trait]
pub trait ModelBackend: Send + Sync {
    async fn generate(&self, req: &ModelRequest) -> Result<ModelResponse, LlmError>;
    fn kind(&self) -> BackendKind;
    fn model_id(&self) -> &str;
    fn is_local(&self) -> bool {
        self.kind().is_local()
    }
}

/// Temperature and output length used when a request leaves them unset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplingDefaults {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for SamplingDefaults {
    fn default() -> Self {
        Self { temperature: 0.7, max_tokens: 2000 }
    }
}

impl SamplingDefaults {
    fn resolve(&self, params: &SamplingParams) -> (f32, u32) {
        (
            params.temperature.unwrap_or(self.temperature),
            params.max_tokens.unwrap_or(self.max_tokens),
        )
    }
}

fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Falling back to default HTTP client");
            reqwest::Client::new()
        })
}

// ── Helper: parse OpenAI-style response ──────────────────────────────────────

fn parse_openai_response(
    json: &serde_json::Value,
    kind: BackendKind,
    fallback_model: &str,
) -> ModelResponse {
    ModelResponse {
        text: json["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or("")
            .to_string(),
        backend: kind,
        model: json["model"].as_str().unwrap_or(fallback_model).to_string(),
        prompt_tokens:     json["usage"]["prompt_tokens"].as_u64().unwrap_or(0) as u32,
        completion_tokens: json["usage"]["completion_tokens"].as_u64().unwrap_or(0) as u32,
    }
}

async fn check_response_status(resp: reqwest::Response) -> Result<serde_json::Value, LlmError> {
    let status = resp.status().as_u16();
    let text = resp.text().await?;
    if status >= 400 {
        let message = serde_json::from_str::<serde_json::Value>(&text)
            .ok()
            .and_then(|body| {
                body["error"]["message"]
                    .as_str()
                    .or_else(|| body["message"].as_str())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| text.chars().take(200).collect());
        return Err(LlmError::ApiError { status, message });
    }
    Ok(serde_json::from_str(&text)?)
}

// ── 1. OpenAI-compatible chat completions ─────────────────────────────────────

pub struct OpenAiCompatibleBackend {
    kind: BackendKind,
    base_url: String,
    model: String,
    api_key: Option<SecretString>,
    defaults: SamplingDefaults,
    client: reqwest::Client,
}

impl OpenAiCompatibleBackend {
    pub fn new(
        kind: BackendKind,
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<SecretString>,
    ) -> Self {
        Self {
            kind,
            base_url: base_url.into(),
            model: model.into(),
            api_key,
            defaults: SamplingDefaults::default(),
            client: http_client(Duration::from_secs(60)),
        }
    }

    pub fn with_defaults(mut self, defaults: SamplingDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = http_client(timeout);
        self
    }

    fn auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(k) => req.bearer_auth(k.expose_secret()),
            None    => req,
        }
    }
}

#[async_trait]
impl ModelBackend for OpenAiCompatibleBackend {
    async fn generate(&self, req: &ModelRequest) -> Result<ModelResponse, LlmError> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let (temperature, max_tokens) = self.defaults.resolve(&req.params);
        let body = serde_json::json!({
            "model":       &self.model,
            "messages":    [{ "role": "user", "content": &req.prompt }],
            "max_tokens":  max_tokens,
            "temperature": temperature,
        });
        let resp = self.auth(self.client.post(&url)).json(&body).send().await?;
        let json = check_response_status(resp).await?;
        Ok(parse_openai_response(&json, self.kind, &self.model))
    }

    fn kind(&self) -> BackendKind { self.kind }
    fn model_id(&self) -> &str { &self.model }
}

// ── 2. Anthropic ──────────────────────────────────────────────────────────────

pub struct AnthropicBackend {
    base_url: String,
    model: String,
    api_key: SecretString,
    defaults: SamplingDefaults,
    client: reqwest::Client,
}

impl AnthropicBackend {
    pub fn new(api_key: SecretString, model: impl Into<String>) -> Self {
        Self {
            base_url: BackendKind::Anthropic.default_base_url().to_string(),
            model: model.into(),
            api_key,
            defaults: SamplingDefaults::default(),
            client: http_client(Duration::from_secs(60)),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_defaults(mut self, defaults: SamplingDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = http_client(timeout);
        self
    }
}

#[async_trait]
impl ModelBackend for AnthropicBackend {
    async fn generate(&self, req: &ModelRequest) -> Result<ModelResponse, LlmError> {
        let (temperature, max_tokens) = self.defaults.resolve(&req.params);
        let body = serde_json::json!({
            "model":       &self.model,
            "messages":    [{ "role": "user", "content": &req.prompt }],
            "max_tokens":  max_tokens,
            "temperature": temperature,
        });

        let url = format!("{}/v1/messages", self.base_url.trim_end_matches('/'));
        let resp = self.client
            .post(&url)
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", "2023-06-01")
            .json(&body)
            .send()
            .await?;
        let json = check_response_status(resp).await?;

        let text = json["content"]
            .as_array()
            .map(|blocks| {
                blocks.iter()
                    .filter_map(|b| b["text"].as_str())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        Ok(ModelResponse {
            text,
            backend: BackendKind::Anthropic,
            model: json["model"].as_str().unwrap_or(&self.model).to_string(),
            prompt_tokens:     json["usage"]["input_tokens"].as_u64().unwrap_or(0) as u32,
            completion_tokens: json["usage"]["output_tokens"].as_u64().unwrap_or(0) as u32,
        })
    }

    fn kind(&self) -> BackendKind { BackendKind::Anthropic }
    fn model_id(&self) -> &str { &self.model }
}

// ── 3. Google Gemini ──────────────────────────────────────────────────────────

pub struct GeminiBackend {
    base_url: String,
    model: String,
    api_key: SecretString,
    defaults: SamplingDefaults,
    client: reqwest::Client,
}

impl GeminiBackend {
    pub fn new(api_key: SecretString, model: impl Into<String>) -> Self {
        Self {
            base_url: BackendKind::Gemini.default_base_url().to_string(),
            model: model.into(),
            api_key,
            defaults: SamplingDefaults::default(),
            client: http_client(Duration::from_secs(60)),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_defaults(mut self, defaults: SamplingDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = http_client(timeout);
        self
    }
}

#[async_trait]
impl ModelBackend for GeminiBackend {
    async fn generate(&self, req: &ModelRequest) -> Result<ModelResponse, LlmError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        );
        let (temperature, max_tokens) = self.defaults.resolve(&req.params);
        let body = serde_json::json!({
            "contents": [{ "role": "user", "parts": [{ "text": &req.prompt }] }],
            "generationConfig": {
                "maxOutputTokens": max_tokens,
                "temperature":     temperature,
            }
        });

        let resp = self.client
            .post(&url)
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(&body)
            .send()
            .await?;
        let json = check_response_status(resp).await?;

        let text = json["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .unwrap_or("")
            .to_string();

        Ok(ModelResponse {
            text,
            backend: BackendKind::Gemini,
            model: self.model.clone(),
            prompt_tokens: json["usageMetadata"]["promptTokenCount"]
                .as_u64().unwrap_or(0) as u32,
            completion_tokens: json["usageMetadata"]["candidatesTokenCount"]
                .as_u64().unwrap_or(0) as u32,
        })
    }

    fn kind(&self) -> BackendKind { BackendKind::Gemini }
    fn model_id(&self) -> &str { &self.model }
}

// ── 4. Scripted mock ─────────────────────────────────────────────────────────

/// In-process backend replaying a fixed script of outcomes.
///
/// Scripted outcomes are consumed first; afterwards every call returns the
/// steady reply (or fails when none is set).
pub struct MockBackend {
    kind: BackendKind,
    model: String,
    script: Mutex<VecDeque<Option<String>>>,
    steady: Option<String>,
    calls: AtomicUsize,
}

impl MockBackend {
    pub fn new(kind: BackendKind) -> Self {
        Self {
            kind,
            model: format!("mock-{}", kind.as_str()),
            script: Mutex::new(VecDeque::new()),
            steady: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Reply with `text` once the script is exhausted.
    pub fn replying(mut self, text: impl Into<String>) -> Self {
        self.steady = Some(text.into());
        self
    }

    /// Fail the next `n` calls.
    pub fn fail_first(self, n: usize) -> Self {
        if let Ok(mut script) = self.script.lock() {
            script.extend(std::iter::repeat(None).take(n));
        }
        self
    }

    /// Reply with `text` on the next scripted call.
    pub fn then_reply(self, text: impl Into<String>) -> Self {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(Some(text.into()));
        }
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelBackend for MockBackend {
    async fn generate(&self, req: &ModelRequest) -> Result<ModelResponse, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self.script.lock().ok().and_then(|mut s| s.pop_front());
        let outcome = match scripted {
            Some(step) => step,
            None => self.steady.clone(),
        };
        match outcome {
            Some(text) => Ok(ModelResponse {
                text,
                backend: self.kind,
                model: self.model.clone(),
                prompt_tokens: req.prompt.split_whitespace().count() as u32,
                completion_tokens: 0,
            }),
            None => Err(LlmError::Unavailable(format!("{} scripted failure", self.kind))),
        }
    }

    fn kind(&self) -> BackendKind { self.kind }
    fn model_id(&self) -> &str { &self.model }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_backends_are_not_local() {
        let b = OpenAiCompatibleBackend::new(
            BackendKind::Qwen,
            BackendKind::Qwen.default_base_url(),
            "qwen-max",
            Some(SecretString::from("sk-test".to_string())),
        );
        assert!(!b.is_local());
        assert_eq!(b.model_id(), "qwen-max");
        assert_eq!(b.kind(), BackendKind::Qwen);

        let a = AnthropicBackend::new(SecretString::from("sk-ant-test".to_string()), "claude-3-5-haiku-latest");
        assert!(!a.is_local());
    }

    #[test]
    fn test_ollama_is_local_and_keyless() {
        assert!(BackendKind::Ollama.is_local());
        assert!(!BackendKind::Ollama.requires_credential());
        assert!(BackendKind::Volc.requires_credential());
    }

    #[test]
    fn test_backend_kind_round_trip_names() {
        for kind in BackendKind::ALL {
            assert_eq!(kind.as_str().parse::<BackendKind>().unwrap(), kind);
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
        assert!("watson".parse::<BackendKind>().is_err());
    }

    #[test]
    fn test_default_priority_order() {
        let mut kinds = BackendKind::ALL.to_vec();
        kinds.sort_by_key(|k| k.default_priority());
        assert_eq!(&kinds[..3], &[BackendKind::Qwen, BackendKind::Volc, BackendKind::OpenAi]);
    }

    #[test]
    fn test_sampling_defaults_resolve() {
        let d = SamplingDefaults::default();
        assert_eq!(d.resolve(&SamplingParams::default()), (0.7, 2000));
        let p = SamplingParams { temperature: Some(0.1), max_tokens: None };
        assert_eq!(d.resolve(&p), (0.1, 2000));
    }

    #[test]
    fn test_parse_openai_response() {
        let json = serde_json::json!({
            "model": "qwen-max-0428",
            "choices": [{ "message": { "role": "assistant", "content": "Steady uptrend." } }],
            "usage": { "prompt_tokens": 12, "completion_tokens": 3 }
        });
        let resp = parse_openai_response(&json, BackendKind::Qwen, "qwen-max");
        assert_eq!(resp.text, "Steady uptrend.");
        assert_eq!(resp.model, "qwen-max-0428");
        assert_eq!(resp.prompt_tokens, 12);
    }

    #[tokio::test]
    async fn test_mock_backend_script() {
        let b = MockBackend::new(BackendKind::Volc).fail_first(1).replying("a long enough reply");
        let req = ModelRequest::new("hello", SamplingParams::default());
        assert!(b.generate(&req).await.is_err());
        assert_eq!(b.generate(&req).await.unwrap().text, "a long enough reply");
        assert_eq!(b.calls(), 2);
    }
}
