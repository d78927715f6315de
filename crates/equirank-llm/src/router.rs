//! Model router — priority-ordered backend selection with retry and backoff.
//!
//! A logical request walks the priority list; each backend gets
//! `retries + 1` attempts with a linearly growing pause between them. A
//! reply counts only when its trimmed text exceeds the minimum length.
//! Exhausting every backend yields [`LlmError::ServiceUnavailable`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::audit::{AuditLog, LlmAuditEntry};
use crate::backend::{
    AnthropicBackend, BackendKind, GeminiBackend, LlmError, ModelBackend, ModelRequest,
    ModelResponse, OpenAiCompatibleBackend, SamplingDefaults, SamplingParams,
};
use crate::classification::PromptClassifier;

// ── Settings ─────────────────────────────────────────────────────────────────

fn default_retries() -> u32 { 2 }
fn default_backoff_ms() -> u64 { 1000 }
fn default_min_response_chars() -> usize { 10 }
fn default_audit_capacity() -> usize { 256 }

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouterSettings {
    #[serde(default = "default_retries")]
    pub retries_per_backend: u32,
    /// Pause before retry `n` (0-based) is `backoff_ms * (n + 1)`.
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
    /// Replies with this many trimmed characters or fewer are rejected.
    #[serde(default = "default_min_response_chars")]
    pub min_response_chars: usize,
    #[serde(default = "default_audit_capacity")]
    pub audit_capacity: usize,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            retries_per_backend: default_retries(),
            backoff_ms: default_backoff_ms(),
            min_response_chars: default_min_response_chars(),
            audit_capacity: default_audit_capacity(),
        }
    }
}

// ── Backend configuration ────────────────────────────────────────────────────

fn default_temperature() -> f32 { 0.7 }
fn default_max_tokens() -> u32 { 2000 }
fn default_timeout_secs() -> u64 { 60 }

/// One configured backend. Missing fields fall back to the kind's defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub kind: BackendKind,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Lower runs first; defaults to the kind's built-in order.
    #[serde(default)]
    pub priority: Option<u32>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl BackendConfig {
    pub fn new(kind: BackendKind) -> Self {
        Self {
            kind,
            model: None,
            api_key: None,
            base_url: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            priority: None,
            timeout_secs: default_timeout_secs(),
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn effective_priority(&self) -> u32 {
        self.priority.unwrap_or_else(|| self.kind.default_priority())
    }

    /// A remote backend without a credential is not offered at all.
    pub fn is_offered(&self) -> bool {
        !self.kind.requires_credential()
            || self.api_key.as_deref().map(|k| !k.trim().is_empty()).unwrap_or(false)
    }

    /// Build the backend. Returns `Unavailable` when the backend is not offered.
    pub fn into_backend(self) -> Result<Arc<dyn ModelBackend>, LlmError> {
        if !self.is_offered() {
            return Err(LlmError::Unavailable(format!("{} has no credential", self.kind)));
        }
        let kind = self.kind;
        let model = self.model.unwrap_or_else(|| kind.default_model().to_string());
        let base_url = self.base_url.unwrap_or_else(|| kind.default_base_url().to_string());
        let defaults = SamplingDefaults { temperature: self.temperature, max_tokens: self.max_tokens };
        let timeout = Duration::from_secs(self.timeout_secs);
        let key = self.api_key.map(SecretString::from);

        let backend: Arc<dyn ModelBackend> = match (kind, key) {
            (BackendKind::Anthropic, Some(key)) => Arc::new(
                AnthropicBackend::new(key, model)
                    .with_base_url(base_url)
                    .with_defaults(defaults)
                    .with_timeout(timeout),
            ),
            (BackendKind::Gemini, Some(key)) => Arc::new(
                GeminiBackend::new(key, model)
                    .with_base_url(base_url)
                    .with_defaults(defaults)
                    .with_timeout(timeout),
            ),
            (BackendKind::Anthropic | BackendKind::Gemini, None) => {
                return Err(LlmError::Unavailable(format!("{kind} has no credential")));
            }
            (_, key) => Arc::new(
                OpenAiCompatibleBackend::new(kind, base_url, model, key)
                    .with_defaults(defaults)
                    .with_timeout(timeout),
            ),
        };
        Ok(backend)
    }
}

// ── Router ───────────────────────────────────────────────────────────────────

/// Offered backend as reported by [`ModelRouter::status`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendStatus {
    pub kind: BackendKind,
    pub model: String,
    pub priority: u32,
    pub is_local: bool,
}

struct Registered {
    backend: Arc<dyn ModelBackend>,
    priority: u32,
}

pub struct ModelRouter {
    backends: Vec<Registered>,
    settings: RouterSettings,
    classifier: PromptClassifier,
    audit: AuditLog,
}

impl ModelRouter {
    pub fn new(settings: RouterSettings) -> Self {
        let audit = AuditLog::new(settings.audit_capacity);
        Self {
            backends: Vec::new(),
            settings,
            classifier: PromptClassifier::default(),
            audit,
        }
    }

    /// Register a backend. Registering the same kind again replaces it.
    pub fn register_backend(&mut self, backend: Arc<dyn ModelBackend>, priority: u32) {
        let kind = backend.kind();
        self.backends.retain(|r| r.backend.kind() != kind);
        self.backends.push(Registered { backend, priority });
        self.backends
            .sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.backend.kind().cmp(&b.backend.kind())));
    }

    pub fn settings(&self) -> &RouterSettings {
        &self.settings
    }

    pub fn has_backends(&self) -> bool {
        !self.backends.is_empty()
    }

    /// Kinds in effective priority order.
    pub fn registered_backends(&self) -> Vec<BackendKind> {
        self.backends.iter().map(|r| r.backend.kind()).collect()
    }

    pub fn status(&self) -> Vec<BackendStatus> {
        self.backends
            .iter()
            .map(|r| BackendStatus {
                kind: r.backend.kind(),
                model: r.backend.model_id().to_string(),
                priority: r.priority,
                is_local: r.backend.is_local(),
            })
            .collect()
    }

    pub fn recent_audit(&self) -> Vec<LlmAuditEntry> {
        self.audit.recent()
    }

    fn find(&self, kind: BackendKind) -> Option<&Arc<dyn ModelBackend>> {
        self.backends.iter().find(|r| r.backend.kind() == kind).map(|r| &r.backend)
    }

    /// Resolve the attempt order. An empty list means every registered backend
    /// in priority order; listed kinds that are not registered are skipped.
    fn candidates(&self, priority: &[BackendKind]) -> Vec<&Arc<dyn ModelBackend>> {
        if priority.is_empty() {
            return self.backends.iter().map(|r| &r.backend).collect();
        }
        let mut seen = Vec::new();
        priority
            .iter()
            .filter(|k| {
                if seen.contains(*k) {
                    return false;
                }
                seen.push(**k);
                true
            })
            .filter_map(|k| {
                let found = self.find(*k);
                if found.is_none() {
                    tracing::debug!(backend = k.as_str(), "Backend not offered, skipping");
                }
                found
            })
            .collect()
    }

    pub async fn generate(
        &self,
        prompt: &str,
        priority: &[BackendKind],
        params: SamplingParams,
    ) -> Result<ModelResponse, LlmError> {
        self.generate_with_retries(prompt, priority, params, self.settings.retries_per_backend)
            .await
    }

    pub async fn generate_with_retries(
        &self,
        prompt: &str,
        priority: &[BackendKind],
        params: SamplingParams,
        retries: u32,
    ) -> Result<ModelResponse, LlmError> {
        let request = ModelRequest::new(prompt, params);
        let category = self.classifier.classify(prompt);
        let mut attempts = 0usize;

        for backend in self.candidates(priority) {
            for attempt in 0..=retries {
                attempts += 1;
                let started = Instant::now();
                let outcome = backend.generate(&request).await.and_then(|resp| {
                    let len = resp.text.trim().chars().count();
                    if len > self.settings.min_response_chars {
                        Ok(resp)
                    } else {
                        Err(LlmError::ResponseTooShort { len })
                    }
                });

                match outcome {
                    Ok(resp) => {
                        let latency_ms = started.elapsed().as_millis() as u64;
                        tracing::info!(
                            backend = backend.kind().as_str(),
                            model = %resp.model,
                            category = category.as_str(),
                            attempt,
                            latency_ms,
                            "Model request served"
                        );
                        self.audit.record(LlmAuditEntry::new(&resp, category, latency_ms));
                        return Ok(resp);
                    }
                    Err(e) => {
                        tracing::warn!(
                            backend = backend.kind().as_str(),
                            attempt,
                            error = %e,
                            "Model attempt failed"
                        );
                        if attempt < retries {
                            let pause = self.settings.backoff_ms * (attempt as u64 + 1);
                            tokio::time::sleep(Duration::from_millis(pause)).await;
                        }
                    }
                }
            }
        }

        tracing::warn!(attempts, "All model backends exhausted");
        Err(LlmError::ServiceUnavailable { attempts })
    }
}

/// Build a router from configured backends. Backends that are not offered are
/// left out with an info log.
pub fn build_router(configs: Vec<BackendConfig>, settings: RouterSettings) -> ModelRouter {
    let mut router = ModelRouter::new(settings);
    for config in configs {
        let kind = config.kind;
        let priority = config.effective_priority();
        match config.into_backend() {
            Ok(backend) => {
                tracing::info!(backend = kind.as_str(), model = backend.model_id(), priority, "Model backend registered");
                router.register_backend(backend, priority);
            }
            Err(e) => {
                tracing::info!(backend = kind.as_str(), reason = %e, "Model backend not offered");
            }
        }
    }
    router
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackend;

    fn fast() -> RouterSettings {
        RouterSettings { backoff_ms: 1, ..RouterSettings::default() }
    }

    #[test]
    fn test_missing_credential_is_not_offered() {
        assert!(!BackendConfig::new(BackendKind::Qwen).is_offered());
        assert!(!BackendConfig::new(BackendKind::Qwen).with_api_key("  ").is_offered());
        assert!(BackendConfig::new(BackendKind::Qwen).with_api_key("sk-1").is_offered());
        assert!(BackendConfig::new(BackendKind::Ollama).is_offered());
    }

    #[test]
    fn test_build_router_skips_unoffered() {
        let router = build_router(
            vec![
                BackendConfig::new(BackendKind::OpenAi),
                BackendConfig::new(BackendKind::Ollama),
                BackendConfig::new(BackendKind::Anthropic).with_api_key("sk-ant"),
            ],
            RouterSettings::default(),
        );
        assert_eq!(router.registered_backends(), vec![BackendKind::Anthropic, BackendKind::Ollama]);
        let status = router.status();
        assert_eq!(status[1].model, "qwen2.5:7b");
        assert!(status[1].is_local);
    }

    #[tokio::test]
    async fn test_first_backend_success() {
        let qwen = Arc::new(MockBackend::new(BackendKind::Qwen).replying("qwen says the trend is up"));
        let volc = Arc::new(MockBackend::new(BackendKind::Volc).replying("volc says the trend is up"));
        let mut router = ModelRouter::new(fast());
        router.register_backend(volc.clone(), 2);
        router.register_backend(qwen.clone(), 1);

        let resp = router.generate("analyse 600519", &[], SamplingParams::default()).await.unwrap();
        assert_eq!(resp.backend, BackendKind::Qwen);
        assert_eq!(volc.calls(), 0);
        assert_eq!(router.recent_audit().len(), 1);
    }

    #[tokio::test]
    async fn test_retries_then_falls_through() {
        let qwen = Arc::new(MockBackend::new(BackendKind::Qwen).fail_first(10));
        let volc = Arc::new(MockBackend::new(BackendKind::Volc).fail_first(1).replying("second backend answer"));
        let mut router = ModelRouter::new(fast());
        router.register_backend(qwen.clone(), 1);
        router.register_backend(volc.clone(), 2);

        let resp = router.generate("hello", &[], SamplingParams::default()).await.unwrap();
        assert_eq!(resp.backend, BackendKind::Volc);
        assert_eq!(qwen.calls(), 3);
        assert_eq!(volc.calls(), 2);
    }

    #[tokio::test]
    async fn test_short_reply_is_a_failure() {
        let qwen = Arc::new(MockBackend::new(BackendKind::Qwen).replying("   ok        "));
        let mut router = ModelRouter::new(fast());
        router.register_backend(qwen.clone(), 1);

        let err = router
            .generate_with_retries("hello", &[], SamplingParams::default(), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::ServiceUnavailable { attempts: 2 }));
        assert_eq!(qwen.calls(), 2);
        assert!(router.recent_audit().is_empty());
    }

    #[tokio::test]
    async fn test_explicit_priority_skips_unregistered() {
        let ollama = Arc::new(MockBackend::new(BackendKind::Ollama).replying("local model narrative"));
        let qwen = Arc::new(MockBackend::new(BackendKind::Qwen).replying("remote model narrative"));
        let mut router = ModelRouter::new(fast());
        router.register_backend(qwen.clone(), 1);
        router.register_backend(ollama.clone(), 6);

        let order = [BackendKind::Gemini, BackendKind::Ollama, BackendKind::Qwen];
        let resp = router.generate("hello", &order, SamplingParams::default()).await.unwrap();
        assert_eq!(resp.backend, BackendKind::Ollama);
        assert_eq!(qwen.calls(), 0);
    }

    #[tokio::test]
    async fn test_no_backends_is_unavailable() {
        let router = ModelRouter::new(fast());
        let err = router.generate("hello", &[], SamplingParams::default()).await.unwrap_err();
        assert!(matches!(err, LlmError::ServiceUnavailable { attempts: 0 }));
    }

    #[tokio::test]
    async fn test_backoff_grows_per_attempt() {
        let qwen = Arc::new(MockBackend::new(BackendKind::Qwen).fail_first(2).replying("eventually a reply"));
        let settings = RouterSettings { backoff_ms: 20, ..RouterSettings::default() };
        let mut router = ModelRouter::new(settings);
        router.register_backend(qwen, 1);

        let started = Instant::now();
        router.generate("hello", &[], SamplingParams::default()).await.unwrap();
        // 20ms after the first failure, 40ms after the second
        assert!(started.elapsed() >= Duration::from_millis(60));
    }
}
