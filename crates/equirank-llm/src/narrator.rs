//! Narrator — model-backed narratives that never hard-fail.
//!
//! Every public narrative call goes through the router first and, when all
//! backends are exhausted (or none is offered), substitutes offline text.

use std::sync::Arc;

use equirank_common::{Instrument, Narrative, NarrativeSource, ScoreRecord};

use crate::backend::{BackendKind, LlmError, SamplingParams};
use crate::offline::OfflineGenerator;
use crate::prompts::{self, AnalysisKind};
use crate::router::{ModelRouter, RouterSettings};

pub struct Narrator {
    router: Arc<ModelRouter>,
    offline: OfflineGenerator,
    priority: Vec<BackendKind>,
    params: SamplingParams,
}

impl Narrator {
    pub fn new(router: Arc<ModelRouter>) -> Self {
        Self {
            router,
            offline: OfflineGenerator::new(),
            priority: Vec::new(),
            params: SamplingParams::default(),
        }
    }

    /// Narrator with no backends; always answers offline.
    pub fn offline() -> Self {
        Self::new(Arc::new(ModelRouter::new(RouterSettings::default())))
    }

    /// Explicit backend order; empty keeps the router's registered order.
    pub fn with_priority(mut self, priority: Vec<BackendKind>) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_params(mut self, params: SamplingParams) -> Self {
        self.params = params;
        self
    }

    pub fn router(&self) -> &Arc<ModelRouter> {
        &self.router
    }

    /// Raw model text, surfacing `ServiceUnavailable` to the caller.
    pub async fn generate_narrative(
        &self,
        prompt: &str,
        priority: Option<&[BackendKind]>,
        params: Option<SamplingParams>,
    ) -> Result<String, LlmError> {
        let priority = priority.unwrap_or(self.priority.as_slice());
        let params = params.unwrap_or(self.params);
        self.router.generate(prompt, priority, params).await.map(|r| r.text)
    }

    pub async fn narrate(&self, prompt: &str) -> Narrative {
        let offline = &self.offline;
        self.narrate_or_else(prompt, || offline.generate(prompt)).await
    }

    /// Like [`narrate`](Self::narrate) with a caller-supplied offline text.
    pub async fn narrate_or_else<F>(&self, prompt: &str, fallback: F) -> Narrative
    where
        F: FnOnce() -> String + Send,
    {
        if !self.router.has_backends() {
            tracing::debug!("No model backend offered, using offline narrative");
            return Narrative { text: fallback(), source: NarrativeSource::Offline };
        }
        match self.router.generate(prompt, &self.priority, self.params).await {
            Ok(resp) => Narrative {
                text: resp.text,
                source: NarrativeSource::Model {
                    backend: resp.backend.as_str().to_string(),
                    model: resp.model,
                },
            },
            Err(e) => {
                tracing::warn!(error = %e, "Model narrative failed, using offline narrative");
                Narrative { text: fallback(), source: NarrativeSource::Offline }
            }
        }
    }

    pub async fn analyze_instrument(
        &self,
        instrument: &Instrument,
        score: &ScoreRecord,
        kind: AnalysisKind,
    ) -> Narrative {
        self.narrate(&prompts::instrument_analysis(instrument, score, kind)).await
    }

    pub async fn compare_instruments(&self, rows: &[(Instrument, ScoreRecord)]) -> Narrative {
        self.narrate(&prompts::compare_instruments(rows)).await
    }

    pub async fn market_report(&self, sectors: &[(String, f64)]) -> Narrative {
        self.narrate(&prompts::market_report(sectors)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackend;

    fn router_with(backend: MockBackend) -> Arc<ModelRouter> {
        let mut router = ModelRouter::new(RouterSettings { backoff_ms: 1, ..RouterSettings::default() });
        router.register_backend(Arc::new(backend), 1);
        Arc::new(router)
    }

    #[tokio::test]
    async fn test_offline_narrator_is_deterministic() {
        let n = Narrator::offline();
        let a = n.narrate("Summarise the sector cohort").await;
        let b = n.narrate("Summarise the sector cohort").await;
        assert!(a.is_offline());
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_model_narrative_carries_source() {
        let n = Narrator::new(router_with(MockBackend::new(BackendKind::Qwen).replying("Banks lead the market today.")));
        let out = n.narrate("market today").await;
        assert_eq!(out.text, "Banks lead the market today.");
        assert_eq!(
            out.source,
            NarrativeSource::Model { backend: "qwen".to_string(), model: "mock-qwen".to_string() }
        );
    }

    #[tokio::test]
    async fn test_exhausted_backends_fall_back() {
        let n = Narrator::new(router_with(MockBackend::new(BackendKind::Volc).fail_first(3)));
        let out = n.narrate_or_else("market today", || "Banking +1.20%".to_string()).await;
        assert!(out.is_offline());
        assert_eq!(out.text, "Banking +1.20%");
    }

    #[tokio::test]
    async fn test_generate_narrative_surfaces_unavailability() {
        let n = Narrator::offline();
        let err = n.generate_narrative("hello", None, None).await.unwrap_err();
        assert!(matches!(err, LlmError::ServiceUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_analysis_falls_back_per_category() {
        let n = Narrator::offline();
        let score = ScoreRecord {
            symbol: "A".to_string(),
            technical: 50.0,
            fundamental: 50.0,
            valuation: 50.0,
            comprehensive: 50.0,
            rating: equirank_common::Rating::Neutral,
            scored_at: chrono::Utc::now(),
        };
        let out = n.analyze_instrument(&Instrument::new("A", "Alpha"), &score, AnalysisKind::Technical).await;
        assert!(out.text.contains("Technical view"));
    }
}
