//! Deterministic offline narrative generator.
//!
//! Used when no model backend is reachable. Output depends only on the
//! prompt category, so repeated calls for the same kind of prompt return
//! identical text.

use crate::classification::{PromptCategory, PromptClassifier};

const OFFLINE_NOTE: &str =
    "Note: generated offline from templates because no model service was reachable. \
     Scores are heuristic and advisory only.";

#[derive(Default)]
pub struct OfflineGenerator {
    classifier: PromptClassifier,
}

impl OfflineGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn category(&self, prompt: &str) -> PromptCategory {
        self.classifier.classify(prompt)
    }

    pub fn generate(&self, prompt: &str) -> String {
        format!("{}\n\n{}", template(self.category(prompt)), OFFLINE_NOTE)
    }
}

fn template(category: PromptCategory) -> &'static str {
    match category {
        PromptCategory::StockAnalysis => "\
Technical view: read the trend from the position of the short moving average against the \
longer one, and confirm it with 10-day momentum and turnover.
Fundamental view: earnings and book multiples below their peer references point to a \
margin of safety; very high multiples need growth to justify them.
Valuation view: compare the multiples with the sector reference before acting.
Risk: size positions to volatility and keep a stop-loss discipline.",

        PromptCategory::Comparison => "\
Comparison: rank the candidates on the comprehensive score first, then check whether the \
leader's edge comes from valuation (more durable) or from short-term momentum (less durable).
Prefer the candidate with the better balance of fundamental and valuation sub-scores when \
comprehensive scores are close.",

        PromptCategory::Market => "\
Market view: leadership is concentrated in the sectors with the strongest recent price \
change and rising volume; lagging sectors with stable volume may offer value.
Watch for rotation when volume growth fades in the leading groups.
Keep exposure diversified across at least three sectors.",

        PromptCategory::InvestmentAdvice => "\
Allocation guidance: favour instruments rated buy or better, cap any single position at \
a modest share of the portfolio, and rebalance when ratings change.
Match the mix of large and small capitalisation names to your risk tolerance.",

        PromptCategory::General => "\
The ranking engine combines technical, fundamental and valuation sub-scores into a \
comprehensive score. Use the cohort lists as a starting point for research rather than \
as trading signals.",
    }
}
