//! Prompt categorisation.
//!
//! Keys the offline generator's templates and tags audit entries.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptCategory {
    /// Side-by-side evaluation of several instruments.
    Comparison,
    /// Sector rotation, market trend and cohort reports.
    Market,
    InvestmentAdvice,
    /// Single-instrument analysis.
    StockAnalysis,
    General,
}

impl PromptCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            PromptCategory::Comparison       => "comparison",
            PromptCategory::Market           => "market",
            PromptCategory::InvestmentAdvice => "investment_advice",
            PromptCategory::StockAnalysis    => "stock_analysis",
            PromptCategory::General          => "general",
        }
    }
}

/// Keyword classifier. Categories are checked in declaration order and the
/// first category with a matching keyword wins.
pub struct PromptClassifier {
    rules: Vec<(PromptCategory, Vec<String>)>,
}

impl Default for PromptClassifier {
    fn default() -> Self {
        let rule = |category, words: &[&str]| {
            (category, words.iter().map(|w| w.to_string()).collect::<Vec<_>>())
        };
        Self {
            rules: vec![
                rule(PromptCategory::Comparison, &["compare", "comparison", "versus", " vs ", "对比", "比较"]),
                rule(PromptCategory::Market, &["market", "sector", "cohort", "市场", "行业", "板块"]),
                rule(PromptCategory::InvestmentAdvice, &["advice", "recommend", "portfolio", "allocation", "建议", "配置"]),
                rule(PromptCategory::StockAnalysis, &["analy", "stock", "score", "分析", "股票"]),
            ],
        }
    }
}

impl PromptClassifier {
    pub fn classify(&self, prompt: &str) -> PromptCategory {
        let lowered = prompt.to_lowercase();
        self.rules
            .iter()
            .find(|(_, words)| words.iter().any(|w| lowered.contains(w.as_str())))
            .map(|(category, _)| *category)
            .unwrap_or(PromptCategory::General)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stock_analysis_classification() {
        let clf = PromptClassifier::default();
        assert_eq!(clf.classify("Analyse 600519 technically"), PromptCategory::StockAnalysis);
        assert_eq!(clf.classify("请分析这只股票"), PromptCategory::StockAnalysis);
    }

    #[test]
    fn test_comparison_wins_over_analysis() {
        let clf = PromptClassifier::default();
        let prompt = "Compare these stocks and analyse their scores";
        assert_eq!(clf.classify(prompt), PromptCategory::Comparison);
    }

    #[test]
    fn test_market_and_advice() {
        let clf = PromptClassifier::default();
        assert_eq!(clf.classify("Summarise SECTOR rotation this week"), PromptCategory::Market);
        assert_eq!(clf.classify("Suggest a portfolio allocation"), PromptCategory::InvestmentAdvice);
    }

    #[test]
    fn test_general_fallback() {
        let clf = PromptClassifier::default();
        assert_eq!(clf.classify("hello there"), PromptCategory::General);
    }
}
