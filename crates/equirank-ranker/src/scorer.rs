//! Composite instrument score.
//!
//! Three sub-scores on a 0–100 scale (technical, fundamental, valuation)
//! combined into a comprehensive score and bucketed into a rating.
//! Missing inputs degrade to the neutral 50 rather than failing.

use chrono::Utc;
use equirank_common::{PriceBar, Rating, ScoreRecord, ValuationMultiples};
use serde::{Deserialize, Serialize};

use crate::config::ScoringConfig;
use crate::metrics::{closes, mean, pct_change, std_dev, trailing_mean, volumes};
use crate::weights::{
    CompositeWeights, FundamentalWeights, TechnicalWeights, ValuationWeights,
};

pub const NEUTRAL_SCORE: f64 = 50.0;
/// History required before the technical sub-score is computed.
pub const MIN_TECHNICAL_BARS: usize = 20;

pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

fn bounded(score: f64) -> f64 {
    if score.is_nan() {
        return NEUTRAL_SCORE;
    }
    round2(score.clamp(0.0, 100.0))
}

/// Profitability, leverage and growth inputs for the fundamental sub-score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FinancialHealth {
    pub roe: f64,
    pub debt_ratio: f64,
    pub revenue_growth: f64,
}

impl FinancialHealth {
    /// Stand-in values used until statement data is wired in.
    pub const PLACEHOLDER: FinancialHealth = FinancialHealth {
        roe: 0.10,
        debt_ratio: 0.40,
        revenue_growth: 0.10,
    };
}

/// Peer-group multiples the valuation sub-score compares against.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferenceMultiples {
    pub pe: f64,
    pub pb: f64,
}

impl Default for ReferenceMultiples {
    fn default() -> Self {
        Self { pe: 18.0, pb: 1.8 }
    }
}

// ── Technical ────────────────────────────────────────────────────────────────

/// Trend, momentum, stability and activity over the trailing bars.
/// Neutral with fewer than [`MIN_TECHNICAL_BARS`] bars.
pub fn technical_score(bars: &[PriceBar], w: &TechnicalWeights) -> f64 {
    if bars.len() < MIN_TECHNICAL_BARS {
        return NEUTRAL_SCORE;
    }
    let prices = closes(bars);
    let vols = volumes(bars);
    let last = prices[prices.len() - 1];

    let ma5 = trailing_mean(&prices, 5).unwrap_or(last);
    let ma20 = trailing_mean(&prices, 20).unwrap_or(last);
    let trend = if ma20 != 0.0 {
        ((ma5 - ma20) / ma20 * 100.0 * 2.0).clamp(-30.0, 30.0) + 50.0
    } else {
        0.0
    };

    let momentum_10 = pct_change(prices[prices.len() - 11], last);
    let momentum = (momentum_10 * 2.0).clamp(-30.0, 30.0) + 50.0;

    let recent = &prices[prices.len() - 20..];
    let stability = match (std_dev(recent, 0), mean(recent)) {
        (Some(sd), Some(m)) if m > 0.0 => (70.0 - sd / m * 1000.0).max(10.0),
        _ => 10.0,
    };

    let avg_10 = trailing_mean(&vols, 10).unwrap_or(0.0);
    let avg_long = if vols.len() >= 30 { mean(&vols).unwrap_or(0.0) } else { avg_10 };
    let activity = if avg_long > 0.0 { (avg_10 / avg_long * 30.0).min(60.0) } else { 30.0 };

    bounded(
        trend * w.trend
            + momentum * w.momentum
            + stability * w.stability
            + activity * w.activity,
    )
}

// ── Fundamental ──────────────────────────────────────────────────────────────

pub fn fundamental_score(
    multiples: &ValuationMultiples,
    health: &FinancialHealth,
    w: &FundamentalWeights,
) -> f64 {
    let pe = match multiples.pe {
        Some(pe) if pe > 0.0 && pe < 100.0 => (80.0 - pe * 2.0).max(10.0),
        _ => NEUTRAL_SCORE,
    };
    let pb = match multiples.pb {
        Some(pb) if pb > 0.0 && pb < 10.0 => (90.0 - pb * 8.0).max(10.0),
        _ => NEUTRAL_SCORE,
    };
    let profitability = if health.roe >= 0.0 { (health.roe * 200.0).min(90.0) } else { 10.0 };
    let leverage = if health.debt_ratio >= 0.0 {
        (90.0 - health.debt_ratio * 100.0).max(10.0)
    } else {
        10.0
    };
    let growth = if health.revenue_growth >= 0.0 {
        (health.revenue_growth * 200.0).min(90.0)
    } else {
        10.0
    };

    bounded(
        pe * w.pe
            + pb * w.pb
            + profitability * w.profitability
            + leverage * w.leverage
            + growth * w.growth,
    )
}

// ── Valuation ────────────────────────────────────────────────────────────────

fn relative_multiple_score(value: Option<f64>, reference: f64) -> f64 {
    match value {
        Some(x) if x > 0.0 && reference > 0.0 => {
            ((reference - x) / reference * 50.0 + 50.0).clamp(10.0, 90.0)
        }
        _ => NEUTRAL_SCORE,
    }
}

pub fn valuation_score(
    multiples: &ValuationMultiples,
    reference: &ReferenceMultiples,
    w: &ValuationWeights,
) -> f64 {
    let pe = relative_multiple_score(multiples.pe, reference.pe);
    let pb = relative_multiple_score(multiples.pb, reference.pb);
    bounded(pe * w.pe + pb * w.pb)
}

// ── Composite ────────────────────────────────────────────────────────────────

pub fn comprehensive_score(technical: f64, fundamental: f64, valuation: f64, w: &CompositeWeights) -> f64 {
    round2(weighted_sum(technical, fundamental, valuation, w))
}

fn weighted_sum(technical: f64, fundamental: f64, valuation: f64, w: &CompositeWeights) -> f64 {
    technical * w.technical + fundamental * w.fundamental + valuation * w.valuation
}

/// Stateless scorer bound to one weight configuration.
#[derive(Debug, Clone, Default)]
pub struct CompositeScorer {
    config: ScoringConfig,
}

impl CompositeScorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    pub fn score(
        &self,
        symbol: &str,
        bars: &[PriceBar],
        multiples: &ValuationMultiples,
        health: &FinancialHealth,
    ) -> ScoreRecord {
        let technical = technical_score(bars, &self.config.technical);
        let fundamental = fundamental_score(multiples, health, &self.config.fundamental);
        let valuation = valuation_score(multiples, &self.config.reference, &self.config.valuation);
        self.combine(symbol, technical, fundamental, valuation)
    }

    /// Record with every sub-score neutral.
    pub fn neutral(&self, symbol: &str) -> ScoreRecord {
        self.combine(symbol, NEUTRAL_SCORE, NEUTRAL_SCORE, NEUTRAL_SCORE)
    }

    pub fn combine(&self, symbol: &str, technical: f64, fundamental: f64, valuation: f64) -> ScoreRecord {
        // Rating bands apply to the unrounded sum.
        let raw = weighted_sum(technical, fundamental, valuation, &self.config.composite);
        ScoreRecord {
            symbol: symbol.to_string(),
            technical,
            fundamental,
            valuation,
            comprehensive: round2(raw),
            rating: Rating::from_score(raw),
            scored_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use equirank_test_utils::bars_from_closes;

    fn multiples(pe: f64, pb: f64) -> ValuationMultiples {
        ValuationMultiples { pe: Some(pe), pb: Some(pb) }
    }

    #[test]
    fn test_comprehensive_fixed_subscores() {
        let scorer = CompositeScorer::default();
        let record = scorer.combine("600000", 80.0, 70.0, 60.0);
        // 80*0.3 + 70*0.4 + 60*0.3
        assert_eq!(record.comprehensive, 70.0);
        assert_eq!(record.rating, Rating::Buy);
    }

    #[test]
    fn test_rating_uses_unrounded_score() {
        let scorer = CompositeScorer::default();
        // 24 + 32 + 23.997 = 79.997, shown as 80.00 but still below the band
        let record = scorer.combine("600000", 80.0, 80.0, 79.99);
        assert_eq!(record.comprehensive, 80.0);
        assert_eq!(record.rating, Rating::Buy);
    }

    #[test]
    fn test_technical_neutral_on_short_history() {
        let bars = bars_from_closes("A", &[10.0; 19]);
        assert_eq!(technical_score(&bars, &TechnicalWeights::default()), NEUTRAL_SCORE);
        assert_eq!(technical_score(&[], &TechnicalWeights::default()), NEUTRAL_SCORE);
    }

    #[test]
    fn test_technical_flat_series() {
        // trend 50, momentum 50, stability 70, activity 30
        let bars = bars_from_closes("A", &[10.0; 20]);
        assert_eq!(technical_score(&bars, &TechnicalWeights::default()), 51.0);
    }

    #[test]
    fn test_technical_rewards_uptrend() {
        let rising: Vec<f64> = (0..40).map(|i| 10.0 + i as f64 * 0.2).collect();
        let falling: Vec<f64> = rising.iter().rev().copied().collect();
        let w = TechnicalWeights::default();
        let up = technical_score(&bars_from_closes("A", &rising), &w);
        let down = technical_score(&bars_from_closes("B", &falling), &w);
        assert!(up > down, "uptrend {up} should beat downtrend {down}");
        assert!((0.0..=100.0).contains(&up));
    }

    #[test]
    fn test_fundamental_with_placeholders() {
        let w = FundamentalWeights::default();
        // pe 60, pb 82, roe 20, debt 50, growth 20
        let s = fundamental_score(&multiples(10.0, 1.0), &FinancialHealth::PLACEHOLDER, &w);
        assert_eq!(s, 50.0);
    }

    #[test]
    fn test_fundamental_missing_multiples_are_neutral() {
        let w = FundamentalWeights::default();
        let missing = fundamental_score(&ValuationMultiples::default(), &FinancialHealth::PLACEHOLDER, &w);
        let negative = fundamental_score(&multiples(-3.0, -1.0), &FinancialHealth::PLACEHOLDER, &w);
        assert_eq!(missing, 39.5);
        assert_eq!(negative, missing);
        assert!(!missing.is_nan());
    }

    #[test]
    fn test_valuation_against_reference() {
        let reference = ReferenceMultiples::default();
        let w = ValuationWeights::default();
        // half the reference multiples → 75 on both factors
        assert_eq!(valuation_score(&multiples(9.0, 0.9), &reference, &w), 75.0);
        // at reference → 50
        assert_eq!(valuation_score(&multiples(18.0, 1.8), &reference, &w), 50.0);
        // far above reference clamps at 10
        assert_eq!(valuation_score(&multiples(90.0, 18.0), &reference, &w), 10.0);
        assert_eq!(valuation_score(&ValuationMultiples::default(), &reference, &w), 50.0);
    }

    #[test]
    fn test_neutral_record() {
        let record = CompositeScorer::default().neutral("X");
        assert_eq!(record.comprehensive, 50.0);
        assert_eq!(record.rating, Rating::Neutral);
    }
}
