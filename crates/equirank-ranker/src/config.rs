//! Ranker configuration.
//!
//! Loaded as the `[ranker]` table of `equirank.toml`. Every field has a
//! default, so a missing table yields the stock behaviour.

use serde::{Deserialize, Serialize};

use crate::scorer::ReferenceMultiples;
use crate::weights::{
    CompositeWeights, FundamentalWeights, InstitutionalWeights, SectorLeaderWeights,
    SmallCapHotWeights, SmallCapLeaderWeights, TechnicalWeights, UndervaluedWeights,
    ValuationWeights,
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankerConfig {
    pub scoring: ScoringConfig,
    pub sector_leaders: SectorLeadersConfig,
    pub institutional: InstitutionalConfig,
    pub small_cap_leader: SmallCapLeaderConfig,
    pub small_cap_hot: SmallCapHotConfig,
    pub undervalued: UndervaluedConfig,
    pub ranking: RankingConfig,
    pub fetch: FetchConfig,
}

impl RankerConfig {
    /// Names of weight tables that do not sum to 1.0.
    pub fn invalid_weight_tables(&self) -> Vec<&'static str> {
        let checks = [
            ("scoring.technical", self.scoring.technical.validate()),
            ("scoring.fundamental", self.scoring.fundamental.validate()),
            ("scoring.valuation", self.scoring.valuation.validate()),
            ("scoring.composite", self.scoring.composite.validate()),
            ("sector_leaders.weights", self.sector_leaders.weights.validate()),
            ("institutional.weights", self.institutional.weights.validate()),
            ("small_cap_leader.weights", self.small_cap_leader.weights.validate()),
            ("small_cap_hot.weights", self.small_cap_hot.weights.validate()),
            ("undervalued.weights", self.undervalued.weights.validate()),
        ];
        checks.into_iter().filter(|(_, ok)| !ok).map(|(name, _)| name).collect()
    }

    /// Renormalise every weight table in place.
    pub fn normalise_weights(&mut self) {
        self.scoring.technical.normalise();
        self.scoring.fundamental.normalise();
        self.scoring.valuation.normalise();
        self.scoring.composite.normalise();
        self.sector_leaders.weights.normalise();
        self.institutional.weights.normalise();
        self.small_cap_leader.weights.normalise();
        self.small_cap_hot.weights.normalise();
        self.undervalued.weights.normalise();
    }
}

// ── Composite scorer ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub technical: TechnicalWeights,
    pub fundamental: FundamentalWeights,
    pub valuation: ValuationWeights,
    pub composite: CompositeWeights,
    pub reference: ReferenceMultiples,
    /// Calendar days of history fetched for the technical sub-score.
    pub history_days: i64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            technical: TechnicalWeights::default(),
            fundamental: FundamentalWeights::default(),
            valuation: ValuationWeights::default(),
            composite: CompositeWeights::default(),
            reference: ReferenceMultiples::default(),
            history_days: 70,
        }
    }
}

// ── Cohorts ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SectorLeadersConfig {
    pub weights: SectorLeaderWeights,
    pub lookback_days: i64,
    pub min_bars: usize,
    /// Cap on the universe when no sector is given, largest caps first.
    pub universe_cap: usize,
    pub leaders: usize,
    pub detail_limit: usize,
}

impl Default for SectorLeadersConfig {
    fn default() -> Self {
        Self {
            weights: SectorLeaderWeights::default(),
            lookback_days: 15,
            min_bars: 2,
            universe_cap: 100,
            leaders: 2,
            detail_limit: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstitutionalConfig {
    pub weights: InstitutionalWeights,
    pub lookback_days: i64,
    pub min_bars: usize,
    pub universe_cap: usize,
    pub leaders: usize,
    pub detail_limit: usize,
}

impl Default for InstitutionalConfig {
    fn default() -> Self {
        Self {
            weights: InstitutionalWeights::default(),
            lookback_days: 30,
            min_bars: 10,
            universe_cap: 50,
            leaders: 10,
            detail_limit: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmallCapLeaderConfig {
    pub weights: SmallCapLeaderWeights,
    pub lookback_days: i64,
    pub min_bars: usize,
    pub max_market_cap: f64,
    /// Bars between the momentum base close and the last close.
    pub momentum_bars: usize,
    pub leaders: usize,
    pub detail_limit: usize,
}

impl Default for SmallCapLeaderConfig {
    fn default() -> Self {
        Self {
            weights: SmallCapLeaderWeights::default(),
            lookback_days: 60,
            min_bars: 10,
            max_market_cap: 1e10,
            momentum_bars: 20,
            leaders: 10,
            detail_limit: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmallCapHotConfig {
    pub weights: SmallCapHotWeights,
    pub lookback_days: i64,
    pub min_bars: usize,
    pub max_market_cap: f64,
    /// Trailing bars excluded from the prior-volume baseline.
    pub recent_bars: usize,
    pub leaders: usize,
    pub detail_limit: usize,
}

impl Default for SmallCapHotConfig {
    fn default() -> Self {
        Self {
            weights: SmallCapHotWeights::default(),
            lookback_days: 20,
            min_bars: 5,
            max_market_cap: 5e9,
            recent_bars: 10,
            leaders: 10,
            detail_limit: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UndervaluedConfig {
    pub weights: UndervaluedWeights,
    pub pe_threshold: f64,
    pub pb_threshold: f64,
    pub leaders: usize,
    pub detail_limit: usize,
}

impl Default for UndervaluedConfig {
    fn default() -> Self {
        Self {
            weights: UndervaluedWeights::default(),
            pe_threshold: 15.0,
            pb_threshold: 1.5,
            leaders: 10,
            detail_limit: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    pub universe_cap: usize,
    pub leaders: usize,
    pub limit: usize,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self { universe_cap: 100, leaders: 10, limit: 20 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Candidates whose bars are fetched concurrently.
    pub concurrency: usize,
    /// Trailing days used for sector performance in the market overview.
    pub overview_days: i64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self { concurrency: 4, overview_days: 5 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(RankerConfig::default().invalid_weight_tables().is_empty());
    }

    #[test]
    fn test_negative_composite_weight_is_repaired() {
        let mut cfg = RankerConfig::default();
        cfg.scoring.composite = CompositeWeights { technical: -0.5, fundamental: 1.0, valuation: 0.5 };
        assert_eq!(cfg.invalid_weight_tables(), vec!["scoring.composite"]);

        cfg.normalise_weights();
        assert!(cfg.invalid_weight_tables().is_empty());

        let scorer = crate::scorer::CompositeScorer::new(cfg.scoring.clone());
        for (t, f, v) in [(100.0, 10.0, 10.0), (0.0, 100.0, 100.0)] {
            let c = scorer.combine("X", t, f, v).comprehensive;
            assert!((0.0..=100.0).contains(&c), "comprehensive {c} out of bounds");
        }
    }

    #[test]
    fn test_partial_toml_overrides() {
        let cfg: RankerConfig = toml::from_str(
            r#"
            [undervalued]
            pe_threshold = 20.0
            weights = { pe = 0.6, pb = 0.4 }

            [small_cap_hot]
            max_market_cap = 3e9
            "#,
        )
        .unwrap();
        assert_eq!(cfg.undervalued.pe_threshold, 20.0);
        assert_eq!(cfg.undervalued.pb_threshold, 1.5);
        assert_eq!(cfg.undervalued.weights.pe, 0.6);
        assert_eq!(cfg.small_cap_hot.max_market_cap, 3e9);
        assert_eq!(cfg.small_cap_hot.lookback_days, 20);
        assert_eq!(cfg.sector_leaders, SectorLeadersConfig::default());
    }

    #[test]
    fn test_invalid_tables_reported_and_repaired() {
        let mut cfg = RankerConfig::default();
        cfg.institutional.weights.market_cap = 0.9;
        assert_eq!(cfg.invalid_weight_tables(), vec!["institutional.weights"]);
        cfg.normalise_weights();
        assert!(cfg.invalid_weight_tables().is_empty());
    }
}
