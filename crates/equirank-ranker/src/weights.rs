//! Weight tables for the composite scorer and the cohort rankers.
//!
//! Every table is a convex combination: weights sum to 1.0. Tables loaded
//! from configuration can be checked with `validate()` and repaired with
//! `normalise()`.

use serde::{Deserialize, Serialize};

macro_rules! weight_table {
    (
        $(#[$meta:meta])*
        $name:ident { $( $(#[$fmeta:meta])* $field:ident = $default:expr ),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
        #[serde(default)]
        pub struct $name {
            $( $(#[$fmeta])* pub $field: f64, )+
        }

        impl Default for $name {
            fn default() -> Self {
                Self { $( $field: $default, )+ }
            }
        }

        impl $name {
            /// Weights in declaration order.
            pub fn as_vec(&self) -> Vec<f64> {
                vec![ $( self.$field, )+ ]
            }

            /// Validate that all weights sum to ~1.0 and none is negative.
            pub fn validate(&self) -> bool {
                let weights = self.as_vec();
                weights.iter().all(|w| *w >= 0.0)
                    && (weights.iter().sum::<f64>() - 1.0).abs() < 1e-6
            }

            /// Renormalise weights so they sum to 1.0. Negative or non-finite
            /// weights count as 0; a table with nothing left reverts to the
            /// defaults.
            pub fn normalise(&mut self) {
                $(
                    if !(self.$field.is_finite() && self.$field > 0.0) {
                        self.$field = 0.0;
                    }
                )+
                let sum: f64 = self.as_vec().iter().sum();
                if sum > 0.0 {
                    $( self.$field /= sum; )+
                } else {
                    *self = Self::default();
                }
            }
        }
    };
}

weight_table! {
    /// Technical sub-score: trend / momentum / stability / activity.
    TechnicalWeights {
        /// 5-day vs 20-day moving-average position
        trend = 0.30,
        /// 10-day return
        momentum = 0.25,
        /// inverse 20-day coefficient of variation
        stability = 0.25,
        /// recent vs window average volume
        activity = 0.20,
    }
}

weight_table! {
    /// Fundamental sub-score.
    FundamentalWeights {
        pe = 0.25,
        pb = 0.25,
        /// return on equity
        profitability = 0.20,
        /// debt ratio, lower is better
        leverage = 0.15,
        /// revenue growth
        growth = 0.15,
    }
}

weight_table! {
    /// Valuation sub-score: multiples against the reference multiples.
    ValuationWeights {
        pe = 0.60,
        pb = 0.40,
    }
}

weight_table! {
    /// Comprehensive score.
    CompositeWeights {
        technical = 0.30,
        fundamental = 0.40,
        valuation = 0.30,
    }
}

weight_table! {
    SectorLeaderWeights {
        market_cap = 0.30,
        price_change = 0.40,
        volume = 0.30,
    }
}

weight_table! {
    InstitutionalWeights {
        market_cap = 0.50,
        liquidity = 0.30,
        stability = 0.20,
    }
}

weight_table! {
    SmallCapLeaderWeights {
        size = 0.20,
        growth = 0.30,
        momentum = 0.30,
        /// inverse volatility
        risk = 0.20,
    }
}

weight_table! {
    SmallCapHotWeights {
        growth = 0.40,
        volume = 0.30,
        volume_growth = 0.30,
    }
}

weight_table! {
    /// Inverse multiples. 0.6 / 0.4 is the PE-leaning alternative.
    UndervaluedWeights {
        pe = 0.50,
        pb = 0.50,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_weights_sum_to_one() {
        assert!(TechnicalWeights::default().validate());
        assert!(FundamentalWeights::default().validate());
        assert!(ValuationWeights::default().validate());
        assert!(CompositeWeights::default().validate());
        assert!(SectorLeaderWeights::default().validate());
        assert!(InstitutionalWeights::default().validate());
        assert!(SmallCapLeaderWeights::default().validate());
        assert!(SmallCapHotWeights::default().validate());
        assert!(UndervaluedWeights::default().validate());
    }

    #[test]
    fn test_normalise_restores_sum() {
        let mut w = SectorLeaderWeights::default();
        w.price_change += 0.10; // deliberately break sum
        assert!(!w.validate());
        w.normalise();
        assert!(w.validate());
        assert!(w.price_change > w.market_cap);
    }

    #[test]
    fn test_negative_weight_rejected() {
        let w = UndervaluedWeights { pe: 1.5, pb: -0.5 };
        assert!(!w.validate());
    }

    #[test]
    fn test_normalise_drops_negative_weights() {
        // sums to 1 but is not convex
        let mut w = CompositeWeights { technical: -0.5, fundamental: 1.0, valuation: 0.5 };
        assert!(!w.validate());
        w.normalise();
        assert!(w.validate());
        assert_eq!(w.technical, 0.0);
        assert!((w.fundamental - 2.0 / 3.0).abs() < 1e-12);
        assert!((w.valuation - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_normalise_empty_table_reverts_to_defaults() {
        let mut w = SmallCapHotWeights { growth: -1.0, volume: 0.0, volume_growth: f64::NAN };
        w.normalise();
        assert_eq!(w, SmallCapHotWeights::default());
    }

    #[test]
    fn test_partial_table_fills_defaults() {
        let w: UndervaluedWeights = toml::from_str("pe = 0.6\npb = 0.4").unwrap();
        assert!(w.validate());
        let w: CompositeWeights = toml::from_str("technical = 0.3").unwrap();
        assert_eq!(w, CompositeWeights::default());
    }
}
