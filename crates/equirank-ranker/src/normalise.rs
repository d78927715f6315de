//! Feature normalisation over a candidate set.
//!
//! Raw per-candidate metrics are scaled into [0, 1] with min-max scaling
//! over the set being ranked. Degenerate sets (a single candidate or all
//! equal values) map every candidate to a neutral 0.5.

use serde::{Deserialize, Serialize};

const DEGENERATE_SPAN: f64 = 1e-10;
const NEUTRAL: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    HigherIsBetter,
    /// Valuation multiples, size for small-cap screens.
    LowerIsBetter,
}

/// Min-max normalisation within a given range [min_val, max_val].
pub fn minmax_normalise(value: f64, min_val: f64, max_val: f64) -> f64 {
    if (max_val - min_val).abs() < DEGENERATE_SPAN {
        return NEUTRAL;
    }
    ((value - min_val) / (max_val - min_val)).clamp(0.0, 1.0)
}

/// Normalise every value against the set's own min and max.
/// Returns scores in the same order as input.
pub fn normalise_set(values: &[f64], direction: Direction) -> Vec<f64> {
    let finite = values.iter().copied().filter(|v| v.is_finite());
    let (min, max) = finite.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if !min.is_finite() || !max.is_finite() {
        return vec![NEUTRAL; values.len()];
    }

    values
        .iter()
        .map(|&v| {
            let v = if v.is_finite() { v } else { sentinel(direction, max) };
            let n = minmax_normalise(v, min, max);
            match direction {
                Direction::HigherIsBetter => n,
                Direction::LowerIsBetter if (max - min).abs() < DEGENERATE_SPAN => n,
                Direction::LowerIsBetter => 1.0 - n,
            }
        })
        .collect()
}

/// Like [`normalise_set`], substituting a sentinel for missing values:
/// the worst observed value for lower-is-better metrics, zero otherwise.
pub fn normalise_with_missing(values: &[Option<f64>], direction: Direction) -> Vec<f64> {
    let worst = values
        .iter()
        .flatten()
        .copied()
        .filter(|v| v.is_finite())
        .fold(f64::NEG_INFINITY, f64::max);
    let worst = if worst.is_finite() { worst } else { 0.0 };

    let filled: Vec<f64> = values
        .iter()
        .map(|v| v.filter(|x| x.is_finite()).unwrap_or_else(|| sentinel(direction, worst)))
        .collect();
    normalise_set(&filled, direction)
}

fn sentinel(direction: Direction, worst: f64) -> f64 {
    match direction {
        Direction::HigherIsBetter => 0.0,
        Direction::LowerIsBetter => worst,
    }
}
