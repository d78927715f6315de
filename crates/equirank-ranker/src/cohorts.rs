//! Cohort scoring formulas, universe selection and result ordering.
//!
//! Everything here is pure: the engine fetches the data and calls in.
//! Scores are rounded to 2 decimals before ordering so repeated runs on
//! the same snapshot order identically.

use equirank_common::{CohortMetrics, Instrument, RankedEntry};

use crate::metrics::WindowMetrics;
use crate::normalise::{normalise_set, Direction};
use crate::scorer::round2;
use crate::weights::{
    InstitutionalWeights, SectorLeaderWeights, SmallCapHotWeights, SmallCapLeaderWeights,
    UndervaluedWeights,
};

/// Message returned with an empty universe.
pub const EMPTY_UNIVERSE_MESSAGE: &str = "no matching instruments";

fn stability_points(volatility: Option<f64>) -> f64 {
    volatility.map(|v| (10.0 - v * 100.0).max(0.0)).unwrap_or(0.0)
}

// ── Formulas ─────────────────────────────────────────────────────────────────

/// Market cap (capped at 10bn), window price change and average volume.
pub fn sector_leader_score(market_cap: Option<f64>, m: &WindowMetrics, w: &SectorLeaderWeights) -> f64 {
    let cap = market_cap.map(|c| (c / 1e9).clamp(0.0, 10.0)).unwrap_or(0.0);
    let change = m.price_change_pct.clamp(-20.0, 20.0) / 2.0;
    let volume = (m.avg_volume / 1e7).min(10.0);
    round2((cap * w.market_cap + change * w.price_change + volume * w.volume) * 10.0)
}

/// Size, liquidity and price stability as a proxy for institutional interest.
pub fn institutional_score(market_cap: Option<f64>, m: &WindowMetrics, w: &InstitutionalWeights) -> f64 {
    let cap = market_cap.map(|c| (c / 1e10).clamp(0.0, 10.0)).unwrap_or(0.0);
    let liquidity = (m.avg_volume / 5e7).min(10.0);
    let stability = stability_points(m.volatility);
    round2((cap * w.market_cap + liquidity * w.liquidity + stability * w.stability) * 10.0)
}

pub fn small_cap_leader_score(market_cap: Option<f64>, m: &WindowMetrics, w: &SmallCapLeaderWeights) -> f64 {
    let size = market_cap.map(|c| (c / 1e9).clamp(0.5, 5.0)).unwrap_or(0.5);
    let growth = m.price_change_pct.clamp(-50.0, 100.0) / 10.0;
    let momentum = m.momentum_pct.unwrap_or(m.price_change_pct).clamp(-25.0, 50.0) / 5.0;
    let risk = stability_points(m.volatility);
    round2((size * w.size + growth * w.growth + momentum * w.momentum + risk * w.risk) * 10.0)
}

pub fn small_cap_hot_score(m: &WindowMetrics, w: &SmallCapHotWeights) -> f64 {
    let growth = m.price_change_pct.clamp(-20.0, 50.0) / 5.0;
    let volume = (m.avg_volume / 1e7).min(10.0);
    let volume_growth = m.volume_growth_pct.clamp(0.0, 200.0) / 20.0;
    round2((growth * w.growth + volume * w.volume + volume_growth * w.volume_growth) * 10.0)
}

/// Instruments with `0 < pe < pe_threshold` and `0 < pb < pb_threshold`.
pub fn undervalued_universe(instruments: Vec<Instrument>, pe_threshold: f64, pb_threshold: f64) -> Vec<Instrument> {
    instruments
        .into_iter()
        .filter(|i| {
            matches!(i.pe, Some(pe) if pe > 0.0 && pe < pe_threshold)
                && matches!(i.pb, Some(pb) if pb > 0.0 && pb < pb_threshold)
        })
        .collect()
}

/// Lower-is-better normalised PE and PB over the set, scaled to 0–100.
pub fn undervalued_scores(instruments: &[Instrument], w: &UndervaluedWeights) -> Vec<f64> {
    let pe: Vec<f64> = instruments.iter().map(|i| i.pe.unwrap_or(f64::NAN)).collect();
    let pb: Vec<f64> = instruments.iter().map(|i| i.pb.unwrap_or(f64::NAN)).collect();
    let n_pe = normalise_set(&pe, Direction::LowerIsBetter);
    let n_pb = normalise_set(&pb, Direction::LowerIsBetter);
    n_pe.iter()
        .zip(&n_pb)
        .map(|(a, b)| round2(100.0 * (w.pe * a + w.pb * b)))
        .collect()
}

// ── Universe ─────────────────────────────────────────────────────────────────

/// Largest market cap first, instruments without a cap last, symbol
/// ascending within ties; then truncated to `cap`.
pub fn largest_first(mut instruments: Vec<Instrument>, cap: usize) -> Vec<Instrument> {
    instruments.sort_by(|a, b| match (a.market_cap, b.market_cap) {
        (Some(x), Some(y)) => y.total_cmp(&x).then_with(|| a.symbol.cmp(&b.symbol)),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => a.symbol.cmp(&b.symbol),
    });
    instruments.truncate(cap);
    instruments
}

// ── Ordering ─────────────────────────────────────────────────────────────────

/// One evaluated candidate before ordering.
#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    pub instrument: Instrument,
    pub score: f64,
    pub metrics: CohortMetrics,
}

/// Order by score desc then symbol asc, attach relative scores computed
/// over the full evaluated set, truncate to `limit` and number from 1.
pub fn order_candidates(candidates: Vec<ScoredCandidate>, limit: usize) -> Vec<RankedEntry> {
    let scores: Vec<f64> = candidates.iter().map(|c| c.score).collect();
    let relative = normalise_set(&scores, Direction::HigherIsBetter);

    let mut entries: Vec<RankedEntry> = candidates
        .into_iter()
        .zip(relative)
        .map(|(c, rel)| RankedEntry {
            rank: 0,
            instrument: c.instrument,
            score: c.score,
            relative_score: rel,
            metrics: c.metrics,
        })
        .collect();

    entries.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.instrument.symbol.cmp(&b.instrument.symbol))
    });
    entries.truncate(limit);
    for (i, entry) in entries.iter_mut().enumerate() {
        entry.rank = i + 1;
    }
    entries
}

pub fn window_cohort_metrics(m: &WindowMetrics) -> CohortMetrics {
    CohortMetrics {
        price_change_pct: Some(round2(m.price_change_pct)),
        momentum_pct: m.momentum_pct.map(round2),
        avg_volume: Some(m.avg_volume.round()),
        volatility: m.volatility,
        bars: m.bars,
        ..CohortMetrics::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use equirank_test_utils::instrument;

    fn window(pct: f64, avg_volume: f64, volatility: Option<f64>) -> WindowMetrics {
        WindowMetrics {
            bars: 20,
            price_change_pct: pct,
            momentum_pct: None,
            avg_volume,
            volatility,
            volume_growth_pct: 0.0,
            last_close: Some(10.0),
        }
    }

    #[test]
    fn test_sector_leader_formula() {
        let w = SectorLeaderWeights::default();
        // cap 10, change 5, volume 2 → (3 + 2 + 0.6) * 10
        let s = sector_leader_score(Some(2e10), &window(10.0, 2e7, None), &w);
        assert_eq!(s, 56.0);
        // neutral window and no cap → 0
        assert_eq!(sector_leader_score(None, &WindowMetrics::default(), &w), 0.0);
        // change clamped at ±20
        let crash = sector_leader_score(None, &window(-80.0, 0.0, None), &w);
        assert_eq!(crash, -40.0);
    }

    #[test]
    fn test_institutional_formula() {
        let w = InstitutionalWeights::default();
        // cap 5, liquidity 1, stability 10 - 2 = 8 → (2.5 + 0.3 + 1.6) * 10
        let s = institutional_score(Some(5e10), &window(0.0, 5e7, Some(0.02)), &w);
        assert_eq!(s, 44.0);
        // missing volatility → worst-case stability
        let s = institutional_score(Some(5e10), &window(0.0, 5e7, None), &w);
        assert_eq!(s, 28.0);
    }

    #[test]
    fn test_small_cap_leader_formula() {
        let w = SmallCapLeaderWeights::default();
        let mut m = window(30.0, 0.0, Some(0.05));
        m.momentum_pct = Some(10.0);
        // size 2, growth 3, momentum 2, risk 5 → (0.4 + 0.9 + 0.6 + 1.0) * 10
        assert_eq!(small_cap_leader_score(Some(2e9), &m, &w), 29.0);
        // without momentum the window change stands in; tiny cap floors at 0.5
        m.momentum_pct = None;
        // size 0.5, growth 3, momentum 6, risk 5 → (0.1 + 0.9 + 1.8 + 1.0) * 10
        assert_eq!(small_cap_leader_score(Some(1e8), &m, &w), 38.0);
    }

    #[test]
    fn test_small_cap_hot_formula() {
        let w = SmallCapHotWeights::default();
        let mut m = window(25.0, 1e7, None);
        m.volume_growth_pct = 300.0;
        // growth 5, volume 1, volume growth 10 → (2 + 0.3 + 3) * 10
        assert_eq!(small_cap_hot_score(&m, &w), 53.0);
    }

    #[test]
    fn test_undervalued_filter_and_scores() {
        let all = vec![
            instrument("A", "Banking", 1e10).with_multiples(5.0, 0.5),
            instrument("B", "Banking", 1e10).with_multiples(10.0, 1.0),
            instrument("C", "Banking", 1e10).with_multiples(15.0, 1.0), // pe at threshold
            instrument("D", "Banking", 1e10).with_multiples(-4.0, 0.8), // loss-making
            instrument("E", "Banking", 1e10),                           // no multiples
        ];
        let cheap = undervalued_universe(all, 15.0, 1.5);
        let symbols: Vec<&str> = cheap.iter().map(|i| i.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["A", "B"]);

        let scores = undervalued_scores(&cheap, &UndervaluedWeights::default());
        assert_eq!(scores, vec![100.0, 0.0]);
    }

    #[test]
    fn test_largest_first_puts_missing_caps_last() {
        let list = vec![
            Instrument::new("Z", "no cap"),
            instrument("B", "x", 5e9),
            instrument("A", "x", 5e9),
            instrument("C", "x", 9e9),
            Instrument::new("Y", "no cap"),
        ];
        let symbols: Vec<String> = largest_first(list, 4).into_iter().map(|i| i.symbol).collect();
        assert_eq!(symbols, vec!["C", "A", "B", "Y"]);
    }

    #[test]
    fn test_ordering_breaks_ties_by_symbol() {
        let candidates = ["C", "A", "B", "D"]
            .iter()
            .zip([50.0, 50.0, 70.0, 10.0])
            .map(|(s, score)| ScoredCandidate {
                instrument: Instrument::new(*s, *s),
                score,
                metrics: CohortMetrics::default(),
            })
            .collect();
        let entries = order_candidates(candidates, 3);
        let order: Vec<(&str, usize)> =
            entries.iter().map(|e| (e.instrument.symbol.as_str(), e.rank)).collect();
        assert_eq!(order, vec![("B", 1), ("A", 2), ("C", 3)]);
        assert_eq!(entries[0].relative_score, 1.0);
        assert!((entries[1].relative_score - 40.0 / 60.0).abs() < 1e-12);
    }
}
