//! Derived metrics over a trailing window of price bars.
//!
//! Short or empty windows never fail: they produce the neutral values
//! documented on [`WindowMetrics`].

use equirank_common::PriceBar;

pub fn closes(bars: &[PriceBar]) -> Vec<f64> {
    bars.iter().map(|b| b.close).collect()
}

pub fn volumes(bars: &[PriceBar]) -> Vec<f64> {
    bars.iter().map(|b| b.volume).collect()
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Standard deviation with `ddof` delta degrees of freedom
/// (0 = population, 1 = sample).
pub fn std_dev(values: &[f64], ddof: usize) -> Option<f64> {
    if values.len() <= ddof {
        return None;
    }
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    Some((ss / (values.len() - ddof) as f64).sqrt())
}

/// Mean of the last `n` values (all of them if fewer).
pub fn trailing_mean(values: &[f64], n: usize) -> Option<f64> {
    let start = values.len().saturating_sub(n);
    mean(&values[start..])
}

pub fn pct_change(from: f64, to: f64) -> f64 {
    if from <= 0.0 || !from.is_finite() || !to.is_finite() {
        return 0.0;
    }
    (to - from) / from * 100.0
}

/// First close to last close, in percent. Zero with fewer than 2 bars.
pub fn price_change_pct(bars: &[PriceBar]) -> f64 {
    match (bars.first(), bars.last()) {
        (Some(first), Some(last)) if bars.len() >= 2 => pct_change(first.close, last.close),
        _ => 0.0,
    }
}

/// Return of the last close against the close `lookback` bars earlier.
pub fn momentum_pct(bars: &[PriceBar], lookback: usize) -> Option<f64> {
    if lookback == 0 || bars.len() <= lookback {
        return None;
    }
    let last = bars[bars.len() - 1].close;
    let base = bars[bars.len() - 1 - lookback].close;
    Some(pct_change(base, last))
}

pub fn average_volume(bars: &[PriceBar]) -> f64 {
    mean(&volumes(bars)).unwrap_or(0.0)
}

/// Sample coefficient of variation of closes.
pub fn volatility(bars: &[PriceBar]) -> Option<f64> {
    let c = closes(bars);
    let m = mean(&c)?;
    if m <= 0.0 {
        return None;
    }
    std_dev(&c, 1).map(|sd| sd / m)
}

/// Window-average volume against the average of every bar except the
/// last `recent` ones. Zero unless the window is longer than `recent`.
pub fn volume_growth_pct(bars: &[PriceBar], recent: usize) -> f64 {
    if bars.len() <= recent {
        return 0.0;
    }
    let v = volumes(bars);
    let prior = mean(&v[..v.len() - recent]).unwrap_or(0.0);
    let avg = mean(&v).unwrap_or(0.0);
    if prior <= 0.0 {
        return 0.0;
    }
    (avg - prior) / prior * 100.0
}

// ── Window summary ───────────────────────────────────────────────────────────

/// Metrics for one candidate's trailing window.
///
/// With fewer than `min_bars` bars the window is neutral: changes, volume
/// and volume growth are 0 and volatility is absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WindowMetrics {
    pub bars: usize,
    pub price_change_pct: f64,
    /// `None` when the window is too short for the momentum lookback.
    pub momentum_pct: Option<f64>,
    pub avg_volume: f64,
    pub volatility: Option<f64>,
    pub volume_growth_pct: f64,
    pub last_close: Option<f64>,
}

impl WindowMetrics {
    pub fn from_bars(
        bars: &[PriceBar],
        min_bars: usize,
        momentum_lookback: usize,
        volume_recent: usize,
    ) -> Self {
        if bars.len() < min_bars.max(2) {
            return Self { bars: bars.len(), ..Self::default() };
        }
        Self {
            bars: bars.len(),
            price_change_pct: price_change_pct(bars),
            momentum_pct: momentum_pct(bars, momentum_lookback),
            avg_volume: average_volume(bars),
            volatility: volatility(bars),
            volume_growth_pct: volume_growth_pct(bars, volume_recent),
            last_close: bars.last().map(|b| b.close),
        }
    }

    pub fn is_neutral(&self) -> bool {
        self.last_close.is_none()
    }

    /// Average daily traded value over the window.
    pub fn avg_turnover(&self) -> f64 {
        self.avg_volume * self.last_close.unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use equirank_test_utils::bars_from_closes;

    #[test]
    fn test_population_vs_sample_std() {
        let v = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((std_dev(&v, 0).unwrap() - 2.0).abs() < 1e-12);
        assert!((std_dev(&v, 1).unwrap() - (32.0f64 / 7.0).sqrt()).abs() < 1e-12);
        assert!(std_dev(&[1.0], 1).is_none());
    }

    #[test]
    fn test_price_change_needs_two_bars() {
        assert_eq!(price_change_pct(&[]), 0.0);
        assert_eq!(price_change_pct(&bars_from_closes("A", &[10.0])), 0.0);
        let bars = bars_from_closes("A", &[10.0, 11.0, 12.0]);
        assert!((price_change_pct(&bars) - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_momentum_lookback() {
        let bars = bars_from_closes("A", &[10.0, 20.0, 25.0]);
        assert!((momentum_pct(&bars, 2).unwrap() - 150.0).abs() < 1e-9);
        assert!((momentum_pct(&bars, 1).unwrap() - 25.0).abs() < 1e-9);
        assert!(momentum_pct(&bars, 3).is_none());
    }

    #[test]
    fn test_volume_growth_against_prior_bars() {
        let mut bars = bars_from_closes("A", &[10.0; 4]);
        for (bar, vol) in bars.iter_mut().zip([100.0, 100.0, 300.0, 300.0]) {
            bar.volume = vol;
        }
        // window mean 200 vs prior mean 100
        assert!((volume_growth_pct(&bars, 2) - 100.0).abs() < 1e-9);
        assert_eq!(volume_growth_pct(&bars, 4), 0.0);
    }

    #[test]
    fn test_short_window_is_neutral() {
        let bars = bars_from_closes("A", &[10.0]);
        let m = WindowMetrics::from_bars(&bars, 2, 20, 10);
        assert!(m.is_neutral());
        assert_eq!(m.bars, 1);
        assert_eq!(m.price_change_pct, 0.0);
        assert_eq!(m.avg_volume, 0.0);
        assert_eq!(m.volatility, None);
        assert_eq!(m.avg_turnover(), 0.0);
    }

    #[test]
    fn test_flat_window_has_zero_volatility() {
        let bars = bars_from_closes("A", &[5.0; 12]);
        let m = WindowMetrics::from_bars(&bars, 10, 20, 10);
        assert_eq!(m.volatility, Some(0.0));
        assert_eq!(m.momentum_pct, None);
        assert!((m.avg_turnover() - 5.0 * m.avg_volume).abs() < 1e-9);
    }
}
