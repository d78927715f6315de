//! Fixture builders shared by the Equirank test suites.
//!
//! Bars are synthetic daily bars on consecutive calendar days starting at
//! [`day`]`(1)` = 2024-01-01 unless an explicit end date is given.

use std::sync::Mutex;

use chrono::{Duration, NaiveDate};
use equirank_common::{Instrument, PriceBar, ProgressSink};

pub const DEFAULT_VOLUME: f64 = 1_000_000.0;

/// Calendar day `n` of the fixture timeline (1-based).
pub fn day(n: u32) -> NaiveDate {
    let origin = NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid fixture origin");
    origin + Duration::days(i64::from(n.max(1)) - 1)
}

fn bar(symbol: &str, date: NaiveDate, close: f64, volume: f64) -> PriceBar {
    PriceBar {
        symbol: symbol.to_string(),
        date,
        open: close,
        close,
        high: close,
        low: close,
        volume,
    }
}

/// Bars from `day(1)` onwards with a constant volume.
pub fn bars_from_closes(symbol: &str, closes: &[f64]) -> Vec<PriceBar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| bar(symbol, day(i as u32 + 1), c, DEFAULT_VOLUME))
        .collect()
}

/// Bars from `day(1)` onwards; `volumes` must be as long as `closes`.
pub fn bars_with_volumes(symbol: &str, closes: &[f64], volumes: &[f64]) -> Vec<PriceBar> {
    assert_eq!(closes.len(), volumes.len(), "closes and volumes differ in length");
    closes
        .iter()
        .zip(volumes)
        .enumerate()
        .map(|(i, (&c, &v))| bar(symbol, day(i as u32 + 1), c, v))
        .collect()
}

/// Consecutive daily bars whose last bar falls on `end`.
pub fn bars_ending(symbol: &str, end: NaiveDate, closes: &[f64], volume: f64) -> Vec<PriceBar> {
    let n = closes.len() as i64;
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| bar(symbol, end - Duration::days(n - 1 - i as i64), c, volume))
        .collect()
}

/// Linear close series from `from` to `to` over `n` bars.
pub fn linear_closes(from: f64, to: f64, n: usize) -> Vec<f64> {
    if n < 2 {
        return vec![from; n];
    }
    let step = (to - from) / (n - 1) as f64;
    (0..n).map(|i| from + step * i as f64).collect()
}

pub fn instrument(symbol: &str, industry: &str, market_cap: f64) -> Instrument {
    Instrument::new(symbol, format!("{symbol} Holdings"))
        .with_industry(industry)
        .with_market_cap(market_cap)
}

/// One progress report as seen by [`RecordingProgress`].
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
    pub percent: u8,
    pub step: String,
    pub current_item: Option<String>,
}

/// Progress sink that keeps every report.
#[derive(Debug, Default)]
pub struct RecordingProgress {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn percents(&self) -> Vec<u8> {
        self.events().iter().map(|e| e.percent).collect()
    }
}

impl ProgressSink for RecordingProgress {
    fn report(&self, percent: u8, step: &str, current_item: Option<&str>) {
        if let Ok(mut events) = self.events.lock() {
            events.push(ProgressEvent {
                percent,
                step: step.to_string(),
                current_item: current_item.map(str::to_string),
            });
        }
    }
}
