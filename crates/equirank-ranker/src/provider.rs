//! Traits for external market-data access.
//!
//! The ranker never talks to a data vendor directly: bars, quotes and
//! multiples come through [`MarketDataProvider`], the candidate universe
//! through [`InstrumentDirectory`] and statement data through
//! [`FundamentalsProvider`]. Implementations must be safe to share across
//! tasks.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::NaiveDate;
use equirank_common::{Instrument, PriceBar, ProviderError, SpotQuote, ValuationMultiples};

use crate::scorer::FinancialHealth;

/// Source of bars, quotes and valuation multiples.
///
/// Calls are assumed slow and unreliable; callers treat every error as
/// "no data" for that instrument.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Bars with `start <= date <= end`, ascending. May be empty.
    async fn get_price_history(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceBar>, ProviderError>;

    async fn get_spot_quote(&self, symbol: &str) -> Result<Option<SpotQuote>, ProviderError>;

    async fn get_valuation_multiples(
        &self,
        symbol: &str,
    ) -> Result<Option<ValuationMultiples>, ProviderError>;
}

/// Candidate-universe selection passed to [`InstrumentDirectory`].
#[derive(Debug, Clone, PartialEq)]
pub enum InstrumentFilter {
    All,
    /// Case-insensitive substring of the industry label.
    Industry(String),
    MarketCapAtMost(f64),
    MarketCapAtLeast(f64),
    Symbols(Vec<String>),
}

impl InstrumentFilter {
    pub fn matches(&self, instrument: &Instrument) -> bool {
        match self {
            InstrumentFilter::All => true,
            InstrumentFilter::Industry(needle) => instrument
                .industry
                .as_deref()
                .map(|i| i.to_lowercase().contains(&needle.to_lowercase()))
                .unwrap_or(false),
            InstrumentFilter::MarketCapAtMost(max) => {
                instrument.market_cap.map(|c| c <= *max).unwrap_or(false)
            }
            InstrumentFilter::MarketCapAtLeast(min) => {
                instrument.market_cap.map(|c| c >= *min).unwrap_or(false)
            }
            InstrumentFilter::Symbols(symbols) => symbols.iter().any(|s| s == &instrument.symbol),
        }
    }
}

#[async_trait]
pub trait InstrumentDirectory: Send + Sync {
    async fn list_instruments(
        &self,
        filter: &InstrumentFilter,
    ) -> Result<Vec<Instrument>, ProviderError>;

    async fn get_instrument(&self, symbol: &str) -> Result<Option<Instrument>, ProviderError> {
        let found = self
            .list_instruments(&InstrumentFilter::Symbols(vec![symbol.to_string()]))
            .await?;
        Ok(found.into_iter().next())
    }
}

/// Statement-derived inputs for the fundamental sub-score.
pub trait FundamentalsProvider: Send + Sync {
    /// Returns None when no statement data is available for the symbol.
    fn financial_health(&self, symbol: &str) -> Option<FinancialHealth>;
}

/// Returns [`FinancialHealth::PLACEHOLDER`] for every symbol.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlaceholderFundamentals;

impl FundamentalsProvider for PlaceholderFundamentals {
    fn financial_health(&self, _symbol: &str) -> Option<FinancialHealth> {
        Some(FinancialHealth::PLACEHOLDER)
    }
}

// ── Mock Implementations ─────────────────────────────────────────────────────

/// In-memory market data for tests and embedding.
pub struct MockMarketData {
    bars: HashMap<String, Vec<PriceBar>>,
    quotes: HashMap<String, SpotQuote>,
    multiples: HashMap<String, ValuationMultiples>,
    failing: HashSet<String>,
    history_calls: AtomicUsize,
}

impl MockMarketData {
    pub fn new() -> Self {
        Self {
            bars: HashMap::new(),
            quotes: HashMap::new(),
            multiples: HashMap::new(),
            failing: HashSet::new(),
            history_calls: AtomicUsize::new(0),
        }
    }

    /// Add bars for a symbol; they are kept sorted by date.
    pub fn with_bars(mut self, symbol: &str, mut bars: Vec<PriceBar>) -> Self {
        bars.sort_by_key(|b| b.date);
        self.bars.insert(symbol.to_string(), bars);
        self
    }

    pub fn with_quote(mut self, symbol: &str, quote: SpotQuote) -> Self {
        self.quotes.insert(symbol.to_string(), quote);
        self
    }

    pub fn with_multiples(mut self, symbol: &str, pe: f64, pb: f64) -> Self {
        self.multiples
            .insert(symbol.to_string(), ValuationMultiples { pe: Some(pe), pb: Some(pb) });
        self
    }

    /// Every call for this symbol fails with `Unreachable`.
    pub fn failing(mut self, symbol: &str) -> Self {
        self.failing.insert(symbol.to_string());
        self
    }

    pub fn history_calls(&self) -> usize {
        self.history_calls.load(Ordering::SeqCst)
    }

    fn check(&self, symbol: &str) -> Result<(), ProviderError> {
        if self.failing.contains(symbol) {
            return Err(ProviderError::Unreachable(format!("mock failure for {symbol}")));
        }
        Ok(())
    }
}

impl Default for MockMarketData {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MarketDataProvider for MockMarketData {
    async fn get_price_history(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceBar>, ProviderError> {
        self.history_calls.fetch_add(1, Ordering::SeqCst);
        self.check(symbol)?;
        Ok(self
            .bars
            .get(symbol)
            .map(|bars| {
                bars.iter()
                    .filter(|b| b.date >= start && b.date <= end)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn get_spot_quote(&self, symbol: &str) -> Result<Option<SpotQuote>, ProviderError> {
        self.check(symbol)?;
        Ok(self.quotes.get(symbol).cloned())
    }

    async fn get_valuation_multiples(
        &self,
        symbol: &str,
    ) -> Result<Option<ValuationMultiples>, ProviderError> {
        self.check(symbol)?;
        Ok(self.multiples.get(symbol).copied())
    }
}

/// Fixed instrument list.
#[derive(Debug, Default, Clone)]
pub struct MemoryDirectory {
    instruments: Vec<Instrument>,
    unavailable: bool,
}

impl MemoryDirectory {
    pub fn new(instruments: Vec<Instrument>) -> Self {
        Self { instruments, unavailable: false }
    }

    pub fn with(mut self, instrument: Instrument) -> Self {
        self.instruments.push(instrument);
        self
    }

    /// Every listing fails with `Unreachable`.
    pub fn unavailable() -> Self {
        Self { instruments: Vec::new(), unavailable: true }
    }
}

#[async_trait]
impl InstrumentDirectory for MemoryDirectory {
    async fn list_instruments(
        &self,
        filter: &InstrumentFilter,
    ) -> Result<Vec<Instrument>, ProviderError> {
        if self.unavailable {
            return Err(ProviderError::Unreachable("instrument directory offline".to_string()));
        }
        Ok(self.instruments.iter().filter(|i| filter.matches(i)).cloned().collect())
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use equirank_test_utils::{bars_from_closes, day};

    #[test]
    fn test_filter_matching() {
        let bank = Instrument::new("600036", "Merchants Bank")
            .with_industry("Banking")
            .with_market_cap(8e11);
        let bare = Instrument::new("300999", "Unlisted Cap");

        assert!(InstrumentFilter::Industry("bank".into()).matches(&bank));
        assert!(!InstrumentFilter::Industry("bank".into()).matches(&bare));
        assert!(InstrumentFilter::MarketCapAtLeast(1e11).matches(&bank));
        assert!(!InstrumentFilter::MarketCapAtMost(1e10).matches(&bank));
        assert!(!InstrumentFilter::MarketCapAtMost(1e10).matches(&bare));
        assert!(InstrumentFilter::Symbols(vec!["300999".into()]).matches(&bare));
    }

    #[tokio::test]
    async fn test_mock_history_respects_range() {
        let market = MockMarketData::new().with_bars("A", bars_from_closes("A", &[1.0, 2.0, 3.0, 4.0]));
        let bars = market.get_price_history("A", day(2), day(3)).await.unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].close, 2.0);
        assert!(market.get_price_history("B", day(1), day(9)).await.unwrap().is_empty());
        assert_eq!(market.history_calls(), 2);
    }

    #[tokio::test]
    async fn test_mock_failure() {
        let market = MockMarketData::new().failing("A");
        let err = market.get_valuation_multiples("A").await.unwrap_err();
        assert!(matches!(err, ProviderError::Unreachable(_)));
    }

    #[tokio::test]
    async fn test_directory_lookup() {
        let dir = MemoryDirectory::default().with(Instrument::new("A", "Alpha"));
        assert_eq!(dir.get_instrument("A").await.unwrap().unwrap().name, "Alpha");
        assert!(dir.get_instrument("Z").await.unwrap().is_none());
        assert!(MemoryDirectory::unavailable().list_instruments(&InstrumentFilter::All).await.is_err());
    }
}
