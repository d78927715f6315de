//! CSV-backed market data.
//!
//! Reads two files from a data directory:
//!
//! - `instruments.csv`: `symbol,name,industry,market_cap,pe,pb`
//! - `bars.csv`: `symbol,date,open,close,high,low,volume`
//!
//! Empty numeric cells are treated as missing. Spot quotes are derived
//! from the two most recent bars.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use anyhow::Context;
use async_trait::async_trait;
use chrono::NaiveDate;
use equirank_common::{Instrument, PriceBar, ProviderError, SpotQuote, ValuationMultiples};
use serde::Deserialize;

use crate::provider::{InstrumentDirectory, InstrumentFilter, MarketDataProvider};

#[derive(Debug, Deserialize)]
struct InstrumentRow {
    symbol: String,
    name: String,
    #[serde(default)]
    industry: Option<String>,
    #[serde(default)]
    market_cap: Option<f64>,
    #[serde(default)]
    pe: Option<f64>,
    #[serde(default)]
    pb: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct BarRow {
    symbol: String,
    date: NaiveDate,
    open: f64,
    close: f64,
    high: f64,
    low: f64,
    volume: f64,
}

pub struct CsvMarketData {
    instruments: Vec<Instrument>,
    bars: HashMap<String, Vec<PriceBar>>,
}

impl CsvMarketData {
    /// Load `instruments.csv` and `bars.csv` from `dir`.
    pub fn load(dir: &Path) -> anyhow::Result<Self> {
        let instruments_path = dir.join("instruments.csv");
        let bars_path = dir.join("bars.csv");
        let instruments = std::fs::File::open(&instruments_path)
            .with_context(|| format!("opening {}", instruments_path.display()))?;
        let bars = std::fs::File::open(&bars_path)
            .with_context(|| format!("opening {}", bars_path.display()))?;
        let data = Self::from_readers(instruments, bars)?;
        tracing::info!(
            dir = %dir.display(),
            instruments = data.instruments.len(),
            symbols_with_bars = data.bars.len(),
            "Loaded CSV market data"
        );
        Ok(data)
    }

    pub fn from_readers(instruments: impl Read, bars: impl Read) -> anyhow::Result<Self> {
        let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(instruments);
        let mut parsed = Vec::new();
        for (line, row) in rdr.deserialize::<InstrumentRow>().enumerate() {
            let row = row.with_context(|| format!("instruments.csv record {}", line + 1))?;
            parsed.push(Instrument {
                symbol: row.symbol,
                name: row.name,
                industry: row.industry.filter(|s| !s.is_empty()),
                market_cap: row.market_cap,
                pe: row.pe,
                pb: row.pb,
            });
        }
        parsed.sort_by(|a, b| a.symbol.cmp(&b.symbol));

        let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(bars);
        let mut by_symbol: HashMap<String, Vec<PriceBar>> = HashMap::new();
        for (line, row) in rdr.deserialize::<BarRow>().enumerate() {
            let row = row.with_context(|| format!("bars.csv record {}", line + 1))?;
            by_symbol.entry(row.symbol.clone()).or_default().push(PriceBar {
                symbol: row.symbol,
                date: row.date,
                open: row.open,
                close: row.close,
                high: row.high,
                low: row.low,
                volume: row.volume,
            });
        }
        for bars in by_symbol.values_mut() {
            bars.sort_by_key(|b| b.date);
        }

        Ok(Self { instruments: parsed, bars: by_symbol })
    }

    fn instrument(&self, symbol: &str) -> Option<&Instrument> {
        self.instruments.iter().find(|i| i.symbol == symbol)
    }
}

#[async_trait]
impl MarketDataProvider for CsvMarketData {
    async fn get_price_history(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceBar>, ProviderError> {
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
        let Some(bars) = self.bars.get(symbol) else { return Ok(None) };
        let Some(last) = bars.last() else { return Ok(None) };
        let change_pct = match bars.len() {
            n if n >= 2 => crate::metrics::pct_change(bars[n - 2].close, last.close),
            _ => 0.0,
        };
        Ok(Some(SpotQuote {
            price: last.close,
            change_pct,
            volume: last.volume,
            turnover: last.close * last.volume,
            market_cap: self.instrument(symbol).and_then(|i| i.market_cap),
        }))
    }

    async fn get_valuation_multiples(
        &self,
        symbol: &str,
    ) -> Result<Option<ValuationMultiples>, ProviderError> {
        Ok(self
            .instrument(symbol)
            .filter(|i| i.pe.is_some() || i.pb.is_some())
            .map(|i| ValuationMultiples { pe: i.pe, pb: i.pb }))
    }
}

#[async_trait]
impl InstrumentDirectory for CsvMarketData {
    async fn list_instruments(
        &self,
        filter: &InstrumentFilter,
    ) -> Result<Vec<Instrument>, ProviderError> {
        Ok(self.instruments.iter().filter(|i| filter.matches(i)).cloned().collect())
    }
}
