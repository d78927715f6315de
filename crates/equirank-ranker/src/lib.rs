//! equirank-ranker — Equity scoring and cohort ranking engine.
//!
//! Feature normalisation, the composite scorer, bar-derived metrics,
//! cohort formulas and the [`RankEngine`] facade that runs them against
//! the external market-data collaborators.

pub mod archive;
pub mod cohorts;
pub mod config;
pub mod csv_provider;
pub mod engine;
pub mod metrics;
pub mod normalise;
pub mod provider;
pub mod scorer;
pub mod weights;

pub use archive::{JsonlArchive, MemoryArchive, Producer, ResultArchive};
pub use config::RankerConfig;
pub use csv_provider::CsvMarketData;
pub use engine::{known_sectors, MarketOverview, RankEngine, SectorPerformance};
pub use provider::{
    FundamentalsProvider, InstrumentDirectory, InstrumentFilter, MarketDataProvider,
    MemoryDirectory, MockMarketData, PlaceholderFundamentals,
};
pub use scorer::{CompositeScorer, FinancialHealth};
