//! equirank-common — Shared types, errors, and traits used across all Equirank crates.

pub mod error;
pub mod entities;
pub mod progress;

// Re-export commonly used types
pub use entities::{
    CohortKind, CohortMetrics, CohortParams, CohortResult, Instrument, Narrative,
    NarrativeSource, PriceBar, RankedEntry, Rating, ScoreRecord, SpotQuote, ValuationMultiples,
};
pub use error::{EquirankError, ProviderError, Result};
pub use progress::{NoProgress, ProgressSink};
