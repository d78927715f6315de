/// Core entity types shared by the scoring engine, the model layer and the task manager.
/// Instruments and bars are read-only snapshots handed over by the data provider.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::EquirankError;

// ---------------------------------------------------------------------------
// Instrument
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instrument {
    pub symbol: String,
    pub name: String,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub market_cap: Option<f64>,
    #[serde(default)]
    pub pe: Option<f64>,
    #[serde(default)]
    pub pb: Option<f64>,
}

impl Instrument {
    pub fn new(symbol: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            name: name.into(),
            industry: None,
            market_cap: None,
            pe: None,
            pb: None,
        }
    }

    pub fn with_industry(mut self, industry: impl Into<String>) -> Self {
        self.industry = Some(industry.into());
        self
    }

    pub fn with_market_cap(mut self, market_cap: f64) -> Self {
        self.market_cap = Some(market_cap);
        self
    }

    pub fn with_multiples(mut self, pe: f64, pb: f64) -> Self {
        self.pe = Some(pe);
        self.pb = Some(pb);
        self
    }

    /// "SYMBOL name", used as the current item in progress reports.
    pub fn label(&self) -> String {
        format!("{} {}", self.symbol, self.name)
    }
}

// ---------------------------------------------------------------------------
// Market data
// ---------------------------------------------------------------------------

/// One daily OHLCV bar. Sequences are ascending by date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub symbol: String,
    pub date: NaiveDate,
    pub open: f64,
    pub close: f64,
    pub high: f64,
    pub low: f64,
    pub volume: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpotQuote {
    pub price: f64,
    pub change_pct: f64,
    pub volume: f64,
    pub turnover: f64,
    pub market_cap: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ValuationMultiples {
    pub pe: Option<f64>,
    pub pb: Option<f64>,
}

// ---------------------------------------------------------------------------
// Scores
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rating {
    #[serde(rename = "strong buy")]
    StrongBuy,
    #[serde(rename = "buy")]
    Buy,
    #[serde(rename = "cautious buy")]
    CautiousBuy,
    #[serde(rename = "neutral")]
    Neutral,
    #[serde(rename = "avoid")]
    Avoid,
}

impl Rating {
    /// Fixed buckets: 80 / 70 / 60 / 40.
    pub fn from_score(score: f64) -> Self {
        if score >= 80.0 {
            Rating::StrongBuy
        } else if score >= 70.0 {
            Rating::Buy
        } else if score >= 60.0 {
            Rating::CautiousBuy
        } else if score >= 40.0 {
            Rating::Neutral
        } else {
            Rating::Avoid
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Rating::StrongBuy   => "strong buy",
            Rating::Buy         => "buy",
            Rating::CautiousBuy => "cautious buy",
            Rating::Neutral     => "neutral",
            Rating::Avoid       => "avoid",
        }
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub symbol: String,
    pub technical: f64,
    pub fundamental: f64,
    pub valuation: f64,
    pub comprehensive: f64,
    pub rating: Rating,
    pub scored_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Cohorts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CohortKind {
    #[serde(alias = "dragon")]
    SectorLeaders,
    Institutional,
    SmallCapLeader,
    SmallCapHot,
    Undervalued,
    Ranking,
}

impl CohortKind {
    pub const ALL: [CohortKind; 6] = [
        CohortKind::SectorLeaders,
        CohortKind::Institutional,
        CohortKind::SmallCapLeader,
        CohortKind::SmallCapHot,
        CohortKind::Undervalued,
        CohortKind::Ranking,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CohortKind::SectorLeaders  => "sector_leaders",
            CohortKind::Institutional  => "institutional",
            CohortKind::SmallCapLeader => "small_cap_leader",
            CohortKind::SmallCapHot    => "small_cap_hot",
            CohortKind::Undervalued    => "undervalued",
            CohortKind::Ranking        => "ranking",
        }
    }
}

impl fmt::Display for CohortKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CohortKind {
    type Err = EquirankError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase().replace('-', "_");
        if key == "dragon" {
            return Ok(CohortKind::SectorLeaders);
        }
        CohortKind::ALL
            .into_iter()
            .find(|k| k.as_str() == key)
            .ok_or_else(|| EquirankError::UnknownCohort(s.to_string()))
    }
}

/// Caller-supplied parameters for one cohort invocation.
/// Unset fields fall back to the cohort's configured defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CohortParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_market_cap: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_market_cap: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pe_threshold: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pb_threshold: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    /// Reference date for trailing windows; today when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub as_of: Option<NaiveDate>,
    #[serde(default)]
    pub with_narrative: bool,
}

impl CohortParams {
    pub fn with_sector(mut self, sector: impl Into<String>) -> Self {
        self.sector = Some(sector.into());
        self
    }

    pub fn with_as_of(mut self, as_of: NaiveDate) -> Self {
        self.as_of = Some(as_of);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_narrative(mut self) -> Self {
        self.with_narrative = true;
        self
    }
}

/// Supporting metrics behind a cohort score. Only the fields a cohort
/// actually uses are populated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CohortMetrics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_change_pct: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub momentum_pct: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_volume: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volatility: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_growth_pct: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_turnover: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comprehensive: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<Rating>,
    /// Number of bars the metrics were derived from.
    #[serde(default)]
    pub bars: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedEntry {
    /// 1-based position in the cohort.
    pub rank: usize,
    pub instrument: Instrument,
    pub score: f64,
    /// Score min-max normalised over every evaluated candidate.
    pub relative_score: f64,
    pub metrics: CohortMetrics,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NarrativeSource {
    Model { backend: String, model: String },
    Offline,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Narrative {
    pub text: String,
    pub source: NarrativeSource,
}

impl Narrative {
    pub fn is_offline(&self) -> bool {
        matches!(self.source, NarrativeSource::Offline)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CohortResult {
    pub kind: CohortKind,
    pub params: CohortParams,
    /// Ordered by score desc, symbol asc.
    pub entries: Vec<RankedEntry>,
    /// Symbols of the headline picks (a prefix of `entries`).
    pub leaders: Vec<String>,
    pub total_analyzed: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narrative: Option<Narrative>,
    pub generated_at: DateTime<Utc>,
}

impl CohortResult {
    /// Successful result with no entries and an explanation.
    pub fn empty(kind: CohortKind, params: CohortParams, message: impl Into<String>) -> Self {
        Self {
            kind,
            params,
            entries: Vec::new(),
            leaders: Vec::new(),
            total_analyzed: 0,
            message: Some(message.into()),
            narrative: None,
            generated_at: Utc::now(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_rating_buckets() {
        assert_eq!(Rating::from_score(80.0), Rating::StrongBuy);
        assert_eq!(Rating::from_score(79.99), Rating::Buy);
        assert_eq!(Rating::from_score(73.0), Rating::Buy);
        assert_eq!(Rating::from_score(60.0), Rating::CautiousBuy);
        assert_eq!(Rating::from_score(40.0), Rating::Neutral);
        assert_eq!(Rating::from_score(39.99), Rating::Avoid);
    }

    #[test]
    fn test_rating_serialises_as_label() {
        let json = serde_json::to_string(&Rating::CautiousBuy).unwrap();
        assert_eq!(json, "\"cautious buy\"");
    }

    #[test]
    fn test_cohort_kind_parse() {
        assert_eq!("sector_leaders".parse::<CohortKind>().unwrap(), CohortKind::SectorLeaders);
        assert_eq!("small-cap-hot".parse::<CohortKind>().unwrap(), CohortKind::SmallCapHot);
        assert_eq!("dragon".parse::<CohortKind>().unwrap(), CohortKind::SectorLeaders);
        for kind in CohortKind::ALL {
            assert_eq!(kind.as_str().parse::<CohortKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_unknown_cohort_is_hard_error() {
        let err = "momentum_monsters".parse::<CohortKind>().unwrap_err();
        assert!(matches!(err, EquirankError::UnknownCohort(ref k) if k == "momentum_monsters"));
    }

    #[test]
    fn test_cohort_params_deserialise_partial() {
        let params: CohortParams =
            serde_json::from_str(r#"{"sector":"Banking","limit":5}"#).unwrap();
        assert_eq!(params, CohortParams::default().with_sector("Banking").with_limit(5));
    }

    #[test]
    fn test_empty_result_carries_message() {
        let r = CohortResult::empty(CohortKind::Undervalued, CohortParams::default(), "nothing");
        assert!(r.is_empty());
        assert_eq!(r.message.as_deref(), Some("nothing"));
        assert_eq!(r.total_analyzed, 0);
    }
}
