//! RankEngine — cohort pipelines, single-instrument scoring and the
//! market overview, wired to the external collaborators.
//!
//! Pipeline shape for every cohort:
//!   1. Select the candidate universe from the instrument directory
//!   2. Fetch each candidate's trailing window (bounded concurrency)
//!   3. Score with the cohort formula, neutralising missing data
//!   4. Order by score desc, symbol asc and truncate
//!   5. Optionally narrate, then archive
//!
//! Provider failures for a single candidate never abort the batch.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use equirank_common::progress::scaled_percent;
use equirank_common::{
    CohortKind, CohortMetrics, CohortParams, CohortResult, EquirankError, Instrument, Narrative,
    NarrativeSource, NoProgress, PriceBar, ProgressSink, Result, ScoreRecord, ValuationMultiples,
};
use equirank_llm::prompts::{self, AnalysisKind};
use equirank_llm::Narrator;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::archive::{archive_quietly, Producer, ResultArchive};
use crate::cohorts::{
    institutional_score, largest_first, order_candidates, sector_leader_score,
    small_cap_hot_score, small_cap_leader_score, undervalued_scores, undervalued_universe,
    window_cohort_metrics, ScoredCandidate, EMPTY_UNIVERSE_MESSAGE,
};
use crate::config::RankerConfig;
use crate::metrics::{price_change_pct, WindowMetrics};
use crate::provider::{
    FundamentalsProvider, InstrumentDirectory, InstrumentFilter, MarketDataProvider,
    PlaceholderFundamentals,
};
use crate::scorer::{round2, CompositeScorer, FinancialHealth, NEUTRAL_SCORE};

/// Momentum lookback reported by cohorts that don't score momentum.
const REPORTED_MOMENTUM_BARS: usize = 10;
/// Recent-window length for volume growth outside the hot small-cap cohort.
const REPORTED_VOLUME_RECENT_BARS: usize = 10;

// ── Market overview ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorPerformance {
    pub sector: String,
    /// Mean trailing price change over instruments with data.
    pub avg_change_pct: f64,
    /// Instruments that contributed to the mean.
    pub instruments: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketOverview {
    /// Best performing sector first.
    pub sectors: Vec<SectorPerformance>,
    pub narrative: Narrative,
    pub generated_at: DateTime<Utc>,
}

/// Algorithmic summary used when no model answers.
pub fn basic_market_summary(sectors: &[SectorPerformance]) -> String {
    if sectors.is_empty() {
        return "No sector data available.".to_string();
    }
    let fmt = |s: &SectorPerformance| format!("{} ({:+.2}%)", s.sector, s.avg_change_pct);
    let leading: Vec<String> = sectors.iter().take(3).map(fmt).collect();
    let trailing: Vec<String> = sectors.iter().rev().take(3).map(fmt).collect();
    format!(
        "Leading sectors: {}. Trailing sectors: {}.",
        leading.join(", "),
        trailing.join(", ")
    )
}

// ── Per-cohort plan ──────────────────────────────────────────────────────────

/// Window and sizing resolved from config and caller parameters.
#[derive(Debug, Clone, Copy)]
struct WindowPlan {
    lookback_days: i64,
    min_bars: usize,
    momentum_bars: usize,
    volume_recent_bars: usize,
}

#[derive(Debug, Clone, Copy)]
struct Sizing {
    universe_cap: Option<usize>,
    leaders: usize,
    limit: usize,
}

// ── Engine ───────────────────────────────────────────────────────────────────

pub struct RankEngine {
    config: RankerConfig,
    scorer: CompositeScorer,
    market: Arc<dyn MarketDataProvider>,
    directory: Arc<dyn InstrumentDirectory>,
    fundamentals: Arc<dyn FundamentalsProvider>,
    narrator: Arc<Narrator>,
    archive: Option<Arc<dyn ResultArchive>>,
}

impl RankEngine {
    /// Engine with placeholder fundamentals, an offline narrator and no archive.
    pub fn new(
        config: RankerConfig,
        market: Arc<dyn MarketDataProvider>,
        directory: Arc<dyn InstrumentDirectory>,
    ) -> Self {
        let mut config = config;
        let invalid = config.invalid_weight_tables();
        if !invalid.is_empty() {
            warn!(tables = ?invalid, "Weight tables do not sum to 1, normalising");
            config.normalise_weights();
        }
        Self {
            scorer: CompositeScorer::new(config.scoring.clone()),
            config,
            market,
            directory,
            fundamentals: Arc::new(PlaceholderFundamentals),
            narrator: Arc::new(Narrator::offline()),
            archive: None,
        }
    }

    pub fn with_fundamentals(mut self, fundamentals: Arc<dyn FundamentalsProvider>) -> Self {
        self.fundamentals = fundamentals;
        self
    }

    pub fn with_narrator(mut self, narrator: Arc<Narrator>) -> Self {
        self.narrator = narrator;
        self
    }

    pub fn with_archive(mut self, archive: Arc<dyn ResultArchive>) -> Self {
        self.archive = Some(archive);
        self
    }

    pub fn config(&self) -> &RankerConfig {
        &self.config
    }

    pub fn narrator(&self) -> &Arc<Narrator> {
        &self.narrator
    }

    pub fn directory(&self) -> &Arc<dyn InstrumentDirectory> {
        &self.directory
    }

    // ── Cohorts ──────────────────────────────────────────────────────────────

    pub async fn rank(&self, kind: CohortKind, params: CohortParams) -> Result<CohortResult> {
        self.rank_with_progress(kind, params, &NoProgress).await
    }

    #[instrument(skip(self, params, progress), fields(cohort = kind.as_str()))]
    pub async fn rank_with_progress(
        &self,
        kind: CohortKind,
        params: CohortParams,
        progress: &dyn ProgressSink,
    ) -> Result<CohortResult> {
        validate_params(&params)?;
        let as_of = params.as_of.unwrap_or_else(|| Utc::now().date_naive());
        let sizing = self.sizing(kind, &params);

        let universe = match self.select_universe(kind, &params, sizing.universe_cap).await {
            Ok(u) => u,
            Err(e) => {
                warn!(error = %e, "Instrument directory unavailable");
                progress.report(0, "instrument directory unavailable", None);
                return Ok(CohortResult::empty(kind, params, format!("instrument directory unavailable: {e}")));
            }
        };
        if universe.is_empty() {
            info!("Empty candidate universe");
            progress.report(0, EMPTY_UNIVERSE_MESSAGE, None);
            return Ok(CohortResult::empty(kind, params, EMPTY_UNIVERSE_MESSAGE));
        }

        let total = universe.len();
        progress.report(0, &format!("analysing {total} instruments"), None);

        let candidates = match kind {
            CohortKind::Undervalued => self.evaluate_undervalued(universe, progress),
            CohortKind::Ranking => {
                self.evaluate_concurrently(universe, progress, |inst| self.evaluate_composite(inst, as_of))
                    .await
            }
            _ => {
                let plan = self.window_plan(kind);
                self.evaluate_concurrently(universe, progress, |inst| {
                    self.evaluate_window(kind, inst, plan, as_of)
                })
                .await
            }
        };

        progress.report(85, "sorting", None);
        let entries = order_candidates(candidates, sizing.limit);

        progress.report(95, "assembling result", None);
        let leaders = entries
            .iter()
            .take(sizing.leaders)
            .map(|e| e.instrument.symbol.clone())
            .collect();
        let with_narrative = params.with_narrative;
        let mut result = CohortResult {
            kind,
            params,
            entries,
            leaders,
            total_analyzed: total,
            message: None,
            narrative: None,
            generated_at: Utc::now(),
        };

        if with_narrative {
            let narrative = self.narrator.narrate(&prompts::cohort_summary(&result)).await;
            self.archive_narrative(None, kind.as_str(), &narrative).await;
            result.narrative = Some(narrative);
        }

        info!(
            analysed = result.total_analyzed,
            returned = result.entries.len(),
            leaders = ?result.leaders,
            "Cohort ranked"
        );
        self.archive_json(None, kind.as_str(), &result, Producer::InternalAlgorithm).await;
        Ok(result)
    }

    fn sizing(&self, kind: CohortKind, params: &CohortParams) -> Sizing {
        let c = &self.config;
        let (universe_cap, leaders, detail_limit) = match kind {
            CohortKind::SectorLeaders => {
                let cap = (!has_sector(params)).then_some(c.sector_leaders.universe_cap);
                (cap, c.sector_leaders.leaders, c.sector_leaders.detail_limit)
            }
            CohortKind::Institutional => (Some(c.institutional.universe_cap), c.institutional.leaders, c.institutional.detail_limit),
            // Already bounded by the market-cap threshold; every eligible instrument is scored.
            CohortKind::SmallCapLeader => (None, c.small_cap_leader.leaders, c.small_cap_leader.detail_limit),
            CohortKind::SmallCapHot => (None, c.small_cap_hot.leaders, c.small_cap_hot.detail_limit),
            CohortKind::Undervalued => (None, c.undervalued.leaders, c.undervalued.detail_limit),
            CohortKind::Ranking => (Some(c.ranking.universe_cap), c.ranking.leaders, c.ranking.limit),
        };
        let limit = params.limit.unwrap_or(detail_limit);
        Sizing { universe_cap, leaders: leaders.min(limit), limit }
    }

    fn window_plan(&self, kind: CohortKind) -> WindowPlan {
        let c = &self.config;
        let plan = |lookback_days, min_bars| WindowPlan {
            lookback_days,
            min_bars,
            momentum_bars: REPORTED_MOMENTUM_BARS,
            volume_recent_bars: REPORTED_VOLUME_RECENT_BARS,
        };
        match kind {
            CohortKind::Institutional => plan(c.institutional.lookback_days, c.institutional.min_bars),
            CohortKind::SmallCapLeader => WindowPlan {
                momentum_bars: c.small_cap_leader.momentum_bars,
                ..plan(c.small_cap_leader.lookback_days, c.small_cap_leader.min_bars)
            },
            CohortKind::SmallCapHot => WindowPlan {
                volume_recent_bars: c.small_cap_hot.recent_bars,
                ..plan(c.small_cap_hot.lookback_days, c.small_cap_hot.min_bars)
            },
            _ => plan(c.sector_leaders.lookback_days, c.sector_leaders.min_bars),
        }
    }

    async fn select_universe(
        &self,
        kind: CohortKind,
        params: &CohortParams,
        cap: Option<usize>,
    ) -> std::result::Result<Vec<Instrument>, equirank_common::ProviderError> {
        let base = match &params.sector {
            Some(sector) if has_sector(params) => InstrumentFilter::Industry(sector.trim().to_string()),
            _ => InstrumentFilter::All,
        };

        let mut constraints = Vec::new();
        if let Some(min) = params.min_market_cap {
            constraints.push(InstrumentFilter::MarketCapAtLeast(min));
        }
        match kind {
            CohortKind::SmallCapLeader => constraints.push(InstrumentFilter::MarketCapAtMost(
                params.max_market_cap.unwrap_or(self.config.small_cap_leader.max_market_cap),
            )),
            CohortKind::SmallCapHot => constraints.push(InstrumentFilter::MarketCapAtMost(
                params.max_market_cap.unwrap_or(self.config.small_cap_hot.max_market_cap),
            )),
            _ => {
                if let Some(max) = params.max_market_cap {
                    constraints.push(InstrumentFilter::MarketCapAtMost(max));
                }
            }
        }

        let listed: Vec<Instrument> = self
            .directory
            .list_instruments(&base)
            .await?
            .into_iter()
            .filter(|i| constraints.iter().all(|c| c.matches(i)))
            .collect();

        let selected = match kind {
            CohortKind::Undervalued => {
                let pe = params.pe_threshold.unwrap_or(self.config.undervalued.pe_threshold);
                let pb = params.pb_threshold.unwrap_or(self.config.undervalued.pb_threshold);
                undervalued_universe(listed, pe, pb)
            }
            _ => largest_first(listed, cap.unwrap_or(usize::MAX)),
        };
        Ok(selected)
    }

    async fn evaluate_concurrently<'a, F, Fut>(
        &'a self,
        universe: Vec<Instrument>,
        progress: &dyn ProgressSink,
        evaluate: F,
    ) -> Vec<ScoredCandidate>
    where
        F: Fn(Instrument) -> Fut,
        Fut: std::future::Future<Output = ScoredCandidate> + 'a,
    {
        let total = universe.len();
        let concurrency = self.config.fetch.concurrency.max(1);
        let mut stream = futures::stream::iter(universe.into_iter().map(evaluate)).buffer_unordered(concurrency);

        let mut candidates = Vec::with_capacity(total);
        while let Some(candidate) = stream.next().await {
            let label = candidate.instrument.label();
            candidates.push(candidate);
            progress.report(scaled_percent(candidates.len(), total, 80), "analysing", Some(&label));
        }
        candidates
    }

    fn evaluate_undervalued(&self, universe: Vec<Instrument>, progress: &dyn ProgressSink) -> Vec<ScoredCandidate> {
        let total = universe.len();
        let scores = undervalued_scores(&universe, &self.config.undervalued.weights);
        universe
            .into_iter()
            .zip(scores)
            .enumerate()
            .map(|(i, (instrument, score))| {
                progress.report(scaled_percent(i + 1, total, 80), "analysing", Some(&instrument.label()));
                ScoredCandidate { instrument, score, metrics: CohortMetrics::default() }
            })
            .collect()
    }

    async fn fetch_window(&self, symbol: &str, as_of: NaiveDate, lookback_days: i64) -> Vec<PriceBar> {
        let start = as_of - Duration::days(lookback_days);
        match self.market.get_price_history(symbol, start, as_of).await {
            Ok(bars) => bars,
            Err(e) => {
                warn!(symbol, error = %e, "Price history unavailable, using neutral metrics");
                Vec::new()
            }
        }
    }

    /// Directory market cap, falling back to the spot quote.
    async fn market_cap(&self, instrument: &Instrument) -> Option<f64> {
        if instrument.market_cap.is_some() {
            return instrument.market_cap;
        }
        match self.market.get_spot_quote(&instrument.symbol).await {
            Ok(quote) => quote.and_then(|q| q.market_cap),
            Err(e) => {
                warn!(symbol = %instrument.symbol, error = %e, "Spot quote unavailable");
                None
            }
        }
    }

    async fn evaluate_window(
        &self,
        kind: CohortKind,
        mut instrument: Instrument,
        plan: WindowPlan,
        as_of: NaiveDate,
    ) -> ScoredCandidate {
        let bars = self.fetch_window(&instrument.symbol, as_of, plan.lookback_days).await;
        let m = WindowMetrics::from_bars(&bars, plan.min_bars, plan.momentum_bars, plan.volume_recent_bars);
        let cap = self.market_cap(&instrument).await;
        instrument.market_cap = cap;

        let c = &self.config;
        let mut metrics = window_cohort_metrics(&m);
        let score = match kind {
            CohortKind::Institutional => {
                metrics.avg_turnover = Some(m.avg_turnover().round());
                institutional_score(cap, &m, &c.institutional.weights)
            }
            CohortKind::SmallCapLeader => small_cap_leader_score(cap, &m, &c.small_cap_leader.weights),
            CohortKind::SmallCapHot => {
                metrics.volume_growth_pct = Some(round2(m.volume_growth_pct));
                small_cap_hot_score(&m, &c.small_cap_hot.weights)
            }
            _ => sector_leader_score(cap, &m, &c.sector_leaders.weights),
        };
        ScoredCandidate { instrument, score, metrics }
    }

    async fn evaluate_composite(&self, instrument: Instrument, as_of: NaiveDate) -> ScoredCandidate {
        let (record, bars) = self.score_known(&instrument, as_of).await;
        let metrics = CohortMetrics {
            price_change_pct: (bars.len() >= 2).then(|| round2(price_change_pct(&bars))),
            comprehensive: Some(record.comprehensive),
            rating: Some(record.rating),
            bars: bars.len(),
            ..CohortMetrics::default()
        };
        ScoredCandidate { instrument, score: record.comprehensive, metrics }
    }

    /// Score an instrument known to the directory, returning the bars the
    /// technical sub-score was computed from.
    async fn score_known(&self, instrument: &Instrument, as_of: NaiveDate) -> (ScoreRecord, Vec<PriceBar>) {
        let symbol = instrument.symbol.as_str();
        let bars = self.fetch_window(symbol, as_of, self.config.scoring.history_days).await;
        let multiples = match self.market.get_valuation_multiples(symbol).await {
            Ok(Some(m)) => m,
            Ok(None) => ValuationMultiples { pe: instrument.pe, pb: instrument.pb },
            Err(e) => {
                warn!(symbol, error = %e, "Valuation multiples unavailable, using directory values");
                ValuationMultiples { pe: instrument.pe, pb: instrument.pb }
            }
        };
        let health = self
            .fundamentals
            .financial_health(symbol)
            .unwrap_or(FinancialHealth::PLACEHOLDER);
        (self.scorer.score(symbol, &bars, &multiples, &health), bars)
    }

    // ── Single instruments ───────────────────────────────────────────────────

    pub async fn score(&self, symbol: &str) -> Result<ScoreRecord> {
        self.score_as_of(symbol, None).await
    }

    /// Score one instrument. An instrument unknown to the directory keeps a
    /// technical score from its bars and neutral fundamental and valuation.
    #[instrument(skip(self))]
    pub async fn score_as_of(&self, symbol: &str, as_of: Option<NaiveDate>) -> Result<ScoreRecord> {
        let symbol = symbol.trim();
        if symbol.is_empty() {
            return Err(EquirankError::InvalidInput("empty symbol".to_string()));
        }
        let as_of = as_of.unwrap_or_else(|| Utc::now().date_naive());

        let instrument = match self.directory.get_instrument(symbol).await {
            Ok(found) => found,
            Err(e) => {
                warn!(error = %e, "Instrument lookup failed");
                None
            }
        };

        let record = match instrument {
            Some(instrument) => self.score_known(&instrument, as_of).await.0,
            None => {
                let bars = self.fetch_window(symbol, as_of, self.config.scoring.history_days).await;
                let technical = crate::scorer::technical_score(&bars, &self.config.scoring.technical);
                self.scorer.combine(symbol, technical, NEUTRAL_SCORE, NEUTRAL_SCORE)
            }
        };

        info!(
            comprehensive = record.comprehensive,
            rating = record.rating.as_str(),
            "Instrument scored"
        );
        self.archive_json(Some(symbol), "score", &record, Producer::ScoringAlgorithm).await;
        Ok(record)
    }

    /// Score plus a narrative focused on `kind`.
    pub async fn analyze_instrument(
        &self,
        symbol: &str,
        kind: AnalysisKind,
        as_of: Option<NaiveDate>,
    ) -> Result<(ScoreRecord, Narrative)> {
        let record = self.score_as_of(symbol, as_of).await?;
        let instrument = self
            .directory
            .get_instrument(symbol.trim())
            .await
            .ok()
            .flatten()
            .unwrap_or_else(|| Instrument::new(symbol.trim(), symbol.trim()));
        let narrative = self.narrator.analyze_instrument(&instrument, &record, kind).await;
        self.archive_narrative(Some(symbol.trim()), kind.as_str(), &narrative).await;
        Ok((record, narrative))
    }

    /// Score several instruments and narrate a comparison. Records are
    /// ordered by comprehensive score desc, symbol asc.
    pub async fn compare(
        &self,
        symbols: &[String],
        as_of: Option<NaiveDate>,
    ) -> Result<(Vec<ScoreRecord>, Narrative)> {
        if symbols.len() < 2 {
            return Err(EquirankError::InvalidInput("comparison needs at least two symbols".to_string()));
        }
        let mut rows = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            let record = self.score_as_of(symbol, as_of).await?;
            let instrument = self
                .directory
                .get_instrument(&record.symbol)
                .await
                .ok()
                .flatten()
                .unwrap_or_else(|| Instrument::new(record.symbol.clone(), record.symbol.clone()));
            rows.push((instrument, record));
        }
        rows.sort_by(|a, b| {
            b.1.comprehensive
                .total_cmp(&a.1.comprehensive)
                .then_with(|| a.1.symbol.cmp(&b.1.symbol))
        });
        let narrative = self.narrator.compare_instruments(&rows).await;
        self.archive_narrative(None, "comparison", &narrative).await;
        Ok((rows.into_iter().map(|(_, r)| r).collect(), narrative))
    }

    // ── Market overview ──────────────────────────────────────────────────────

    /// Mean trailing price change per sector label, best first.
    #[instrument(skip(self, sectors))]
    pub async fn market_overview(&self, sectors: &[String], as_of: Option<NaiveDate>) -> Result<MarketOverview> {
        let as_of = as_of.unwrap_or_else(|| Utc::now().date_naive());
        let days = self.config.fetch.overview_days.max(1);
        let cap = self.config.sector_leaders.universe_cap;
        let mut performance = Vec::with_capacity(sectors.len());

        for sector in sectors {
            let listed = match self.directory.list_instruments(&InstrumentFilter::Industry(sector.clone())).await {
                Ok(list) => largest_first(list, cap),
                Err(e) => {
                    warn!(sector = %sector, error = %e, "Sector listing failed");
                    Vec::new()
                }
            };
            let concurrency = self.config.fetch.concurrency.max(1);
            let changes: Vec<Option<f64>> = futures::stream::iter(listed.iter().map(|inst| async move {
                // Calendar window wide enough to hold `days` trading sessions.
                let bars = self.fetch_window(&inst.symbol, as_of, days * 2 + 4).await;
                let tail = &bars[bars.len().saturating_sub(days as usize + 1)..];
                (tail.len() >= 2).then(|| price_change_pct(tail))
            }))
            .buffered(concurrency)
            .collect()
            .await;

            let with_data: Vec<f64> = changes.into_iter().flatten().collect();
            let avg = if with_data.is_empty() {
                0.0
            } else {
                with_data.iter().sum::<f64>() / with_data.len() as f64
            };
            performance.push(SectorPerformance {
                sector: sector.clone(),
                avg_change_pct: round2(avg),
                instruments: with_data.len(),
            });
        }

        performance.sort_by(|a, b| {
            b.avg_change_pct
                .total_cmp(&a.avg_change_pct)
                .then_with(|| a.sector.cmp(&b.sector))
        });

        let rows: Vec<(String, f64)> = performance.iter().map(|p| (p.sector.clone(), p.avg_change_pct)).collect();
        let narrative = self
            .narrator
            .narrate_or_else(&prompts::market_report(&rows), || basic_market_summary(&performance))
            .await;

        let overview = MarketOverview { sectors: performance, narrative, generated_at: Utc::now() };
        self.archive_json(None, "market_overview", &overview, Producer::InternalAlgorithm).await;
        Ok(overview)
    }

    // ── Archiving ────────────────────────────────────────────────────────────

    async fn archive_json<T: Serialize>(&self, symbol: Option<&str>, kind: &str, value: &T, producer: Producer) {
        if self.archive.is_none() {
            return;
        }
        match serde_json::to_value(value) {
            Ok(payload) => archive_quietly(self.archive.as_deref(), symbol, kind, &payload, producer).await,
            Err(e) => warn!(kind, error = %e, "Result not serialisable, skipping archive"),
        }
    }

    async fn archive_narrative(&self, symbol: Option<&str>, kind: &str, narrative: &Narrative) {
        if let NarrativeSource::Model { .. } = narrative.source {
            self.archive_json(symbol, &format!("{kind}_narrative"), narrative, Producer::AiModel).await;
        }
    }
}

fn has_sector(params: &CohortParams) -> bool {
    params.sector.as_deref().is_some_and(|s| !s.trim().is_empty())
}

fn validate_params(params: &CohortParams) -> Result<()> {
    let positive = |name: &str, v: Option<f64>| match v {
        Some(x) if !(x.is_finite() && x > 0.0) => {
            Err(EquirankError::InvalidInput(format!("{name} must be a positive number")))
        }
        _ => Ok(()),
    };
    positive("pe_threshold", params.pe_threshold)?;
    positive("pb_threshold", params.pb_threshold)?;
    positive("max_market_cap", params.max_market_cap)?;
    if let Some(min) = params.min_market_cap {
        if !min.is_finite() || min < 0.0 {
            return Err(EquirankError::InvalidInput("min_market_cap must be non-negative".to_string()));
        }
    }
    if params.limit == Some(0) {
        return Err(EquirankError::InvalidInput("limit must be at least 1".to_string()));
    }
    Ok(())
}

/// Sector labels present in the directory, alphabetical.
pub async fn known_sectors(directory: &dyn InstrumentDirectory) -> Vec<String> {
    match directory.list_instruments(&InstrumentFilter::All).await {
        Ok(list) => list
            .into_iter()
            .filter_map(|i| i.industry)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect(),
        Err(e) => {
            warn!(error = %e, "Instrument directory unavailable");
            Vec::new()
        }
    }
}
