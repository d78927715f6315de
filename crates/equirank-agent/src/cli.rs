//! Command-line surface of the `equirank` binary.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use equirank_common::{CohortKind, CohortParams};
use equirank_llm::AnalysisKind;

#[derive(Debug, Parser)]
#[command(name = "equirank", version, about = "Equity scoring and cohort ranking")]
pub struct Cli {
    /// Config file; overrides EQUIRANK_CONFIG.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Market data directory; overrides `data.dir`.
    #[arg(long, global = true)]
    pub data: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Rank one cohort and print the result as JSON.
    Rank(CohortArgs),
    /// Run a cohort through the task pool, printing progress.
    Submit(CohortArgs),
    /// Composite score for one instrument, optionally with a narrative.
    Score {
        symbol: String,
        /// comprehensive, technical, fundamental or valuation
        #[arg(long)]
        analysis: Option<AnalysisKind>,
        #[arg(long)]
        as_of: Option<NaiveDate>,
    },
    /// Score several instruments and narrate the comparison.
    Compare {
        #[arg(required = true, num_args = 2..)]
        symbols: Vec<String>,
        #[arg(long)]
        as_of: Option<NaiveDate>,
    },
    /// Mean trailing change per sector plus a narrative.
    Overview {
        /// Sector labels; defaults to `overview.sectors`, then every sector.
        #[arg(long = "sector")]
        sectors: Vec<String>,
        #[arg(long)]
        as_of: Option<NaiveDate>,
    },
    /// List offered model backends in attempt order.
    Backends,
    /// Send a free-form prompt through the backends.
    Narrate { prompt: String },
}

#[derive(Debug, Args)]
pub struct CohortArgs {
    /// sector_leaders, institutional, small_cap_leader, small_cap_hot,
    /// undervalued or ranking
    pub kind: CohortKind,
    #[arg(long)]
    pub sector: Option<String>,
    #[arg(long)]
    pub min_market_cap: Option<f64>,
    #[arg(long)]
    pub max_market_cap: Option<f64>,
    #[arg(long)]
    pub pe_threshold: Option<f64>,
    #[arg(long)]
    pub pb_threshold: Option<f64>,
    #[arg(long)]
    pub limit: Option<usize>,
    #[arg(long)]
    pub as_of: Option<NaiveDate>,
    /// Attach a model-written narrative.
    #[arg(long)]
    pub narrative: bool,
}

impl CohortArgs {
    pub fn params(&self) -> CohortParams {
        CohortParams {
            sector: self.sector.clone(),
            min_market_cap: self.min_market_cap,
            max_market_cap: self.max_market_cap,
            pe_threshold: self.pe_threshold,
            pb_threshold: self.pb_threshold,
            limit: self.limit,
            as_of: self.as_of,
            with_narrative: self.narrative,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_rank_args_map_to_params() {
        let cli = Cli::try_parse_from([
            "equirank", "rank", "small_cap_hot", "--sector", "Batteries", "--limit", "5",
            "--as-of", "2024-03-01", "--narrative",
        ])
        .unwrap();
        let Command::Rank(args) = cli.command else { panic!("expected rank") };
        assert_eq!(args.kind, CohortKind::SmallCapHot);
        let params = args.params();
        assert_eq!(params.sector.as_deref(), Some("Batteries"));
        assert_eq!(params.limit, Some(5));
        assert_eq!(params.as_of, NaiveDate::from_ymd_opt(2024, 3, 1));
        assert!(params.with_narrative);
        assert_eq!(params.pe_threshold, None);
    }

    #[test]
    fn test_unknown_cohort_is_rejected() {
        assert!(Cli::try_parse_from(["equirank", "rank", "momentum"]).is_err());
    }

    #[test]
    fn test_compare_needs_two_symbols() {
        assert!(Cli::try_parse_from(["equirank", "compare", "600036"]).is_err());
        let cli = Cli::try_parse_from(["equirank", "compare", "600036", "000001"]).unwrap();
        assert!(matches!(cli.command, Command::Compare { ref symbols, .. } if symbols.len() == 2));
    }

    #[test]
    fn test_score_analysis_kind() {
        let cli = Cli::try_parse_from(["equirank", "--config", "x.yaml", "score", "600036", "--analysis", "valuation"])
            .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("x.yaml")));
        assert!(matches!(cli.command, Command::Score { analysis: Some(AnalysisKind::Valuation), .. }));
    }
}
