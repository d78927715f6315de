//! Prompt builders for narratives.

use std::fmt::Write;
use std::str::FromStr;

use equirank_common::{CohortKind, CohortResult, Instrument, ScoreRecord};
use serde::{Deserialize, Serialize};

use crate::backend::LlmError;

/// Focus of a single-instrument analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisKind {
    #[default]
    Comprehensive,
    Technical,
    Fundamental,
    Valuation,
}

impl AnalysisKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisKind::Comprehensive => "comprehensive",
            AnalysisKind::Technical     => "technical",
            AnalysisKind::Fundamental   => "fundamental",
            AnalysisKind::Valuation     => "valuation",
        }
    }
}

impl FromStr for AnalysisKind {
    type Err = LlmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "comprehensive" => Ok(AnalysisKind::Comprehensive),
            "technical"     => Ok(AnalysisKind::Technical),
            "fundamental"   => Ok(AnalysisKind::Fundamental),
            "valuation"     => Ok(AnalysisKind::Valuation),
            other => Err(LlmError::Unavailable(format!("unknown analysis kind '{other}'"))),
        }
    }
}

fn multiple(v: Option<f64>) -> String {
    v.map(|x| format!("{x:.2}")).unwrap_or_else(|| "n/a".to_string())
}

pub fn instrument_analysis(instrument: &Instrument, score: &ScoreRecord, kind: AnalysisKind) -> String {
    let mut p = String::new();
    let _ = writeln!(p, "Please analyse stock {}.", instrument.label());
    if let Some(industry) = &instrument.industry {
        let _ = writeln!(p, "Industry: {industry}");
    }
    let _ = writeln!(p, "PE: {}, PB: {}", multiple(instrument.pe), multiple(instrument.pb));
    let _ = writeln!(
        p,
        "Scores (0-100): technical {:.2}, fundamental {:.2}, valuation {:.2}, comprehensive {:.2} ({}).",
        score.technical, score.fundamental, score.valuation, score.comprehensive, score.rating
    );
    let focus = match kind {
        AnalysisKind::Comprehensive => "Give a balanced view covering trend, fundamentals, valuation and the main risks.",
        AnalysisKind::Technical => "Focus on the price trend, momentum, volatility and trading activity.",
        AnalysisKind::Fundamental => "Focus on profitability, leverage and growth as reflected in the multiples.",
        AnalysisKind::Valuation => "Focus on whether the multiples are cheap or expensive against industry norms.",
    };
    let _ = writeln!(p, "{focus}");
    p.push_str("Keep it concise and note that the scores are heuristic.");
    p
}

pub fn compare_instruments(rows: &[(Instrument, ScoreRecord)]) -> String {
    let mut p = String::from("Compare the following stocks and say which looks strongest and why:\n");
    for (instrument, score) in rows {
        let _ = writeln!(
            p,
            "- {}: comprehensive {:.2} ({}), technical {:.2}, fundamental {:.2}, valuation {:.2}",
            instrument.label(), score.comprehensive, score.rating,
            score.technical, score.fundamental, score.valuation
        );
    }
    p
}

fn cohort_title(kind: CohortKind) -> &'static str {
    match kind {
        CohortKind::SectorLeaders  => "sector leaders",
        CohortKind::Institutional  => "institutionally favoured stocks",
        CohortKind::SmallCapLeader => "small-cap leaders",
        CohortKind::SmallCapHot    => "hot small caps",
        CohortKind::Undervalued    => "undervalued stocks",
        CohortKind::Ranking        => "comprehensive stock ranking",
    }
}

/// Market-style summary request for a ranked cohort.
pub fn cohort_summary(result: &CohortResult) -> String {
    let mut p = format!(
        "Summarise this market cohort of {} ({} analysed",
        cohort_title(result.kind),
        result.total_analyzed
    );
    if let Some(sector) = &result.params.sector {
        let _ = write!(p, ", sector {sector}");
    }
    p.push_str("):\n");
    for entry in result.entries.iter().take(10) {
        let _ = write!(p, "{}. {} score {:.2}", entry.rank, entry.instrument.label(), entry.score);
        if let Some(pct) = entry.metrics.price_change_pct {
            let _ = write!(p, ", change {pct:.2}%");
        }
        p.push('\n');
    }
    p.push_str("Highlight the leaders and any common theme.");
    p
}

/// Sector performance rows as (sector, average change %).
pub fn market_report(sectors: &[(String, f64)]) -> String {
    let mut p = String::from("Write a short market report from this sector performance:\n");
    for (sector, change) in sectors {
        let _ = writeln!(p, "- {sector}: {change:+.2}%");
    }
    p.push_str("Describe the rotation between leading and lagging sectors.");
    p
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classification::{PromptCategory, PromptClassifier};
    use chrono::Utc;
    use equirank_common::{CohortParams, Rating};

    fn record(symbol: &str, comprehensive: f64) -> ScoreRecord {
        ScoreRecord {
            symbol: symbol.to_string(),
            technical: 60.0,
            fundamental: 70.0,
            valuation: 80.0,
            comprehensive,
            rating: Rating::from_score(comprehensive),
            scored_at: Utc::now(),
        }
    }

    #[test]
    fn test_analysis_prompt_contents() {
        let inst = Instrument::new("600519", "Moutai").with_industry("Liquor").with_multiples(30.0, 9.5);
        let p = instrument_analysis(&inst, &record("600519", 71.0), AnalysisKind::Valuation);
        assert!(p.contains("Please analyse stock 600519 Moutai."));
        assert!(p.contains("PE: 30.00, PB: 9.50"));
        assert!(p.contains("cheap or expensive"));
        assert_eq!(PromptClassifier::default().classify(&p), PromptCategory::StockAnalysis);
    }

    #[test]
    fn test_compare_prompt_classifies_as_comparison() {
        let rows = vec![
            (Instrument::new("A", "Alpha"), record("A", 65.0)),
            (Instrument::new("B", "Beta"), record("B", 55.0)),
        ];
        let p = compare_instruments(&rows);
        assert_eq!(PromptClassifier::default().classify(&p), PromptCategory::Comparison);
        assert_eq!(p.lines().count(), 3);
    }

    #[test]
    fn test_cohort_and_market_prompts() {
        let result = CohortResult::empty(CohortKind::Undervalued, CohortParams::default(), "none");
        let p = cohort_summary(&result);
        assert!(p.contains("undervalued stocks"));
        assert_eq!(PromptClassifier::default().classify(&p), PromptCategory::Market);

        let m = market_report(&[("Banking".to_string(), 1.5), ("Media".to_string(), -2.0)]);
        assert!(m.contains("- Banking: +1.50%"));
        assert!(m.contains("- Media: -2.00%"));
    }

    #[test]
    fn test_analysis_kind_parse() {
        assert_eq!("Technical".parse::<AnalysisKind>().unwrap(), AnalysisKind::Technical);
        assert!("macro".parse::<AnalysisKind>().is_err());
    }
}
