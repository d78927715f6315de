//! Equirank — equity scoring and cohort ranking.
//! Entry point for the `equirank` binary.

mod cli;
mod config;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use equirank_common::{CohortKind, CohortParams};
use equirank_llm::{build_router, ModelRouter, Narrator};
use equirank_ranker::{known_sectors, CsvMarketData, JsonlArchive, RankEngine};
use equirank_tasks::{TaskManager, TaskStatus};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command};

/// Fill missing API keys from each kind's env var and build the router.
fn build_model_router(config: &config::Config) -> ModelRouter {
    let (candidates, explicit) = config.llm.backend_candidates();
    let mut backends = Vec::with_capacity(candidates.len());

    for mut backend in candidates {
        let kind = backend.kind;
        if kind.requires_credential() && backend.api_key.as_deref().map_or(true, str::is_empty) {
            let key = std::env::var(kind.api_key_env()).unwrap_or_default();
            if key.is_empty() {
                if explicit {
                    tracing::warn!(
                        "{kind} configured but no API key found (set api_key or {})",
                        kind.api_key_env()
                    );
                }
                continue;
            }
            backend = backend.with_api_key(key);
        }
        backends.push(backend);
    }

    let router = build_router(backends, config.llm.router.clone());
    if !router.has_backends() {
        tracing::warn!("No model backends offered; narratives will be generated offline");
    }
    router
}

fn build_engine(config: &config::Config, data_dir: Option<PathBuf>) -> anyhow::Result<RankEngine> {
    let dir = data_dir.unwrap_or_else(|| PathBuf::from(&config.data.dir));
    let data = Arc::new(CsvMarketData::load(&dir)?);

    let narrator = Narrator::new(Arc::new(build_model_router(config)))
        .with_priority(config.llm.priority.clone());

    let mut engine = RankEngine::new(config.ranker.clone(), data.clone(), data)
        .with_narrator(Arc::new(narrator));
    if let Some(ref path) = config.data.archive_path {
        engine = engine.with_archive(Arc::new(JsonlArchive::new(path)));
    }
    Ok(engine)
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn submit_and_follow(engine: Arc<RankEngine>, config: &config::Config, kind: CohortKind, params: CohortParams) -> anyhow::Result<()> {
    let manager = TaskManager::new(engine, config.tasks.clone());
    let id = manager.submit(kind, params)?;
    eprintln!("task {id} submitted ({kind})");

    let mut last_progress = None;
    let task = loop {
        let outcome = manager.wait(id, Duration::from_millis(500), Duration::from_millis(50)).await?;
        let task = outcome.task;
        if last_progress != Some(task.progress) {
            match task.current_item {
                Some(ref item) => eprintln!("[{:>3}%] {} ({item})", task.progress, task.current_step),
                None => eprintln!("[{:>3}%] {}", task.progress, task.current_step),
            }
            last_progress = Some(task.progress);
        }
        if !outcome.timed_out {
            break task;
        }
    };
    manager.shutdown().await;

    match task.status {
        TaskStatus::Completed => print_json(&task.result),
        _ => anyhow::bail!("task {id} failed: {}", task.error.unwrap_or_default()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("equirank=debug,info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = config::Config::load(cli.config.as_deref())?;

    match cli.command {
        Command::Backends => {
            let router = build_model_router(&config);
            print_json(&router.status())
        }
        Command::Narrate { prompt } => {
            let narrator = Narrator::new(Arc::new(build_model_router(&config)))
                .with_priority(config.llm.priority.clone());
            print_json(&narrator.narrate(&prompt).await)
        }
        command => {
            let engine = build_engine(&config, cli.data).context("building rank engine")?;
            run_engine_command(Arc::new(engine), &config, command).await
        }
    }
}

async fn run_engine_command(engine: Arc<RankEngine>, config: &config::Config, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Rank(args) => {
            let result = engine.rank(args.kind, args.params()).await?;
            print_json(&result)
        }
        Command::Submit(args) => {
            let params = args.params();
            submit_and_follow(engine, config, args.kind, params).await
        }
        Command::Score { symbol, analysis: None, as_of } => {
            print_json(&engine.score_as_of(&symbol, as_of).await?)
        }
        Command::Score { symbol, analysis: Some(kind), as_of } => {
            let (record, narrative) = engine.analyze_instrument(&symbol, kind, as_of).await?;
            print_json(&serde_json::json!({ "score": record, "narrative": narrative }))
        }
        Command::Compare { symbols, as_of } => {
            let (records, narrative) = engine.compare(&symbols, as_of).await?;
            print_json(&serde_json::json!({ "scores": records, "narrative": narrative }))
        }
        Command::Overview { sectors, as_of } => {
            let sectors = match (sectors.is_empty(), config.overview.sectors.is_empty()) {
                (false, _) => sectors,
                (true, false) => config.overview.sectors.clone(),
                (true, true) => known_sectors(engine.directory().as_ref()).await,
            };
            print_json(&engine.market_overview(&sectors, as_of).await?)
        }
        Command::Backends | Command::Narrate { .. } => Ok(()),
    }
}
