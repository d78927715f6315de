//! Write-only archive for produced results.
//!
//! Archiving is best effort: a failing archive is logged and never
//! affects the result handed back to the caller.

use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use equirank_common::ProviderError;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

/// Which part of the system produced an archived payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Producer {
    ScoringAlgorithm,
    InternalAlgorithm,
    AiModel,
}

impl Producer {
    pub fn as_str(&self) -> &'static str {
        match self {
            Producer::ScoringAlgorithm  => "scoring_algorithm",
            Producer::InternalAlgorithm => "internal_algorithm",
            Producer::AiModel           => "ai_model",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchivedResult {
    pub symbol: Option<String>,
    pub kind: String,
    pub payload: serde_json::Value,
    pub producer: Producer,
    pub recorded_at: DateTime<Utc>,
}

#[async_trait]
pub trait ResultArchive: Send + Sync {
    async fn record_result(
        &self,
        symbol: Option<&str>,
        kind: &str,
        payload: &serde_json::Value,
        producer: Producer,
    ) -> Result<(), ProviderError>;
}

/// Record a result, logging instead of propagating failures.
pub async fn archive_quietly(
    archive: Option<&dyn ResultArchive>,
    symbol: Option<&str>,
    kind: &str,
    payload: &serde_json::Value,
    producer: Producer,
) {
    let Some(archive) = archive else { return };
    if let Err(e) = archive.record_result(symbol, kind, payload, producer).await {
        tracing::warn!(kind, producer = producer.as_str(), error = %e, "Result archive write failed");
    }
}

// ── In-memory ────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct MemoryArchive {
    records: Mutex<Vec<ArchivedResult>>,
}

impl MemoryArchive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<ArchivedResult> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ResultArchive for MemoryArchive {
    async fn record_result(
        &self,
        symbol: Option<&str>,
        kind: &str,
        payload: &serde_json::Value,
        producer: Producer,
    ) -> Result<(), ProviderError> {
        let record = ArchivedResult {
            symbol: symbol.map(str::to_string),
            kind: kind.to_string(),
            payload: payload.clone(),
            producer,
            recorded_at: Utc::now(),
        };
        self.records
            .lock()
            .map_err(|_| ProviderError::Unreachable("archive lock poisoned".to_string()))?
            .push(record);
        Ok(())
    }
}

// ── JSON lines file ──────────────────────────────────────────────────────────

/// Appends one JSON object per result to a file.
#[derive(Debug, Clone)]
pub struct JsonlArchive {
    path: PathBuf,
}

impl JsonlArchive {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ResultArchive for JsonlArchive {
    async fn record_result(
        &self,
        symbol: Option<&str>,
        kind: &str,
        payload: &serde_json::Value,
        producer: Producer,
    ) -> Result<(), ProviderError> {
        let record = ArchivedResult {
            symbol: symbol.map(str::to_string),
            kind: kind.to_string(),
            payload: payload.clone(),
            producer,
            recorded_at: Utc::now(),
        };
        let mut line = serde_json::to_string(&record)
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| ProviderError::Unreachable(format!("{}: {e}", self.path.display())))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| ProviderError::Unreachable(format!("{}: {e}", self.path.display())))?;
        Ok(())
    }
}
