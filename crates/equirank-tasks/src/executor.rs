//! Work performed by the pool.

use std::sync::Arc;

use async_trait::async_trait;
use equirank_common::{CohortKind, CohortParams, ProgressSink};
use equirank_ranker::RankEngine;

/// Runs one cohort job, reporting progress as it goes.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    async fn execute(
        &self,
        kind: CohortKind,
        params: CohortParams,
        progress: Arc<dyn ProgressSink>,
    ) -> anyhow::Result<serde_json::Value>;
}

#[async_trait]
impl TaskExecutor for RankEngine {
    async fn execute(
        &self,
        kind: CohortKind,
        params: CohortParams,
        progress: Arc<dyn ProgressSink>,
    ) -> anyhow::Result<serde_json::Value> {
        let result = self.rank_with_progress(kind, params, progress.as_ref()).await?;
        Ok(serde_json::to_value(result)?)
    }
}
