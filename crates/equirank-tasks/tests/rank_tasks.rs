//! Cohort jobs executed through the pool against a real engine.

use std::sync::Arc;
use std::time::Duration;

use equirank_common::{CohortKind, CohortParams, CohortResult};
use equirank_ranker::{MemoryDirectory, MockMarketData, RankEngine, RankerConfig};
use equirank_tasks::{TaskConfig, TaskManager, TaskStatus};
use equirank_test_utils::{bars_ending, day, instrument, linear_closes};
use tokio_test::assert_ok;

fn engine() -> Arc<RankEngine> {
    let closes = linear_closes(10.0, 12.0, 25);
    let market = MockMarketData::new()
        .with_bars("A", bars_ending("A", day(60), &closes, 3e7))
        .with_bars("B", bars_ending("B", day(60), &[10.0; 25], 1e7))
        .failing("C");
    let directory = MemoryDirectory::new(vec![
        instrument("A", "Semiconductors", 3e9),
        instrument("B", "Semiconductors", 4e9),
        instrument("C", "Semiconductors", 2e9),
    ]);
    Arc::new(RankEngine::new(RankerConfig::default(), Arc::new(market), Arc::new(directory)))
}

#[tokio::test]
async fn cohort_job_runs_to_completion() {
    let manager = TaskManager::new(engine(), TaskConfig::default());
    let params = CohortParams::default().with_as_of(day(60));
    let id = assert_ok!(manager.submit(CohortKind::SmallCapHot, params));

    let out = assert_ok!(manager.wait(id, Duration::from_secs(10), Duration::from_millis(5)).await);
    assert!(!out.timed_out);
    let task = out.task;
    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.progress, 100);
    assert!(task.started_at.is_some());

    let result: CohortResult = serde_json::from_value(task.result.unwrap()).unwrap();
    assert_eq!(result.kind, CohortKind::SmallCapHot);
    assert_eq!(result.total_analyzed, 3);
    assert_eq!(result.entries[0].instrument.symbol, "A");
    assert_eq!(result.entries.len(), 3);
}

#[tokio::test]
async fn several_cohorts_share_the_pool() {
    let manager = TaskManager::new(engine(), TaskConfig { workers: 2, ..TaskConfig::default() });
    let ids: Vec<_> = CohortKind::ALL
        .into_iter()
        .map(|kind| manager.submit(kind, CohortParams::default().with_as_of(day(60))).unwrap())
        .collect();

    for id in ids {
        let task = manager
            .wait(id, Duration::from_secs(10), Duration::from_millis(5))
            .await
            .unwrap()
            .task;
        assert_eq!(task.status, TaskStatus::Completed, "task {} ended {:?}", task.kind, task.error);
    }
    assert_eq!(manager.list().len(), CohortKind::ALL.len());
    manager.shutdown().await;
}
