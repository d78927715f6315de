//! Task manager — bounded worker pool with a shared task registry.
//!
//! Submissions go onto an unbounded queue; `workers` tokio tasks pull from
//! it one job at a time. The registry lock is a plain mutex held only for
//! short map operations, never across an await.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use equirank_common::{CohortKind, CohortParams, ProgressSink};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::executor::TaskExecutor;
use crate::task::Task;

#[derive(Debug, Error, PartialEq)]
pub enum TaskError {
    #[error("Task not found: {0}")]
    NotFound(Uuid),
    #[error("Task manager is shut down")]
    ShutDown,
}

fn default_workers() -> usize { 2 }
fn default_retention_secs() -> u64 { 3600 }

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskConfig {
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Finished tasks older than this are evicted on the next submission.
    #[serde(default = "default_retention_secs")]
    pub retention_secs: u64,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self { workers: default_workers(), retention_secs: default_retention_secs() }
    }
}

/// Snapshot returned by [`TaskManager::wait`].
#[derive(Debug, Clone, PartialEq)]
pub struct WaitOutcome {
    pub task: Task,
    pub timed_out: bool,
}

// ── Registry ─────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Registry {
    tasks: Mutex<HashMap<Uuid, Task>>,
}

impl Registry {
    fn with_task<R>(&self, id: Uuid, f: impl FnOnce(&mut Task) -> R) -> Option<R> {
        let mut tasks = match self.tasks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        tasks.get_mut(&id).map(f)
    }

    fn insert(&self, task: Task) {
        let mut tasks = match self.tasks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        tasks.insert(task.id, task);
    }

    fn snapshot(&self) -> Vec<Task> {
        match self.tasks.lock() {
            Ok(tasks) => tasks.values().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().values().cloned().collect(),
        }
    }

    fn evict_finished(&self, older_than: Duration) -> usize {
        let cutoff = Utc::now() - chrono::Duration::from_std(older_than).unwrap_or_else(|_| chrono::Duration::days(36_500));
        let mut tasks = match self.tasks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let before = tasks.len();
        tasks.retain(|_, t| !(t.status.is_terminal() && t.completed_at.map(|c| c <= cutoff).unwrap_or(false)));
        before - tasks.len()
    }
}

/// Progress sink bound to one task.
struct TaskProgress {
    registry: Arc<Registry>,
    id: Uuid,
}

impl ProgressSink for TaskProgress {
    fn report(&self, percent: u8, step: &str, current_item: Option<&str>) {
        self.registry.with_task(self.id, |t| t.apply_progress(percent, step, current_item));
    }
}

struct Job {
    id: Uuid,
    kind: CohortKind,
    params: CohortParams,
}

// ── Manager ──────────────────────────────────────────────────────────────────

pub struct TaskManager {
    registry: Arc<Registry>,
    config: TaskConfig,
    tx: Mutex<Option<mpsc::UnboundedSender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl TaskManager {
    /// Start the worker pool. Must be called inside a tokio runtime.
    pub fn new(executor: Arc<dyn TaskExecutor>, config: TaskConfig) -> Self {
        let registry = Arc::new(Registry::default());
        let (tx, rx) = mpsc::unbounded_channel::<Job>();
        let rx = Arc::new(tokio::sync::Mutex::new(rx));
        let pool = config.workers.max(1);

        let workers = (0..pool)
            .map(|worker| {
                let rx = rx.clone();
                let registry = registry.clone();
                let executor = executor.clone();
                tokio::spawn(async move {
                    debug!(worker, "Task worker started");
                    loop {
                        let job = { rx.lock().await.recv().await };
                        let Some(job) = job else { break };
                        run_job(worker, job, &registry, &executor).await;
                    }
                    debug!(worker, "Task worker stopped");
                })
            })
            .collect();

        info!(workers = pool, "Task manager started");
        Self {
            registry,
            config,
            tx: Mutex::new(Some(tx)),
            workers: Mutex::new(workers),
        }
    }

    pub fn config(&self) -> &TaskConfig {
        &self.config
    }

    /// Register a pending task and queue it for the pool.
    pub fn submit(&self, kind: CohortKind, params: CohortParams) -> Result<Uuid, TaskError> {
        self.evict_finished(Duration::from_secs(self.config.retention_secs));

        let task = Task::new(kind, params.clone());
        let id = task.id;
        let guard = match self.tx.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let tx = guard.as_ref().ok_or(TaskError::ShutDown)?;
        self.registry.insert(task);
        if tx.send(Job { id, kind, params }).is_err() {
            self.registry.with_task(id, |t| t.finish(Err("task manager is shut down".to_string())));
            return Err(TaskError::ShutDown);
        }
        info!(task_id = %id, cohort = kind.as_str(), "Task submitted");
        Ok(id)
    }

    pub fn get_status(&self, id: Uuid) -> Option<Task> {
        self.registry.with_task(id, |t| t.clone())
    }

    /// Record progress. Percentages below the current value are raised to
    /// it; reports for finished tasks are ignored.
    pub fn report_progress(
        &self,
        id: Uuid,
        percent: u8,
        step: &str,
        current_item: Option<&str>,
    ) -> Result<bool, TaskError> {
        self.registry
            .with_task(id, |t| t.apply_progress(percent, step, current_item))
            .ok_or(TaskError::NotFound(id))
    }

    pub fn complete(&self, id: Uuid, result: serde_json::Value) -> Result<bool, TaskError> {
        self.registry
            .with_task(id, |t| t.finish(Ok(result)))
            .ok_or(TaskError::NotFound(id))
    }

    pub fn fail(&self, id: Uuid, error: impl Into<String>) -> Result<bool, TaskError> {
        let error = error.into();
        self.registry
            .with_task(id, |t| t.finish(Err(error)))
            .ok_or(TaskError::NotFound(id))
    }

    /// Poll until the task is terminal or `timeout` elapses.
    pub async fn wait(&self, id: Uuid, timeout: Duration, poll_interval: Duration) -> Result<WaitOutcome, TaskError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let task = self.get_status(id).ok_or(TaskError::NotFound(id))?;
            if task.status.is_terminal() {
                return Ok(WaitOutcome { task, timed_out: false });
            }
            if tokio::time::Instant::now() >= deadline {
                return Ok(WaitOutcome { task, timed_out: true });
            }
            tokio::time::sleep(poll_interval).await;
        }
    }

    /// Drop finished tasks that completed more than `older_than` ago.
    pub fn evict_finished(&self, older_than: Duration) -> usize {
        let evicted = self.registry.evict_finished(older_than);
        if evicted > 0 {
            debug!(evicted, "Evicted finished tasks");
        }
        evicted
    }

    /// Snapshots of every retained task, oldest first.
    pub fn list(&self) -> Vec<Task> {
        let mut tasks = self.registry.snapshot();
        tasks.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        tasks
    }

    /// Stop accepting work, let queued jobs drain and wait for the workers.
    pub async fn shutdown(&self) {
        let tx = match self.tx.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        drop(tx);
        let workers = match self.workers.lock() {
            Ok(mut guard) => std::mem::take(&mut *guard),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        };
        for handle in workers {
            if let Err(e) = handle.await {
                warn!(error = %e, "Task worker ended abnormally");
            }
        }
        info!("Task manager stopped");
    }
}

async fn run_job(worker: usize, job: Job, registry: &Arc<Registry>, executor: &Arc<dyn TaskExecutor>) {
    let Job { id, kind, params } = job;
    registry.with_task(id, |t| {
        t.start();
        t.current_step = "started".to_string();
    });
    info!(task_id = %id, worker, cohort = kind.as_str(), "Task running");

    let progress: Arc<dyn ProgressSink> = Arc::new(TaskProgress { registry: registry.clone(), id });
    let executor = executor.clone();
    // Run on its own task so a panic is contained and reported as a failure.
    let handle = tokio::spawn(async move { executor.execute(kind, params, progress).await });

    let outcome = match handle.await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(format!("{e:#}")),
        Err(e) if e.is_panic() => Err("task panicked".to_string()),
        Err(e) => Err(e.to_string()),
    };

    match &outcome {
        Ok(_) => info!(task_id = %id, "Task completed"),
        Err(error) => warn!(task_id = %id, error = %error, "Task failed"),
    }
    registry.with_task(id, |t| t.finish(outcome));
}
