//! Task snapshot and status.

use chrono::{DateTime, Utc};
use equirank_common::{CohortKind, CohortParams};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status moves pending → running → completed | failed and never back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending   => "pending",
            TaskStatus::Running   => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed    => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub kind: CohortKind,
    pub params: CohortParams,
    pub status: TaskStatus,
    /// 0–100, never decreasing.
    pub progress: u8,
    pub current_step: String,
    pub current_item: Option<String>,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(kind: CohortKind, params: CohortParams) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            params,
            status: TaskStatus::Pending,
            progress: 0,
            current_step: "queued".to_string(),
            current_item: None,
            result: None,
            error: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    /// Apply a progress report. Returns false when the task is terminal.
    pub(crate) fn apply_progress(&mut self, percent: u8, step: &str, current_item: Option<&str>) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.start();
        self.progress = self.progress.max(percent.min(100));
        self.current_step = step.to_string();
        self.current_item = current_item.map(str::to_string);
        true
    }

    pub(crate) fn start(&mut self) {
        if self.status == TaskStatus::Pending {
            self.status = TaskStatus::Running;
            self.started_at = Some(Utc::now());
        }
    }

    pub(crate) fn finish(&mut self, outcome: Result<serde_json::Value, String>) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.start();
        self.current_item = None;
        self.completed_at = Some(Utc::now());
        match outcome {
            Ok(value) => {
                self.status = TaskStatus::Completed;
                self.progress = 100;
                self.current_step = "completed".to_string();
                self.result = Some(value);
            }
            Err(error) => {
                self.status = TaskStatus::Failed;
                self.current_step = "failed".to_string();
                self.error = Some(error);
            }
        }
        true
    }
}
