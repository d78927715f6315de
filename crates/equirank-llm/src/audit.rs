//! Audit trail for accepted model responses.

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::backend::ModelResponse;
use crate::classification::PromptCategory;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmAuditEntry {
    pub id: Uuid,
    pub model: String,
    pub backend: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub category: PromptCategory,
    pub output_hash: String,
    pub latency_ms: u64,
    pub called_at: chrono::DateTime<Utc>,
}

impl LlmAuditEntry {
    pub fn new(response: &ModelResponse, category: PromptCategory, latency_ms: u64) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(response.text.as_bytes());
        let output_hash = format!("{:x}", hasher.finalize());

        Self {
            id: Uuid::new_v4(),
            model: response.model.clone(),
            backend: response.backend.as_str().to_string(),
            prompt_tokens: response.prompt_tokens,
            completion_tokens: response.completion_tokens,
            category,
            output_hash,
            latency_ms,
            called_at: Utc::now(),
        }
    }
}

/// Bounded log keeping the most recent entries.
pub struct AuditLog {
    capacity: usize,
    entries: Mutex<VecDeque<LlmAuditEntry>>,
}

impl AuditLog {
    pub fn new(capacity: usize) -> Self {
        Self { capacity, entries: Mutex::new(VecDeque::new()) }
    }

    pub fn record(&self, entry: LlmAuditEntry) {
        if self.capacity == 0 {
            return;
        }
        if let Ok(mut entries) = self.entries.lock() {
            while entries.len() >= self.capacity {
                entries.pop_front();
            }
            entries.push_back(entry);
        }
    }

    /// Oldest first.
    pub fn recent(&self) -> Vec<LlmAuditEntry> {
        self.entries
            .lock()
            .map(|e| e.iter().cloned().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendKind;

    fn response(text: &str) -> ModelResponse {
        ModelResponse {
            text: text.to_string(),
            backend: BackendKind::Qwen,
            model: "qwen-max".to_string(),
            prompt_tokens: 10,
            completion_tokens: 4,
        }
    }

    #[test]
    fn test_output_hash_is_sha256_hex() {
        let entry = LlmAuditEntry::new(&response("abc"), PromptCategory::General, 5);
        assert_eq!(
            entry.output_hash,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(entry.backend, "qwen");
    }

    #[test]
    fn test_log_is_bounded() {
        let log = AuditLog::new(2);
        for text in ["one", "two", "three"] {
            log.record(LlmAuditEntry::new(&response(text), PromptCategory::General, 1));
        }
        let recent = log.recent();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[1].output_hash, LlmAuditEntry::new(&response("three"), PromptCategory::General, 1).output_hash);
    }
}
