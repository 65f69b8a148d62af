//! Dead-letter lists for work that exhausted its retries.
//!
//! One list per dependency, `dlq:{dependency}`, oldest first. Entries stay
//! until an operator drains them for replay.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::ResilienceResult;
use super::store::SharedStore;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadLetterEntry {
    pub dependency: String,
    pub payload: serde_json::Value,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<Uuid>,
}

#[derive(Clone)]
pub struct DeadLetterQueue {
    store: Arc<dyn SharedStore>,
}

impl DeadLetterQueue {
    pub fn new(store: Arc<dyn SharedStore>) -> Self {
        Self { store }
    }

    pub fn key(dependency: &str) -> String {
        format!("dlq:{}", dependency)
    }

    /// Append an entry and return the list length
    pub async fn push(&self, entry: &DeadLetterEntry) -> ResilienceResult<usize> {
        let len = self
            .store
            .push_back(&Self::key(&entry.dependency), serde_json::to_string(entry)?)
            .await?;
        tracing::warn!(
            event = "dead_lettered",
            dependency = %entry.dependency,
            reason = %entry.reason,
            attempts = entry.attempts,
            depth = len,
            "task moved to dead-letter list"
        );
        Ok(len)
    }

    pub async fn list(&self, dependency: &str) -> ResilienceResult<Vec<DeadLetterEntry>> {
        self.store
            .list(&Self::key(dependency))
            .await?
            .iter()
            .map(|raw| serde_json::from_str(raw).map_err(Into::into))
            .collect()
    }

    pub async fn len(&self, dependency: &str) -> ResilienceResult<usize> {
        self.store.len(&Self::key(dependency)).await
    }

    /// Remove every entry, oldest first, for manual replay
    pub async fn drain(&self, dependency: &str) -> ResilienceResult<Vec<DeadLetterEntry>> {
        let key = Self::key(dependency);
        let mut drained = Vec::new();
        while let Some(raw) = self.store.pop_front(&key).await? {
            drained.push(serde_json::from_str(&raw)?);
        }
        Ok(drained)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::store::MemoryStore;
    use serde_json::json;

    fn entry(dependency: &str, reason: &str) -> DeadLetterEntry {
        DeadLetterEntry {
            dependency: dependency.into(),
            payload: json!({"permit": 17}),
            reason: reason.into(),
            timestamp: DateTime::<Utc>::UNIX_EPOCH,
            attempts: 5,
            task_id: Some(Uuid::new_v4()),
        }
    }

    #[tokio::test]
    async fn test_push_list_drain() {
        let dlq = DeadLetterQueue::new(Arc::new(MemoryStore::new()));
        assert_eq!(dlq.push(&entry("permits", "retries exhausted")).await.unwrap(), 1);
        assert_eq!(dlq.push(&entry("permits", "circuit open")).await.unwrap(), 2);
        dlq.push(&entry("geocoder", "circuit open")).await.unwrap();

        let listed = dlq.list("permits").await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].reason, "retries exhausted");

        let drained = dlq.drain("permits").await.unwrap();
        assert_eq!(drained, listed);
        assert_eq!(dlq.len("permits").await.unwrap(), 0);
        assert_eq!(dlq.len("geocoder").await.unwrap(), 1);
    }
}
