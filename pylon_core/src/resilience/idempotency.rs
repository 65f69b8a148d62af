//! # Idempotency Cache
//!
//! Runs an action at most once per idempotency key and replays the cached
//! response for duplicates.
//!
//! ```text
//! execute(key)
//!   set_if_absent(key, Pending) ──won──▶ run action ──ok──▶ CAS Pending → Completed
//!         │                                  └──err──▶ delete key, return error
//!         └──lost──▶ read record: Completed → replay
//!                                 Pending   → InProgress
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::clock::{Clock, SystemClock};
use super::error::{ResilienceError, ResilienceResult};
use super::store::SharedStore;
use crate::envelope::canonical::sha256_hex;

/// Default lifetime of a completed record
pub const DEFAULT_TTL: Duration = Duration::from_secs(86_400);

const READ_ATTEMPTS: u32 = 3;

/// Store key for a request: `idem:` + sha256 of endpoint, body and the
/// caller's key, NUL-separated.
pub fn idempotency_key(endpoint: &str, body: &[u8], caller_key: &str) -> String {
    let mut bytes = Vec::with_capacity(endpoint.len() + body.len() + caller_key.len() + 2);
    bytes.extend_from_slice(endpoint.as_bytes());
    bytes.push(0);
    bytes.extend_from_slice(body);
    bytes.push(0);
    bytes.extend_from_slice(caller_key.as_bytes());
    format!("idem:{}", sha256_hex(&bytes))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IdempotencyRecord {
    Pending {
        started_at: DateTime<Utc>,
    },
    Completed {
        response: serde_json::Value,
        completed_at: DateTime<Utc>,
    },
}

/// Result of [`IdempotencyCache::execute`]
#[derive(Debug, Clone, PartialEq)]
pub struct Execution<T> {
    pub value: T,
    /// True when the value came from an earlier run
    pub replayed: bool,
}

#[derive(Clone)]
pub struct IdempotencyCache {
    store: Arc<dyn SharedStore>,
    ttl: Duration,
    pending_ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl IdempotencyCache {
    pub fn new(store: Arc<dyn SharedStore>, ttl: Duration) -> Self {
        Self {
            store,
            ttl,
            pending_ttl: ttl,
            clock: Arc::new(SystemClock),
        }
    }

    /// Lease on a pending record, after which a crashed run may be retried
    pub fn with_pending_ttl(mut self, pending_ttl: Duration) -> Self {
        self.pending_ttl = pending_ttl;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub async fn status(&self, key: &str) -> ResilienceResult<Option<IdempotencyRecord>> {
        match self.store.get(key).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub async fn execute<T, F, Fut>(&self, key: &str, action: F) -> ResilienceResult<Execution<T>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = ResilienceResult<T>>,
    {
        let pending = serde_json::to_string(&IdempotencyRecord::Pending {
            started_at: self.clock.now(),
        })?;

        for _ in 0..READ_ATTEMPTS {
            if self
                .store
                .set_if_absent(key, pending.clone(), Some(self.pending_ttl))
                .await?
            {
                return self.run(key, &pending, action).await;
            }

            match self.status(key).await? {
                Some(IdempotencyRecord::Completed { response, .. }) => {
                    tracing::debug!(key, "replaying cached response");
                    return Ok(Execution {
                        value: serde_json::from_value(response)?,
                        replayed: true,
                    });
                }
                Some(IdempotencyRecord::Pending { .. }) => {
                    return Err(ResilienceError::InProgress { key: key.to_string() });
                }
                // Expired between the two calls
                None => continue,
            }
        }
        Err(ResilienceError::Contention { key: key.to_string() })
    }

    async fn run<T, F, Fut>(&self, key: &str, pending: &str, action: F) -> ResilienceResult<Execution<T>>
    where
        T: Serialize,
        F: FnOnce() -> Fut,
        Fut: Future<Output = ResilienceResult<T>>,
    {
        let value = match action().await {
            Ok(value) => value,
            Err(err) => {
                if let Err(cleanup) = self.store.delete(key).await {
                    tracing::warn!(key, error = %cleanup, "failed to clear pending idempotency record");
                }
                return Err(err);
            }
        };

        let completed = serde_json::to_string(&IdempotencyRecord::Completed {
            response: serde_json::to_value(&value)?,
            completed_at: self.clock.now(),
        })?;
        if !self
            .store
            .compare_and_swap(key, Some(pending), completed, Some(self.ttl))
            .await?
        {
            tracing::warn!(key, "pending idempotency record changed before completion");
        }
        Ok(Execution { value, replayed: false })
    }
}
