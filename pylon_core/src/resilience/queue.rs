//! # Task Queue and Runner
//!
//! Calls to external dependencies (permit portals, geocoders, supplier
//! pricing) are queued as [`QueuedTask`]s in the shared store and executed
//! by [`TaskRunner`]s. Delivery is at-least-once; the idempotency cache
//! turns that into at-most-once side effects.
//!
//! A worker never holds a task only in memory. Taking a task moves it from
//! `queue:{name}` to `processing:{name}` in one store step (a [`Lease`]), and
//! the lease is released only after the task has been requeued or has
//! reached a terminal state. If the runner itself fails mid-attempt the
//! task goes back on the queue. Leases orphaned by a crashed worker are put
//! back with [`TaskQueue::reclaim`].
//!
//! ## One attempt
//!
//! ```text
//! lease ─▶ not due? ─yes─▶ back to the tail, Deferred
//!            │no
//!            ▼
//!         Running ─▶ breaker.allow()? ──no──▶ dead-letter "circuit open"
//!                        │yes
//!                        ▼
//!        idempotency.execute(timeout(handler))
//!          ├─ ok ───────────────▶ record_success, Succeeded
//!          ├─ permanent error ──▶ record_failure, dead-letter
//!          └─ retriable/timeout ▶ record_failure
//!                                   ├─ attempts left ─▶ requeue Retrying, not_before = now + backoff
//!                                   └─ exhausted ─────▶ dead-letter "retries exhausted"
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use uuid::Uuid;

use super::backoff::{RetryDecision, RetryPolicy};
use super::breaker::{BreakerConfig, CircuitBreaker};
use super::clock::{Clock, SystemClock};
use super::dead_letter::{DeadLetterEntry, DeadLetterQueue};
use super::error::{ResilienceError, ResilienceResult};
use super::idempotency::{idempotency_key, IdempotencyCache};
use super::store::SharedStore;
use super::task::TaskState;
use crate::settings::ResilienceSettings;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedTask {
    pub id: Uuid,
    pub dependency: String,
    pub payload: serde_json::Value,
    pub idempotency_key: String,
    pub attempts: u32,
    pub state: TaskState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// Earliest time the next attempt may start
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_before: Option<DateTime<Utc>>,
}

impl QueuedTask {
    /// New pending task. Tasks with the same dependency, payload and
    /// `caller_key` share an idempotency key.
    pub fn new(dependency: impl Into<String>, payload: serde_json::Value, caller_key: &str) -> Self {
        let dependency = dependency.into();
        let idempotency_key = idempotency_key(&dependency, payload.to_string().as_bytes(), caller_key);
        Self {
            id: Uuid::new_v4(),
            dependency,
            payload,
            idempotency_key,
            attempts: 0,
            state: TaskState::Pending,
            last_error: None,
            not_before: None,
        }
    }
}

/// A task taken off the queue and parked in `processing:{name}`
#[derive(Debug, Clone)]
pub struct Lease {
    pub task: QueuedTask,
    raw: String,
}

/// FIFO of tasks at `queue:{name}`, with in-flight tasks at `processing:{name}`
#[derive(Clone)]
pub struct TaskQueue {
    name: String,
    store: Arc<dyn SharedStore>,
}

impl TaskQueue {
    pub fn new(name: impl Into<String>, store: Arc<dyn SharedStore>) -> Self {
        Self {
            name: name.into(),
            store,
        }
    }

    pub fn key(&self) -> String {
        format!("queue:{}", self.name)
    }

    pub fn processing_key(&self) -> String {
        format!("processing:{}", self.name)
    }

    pub async fn enqueue(&self, task: &QueuedTask) -> ResilienceResult<usize> {
        self.store.push_back(&self.key(), serde_json::to_string(task)?).await
    }

    /// Move the front task to the processing list. An undecodable entry
    /// stays there for inspection and the error is returned.
    pub async fn lease(&self) -> ResilienceResult<Option<Lease>> {
        let Some(raw) = self.store.move_front(&self.key(), &self.processing_key()).await? else {
            return Ok(None);
        };
        let task = serde_json::from_str(&raw)?;
        Ok(Some(Lease { task, raw }))
    }

    /// Drop a lease whose task is finished
    pub async fn release(&self, lease: &Lease) -> ResilienceResult<()> {
        self.store.remove_item(&self.processing_key(), &lease.raw).await?;
        Ok(())
    }

    /// Put the updated task back on the queue, then drop the lease
    pub async fn requeue(&self, lease: &Lease, task: &QueuedTask) -> ResilienceResult<()> {
        self.enqueue(task).await?;
        self.release(lease).await
    }

    /// Return the task unchanged to the queue, then drop the lease
    pub async fn restore(&self, lease: &Lease) -> ResilienceResult<()> {
        self.store.push_back(&self.key(), lease.raw.clone()).await?;
        self.release(lease).await
    }

    /// Move every in-flight task back to the queue. Only safe when no
    /// worker is running, e.g. at startup after a crash.
    pub async fn reclaim(&self) -> ResilienceResult<usize> {
        let mut moved = 0;
        while self
            .store
            .move_front(&self.processing_key(), &self.key())
            .await?
            .is_some()
        {
            moved += 1;
        }
        if moved > 0 {
            tracing::warn!(event = "tasks_reclaimed", queue = %self.name, count = moved);
        }
        Ok(moved)
    }

    pub async fn len(&self) -> ResilienceResult<usize> {
        self.store.len(&self.key()).await
    }

    pub async fn in_flight(&self) -> ResilienceResult<usize> {
        self.store.len(&self.processing_key()).await
    }

    pub async fn pending(&self) -> ResilienceResult<Vec<QueuedTask>> {
        self.store
            .list(&self.key())
            .await?
            .iter()
            .map(|raw| serde_json::from_str(raw).map_err(Into::into))
            .collect()
    }
}

/// Performs the external call for a task
#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn handle(&self, task: &QueuedTask) -> ResilienceResult<serde_json::Value>;
}

/// What one `run_once` call did
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// Queue was empty
    Idle,
    /// Front task was still backing off and went back to the tail
    Deferred {
        id: Uuid,
        ready_at: DateTime<Utc>,
    },
    Succeeded {
        id: Uuid,
        response: serde_json::Value,
        replayed: bool,
    },
    Requeued {
        id: Uuid,
        attempts: u32,
        delay: Duration,
    },
    DeadLettered {
        id: Uuid,
        reason: String,
    },
}

/// Counts from [`run_pool`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolSummary {
    pub succeeded: usize,
    pub requeued: usize,
    pub dead_lettered: usize,
}

impl PoolSummary {
    fn record(&mut self, outcome: &RunOutcome) {
        match outcome {
            RunOutcome::Idle | RunOutcome::Deferred { .. } => {}
            RunOutcome::Succeeded { .. } => self.succeeded += 1,
            RunOutcome::Requeued { .. } => self.requeued += 1,
            RunOutcome::DeadLettered { .. } => self.dead_lettered += 1,
        }
    }

    fn merge(&mut self, other: PoolSummary) {
        self.succeeded += other.succeeded;
        self.requeued += other.requeued;
        self.dead_lettered += other.dead_lettered;
    }
}

pub struct TaskRunner {
    queue: TaskQueue,
    handler: Arc<dyn TaskHandler>,
    store: Arc<dyn SharedStore>,
    breaker: BreakerConfig,
    retry: RetryPolicy,
    budget: Duration,
    idempotency: IdempotencyCache,
    dead_letters: DeadLetterQueue,
    clock: Arc<dyn Clock>,
}

impl TaskRunner {
    pub fn new(
        queue: TaskQueue,
        store: Arc<dyn SharedStore>,
        handler: Arc<dyn TaskHandler>,
        settings: &ResilienceSettings,
    ) -> Self {
        Self::with_clock(queue, store, handler, settings, Arc::new(SystemClock))
    }

    pub fn with_clock(
        queue: TaskQueue,
        store: Arc<dyn SharedStore>,
        handler: Arc<dyn TaskHandler>,
        settings: &ResilienceSettings,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let budget = Duration::from_millis(settings.task_timeout_ms);
        let idempotency = IdempotencyCache::new(store.clone(), Duration::from_secs(settings.idempotency_ttl_secs))
            .with_pending_ttl(budget.saturating_mul(2))
            .with_clock(clock.clone());
        Self {
            queue,
            handler,
            dead_letters: DeadLetterQueue::new(store.clone()),
            store,
            breaker: settings.breaker.clone(),
            retry: settings.retry.clone(),
            budget,
            idempotency,
            clock,
        }
    }

    pub fn queue(&self) -> &TaskQueue {
        &self.queue
    }

    pub fn dead_letters(&self) -> &DeadLetterQueue {
        &self.dead_letters
    }

    pub fn breaker_for(&self, dependency: &str) -> CircuitBreaker {
        CircuitBreaker::with_clock(dependency, self.store.clone(), self.breaker.clone(), self.clock.clone())
    }

    /// Lease one task and drive it through one attempt. If the attempt
    /// fails inside the runner (store, breaker or serialization errors) the
    /// task is restored to the queue before the error is returned.
    pub async fn run_once(&self) -> ResilienceResult<RunOutcome> {
        let Some(lease) = self.queue.lease().await? else {
            return Ok(RunOutcome::Idle);
        };
        match self.attempt(&lease).await {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                tracing::error!(
                    event = "task_restored",
                    task_id = %lease.task.id,
                    dependency = %lease.task.dependency,
                    error = %err,
                );
                self.queue.restore(&lease).await?;
                Err(err)
            }
        }
    }

    async fn attempt(&self, lease: &Lease) -> ResilienceResult<RunOutcome> {
        let mut task = lease.task.clone();
        let now = self.clock.now();
        if let Some(ready_at) = task.not_before.filter(|at| *at > now) {
            self.queue.requeue(lease, &task).await?;
            return Ok(RunOutcome::Deferred { id: task.id, ready_at });
        }
        task.state = task.state.transition(TaskState::Running)?;

        let breaker = self.breaker_for(&task.dependency);
        if !breaker.allow().await? {
            return self.dead_letter(lease, task, "circuit open".to_string()).await;
        }

        task.attempts += 1;
        let budget = self.budget;
        let handler = self.handler.clone();
        let attempt = {
            let task = &task;
            self.idempotency
                .execute(&task.idempotency_key, move || async move {
                    match tokio::time::timeout(budget, handler.handle(task)).await {
                        Ok(result) => result,
                        Err(_) => Err(ResilienceError::Timeout {
                            budget_ms: u64::try_from(budget.as_millis()).unwrap_or(u64::MAX),
                        }),
                    }
                })
                .await
        };

        match attempt {
            Ok(execution) => {
                breaker.record_success().await?;
                task.state = task.state.transition(TaskState::Succeeded)?;
                self.queue.release(lease).await?;
                tracing::info!(
                    event = "task_succeeded",
                    task_id = %task.id,
                    dependency = %task.dependency,
                    attempts = task.attempts,
                    replayed = execution.replayed,
                );
                Ok(RunOutcome::Succeeded {
                    id: task.id,
                    response: execution.value,
                    replayed: execution.replayed,
                })
            }
            Err(err) => {
                if counts_against_dependency(&err) {
                    breaker.record_failure().await?;
                }
                task.last_error = Some(err.to_string());
                match self.retry.decide(&err, task.attempts) {
                    RetryDecision::RetryAfter(delay) => {
                        let backoff = chrono::Duration::from_std(delay)
                            .map_err(|e| ResilienceError::store(format!("backoff out of range: {}", e)))?;
                        task.state = task.state.transition(TaskState::Retrying)?;
                        task.not_before = Some(self.clock.now() + backoff);
                        self.queue.requeue(lease, &task).await?;
                        tracing::warn!(
                            event = "task_retry",
                            task_id = %task.id,
                            dependency = %task.dependency,
                            attempts = task.attempts,
                            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                            error = %err,
                        );
                        Ok(RunOutcome::Requeued {
                            id: task.id,
                            attempts: task.attempts,
                            delay,
                        })
                    }
                    RetryDecision::GiveUp if err.is_retriable() => {
                        self.dead_letter(lease, task, "retries exhausted".to_string()).await
                    }
                    RetryDecision::GiveUp => self.dead_letter(lease, task, err.to_string()).await,
                }
            }
        }
    }

    async fn dead_letter(&self, lease: &Lease, mut task: QueuedTask, reason: String) -> ResilienceResult<RunOutcome> {
        task.state = task.state.transition(TaskState::DeadLettered)?;
        let entry = DeadLetterEntry {
            dependency: task.dependency.clone(),
            payload: task.payload.clone(),
            reason: reason.clone(),
            timestamp: self.clock.now(),
            attempts: task.attempts,
            task_id: Some(task.id),
        };
        self.dead_letters.push(&entry).await?;
        self.queue.release(lease).await?;
        Ok(RunOutcome::DeadLettered { id: task.id, reason })
    }

    /// Time left until `at`, zero if it has passed
    fn until(&self, at: DateTime<Utc>) -> Duration {
        (at - self.clock.now()).to_std().unwrap_or(Duration::ZERO)
    }
}

/// Failures the breaker should count. Store and coordination errors say
/// nothing about the dependency's health.
fn counts_against_dependency(err: &ResilienceError) -> bool {
    matches!(err, ResilienceError::Dependency { .. } | ResilienceError::Timeout { .. })
}

/// Drain the queue with `workers` concurrent runners. A worker waits out
/// backoff on deferred tasks and stops when it finds the queue empty.
pub async fn run_pool(runner: Arc<TaskRunner>, workers: usize) -> ResilienceResult<PoolSummary> {
    let mut set = JoinSet::new();
    for worker in 0..workers.max(1) {
        let runner = runner.clone();
        set.spawn(async move {
            let mut summary = PoolSummary::default();
            loop {
                let outcome = runner.run_once().await?;
                match &outcome {
                    RunOutcome::Idle => {
                        tracing::debug!(worker, "queue drained");
                        return Ok::<_, ResilienceError>(summary);
                    }
                    RunOutcome::Deferred { ready_at, .. } => tokio::time::sleep(runner.until(*ready_at)).await,
                    _ => summary.record(&outcome),
                }
            }
        });
    }

    let mut total = PoolSummary::default();
    let mut first_error = None;
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(Ok(summary)) => total.merge(summary),
            Ok(Err(err)) => {
                tracing::error!(error = %err, "worker stopped");
                first_error.get_or_insert(err);
            }
            Err(join) => {
                first_error.get_or_insert(ResilienceError::store(format!("worker panicked: {}", join)));
            }
        }
    }
    match first_error {
        Some(err) => Err(err),
        None => Ok(total),
    }
}
