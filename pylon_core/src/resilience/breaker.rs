//! # Circuit Breaker
//!
//! Per-dependency failure isolation whose state lives in the shared store
//! under `breaker:{dependency}`, so every worker sees the same circuit.
//!
//! ```text
//!            N consecutive failures
//!  Closed ─────────────────────────▶ Open
//!    ▲                                 │ cool-off elapsed (first allow())
//!    │ M consecutive successes         ▼
//!    └──────────────────────────── HalfOpen ──any failure──▶ Open
//! ```
//!
//! `allow()`, `record_success()` and `record_failure()` are separate
//! operations. Each one is a compare-and-swap loop over the stored JSON.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::clock::{Clock, SystemClock};
use super::error::{ResilienceError, ResilienceResult};
use super::store::SharedStore;

const CAS_ATTEMPTS: u32 = 16;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// Consecutive failures that open a closed circuit
    pub failure_threshold: u32,
    /// Consecutive half-open successes that close it again
    pub success_threshold: u32,
    pub cool_off_secs: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            success_threshold: 2,
            cool_off_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerState {
    #[default]
    Closed,
    Open,
    HalfOpen,
}

impl BreakerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BreakerState::Closed => "closed",
            BreakerState::Open => "open",
            BreakerState::HalfOpen => "half_open",
        }
    }

    pub fn can_transition_to(&self, to: BreakerState) -> bool {
        matches!(
            (self, to),
            (BreakerState::Closed, BreakerState::Open)
                | (BreakerState::Open, BreakerState::HalfOpen)
                | (BreakerState::HalfOpen, BreakerState::Closed)
                | (BreakerState::HalfOpen, BreakerState::Open)
        )
    }

    pub fn transition(self, to: BreakerState) -> ResilienceResult<BreakerState> {
        if self.can_transition_to(to) {
            Ok(to)
        } else {
            Err(ResilienceError::InvalidTransition {
                from: self.to_string(),
                to: to.to_string(),
            })
        }
    }
}

impl fmt::Display for BreakerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stored circuit document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CircuitState {
    pub state: BreakerState,
    pub failure_count: u32,
    pub success_count: u32,
    pub last_failure_time: Option<DateTime<Utc>>,
    pub opened_at: Option<DateTime<Utc>>,
}

impl CircuitState {
    fn open(&self, now: DateTime<Utc>) -> ResilienceResult<CircuitState> {
        Ok(CircuitState {
            state: self.state.transition(BreakerState::Open)?,
            failure_count: self.failure_count + 1,
            success_count: 0,
            last_failure_time: Some(now),
            opened_at: Some(now),
        })
    }
}

/// Handle on one dependency's circuit. Cheap to clone.
#[derive(Clone)]
pub struct CircuitBreaker {
    dependency: String,
    store: Arc<dyn SharedStore>,
    config: BreakerConfig,
    clock: Arc<dyn Clock>,
}

impl CircuitBreaker {
    pub fn new(dependency: impl Into<String>, store: Arc<dyn SharedStore>, config: BreakerConfig) -> Self {
        Self::with_clock(dependency, store, config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        dependency: impl Into<String>,
        store: Arc<dyn SharedStore>,
        config: BreakerConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            dependency: dependency.into(),
            store,
            config,
            clock,
        }
    }

    pub fn dependency(&self) -> &str {
        &self.dependency
    }

    pub fn key(&self) -> String {
        format!("breaker:{}", self.dependency)
    }

    /// Current circuit, closed if never written
    pub async fn status(&self) -> ResilienceResult<CircuitState> {
        match self.store.get(&self.key()).await? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(CircuitState::default()),
        }
    }

    /// Whether a call may proceed. An open circuit whose cool-off has
    /// elapsed moves to half-open here.
    pub async fn allow(&self) -> ResilienceResult<bool> {
        let cool_off = Duration::from_std(std::time::Duration::from_secs(self.config.cool_off_secs))
            .unwrap_or_else(|_| Duration::days(36_500));
        let state = self
            .update(|current, now| {
                if current.state != BreakerState::Open {
                    return Ok(None);
                }
                let elapsed = current.opened_at.map_or(true, |at| now - at >= cool_off);
                if !elapsed {
                    return Ok(None);
                }
                Ok(Some(CircuitState {
                    state: current.state.transition(BreakerState::HalfOpen)?,
                    success_count: 0,
                    ..current.clone()
                }))
            })
            .await?;
        Ok(state.state != BreakerState::Open)
    }

    pub async fn record_success(&self) -> ResilienceResult<CircuitState> {
        let threshold = self.config.success_threshold;
        self.update(|current, _| match current.state {
            BreakerState::Closed if current.failure_count == 0 => Ok(None),
            BreakerState::Closed => Ok(Some(CircuitState {
                failure_count: 0,
                ..current.clone()
            })),
            BreakerState::HalfOpen if current.success_count + 1 >= threshold => Ok(Some(CircuitState {
                state: current.state.transition(BreakerState::Closed)?,
                failure_count: 0,
                success_count: 0,
                opened_at: None,
                ..current.clone()
            })),
            BreakerState::HalfOpen => Ok(Some(CircuitState {
                success_count: current.success_count + 1,
                ..current.clone()
            })),
            // A late result from before the circuit opened
            BreakerState::Open => Ok(None),
        })
        .await
    }

    pub async fn record_failure(&self) -> ResilienceResult<CircuitState> {
        let threshold = self.config.failure_threshold;
        self.update(|current, now| match current.state {
            BreakerState::Closed if current.failure_count + 1 >= threshold => current.open(now).map(Some),
            BreakerState::HalfOpen => current.open(now).map(Some),
            BreakerState::Closed | BreakerState::Open => Ok(Some(CircuitState {
                failure_count: current.failure_count + 1,
                last_failure_time: Some(now),
                ..current.clone()
            })),
        })
        .await
    }

    /// Apply `step` atomically. `None` from the step means no change.
    async fn update<F>(&self, step: F) -> ResilienceResult<CircuitState>
    where
        F: Fn(&CircuitState, DateTime<Utc>) -> ResilienceResult<Option<CircuitState>>,
    {
        let key = self.key();
        for _ in 0..CAS_ATTEMPTS {
            let raw = self.store.get(&key).await?;
            let current: CircuitState = match &raw {
                Some(raw) => serde_json::from_str(raw)?,
                None => CircuitState::default(),
            };
            let Some(next) = step(&current, self.clock.now())? else {
                return Ok(current);
            };
            let encoded = serde_json::to_string(&next)?;
            if self
                .store
                .compare_and_swap(&key, raw.as_deref(), encoded, None)
                .await?
            {
                if next.state != current.state {
                    tracing::info!(
                        event = "breaker_transition",
                        dependency = %self.dependency,
                        from = %current.state,
                        to = %next.state,
                        failures = next.failure_count,
                        "circuit breaker changed state"
                    );
                }
                return Ok(next);
            }
        }
        Err(ResilienceError::Contention { key })
    }
}
