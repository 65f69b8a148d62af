//! # Resilience Layer
//!
//! Guards calls to external dependencies. All state (circuits, idempotency
//! records, queues, dead letters) lives in a [`SharedStore`] so that many
//! workers, in one process or several, act on a single view.
//!
//! | Module | Store keys |
//! |--------|------------|
//! | [`breaker`] | `breaker:{dependency}` |
//! | [`idempotency`] | `idem:{sha256}` |
//! | [`dead_letter`] | `dlq:{dependency}` |
//! | [`queue`] | `queue:{name}`, `processing:{name}` |

pub mod backoff;
pub mod breaker;
pub mod clock;
pub mod dead_letter;
pub mod error;
pub mod file_store;
pub mod idempotency;
pub mod queue;
pub mod store;
pub mod task;

pub use backoff::{RetryDecision, RetryPolicy};
pub use breaker::{BreakerConfig, BreakerState, CircuitBreaker, CircuitState};
pub use clock::{Clock, ManualClock, SystemClock};
pub use dead_letter::{DeadLetterEntry, DeadLetterQueue};
pub use error::{ResilienceError, ResilienceResult};
pub use file_store::FileStore;
pub use idempotency::{idempotency_key, Execution, IdempotencyCache, IdempotencyRecord};
pub use queue::{run_pool, Lease, PoolSummary, QueuedTask, RunOutcome, TaskHandler, TaskQueue, TaskRunner};
pub use store::{MemoryStore, SharedStore};
pub use task::TaskState;
