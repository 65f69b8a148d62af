//! Lifecycle of a queued task.
//!
//! ```text
//! Pending ──▶ Running ──▶ Succeeded
//!                │ ▲
//!                │ └──── Retrying
//!                ├──────▶ Retrying
//!                └──────▶ DeadLettered
//! ```
//! A worker marks a task Running as soon as it claims it, so a task refused
//! by an open circuit is dead-lettered from Running.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::{ResilienceError, ResilienceResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    #[default]
    Pending,
    Running,
    Succeeded,
    Retrying,
    DeadLettered,
}

impl TaskState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Pending => "pending",
            TaskState::Running => "running",
            TaskState::Succeeded => "succeeded",
            TaskState::Retrying => "retrying",
            TaskState::DeadLettered => "dead_lettered",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Succeeded | TaskState::DeadLettered)
    }

    pub fn can_transition_to(&self, to: TaskState) -> bool {
        use TaskState::*;
        matches!(
            (self, to),
            (Pending, Running)
                | (Running, Succeeded)
                | (Running, Retrying)
                | (Running, DeadLettered)
                | (Retrying, Running)
        )
    }

    pub fn transition(self, to: TaskState) -> ResilienceResult<TaskState> {
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

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
