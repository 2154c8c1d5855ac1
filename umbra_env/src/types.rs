//! Common types for the Umbra environment abstraction.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Boxed failure raised by a task body.
///
/// Shadow errors convert into this with `?`, so a failing shadow call inside
/// a posted task surfaces from `advance()` without extra plumbing.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Outcome of running one task.
pub type TaskResult = Result<(), BoxError>;

/// Identifier of a task, unique within its execution context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(pub u64);

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Processing state of an execution context.
///
/// - `Running`: zero-delay posts execute before `post` returns; delayed
///   tasks wait for the clock to be advanced.
/// - `Paused`: every post is queued, whatever its delay.
/// - `ConstantIdle`: every post drains the queue up to the last posted
///   deadline, advancing the clock as it goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum IdleState {
    #[default]
    Running,
    Paused,
    ConstantIdle,
}

/// Handle to a posted task.
///
/// Cancelling is advisory and immediate: the flag is checked right before
/// the task would run, it never interrupts a task body already executing.
#[derive(Debug, Clone)]
pub struct TaskHandle {
    id: TaskId,
    context: String,
    cancelled: Arc<AtomicBool>,
}

impl TaskHandle {
    pub(crate) fn new(id: TaskId, context: &str, cancelled: Arc<AtomicBool>) -> Self {
        Self {
            id,
            context: context.to_string(),
            cancelled,
        }
    }

    /// Returns the task ID.
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Returns the name of the context the task was posted to.
    pub fn context(&self) -> &str {
        &self.context
    }

    /// Marks the task cancelled. It will be skipped even if already due.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Returns true once `cancel()` has been called.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl PartialEq for TaskHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.context == other.context
    }
}

impl Eq for TaskHandle {}
