//! Error types for the Umbra environment abstraction.

use crate::types::{BoxError, TaskId};
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while scheduling or draining tasks.
#[derive(Debug, Error)]
pub enum EnvError {
    /// No execution context is registered under this name
    #[error("Unknown execution context: {0}")]
    UnknownContext(String),

    /// The context was quit and no longer accepts tasks
    #[error("Execution context {0} has quit")]
    ContextQuit(String),

    /// A task body failed; the rest of the drain was abandoned
    #[error("Task {task} on {context} failed at {deadline:?}: {source}")]
    TaskFailed {
        context: String,
        task: TaskId,
        deadline: Duration,
        #[source]
        source: BoxError,
    },
}

impl EnvError {
    /// Creates an unknown-context error.
    pub fn unknown_context(name: impl Into<String>) -> Self {
        Self::UnknownContext(name.into())
    }

    /// Returns the underlying task failure, if this is one.
    pub fn task_failure(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match self {
            Self::TaskFailed { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}
