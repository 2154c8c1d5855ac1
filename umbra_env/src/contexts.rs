//! Named execution contexts.
//!
//! Every engine owns one table of contexts with a designated main context
//! that any test can address by convention. Each context keeps its own
//! clock: posting into another context schedules relative to the target's
//! clock, and advancing one context never moves another.

use crate::error::EnvError;
use crate::scheduler::Scheduler;
use crate::types::IdleState;

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::debug;

/// Name of the main context unless configured otherwise.
pub const MAIN_CONTEXT: &str = "main";

/// Table of execution contexts keyed by name.
pub struct ExecutionContexts {
    main_name: String,

    /// Idle state new contexts start in
    default_idle_state: IdleState,

    contexts: Mutex<BTreeMap<String, Arc<Scheduler>>>,
}

impl ExecutionContexts {
    /// Creates the table with its main context.
    pub fn new(main_name: impl Into<String>, default_idle_state: IdleState) -> Self {
        let main_name = main_name.into();
        let mut contexts = BTreeMap::new();
        contexts.insert(
            main_name.clone(),
            Scheduler::shared(main_name.clone(), default_idle_state),
        );

        Self {
            main_name,
            default_idle_state,
            contexts: Mutex::new(contexts),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, Arc<Scheduler>>> {
        self.contexts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the main context.
    pub fn main(&self) -> Arc<Scheduler> {
        let mut contexts = self.lock();
        let main = contexts
            .entry(self.main_name.clone())
            .or_insert_with(|| Scheduler::shared(self.main_name.clone(), self.default_idle_state));
        Arc::clone(main)
    }

    /// Returns the name of the main context.
    pub fn main_name(&self) -> &str {
        &self.main_name
    }

    /// Looks up an existing context.
    pub fn get(&self, name: &str) -> Result<Arc<Scheduler>, EnvError> {
        self.lock()
            .get(name)
            .cloned()
            .ok_or_else(|| EnvError::unknown_context(name))
    }

    /// Returns the named context, creating it if needed.
    pub fn get_or_create(&self, name: &str) -> Arc<Scheduler> {
        let mut contexts = self.lock();
        let scheduler = contexts.entry(name.to_string()).or_insert_with(|| {
            debug!(context = name, "execution context created");
            Scheduler::shared(name, self.default_idle_state)
        });
        Arc::clone(scheduler)
    }

    /// Returns all context names in sorted order.
    pub fn names(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    fn snapshot(&self) -> Vec<Arc<Scheduler>> {
        self.lock().values().cloned().collect()
    }

    /// Advances every context by `duration`, one after another in name
    /// order. Returns the total number of tasks executed.
    pub fn advance_all(&self, duration: Duration) -> Result<usize, EnvError> {
        let mut ran = 0;
        for scheduler in self.snapshot() {
            ran += scheduler.advance(duration)?;
        }
        Ok(ran)
    }

    /// Resets every context: queues cleared, clocks zeroed.
    pub fn reset_all(&self) {
        for scheduler in self.snapshot() {
            scheduler.reset();
        }
    }
}

impl Default for ExecutionContexts {
    fn default() -> Self {
        Self::new(MAIN_CONTEXT, IdleState::Running)
    }
}
