//! Deterministic virtual-time task scheduler.
//!
//! One `Scheduler` backs one execution context: a single serial task queue
//! with its own virtual clock. Nothing here sleeps or spawns; time moves only
//! when a caller advances it, and every due task runs on the caller's stack.
//!
//! # Ordering
//!
//! Tasks are keyed by `(deadline, sequence)`. The sequence is taken at
//! enqueue time, so two tasks with the same deadline run in the order they
//! were posted. `post_at_front` draws from a separate, decreasing sequence
//! so it sorts ahead of everything else due at the current time.
//!
//! # Re-entrancy
//!
//! The state lock is never held while a task body runs. A task may post,
//! cancel, pause or even advance its own context.

use crate::clock::{virtual_epoch, Clock};
use crate::error::EnvError;
use crate::types::{IdleState, TaskHandle, TaskId, TaskResult};

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime};
use tracing::{debug, trace};

type TaskFn = Box<dyn FnOnce() -> TaskResult + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct QueueKey {
    deadline: Duration,
    seq: i64,
}

struct ScheduledTask {
    id: TaskId,
    deadline: Duration,
    cancelled: Arc<AtomicBool>,
    run: TaskFn,
}

impl ScheduledTask {
    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

struct SchedulerState {
    /// Current virtual time
    now: Duration,

    queue: BTreeMap<QueueKey, ScheduledTask>,

    /// Sequence for normal posts (increasing)
    next_seq: i64,

    /// Sequence for front-of-queue posts (decreasing, always negative)
    front_seq: i64,

    next_task_id: u64,

    idle_state: IdleState,

    /// Nesting depth of task bodies currently running
    executing: u32,

    quit: bool,
}

impl SchedulerState {
    fn new(idle_state: IdleState) -> Self {
        Self {
            now: Duration::ZERO,
            queue: BTreeMap::new(),
            next_seq: 0,
            front_seq: 0,
            next_task_id: 0,
            idle_state,
            executing: 0,
            quit: false,
        }
    }

    fn enqueue(&mut self, key: QueueKey, run: TaskFn, context: &str) -> TaskHandle {
        self.next_task_id += 1;
        let id = TaskId(self.next_task_id);
        let cancelled = Arc::new(AtomicBool::new(false));

        self.queue.insert(
            key,
            ScheduledTask {
                id,
                deadline: key.deadline,
                cancelled: Arc::clone(&cancelled),
                run,
            },
        );

        TaskHandle::new(id, context, cancelled)
    }

    fn normal_key(&mut self, deadline: Duration) -> QueueKey {
        let seq = self.next_seq;
        self.next_seq += 1;
        QueueKey { deadline, seq }
    }

    fn front_key(&mut self) -> QueueKey {
        self.front_seq -= 1;
        QueueKey {
            deadline: self.now,
            seq: self.front_seq,
        }
    }

    /// Drops cancelled tasks sitting at the head of the queue.
    fn prune_head(&mut self) {
        while let Some(entry) = self.queue.first_entry() {
            if entry.get().is_cancelled() {
                entry.remove();
            } else {
                break;
            }
        }
    }

    fn peek_deadline(&mut self) -> Option<Duration> {
        self.prune_head();
        self.queue.first_key_value().map(|(key, _)| key.deadline)
    }

    /// Removes the next live task if its deadline is within `end`.
    fn pop_due(&mut self, end: Duration) -> Option<ScheduledTask> {
        match self.peek_deadline() {
            Some(deadline) if deadline <= end => self.queue.pop_first().map(|(_, task)| task),
            _ => None,
        }
    }

    fn last_deadline(&self) -> Option<Duration> {
        self.queue
            .values()
            .filter(|task| !task.is_cancelled())
            .map(|task| task.deadline)
            .max()
    }
}

/// Leaves the executing section when dropped, also when a task body panics.
struct ExecutingGuard<'a> {
    scheduler: &'a Scheduler,
}

impl Drop for ExecutingGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.scheduler.lock();
        state.executing = state.executing.saturating_sub(1);
    }
}

/// The virtual scheduler for one execution context.
pub struct Scheduler {
    name: String,

    /// Idle state restored by `reset()`
    initial_idle_state: IdleState,

    state: Mutex<SchedulerState>,
}

impl Scheduler {
    /// Creates a scheduler with the clock at zero.
    pub fn new(name: impl Into<String>, idle_state: IdleState) -> Self {
        Self {
            name: name.into(),
            initial_idle_state: idle_state,
            state: Mutex::new(SchedulerState::new(idle_state)),
        }
    }

    /// Creates an Arc-wrapped scheduler for sharing.
    pub fn shared(name: impl Into<String>, idle_state: IdleState) -> Arc<Self> {
        Arc::new(Self::new(name, idle_state))
    }

    fn lock(&self) -> MutexGuard<'_, SchedulerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the context name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Posts a task to run `delay` after the current virtual time.
    ///
    /// While `Running` and not already inside a task, a zero-delay task runs
    /// (together with anything else already due) before this returns, and a
    /// failure of that run is returned here. Inside a task body the post is
    /// queued and drained as soon as the outer task finishes.
    pub fn post<F>(&self, delay: Duration, task: F) -> Result<TaskHandle, EnvError>
    where
        F: FnOnce() -> TaskResult + Send + 'static,
    {
        let (handle, drain) = {
            let mut state = self.lock();
            if state.quit {
                return Err(EnvError::ContextQuit(self.name.clone()));
            }

            // Saturates: an overflowing delay is never due.
            let deadline = state.now.saturating_add(delay);
            let key = state.normal_key(deadline);
            let handle = state.enqueue(key, Box::new(task), &self.name);
            trace!(context = %self.name, task = %handle.id(), ?deadline, "task posted");

            let drain = if state.executing > 0 {
                None
            } else {
                match state.idle_state {
                    IdleState::Running if delay.is_zero() => Some(state.now),
                    IdleState::ConstantIdle => state.last_deadline(),
                    _ => None,
                }
            };
            (handle, drain)
        };

        if let Some(end) = drain {
            self.advance_to(end)?;
        }
        Ok(handle)
    }

    /// Posts a task ahead of every other task due at the current time.
    pub fn post_at_front<F>(&self, task: F) -> Result<TaskHandle, EnvError>
    where
        F: FnOnce() -> TaskResult + Send + 'static,
    {
        let (handle, drain) = {
            let mut state = self.lock();
            if state.quit {
                return Err(EnvError::ContextQuit(self.name.clone()));
            }

            let key = state.front_key();
            let handle = state.enqueue(key, Box::new(task), &self.name);
            let drain = state.executing == 0 && state.idle_state != IdleState::Paused;
            (handle, drain.then_some(state.now))
        };

        if let Some(end) = drain {
            self.advance_to(end)?;
        }
        Ok(handle)
    }

    /// Cancels a posted task. A cancelled task never runs.
    pub fn cancel(&self, handle: &TaskHandle) {
        handle.cancel();
        let mut state = self.lock();
        state.queue.retain(|_, task| task.id != handle.id() || handle.context() != self.name);
        debug!(context = %self.name, task = %handle.id(), "task cancelled");
    }

    /// Moves the clock forward by `duration`, running every task that falls
    /// due on the way, including tasks posted by those tasks.
    ///
    /// Returns the number of tasks executed. On a task failure the drain
    /// stops, the clock stays at the failing task's deadline and the
    /// remaining tasks stay queued.
    pub fn advance(&self, duration: Duration) -> Result<usize, EnvError> {
        let end = self.now().saturating_add(duration);
        self.advance_to(end)
    }

    /// Runs every task due at or before `end`, then sets the clock to `end`.
    ///
    /// The clock never moves backwards; an `end` in the past only drains
    /// what is already due.
    pub fn advance_to(&self, end: Duration) -> Result<usize, EnvError> {
        let ran = self.drain_until(end)?;
        let mut state = self.lock();
        if end > state.now {
            state.now = end;
        }
        Ok(ran)
    }

    /// Runs every task already due without moving the clock.
    pub fn idle(&self) -> Result<usize, EnvError> {
        let now = self.now();
        self.drain_until(now)
    }

    /// Runs the next queued task, advancing the clock to its deadline if
    /// needed. Returns false when the queue is empty.
    pub fn run_one_task(&self) -> Result<bool, EnvError> {
        let next = {
            let mut state = self.lock();
            match state.peek_deadline() {
                Some(deadline) => state.pop_due(deadline),
                None => None,
            }
        };

        match next {
            Some(task) => {
                self.execute(task)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Advances to the deadline of the next queued task and runs what is due.
    pub fn advance_to_next_task(&self) -> Result<bool, EnvError> {
        match self.next_deadline() {
            Some(deadline) => Ok(self.advance_to(deadline)? > 0),
            None => Ok(false),
        }
    }

    /// Advances to the latest deadline currently queued.
    pub fn advance_to_last_task(&self) -> Result<bool, EnvError> {
        let last = self.lock().last_deadline();
        match last {
            Some(deadline) => Ok(self.advance_to(deadline)? > 0),
            None => Ok(false),
        }
    }

    fn drain_until(&self, end: Duration) -> Result<usize, EnvError> {
        let mut ran = 0;
        loop {
            let next = self.lock().pop_due(end);
            match next {
                Some(task) => {
                    self.execute(task)?;
                    ran += 1;
                }
                None => break,
            }
        }
        Ok(ran)
    }

    fn execute(&self, task: ScheduledTask) -> Result<(), EnvError> {
        {
            let mut state = self.lock();
            if task.deadline > state.now {
                state.now = task.deadline;
            }
            state.executing += 1;
        }
        let guard = ExecutingGuard { scheduler: self };

        debug!(context = %self.name, task = %task.id, deadline = ?task.deadline, "running task");
        let ScheduledTask {
            id, deadline, run, ..
        } = task;
        let outcome = run();
        drop(guard);

        // Zero-delay posts made by the task body were queued with a deadline
        // of now, so the caller's drain loop picks them up next.
        outcome.map_err(|source| EnvError::TaskFailed {
            context: self.name.clone(),
            task: id,
            deadline,
            source,
        })
    }

    /// Returns the current virtual time.
    pub fn now(&self) -> Duration {
        self.lock().now
    }

    /// Returns the deadline of the next live task.
    pub fn next_deadline(&self) -> Option<Duration> {
        self.lock().peek_deadline()
    }

    /// Returns true if a live task is due at the current time.
    pub fn has_due(&self) -> bool {
        let mut state = self.lock();
        let now = state.now;
        matches!(state.peek_deadline(), Some(deadline) if deadline <= now)
    }

    /// Returns the number of queued tasks that have not been cancelled.
    pub fn len(&self) -> usize {
        self.lock()
            .queue
            .values()
            .filter(|task| !task.is_cancelled())
            .count()
    }

    /// Returns true if no live task is queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the current idle state.
    pub fn idle_state(&self) -> IdleState {
        self.lock().idle_state
    }

    /// Sets the idle state.
    ///
    /// Switching to `ConstantIdle` drains up to the last queued deadline.
    /// Switching to `Running` does not run overdue tasks.
    pub fn set_idle_state(&self, idle_state: IdleState) -> Result<(), EnvError> {
        self.lock().idle_state = idle_state;
        debug!(context = %self.name, ?idle_state, "idle state changed");
        if idle_state == IdleState::ConstantIdle {
            self.advance_to_last_task()?;
        }
        Ok(())
    }

    /// Switches to `Paused`.
    pub fn pause(&self) {
        self.lock().idle_state = IdleState::Paused;
    }

    /// Switches back to `Running` without draining overdue tasks.
    pub fn resume(&self) {
        self.lock().idle_state = IdleState::Running;
    }

    /// Returns true while paused.
    pub fn is_paused(&self) -> bool {
        self.idle_state() == IdleState::Paused
    }

    /// Pauses or resumes, returning whether the context was paused before.
    pub fn set_paused(&self, paused: bool) -> bool {
        let mut state = self.lock();
        let was_paused = state.idle_state == IdleState::Paused;
        state.idle_state = if paused {
            IdleState::Paused
        } else {
            IdleState::Running
        };
        was_paused
    }

    /// Runs `f` with the context paused, then restores the previous state.
    pub fn run_paused<R>(&self, f: impl FnOnce() -> R) -> R {
        let previous = {
            let mut state = self.lock();
            std::mem::replace(&mut state.idle_state, IdleState::Paused)
        };
        let result = f();
        self.lock().idle_state = previous;
        result
    }

    /// Stops accepting tasks and drops everything queued.
    pub fn quit(&self) {
        let mut state = self.lock();
        state.quit = true;
        state.queue.clear();
        debug!(context = %self.name, "context quit");
    }

    /// Returns true after `quit()`.
    pub fn has_quit(&self) -> bool {
        self.lock().quit
    }

    /// Clears the queue, zeroes the clock and restores the initial idle state.
    pub fn reset(&self) {
        let mut state = self.lock();
        *state = SchedulerState::new(self.initial_idle_state);
    }
}

impl Clock for Scheduler {
    fn now(&self) -> Duration {
        Scheduler::now(self)
    }

    fn system_time(&self) -> SystemTime {
        virtual_epoch() + Scheduler::now(self)
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("Scheduler")
            .field("name", &self.name)
            .field("now", &state.now)
            .field("queued", &state.queue.len())
            .field("idle_state", &state.idle_state)
            .finish()
    }
}
