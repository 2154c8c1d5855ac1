//! Umbra Environment Abstraction Layer
//!
//! Deterministic virtual time for shadowed platform code. Shadows that need
//! to defer work (timers, animations, posted callbacks, message delivery)
//! submit tasks to a `Scheduler`; tests move the clock explicitly and every
//! due task runs on the calling thread.
//!
//! # Core Concept
//!
//! - No wall-clock sleeping, no worker threads.
//! - One `Scheduler` per execution context, each with its own clock.
//! - Tasks run in `(deadline, post order)` order; a drain keeps going until
//!   nothing else is due, so follow-up work posted by a task within the
//!   window runs in the same call.
//!
//! # Example
//!
//! ```
//! use umbra_env::ExecutionContexts;
//! use std::time::Duration;
//!
//! let contexts = ExecutionContexts::default();
//! let main = contexts.main();
//! main.post(Duration::from_millis(50), || Ok(())).unwrap();
//!
//! assert_eq!(main.advance(Duration::from_millis(40)).unwrap(), 0);
//! assert_eq!(main.advance(Duration::from_millis(10)).unwrap(), 1);
//! ```

mod clock;
mod contexts;
mod error;
mod scheduler;
mod types;

pub use clock::{virtual_epoch, Clock, SystemClock};
pub use contexts::{ExecutionContexts, MAIN_CONTEXT};
pub use error::EnvError;
pub use scheduler::Scheduler;
pub use types::{BoxError, IdleState, TaskHandle, TaskId, TaskResult};
