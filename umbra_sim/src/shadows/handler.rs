//! `ShadowHandler`: posts runnables into an execution context.
//!
//! A handler built with no arguments targets the main context; one built
//! with a context name targets that context (created on first use), which
//! is how background loops are modelled.

use super::{lock, run_runnable};
use crate::platform::HANDLER;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};
use umbra_core::{Invocation, ShadowClass, ShadowClassRef, ShadowError, Value, ValueType};
use umbra_env::{EnvError, TaskHandle, TaskResult};

struct Posted {
    runnable: Value,
    handle: TaskHandle,
    /// Set once the task body has started
    started: Arc<AtomicBool>,
}

impl Posted {
    fn is_pending(&self) -> bool {
        !self.started.load(Ordering::SeqCst) && !self.handle.is_cancelled()
    }
}

#[derive(Default)]
pub struct HandlerState {
    /// Target context; `None` means the main context
    looper: Mutex<Option<String>>,
    posted: Mutex<Vec<Posted>>,
}

impl HandlerState {
    /// Name of the context this handler posts to.
    pub fn looper_name(&self, inv: &Invocation<'_>) -> String {
        lock(&self.looper)
            .clone()
            .unwrap_or_else(|| inv.engine().contexts().main_name().to_string())
    }

    /// Number of posted runnables that have neither run nor been removed.
    pub fn pending(&self) -> usize {
        lock(&self.posted).iter().filter(|p| p.is_pending()).count()
    }
}

enum Placement {
    After(Duration),
    Front,
}

fn schedule(
    state: &HandlerState,
    inv: &Invocation<'_>,
    runnable: Value,
    placement: Placement,
) -> Result<Value, ShadowError> {
    if !matches!(runnable, Value::Callback(_) | Value::Object(_)) {
        return Err(ShadowError::illegal_argument("runnable must not be null"));
    }

    let engine = inv.engine();
    let looper = state.looper_name(inv);
    let context = engine.context_or_create(&looper);

    let started = Arc::new(AtomicBool::new(false));
    let task = {
        let engine = engine.downgrade();
        let runnable = runnable.clone();
        let started = Arc::clone(&started);
        move || -> TaskResult {
            started.store(true, Ordering::SeqCst);
            if let Some(engine) = engine.upgrade() {
                run_runnable(&engine, &runnable)?;
            }
            Ok(())
        }
    };

    let posted = match placement {
        Placement::After(delay) => context.post(delay, task),
        Placement::Front => context.post_at_front(task),
    };
    let handle = match posted {
        Ok(handle) => handle,
        Err(EnvError::ContextQuit(name)) => {
            warn!(context = %name, "handler posting to a quit context");
            return Ok(Value::Bool(false));
        }
        Err(e) => return Err(e.into()),
    };

    debug!(context = %looper, task = %handle.id(), "runnable posted");
    let mut posted = lock(&state.posted);
    posted.retain(Posted::is_pending);
    posted.push(Posted {
        runnable,
        handle,
        started,
    });
    Ok(Value::Bool(true))
}

pub fn shadow_handler() -> ShadowClassRef {
    ShadowClass::builder::<HandlerState>("ShadowHandler", HANDLER)
        .constructor(&[], |_, _| Ok(()))
        .constructor(&[ValueType::Str], |state, inv| {
            let name = inv.args().str(0)?.to_string();
            inv.engine().context_or_create(&name);
            *lock(&state.looper) = Some(name);
            Ok(())
        })
        .loose_method("post", 1, |state, inv| {
            schedule(state, inv, inv.args().get(0)?.clone(), Placement::After(Duration::ZERO))
        })
        .loose_method("postDelayed", 2, |state, inv| {
            // Negative delays behave like zero.
            let delay = Duration::from_millis(inv.args().int(1)?.max(0) as u64);
            schedule(state, inv, inv.args().get(0)?.clone(), Placement::After(delay))
        })
        .loose_method("postAtFrontOfQueue", 1, |state, inv| {
            schedule(state, inv, inv.args().get(0)?.clone(), Placement::Front)
        })
        .loose_method("removeCallbacks", 1, |state, inv| {
            let runnable = inv.args().get(0)?;
            let engine = inv.engine();
            let mut posted = lock(&state.posted);
            for entry in posted.iter().filter(|p| &p.runnable == runnable) {
                engine.cancel(&entry.handle)?;
            }
            posted.retain(Posted::is_pending);
            Ok(Value::Void)
        })
        .method("getLooperName", &[], |state, inv| Ok(Value::from(state.looper_name(inv))))
        .method("hasCallbacks", &[], |state, _| Ok(Value::Bool(state.pending() > 0)))
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{HANDLER, MYSTERY};
    use crate::sandbox::Sandbox;
    use umbra_core::Callback;

    fn recorder() -> (Arc<Mutex<Vec<&'static str>>>, impl Fn(&'static str) -> Value) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let shared = Arc::clone(&log);
        let make = move |label: &'static str| {
            let log = Arc::clone(&shared);
            Value::Callback(Callback::runnable(move || {
                log.lock().unwrap().push(label);
            }))
        };
        (log, make)
    }

    #[test]
    fn test_post_runs_immediately_while_running() {
        let sandbox = Sandbox::default();
        let engine = sandbox.engine();
        let handler = engine.new_instance_of(HANDLER, &[]).unwrap();
        let (log, runnable) = recorder();

        assert_eq!(engine.invoke(&handler, "post", &[runnable("now")]).unwrap(), Value::Bool(true));
        assert_eq!(*log.lock().unwrap(), vec!["now"]);
    }

    #[test]
    fn test_post_delayed_and_front_of_queue() {
        let sandbox = Sandbox::default();
        let engine = sandbox.engine();
        let handler = engine.new_instance_of(HANDLER, &[]).unwrap();
        let (log, runnable) = recorder();

        engine.pause("main").unwrap();
        engine.invoke(&handler, "postDelayed", &[runnable("late"), Value::Int(20)]).unwrap();
        engine.invoke(&handler, "post", &[runnable("queued")]).unwrap();
        engine.invoke(&handler, "postAtFrontOfQueue", &[runnable("front")]).unwrap();
        assert!(log.lock().unwrap().is_empty());
        assert_eq!(engine.invoke(&handler, "hasCallbacks", &[]).unwrap(), Value::Bool(true));

        engine.advance("main", Duration::from_millis(20)).unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["front", "queued", "late"]);
        assert_eq!(engine.invoke(&handler, "hasCallbacks", &[]).unwrap(), Value::Bool(false));
    }

    #[test]
    fn test_remove_callbacks() {
        let sandbox = Sandbox::default();
        let engine = sandbox.engine();
        let handler = engine.new_instance_of(HANDLER, &[]).unwrap();
        let (log, runnable) = recorder();

        let doomed = runnable("doomed");
        engine.invoke(&handler, "postDelayed", &[doomed.clone(), Value::Int(10)]).unwrap();
        engine.invoke(&handler, "postDelayed", &[doomed.clone(), Value::Int(30)]).unwrap();
        engine.invoke(&handler, "postDelayed", &[runnable("kept"), Value::Int(10)]).unwrap();

        engine.invoke(&handler, "removeCallbacks", &[doomed]).unwrap();
        engine.advance("main", Duration::from_millis(50)).unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["kept"]);
    }

    #[test]
    fn test_runnable_object_dispatched_through_engine() {
        let sandbox = Sandbox::default();
        let engine = sandbox.engine();
        let handler = engine.new_instance_of(HANDLER, &[]).unwrap();
        let mystery = engine.allocate_unbound(MYSTERY).unwrap();

        engine
            .invoke(&handler, "postDelayed", &[Value::Object(mystery.clone()), Value::Int(5)])
            .unwrap();
        assert_eq!(engine.advance("main", Duration::from_millis(5)).unwrap(), 1);
        // run() went through the proxy, which bound a pass-through shadow.
        assert!(engine.lookup_shadow(&mystery).is_some());
    }

    #[test]
    fn test_background_handler_uses_its_own_context() {
        let sandbox = Sandbox::default();
        let engine = sandbox.engine();
        let handler = engine.new_instance_of(HANDLER, &[Value::from("worker")]).unwrap();
        let (log, runnable) = recorder();

        assert_eq!(
            engine.invoke(&handler, "getLooperName", &[]).unwrap(),
            Value::from("worker")
        );
        engine.invoke(&handler, "postDelayed", &[runnable("bg"), Value::Int(10)]).unwrap();

        engine.advance("main", Duration::from_millis(10)).unwrap();
        assert!(log.lock().unwrap().is_empty());
        engine.advance("worker", Duration::from_millis(10)).unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["bg"]);
    }

    #[test]
    fn test_post_to_quit_context_returns_false() {
        let sandbox = Sandbox::default();
        let engine = sandbox.engine();
        let handler = engine.new_instance_of(HANDLER, &[Value::from("worker")]).unwrap();
        engine.context("worker").unwrap().quit();
        let (_, runnable) = recorder();

        assert_eq!(
            engine.invoke(&handler, "post", &[runnable("never")]).unwrap(),
            Value::Bool(false)
        );
    }

    #[test]
    fn test_null_runnable_rejected() {
        let sandbox = Sandbox::default();
        let engine = sandbox.engine();
        let handler = engine.new_instance_of(HANDLER, &[]).unwrap();

        let err = engine.invoke(&handler, "post", &[Value::Null]).unwrap_err();
        assert_eq!(err.exception().unwrap().class, "java.lang.IllegalArgumentException");
    }
}
