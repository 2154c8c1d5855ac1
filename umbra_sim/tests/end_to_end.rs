//! End-to-end behaviour through the public API of the sandbox.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use umbra_core::{Callback, EngineConfig, IdleState, RegisterOptions, ShadowClass, ShadowError, Value};
use umbra_sim::platform::{COUNTER, HANDLER, MYSTERY, POINT, SYSTEM_CLOCK, TEXT_VIEW};
use umbra_sim::{Sandbox, ScenarioId, ScenarioRunner};

type Log = Arc<Mutex<Vec<&'static str>>>;

fn log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

fn entries(log: &Log) -> Vec<&'static str> {
    log.lock().unwrap().clone()
}

fn post_label(sandbox: &Sandbox, log: &Log, label: &'static str, delay_ms: u64) {
    let sink = Arc::clone(log);
    sandbox
        .engine()
        .post("main", Duration::from_millis(delay_ms), move || {
            sink.lock().unwrap().push(label);
            Ok(())
        })
        .unwrap();
}

#[test]
fn counter_increments_twice() {
    let sandbox = Sandbox::default();
    let engine = sandbox.engine();

    let counter = engine.new_instance_of(COUNTER, &[]).unwrap();
    engine.invoke(&counter, "increment", &[]).unwrap();
    engine.invoke(&counter, "increment", &[]).unwrap();

    assert_eq!(engine.invoke(&counter, "get", &[]).unwrap(), Value::Int(2));
}

#[test]
fn unshadowed_method_returns_default() {
    let sandbox = Sandbox::default();
    let engine = sandbox.engine();

    let mystery = engine.allocate_unbound(MYSTERY).unwrap();
    assert_eq!(engine.invoke(&mystery, "doThing", &[]).unwrap(), Value::Int(0));
}

#[test]
fn delayed_tasks_run_in_deadline_then_post_order() {
    let sandbox = Sandbox::default();
    let log = log();

    post_label(&sandbox, &log, "t100", 100);
    post_label(&sandbox, &log, "t50a", 50);
    post_label(&sandbox, &log, "t50b", 50);

    assert_eq!(sandbox.advance(Duration::from_millis(40)).unwrap(), 0);
    assert!(entries(&log).is_empty());

    assert_eq!(sandbox.advance(Duration::from_millis(20)).unwrap(), 2);
    assert_eq!(entries(&log), vec!["t50a", "t50b"]);

    assert_eq!(sandbox.advance(Duration::from_millis(40)).unwrap(), 1);
    assert_eq!(entries(&log), vec!["t50a", "t50b", "t100"]);
    assert_eq!(sandbox.now(), Duration::from_millis(100));
}

#[test]
fn delayed_tasks_cumulative_advance_runs_all() {
    let sandbox = Sandbox::default();
    let log = log();

    post_label(&sandbox, &log, "t100", 100);
    post_label(&sandbox, &log, "t50a", 50);
    post_label(&sandbox, &log, "t50b", 50);

    sandbox.advance(Duration::from_millis(40)).unwrap();
    sandbox.advance(Duration::from_millis(60)).unwrap();

    assert_eq!(entries(&log), vec!["t50a", "t50b", "t100"]);
}

#[test]
fn equal_deadlines_keep_enqueue_order() {
    let sandbox = Sandbox::default();
    let log = log();

    post_label(&sandbox, &log, "T1", 5);
    post_label(&sandbox, &log, "T2", 5);
    post_label(&sandbox, &log, "T3", 3);
    sandbox.advance(Duration::from_millis(10)).unwrap();

    assert_eq!(entries(&log), vec!["T3", "T1", "T2"]);
}

#[test]
fn zero_delay_follow_up_runs_in_same_advance() {
    let sandbox = Sandbox::default();
    let log = log();
    let engine = sandbox.engine().clone();
    let sink = Arc::clone(&log);

    sandbox
        .engine()
        .post("main", Duration::from_millis(5), move || {
            sink.lock().unwrap().push("first");
            let inner = Arc::clone(&sink);
            engine.post("main", Duration::ZERO, move || {
                inner.lock().unwrap().push("follow-up");
                Ok(())
            })?;
            Ok(())
        })
        .unwrap();

    assert_eq!(sandbox.advance(Duration::from_millis(10)).unwrap(), 2);
    assert_eq!(entries(&log), vec!["first", "follow-up"]);
}

#[test]
fn cancelled_task_never_runs() {
    let sandbox = Sandbox::default();
    let log = log();
    let sink = Arc::clone(&log);

    let handle = sandbox
        .engine()
        .post("main", Duration::from_millis(20), move || {
            sink.lock().unwrap().push("cancelled");
            Ok(())
        })
        .unwrap();
    post_label(&sandbox, &log, "kept", 30);

    sandbox.engine().cancel(&handle).unwrap();
    sandbox.advance(Duration::from_millis(50)).unwrap();

    assert_eq!(entries(&log), vec!["kept"]);
}

#[test]
fn removed_handler_callback_never_runs() {
    let sandbox = Sandbox::default();
    let engine = sandbox.engine();
    let log = log();
    let sink = Arc::clone(&log);

    let handler = engine.new_instance_of(HANDLER, &[]).unwrap();
    let runnable = Value::Callback(Callback::runnable(move || sink.lock().unwrap().push("ran")));

    engine.invoke(&handler, "postDelayed", &[runnable.clone(), Value::Int(10)]).unwrap();
    engine.invoke(&handler, "removeCallbacks", &[runnable]).unwrap();
    sandbox.advance(Duration::from_millis(20)).unwrap();

    assert!(entries(&log).is_empty());
}

#[test]
fn paused_context_defers_zero_delay_posts() {
    let sandbox = Sandbox::default();
    let log = log();

    sandbox.engine().pause("main").unwrap();
    post_label(&sandbox, &log, "deferred", 0);
    assert!(entries(&log).is_empty());

    sandbox.engine().resume("main").unwrap();
    assert!(entries(&log).is_empty());

    sandbox.advance(Duration::ZERO).unwrap();
    assert_eq!(entries(&log), vec!["deferred"]);
}

#[test]
fn running_context_runs_zero_delay_posts_immediately() {
    let sandbox = Sandbox::default();
    let log = log();

    post_label(&sandbox, &log, "now", 0);
    assert_eq!(entries(&log), vec!["now"]);
}

#[test]
fn shadow_lookup_is_stable_and_binding_idempotent() {
    let sandbox = Sandbox::default();
    let engine = sandbox.engine();

    let counter = engine.new_instance_of(COUNTER, &[]).unwrap();
    let first = engine.shadow_of(&counter).unwrap();
    let second = engine.shadow_of(&counter).unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    let bindings = engine.binding_count();
    engine.bind_shadow(&counter, Arc::clone(&first)).unwrap();
    assert_eq!(engine.binding_count(), bindings);
    assert!(Arc::ptr_eq(&engine.lookup_shadow(&counter).unwrap(), &first));
}

#[test]
fn subclass_resolves_to_ancestor_shadow() {
    let sandbox = Sandbox::default();
    let engine = sandbox.engine();

    // TextView has its own shadow; its superclass View resolves to ShadowView.
    assert_eq!(engine.resolve(TEXT_VIEW).unwrap().name(), "ShadowTextView");
    assert_eq!(engine.resolve(umbra_sim::platform::VIEW).unwrap().name(), "ShadowView");
    assert!(engine.try_resolve(POINT).is_none());
}

#[test]
fn strict_construction_rejects_unshadowed_class() {
    let sandbox = Sandbox::new(EngineConfig::default().with_strict_construction(true));
    let result = sandbox.engine().new_instance_of(MYSTERY, &[]);
    assert!(matches!(result, Err(ShadowError::ShadowNotFound { .. })));

    // Plain data holders are still constructible.
    assert!(sandbox.engine().new_instance_of(POINT, &[]).is_ok());
}

#[test]
fn paused_idle_state_from_config() {
    let sandbox = Sandbox::new(EngineConfig::default().with_idle_state(IdleState::Paused));
    let log = log();

    post_label(&sandbox, &log, "queued", 0);
    assert!(entries(&log).is_empty());
    sandbox.advance(Duration::ZERO).unwrap();
    assert_eq!(entries(&log), vec!["queued"]);
}

#[test]
fn reset_clears_static_state_of_unregistered_default() {
    let sandbox = Sandbox::default();
    let engine = sandbox.engine();
    engine.reset();

    engine.new_instance_of(COUNTER, &[]).unwrap();
    engine.new_instance_of(COUNTER, &[]).unwrap();
    assert_eq!(engine.invoke_static(COUNTER, "instanceCount", &[]).unwrap(), Value::Int(2));

    engine.unregister_shadow(COUNTER);
    engine.reset();

    assert_eq!(engine.invoke_static(COUNTER, "instanceCount", &[]).unwrap(), Value::Int(0));
}

#[test]
fn reset_clears_static_state_of_overridden_default() {
    let sandbox = Sandbox::default();
    let engine = sandbox.engine();
    engine.reset();

    engine.new_instance_of(COUNTER, &[]).unwrap();
    let stand_in = ShadowClass::builder::<()>("StandInCounter", COUNTER)
        .constructor(&[], |_, _| Ok(()))
        .build();
    engine.register_shadow(&stand_in, RegisterOptions::new().priority(5));
    engine.reset();

    assert_eq!(engine.resolve(COUNTER).unwrap().name(), "ShadowCounter");
    assert_eq!(engine.invoke_static(COUNTER, "instanceCount", &[]).unwrap(), Value::Int(0));
}

#[test]
fn static_calls_follow_the_winning_registration() {
    let sandbox = Sandbox::default();
    let engine = sandbox.engine();

    let high = ShadowClass::builder::<()>("HighClock", SYSTEM_CLOCK)
        .static_method("uptimeMillis", &[], |_| Ok(Value::Int(111)))
        .build();
    let low = ShadowClass::builder::<()>("LowClock", SYSTEM_CLOCK)
        .static_method("uptimeMillis", &[], |_| Ok(Value::Int(222)))
        .build();
    engine.register_shadow(&high, RegisterOptions::new().priority(10));
    engine.register_shadow(&low, RegisterOptions::new());

    assert_eq!(engine.resolve(SYSTEM_CLOCK).unwrap().name(), "HighClock");
    assert_eq!(engine.invoke_static(SYSTEM_CLOCK, "uptimeMillis", &[]).unwrap(), Value::Int(111));
    // HighClock does not replace elapsedRealtime, so the default applies.
    assert_eq!(engine.invoke_static(SYSTEM_CLOCK, "elapsedRealtime", &[]).unwrap(), Value::Int(0));
}

#[test]
fn every_scenario_passes() {
    let runner = ScenarioRunner::new(EngineConfig::default());
    for result in runner.run_all() {
        assert!(
            result.passed,
            "{} failed: {:?}",
            result.scenario,
            result.failure_reason
        );
    }
}

#[test]
fn scenarios_pass_at_older_sdk() {
    let runner = ScenarioRunner::new(EngineConfig::default()).with_sdk_level(21);
    let result = runner.run(ScenarioId::ShadowHierarchy);
    assert!(result.passed, "{:?}", result.failure_reason);
    assert_eq!(result.sdk_level, 21);
}
