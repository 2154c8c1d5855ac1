//! Scenario runner - executes end-to-end scenarios in fresh sandboxes.

use crate::error::{check, check_eq, SimError};
use crate::platform::{COUNTER, GONE, HANDLER, MYSTERY, SYSTEM_CLOCK, TEXT_VIEW};
use crate::sandbox::Sandbox;
use crate::scenarios::ScenarioId;
use crate::shadows::{TextViewState, ViewState};

use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, info};
use umbra_core::{
    Callback, EngineConfig, RegisterOptions, ShadowClass, ShadowEngine, Value,
};
use umbra_env::{Clock, SystemClock, TaskResult};

/// Results from running a scenario.
#[derive(Debug, Clone)]
pub struct ScenarioResult {
    /// Scenario that was run
    pub scenario: ScenarioId,

    /// Emulated platform version
    pub sdk_level: u32,

    /// Whether scenario passed all assertions
    pub passed: bool,

    /// Task bodies observed to run
    pub tasks_run: usize,

    /// Main context clock at the end of the run
    pub virtual_time_ms: u64,

    /// Real time the run took
    pub elapsed: Duration,

    /// Failure message if any
    pub failure_reason: Option<String>,
}

/// Records which tasks ran, in order.
#[derive(Clone, Default)]
struct Probe {
    log: Arc<Mutex<Vec<String>>>,
}

impl Probe {
    fn record(&self, label: &str) {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(label.to_string());
    }

    /// A scheduler task that records `label`.
    fn task(&self, label: &str) -> impl FnOnce() -> TaskResult + Send + 'static {
        let probe = self.clone();
        let label = label.to_string();
        move || {
            probe.record(&label);
            Ok(())
        }
    }

    /// Application code (a runnable callback) that records `label`.
    fn runnable(&self, label: &str) -> Value {
        let probe = self.clone();
        let label = label.to_string();
        Value::Callback(Callback::runnable(move || probe.record(&label)))
    }

    fn entries(&self) -> Vec<String> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn len(&self) -> usize {
        self.log.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn expect(&self, what: &str, expected: &[&str]) -> Result<(), SimError> {
        check_eq(what, self.entries(), expected.iter().map(|s| s.to_string()).collect())
    }
}

fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

/// Runs scenarios, each in its own sandbox.
pub struct ScenarioRunner {
    /// Engine configuration for every sandbox
    config: EngineConfig,
}

impl ScenarioRunner {
    /// Creates a new scenario runner.
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Sets the emulated platform version.
    pub fn with_sdk_level(mut self, sdk_level: u32) -> Self {
        self.config.sdk_level = sdk_level;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Runs a scenario and returns the result.
    pub fn run(&self, scenario: ScenarioId) -> ScenarioResult {
        info!(
            "Starting scenario: {} ({}, sdk={})",
            scenario.name(),
            scenario.code(),
            self.config.sdk_level
        );

        let wall = SystemClock::new();
        let sandbox = Sandbox::new(self.config.clone());
        let probe = Probe::default();

        let outcome = match scenario {
            ScenarioId::CounterIncrement => self.run_counter_increment(&sandbox),
            ScenarioId::DefaultValue => self.run_default_value(&sandbox),
            ScenarioId::DelayedTasks => self.run_delayed_tasks(&sandbox, &probe),
            ScenarioId::TaskOrdering => self.run_task_ordering(&sandbox, &probe),
            ScenarioId::FixedPointDrain => self.run_fixed_point_drain(&sandbox, &probe),
            ScenarioId::Cancellation => self.run_cancellation(&sandbox, &probe),
            ScenarioId::PauseResume => self.run_pause_resume(&sandbox, &probe),
            ScenarioId::ShadowHierarchy => self.run_shadow_hierarchy(&sandbox),
            ScenarioId::StaticDispatch => self.run_static_dispatch(&sandbox),
            ScenarioId::CrossContext => self.run_cross_context(&sandbox, &probe),
            ScenarioId::ResetIsolation => self.run_reset_isolation(&sandbox, &probe),
        };

        let result = ScenarioResult {
            scenario,
            sdk_level: self.config.sdk_level,
            passed: outcome.is_ok(),
            tasks_run: probe.len(),
            virtual_time_ms: sandbox.main().now_millis(),
            elapsed: wall.now(),
            failure_reason: outcome.err().map(|e| e.to_string()),
        };
        debug!(?result, "scenario finished");
        result
    }

    /// Runs every scenario in catalogue order.
    pub fn run_all(&self) -> Vec<ScenarioResult> {
        ScenarioId::all().into_iter().map(|s| self.run(s)).collect()
    }

    /// E2E-001: the smallest shadow, end to end.
    fn run_counter_increment(&self, sandbox: &Sandbox) -> Result<(), SimError> {
        let engine = sandbox.engine();
        let counter = engine.new_instance_of(COUNTER, &[])?;
        check(engine.lookup_shadow(&counter).is_some(), || {
            "constructed Counter has no bound shadow".to_string()
        })?;

        engine.invoke(&counter, "increment", &[])?;
        engine.invoke(&counter, "increment", &[])?;
        check_eq("Counter.get()", engine.invoke(&counter, "get", &[])?, Value::Int(2))
    }

    /// E2E-002: no shadow anywhere, nothing crashes.
    fn run_default_value(&self, sandbox: &Sandbox) -> Result<(), SimError> {
        let engine = sandbox.engine();
        check(engine.try_resolve(MYSTERY).is_none(), || {
            "Mystery unexpectedly has a shadow".to_string()
        })?;

        // Handed in from outside: first dispatch binds lazily.
        let mystery = engine.allocate_unbound(MYSTERY)?;
        check_eq("Mystery.doThing()", engine.invoke(&mystery, "doThing", &[])?, Value::Int(0))?;
        check_eq("Mystery.describe()", engine.invoke(&mystery, "describe", &[])?, Value::Null)?;
        check_eq("Mystery.run()", engine.invoke(&mystery, "run", &[])?, Value::Void)
    }

    /// E2E-003: delayed handler posts observed across several advances.
    fn run_delayed_tasks(&self, sandbox: &Sandbox, probe: &Probe) -> Result<(), SimError> {
        let engine = sandbox.engine();
        let handler = engine.new_instance_of(HANDLER, &[])?;
        engine.invoke(&handler, "postDelayed", &[probe.runnable("t100"), Value::Int(100)])?;
        engine.invoke(&handler, "postDelayed", &[probe.runnable("t50a"), Value::Int(50)])?;
        engine.invoke(&handler, "postDelayed", &[probe.runnable("t50b"), Value::Int(50)])?;

        sandbox.advance(ms(40))?;
        probe.expect("after 40ms", &[])?;

        sandbox.advance(ms(20))?;
        probe.expect("after 60ms", &["t50a", "t50b"])?;

        sandbox.advance(ms(40))?;
        probe.expect("after 100ms", &["t50a", "t50b", "t100"])?;
        check_eq("virtual time", sandbox.now(), ms(100))
    }

    /// SCH-001: equal deadlines keep post order.
    fn run_task_ordering(&self, sandbox: &Sandbox, probe: &Probe) -> Result<(), SimError> {
        let main = sandbox.main();
        main.post(ms(5), probe.task("T1"))?;
        main.post(ms(5), probe.task("T2"))?;
        main.post(ms(3), probe.task("T3"))?;

        let ran = main.advance(ms(10))?;
        check_eq("tasks run", ran, 3)?;
        probe.expect("order", &["T3", "T1", "T2"])
    }

    /// SCH-002: follow-up work posted inside the window runs in the same call.
    fn run_fixed_point_drain(&self, sandbox: &Sandbox, probe: &Probe) -> Result<(), SimError> {
        let engine = sandbox.engine();
        let weak = engine.downgrade();
        let follow_up = probe.task("follow-up");
        let first = probe.task("first");
        let main_name = engine.contexts().main_name().to_string();
        let target = main_name.clone();

        engine.post(&main_name, ms(5), move || {
            first()?;
            if let Some(engine) = weak.upgrade() {
                engine.post(&target, Duration::ZERO, follow_up)?;
            }
            Ok(())
        })?;

        let ran = sandbox.advance(ms(10))?;
        check_eq("tasks run in one advance", ran, 2)?;
        probe.expect("order", &["first", "follow-up"])?;
        check(sandbox.main().is_empty(), || "queue not drained".to_string())
    }

    /// SCH-003: cancellation, before and after the deadline passes.
    fn run_cancellation(&self, sandbox: &Sandbox, probe: &Probe) -> Result<(), SimError> {
        let engine = sandbox.engine();
        let main = sandbox.main();

        let doomed = main.post(ms(5), probe.task("doomed"))?;
        main.post(ms(5), probe.task("kept"))?;
        engine.cancel(&doomed)?;

        // Overdue by the time it is cancelled.
        main.pause();
        let overdue = main.post(Duration::ZERO, probe.task("overdue"))?;
        main.resume();
        overdue.cancel();

        let handler = engine.new_instance_of(HANDLER, &[])?;
        let removed = probe.runnable("removed");
        engine.invoke(&handler, "postDelayed", &[removed.clone(), Value::Int(8)])?;
        engine.invoke(&handler, "removeCallbacks", &[removed])?;

        sandbox.advance(ms(10))?;
        probe.expect("ran", &["kept"])?;
        check(doomed.is_cancelled(), || "handle not marked cancelled".to_string())
    }

    /// SCH-004: paused contexts queue everything; resume does not drain.
    fn run_pause_resume(&self, sandbox: &Sandbox, probe: &Probe) -> Result<(), SimError> {
        let main = sandbox.main();

        main.post(Duration::ZERO, probe.task("running"))?;
        probe.expect("immediate while running", &["running"])?;

        check_eq("previous paused flag", main.set_paused(true), false)?;
        main.post(Duration::ZERO, probe.task("paused"))?;
        probe.expect("queued while paused", &["running"])?;

        main.resume();
        probe.expect("resume does not drain", &["running"])?;

        sandbox.advance(Duration::ZERO)?;
        probe.expect("drained by advance", &["running", "paused"])?;

        main.run_paused(|| main.post(Duration::ZERO, probe.task("inside run_paused")))?;
        check(!main.is_paused(), || "run_paused left the context paused".to_string())?;
        probe.expect("queued by run_paused", &["running", "paused"])?;
        main.idle()?;
        probe.expect("drained by idle", &["running", "paused", "inside run_paused"])
    }

    /// SHD-001: the shadow hierarchy mirrors the class hierarchy.
    fn run_shadow_hierarchy(&self, sandbox: &Sandbox) -> Result<(), SimError> {
        let engine = sandbox.engine();
        let text_view = engine.new_instance_of(TEXT_VIEW, &[Value::from("hi")])?;

        engine.invoke(&text_view, "setVisibility", &[Value::Int(GONE)])?;
        let visibility =
            engine.with_shadow(&text_view, |view: &ViewState| view.visibility.load(Ordering::SeqCst))?;
        check_eq("visibility through ViewState", visibility, GONE)?;

        let text = engine.with_shadow(&text_view, |tv: &TextViewState| {
            tv.text.lock().unwrap_or_else(PoisonError::into_inner).clone()
        })?;
        check_eq("text", text, "hi".to_string())?;

        let shadow = engine.shadow_of(&text_view)?;
        check(shadow.is_kind_of("ShadowView"), || {
            format!("{} does not extend ShadowView", shadow.class_name())
        })?;
        check_eq("unshadowed hashCode()", engine.invoke(&text_view, "hashCode", &[])?, Value::Int(0))
    }

    /// SHD-002: statics routed without any instance.
    fn run_static_dispatch(&self, sandbox: &Sandbox) -> Result<(), SimError> {
        let engine = sandbox.engine();
        check_eq("uptime at start", engine.invoke_static(SYSTEM_CLOCK, "uptimeMillis", &[])?, Value::Int(0))?;

        sandbox.advance(ms(250))?;
        check_eq("uptime after advance", engine.invoke_static(SYSTEM_CLOCK, "uptimeMillis", &[])?, Value::Int(250))?;

        engine.invoke_static(SYSTEM_CLOCK, "sleep", &[Value::Int(50)])?;
        check_eq("uptime after sleep", sandbox.now(), ms(300))?;

        engine.new_instance_of(COUNTER, &[])?;
        engine.new_instance_of(COUNTER, &[Value::Int(7)])?;
        check_eq(
            "Counter.instanceCount()",
            engine.invoke_static(COUNTER, "instanceCount", &[])?,
            Value::Int(2),
        )
    }

    /// CTX-001: a worker context posting into main.
    fn run_cross_context(&self, sandbox: &Sandbox, probe: &Probe) -> Result<(), SimError> {
        let engine = sandbox.engine();
        let main_handler = engine.new_instance_of(HANDLER, &[])?;
        let worker_handler = engine.new_instance_of(HANDLER, &[Value::from("worker")])?;

        let weak = engine.downgrade();
        let reply = probe.runnable("main: reply");
        let worker_probe = probe.clone();
        let work = Value::Callback(Callback::new(move |_| {
            worker_probe.record("worker: work");
            if let Some(engine) = weak.upgrade() {
                engine.invoke(&main_handler, "postDelayed", &[reply.clone(), Value::Int(5)])?;
            }
            Ok(Value::Void)
        }));
        engine.invoke(&worker_handler, "postDelayed", &[work, Value::Int(10)])?;

        let worker = engine.context("worker")?;
        worker.advance(ms(10))?;
        probe.expect("after worker advance", &["worker: work"])?;
        check_eq("main clock untouched", sandbox.now(), Duration::ZERO)?;
        check_eq("worker clock", worker.now(), ms(10))?;

        // The reply's deadline came from main's clock (0 + 5ms).
        sandbox.advance(ms(5))?;
        probe.expect("after main advance", &["worker: work", "main: reply"])
    }

    /// CTX-002: a reset leaves nothing behind.
    fn run_reset_isolation(&self, sandbox: &Sandbox, probe: &Probe) -> Result<(), SimError> {
        let engine = sandbox.engine();
        engine.register_shadow(
            &ShadowClass::builder::<()>("TestCounter", COUNTER).build(),
            RegisterOptions::new().priority(1),
        );
        let counter = engine.new_instance_of(COUNTER, &[])?;
        sandbox.main().post(ms(20), probe.task("stale"))?;
        sandbox.advance(ms(7))?;

        engine.reset();

        check_eq("shadow after reset", engine.resolve(COUNTER)?.name().to_string(), "ShadowCounter".to_string())?;
        check(engine.lookup_shadow(&counter).is_none(), || "binding survived reset".to_string())?;
        check_eq("bindings", engine.binding_count(), 0)?;
        check_eq("clock", sandbox.now(), Duration::ZERO)?;
        check(sandbox.main().is_empty(), || "queue survived reset".to_string())?;
        check_eq(
            "Counter.instanceCount()",
            engine.invoke_static(COUNTER, "instanceCount", &[])?,
            Value::Int(0),
        )?;

        sandbox.advance(ms(50))?;
        probe.expect("stale task never runs", &[])?;
        fresh_counter_works(engine)
    }
}

fn fresh_counter_works(engine: &ShadowEngine) -> Result<(), SimError> {
    let counter = engine.new_instance_of(COUNTER, &[])?;
    engine.invoke(&counter, "increment", &[])?;
    check_eq("fresh Counter.get()", engine.invoke(&counter, "get", &[])?, Value::Int(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_scenarios_pass() {
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
    fn test_result_fields() {
        let runner = ScenarioRunner::new(EngineConfig::default()).with_sdk_level(28);
        let result = runner.run(ScenarioId::DelayedTasks);

        assert!(result.passed);
        assert_eq!(result.sdk_level, 28);
        assert_eq!(result.tasks_run, 3);
        assert_eq!(result.virtual_time_ms, 100);
        assert!(result.failure_reason.is_none());
    }

    #[test]
    fn test_probe_records_in_order() {
        let probe = Probe::default();
        (probe.task("a"))().unwrap();
        if let Value::Callback(cb) = probe.runnable("b") {
            cb.call(&[]).unwrap();
        }
        assert_eq!(probe.entries(), vec!["a", "b"]);
    }
}
