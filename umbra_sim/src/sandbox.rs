//! Per-test sandbox lifecycle.
//!
//! A `Sandbox` is what a test runner creates around each test: an engine
//! with the demonstration platform loaded and the default shadow set bound.
//! Dropping it resets the engine, so shadow static state (resetters) never
//! leaks into the next test on the same thread.

use crate::platform;
use crate::shadows;

use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use umbra_core::{EngineConfig, ShadowEngine, ShadowError};
use umbra_env::Scheduler;

/// Engine plus platform, torn down on drop.
pub struct Sandbox {
    engine: ShadowEngine,
}

impl Sandbox {
    /// Creates a sandbox with the demonstration platform and default shadows.
    pub fn new(config: EngineConfig) -> Self {
        let engine = ShadowEngine::new(config);
        platform::load(&engine);
        engine.bind_default_shadow_set(shadows::default_shadows());
        Self { engine }
    }

    pub fn engine(&self) -> &ShadowEngine {
        &self.engine
    }

    /// The main execution context.
    pub fn main(&self) -> Arc<Scheduler> {
        self.engine.main_context()
    }

    /// Advances the main context.
    pub fn advance(&self, duration: Duration) -> Result<usize, ShadowError> {
        Ok(self.main().advance(duration)?)
    }

    /// Virtual time on the main context.
    pub fn now(&self) -> Duration {
        self.main().now()
    }
}

impl Default for Sandbox {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl Drop for Sandbox {
    fn drop(&mut self) {
        self.engine.reset();
        debug!("sandbox torn down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{COUNTER, HANDLER};
    use umbra_core::{IdleState, Value};

    #[test]
    fn test_default_shadows_bound() {
        let sandbox = Sandbox::default();
        let engine = sandbox.engine();

        assert_eq!(engine.resolve(COUNTER).unwrap().name(), "ShadowCounter");
        assert_eq!(engine.resolve(HANDLER).unwrap().name(), "ShadowHandler");
        assert_eq!(engine.resolve(crate::platform::TEXT_VIEW).unwrap().name(), "ShadowTextView");
        assert!(engine.try_resolve(crate::platform::MYSTERY).is_none());
    }

    #[test]
    fn test_config_flows_into_contexts() {
        let sandbox = Sandbox::new(EngineConfig::default().with_idle_state(IdleState::Paused));
        assert!(sandbox.main().is_paused());

        let counter = sandbox.engine().new_instance_of(COUNTER, &[]).unwrap();
        let engine = sandbox.engine().clone();
        let target = counter.clone();
        sandbox
            .engine()
            .post("main", Duration::ZERO, move || {
                engine.invoke(&target, "increment", &[])?;
                Ok(())
            })
            .unwrap();

        assert_eq!(sandbox.engine().invoke(&counter, "get", &[]).unwrap(), Value::Int(0));
        assert_eq!(sandbox.advance(Duration::ZERO).unwrap(), 1);
        assert_eq!(sandbox.engine().invoke(&counter, "get", &[]).unwrap(), Value::Int(1));
    }

    #[test]
    fn test_reset_between_tests() {
        let sandbox = Sandbox::default();
        sandbox.engine().post("main", Duration::from_millis(10), || Ok(())).unwrap();
        sandbox.advance(Duration::from_millis(3)).unwrap();
        assert_eq!(sandbox.now(), Duration::from_millis(3));

        sandbox.engine().reset();
        assert_eq!(sandbox.now(), Duration::ZERO);
        assert!(sandbox.main().is_empty());
        assert_eq!(sandbox.engine().resolve(COUNTER).unwrap().name(), "ShadowCounter");
    }
}
