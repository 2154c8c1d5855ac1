//! `ShadowCounter`: the smallest useful shadow.

use crate::platform::COUNTER;

use std::cell::Cell;
use std::sync::atomic::{AtomicI64, Ordering};
use umbra_core::{ShadowClass, ShadowClassRef, Value, ValueType};

thread_local! {
    /// Instances constructed on this thread since the last reset
    static INSTANCES: Cell<i64> = const { Cell::new(0) };
}

fn reset_instances() {
    INSTANCES.with(|count| count.set(0));
}

#[derive(Debug, Default)]
pub struct CounterState {
    pub count: AtomicI64,
}

pub fn shadow_counter() -> ShadowClassRef {
    ShadowClass::builder::<CounterState>("ShadowCounter", COUNTER)
        .constructor(&[], |_, _| {
            INSTANCES.with(|count| count.set(count.get() + 1));
            Ok(())
        })
        .constructor(&[ValueType::Int], |state, inv| {
            INSTANCES.with(|count| count.set(count.get() + 1));
            state.count.store(inv.args().int(0)?, Ordering::SeqCst);
            Ok(())
        })
        .method("increment", &[], |state, _| {
            state.count.fetch_add(1, Ordering::SeqCst);
            Ok(Value::Void)
        })
        .method("get", &[], |state, _| Ok(Value::Int(state.count.load(Ordering::SeqCst))))
        .static_method("instanceCount", &[], |_| Ok(Value::Int(INSTANCES.with(Cell::get))))
        .resetter(reset_instances)
        .build()
}

#[cfg(test)]
mod tests {
    use crate::platform::COUNTER;
    use crate::sandbox::Sandbox;
    use umbra_core::Value;

    #[test]
    fn test_increment_and_get() {
        let sandbox = Sandbox::default();
        let engine = sandbox.engine();
        let counter = engine.new_instance_of(COUNTER, &[]).unwrap();

        engine.invoke(&counter, "increment", &[]).unwrap();
        engine.invoke(&counter, "increment", &[]).unwrap();
        assert_eq!(engine.invoke(&counter, "get", &[]).unwrap(), Value::Int(2));
    }

    #[test]
    fn test_constructor_with_initial_value() {
        let sandbox = Sandbox::default();
        let engine = sandbox.engine();
        let counter = engine.new_instance_of(COUNTER, &[Value::Int(40)]).unwrap();

        engine.invoke(&counter, "increment", &[]).unwrap();
        assert_eq!(engine.invoke(&counter, "get", &[]).unwrap(), Value::Int(41));
    }

    #[test]
    fn test_instance_count_cleared_by_reset() {
        let sandbox = Sandbox::default();
        let engine = sandbox.engine();
        engine.reset();

        engine.new_instance_of(COUNTER, &[]).unwrap();
        engine.new_instance_of(COUNTER, &[]).unwrap();
        assert_eq!(engine.invoke_static(COUNTER, "instanceCount", &[]).unwrap(), Value::Int(2));

        engine.reset();
        assert_eq!(engine.invoke_static(COUNTER, "instanceCount", &[]).unwrap(), Value::Int(0));
    }
}
