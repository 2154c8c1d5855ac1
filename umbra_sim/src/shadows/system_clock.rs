//! `ShadowSystemClock`: platform time read from the main context's clock.

use crate::platform::SYSTEM_CLOCK;

use std::time::Duration;
use umbra_core::{ShadowClass, ShadowClassRef, StaticInvocation, Value, ValueType};
use umbra_env::Clock;

fn main_clock_millis(inv: &StaticInvocation<'_>) -> Value {
    Value::Int(inv.engine().main_context().now_millis() as i64)
}

pub fn shadow_system_clock() -> ShadowClassRef {
    ShadowClass::builder::<()>("ShadowSystemClock", SYSTEM_CLOCK)
        .static_method("uptimeMillis", &[], |inv| Ok(main_clock_millis(inv)))
        .static_method("elapsedRealtime", &[], |inv| Ok(main_clock_millis(inv)))
        .static_method("currentThreadTimeMillis", &[], |inv| Ok(main_clock_millis(inv)))
        .static_method("sleep", &[ValueType::Int], |inv| {
            // Sleeping moves virtual time and runs whatever falls due.
            let millis = inv.args().int(0)?.max(0) as u64;
            inv.engine().main_context().advance(Duration::from_millis(millis))?;
            Ok(Value::Void)
        })
        .build()
}
