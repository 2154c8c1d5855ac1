//! Static Dispatch Registry.
//!
//! Keyed by real class with no binding step. Each applicable shadow
//! registration installs its static replacements as one group; for a given
//! class only the winning group (highest priority, then most recent) is
//! consulted, so static calls land on the same shadow that instance
//! resolution picks.

use crate::class::ClassDescriptor;
use crate::shadow::{StaticFn, StaticMethod};
use crate::value::Value;

use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Statics contributed by one shadow registration.
struct StaticGroup {
    shadow: String,
    priority: i32,
    order: u64,
    methods: Vec<StaticMethod>,
}

/// Static replacements by real class name.
#[derive(Default)]
pub struct StaticRegistry {
    by_class: HashMap<String, Vec<StaticGroup>>,
    next_order: u64,
}

impl StaticRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs the static replacements of `shadow` for `real_class` at the
    /// given priority.
    pub fn register<'a>(
        &mut self,
        real_class: &str,
        shadow: &str,
        priority: i32,
        methods: impl IntoIterator<Item = &'a StaticMethod>,
    ) {
        let methods: Vec<StaticMethod> = methods.into_iter().cloned().collect();
        debug!(real_class, shadow, priority, statics = methods.len(), "static replacements registered");

        let order = self.next_order;
        self.next_order += 1;
        self.by_class
            .entry(real_class.to_string())
            .or_default()
            .push(StaticGroup {
                shadow: shadow.to_string(),
                priority,
                order,
                methods,
            });
    }

    /// Name of the shadow whose statics answer for `real_class`.
    pub fn winner(&self, real_class: &str) -> Option<&str> {
        self.winning_group(real_class).map(|g| g.shadow.as_str())
    }

    fn winning_group(&self, real_class: &str) -> Option<&StaticGroup> {
        self.by_class
            .get(real_class)?
            .iter()
            .max_by_key(|g| (g.priority, g.order))
    }

    /// Finds the replacement for a static call against `class` or one of
    /// its ancestors. The first ancestor with a registration decides; within
    /// its winning group exact shapes win over loose ones.
    pub fn resolve_static(
        &self,
        class: &ClassDescriptor,
        method: &str,
        args: &[Value],
        sdk_level: u32,
    ) -> Option<StaticFn> {
        let group = class
            .ancestors()
            .into_iter()
            .find_map(|ancestor| self.winning_group(ancestor.name()))?;
        let applicable = || group.methods.iter().filter(|m| m.applies(method, args, sdk_level));
        applicable()
            .find(|m| m.is_exact())
            .or_else(|| applicable().next())
            .map(|m| Arc::clone(&m.body))
    }

    /// Removes every replacement for `real_class`.
    pub fn unregister(&mut self, real_class: &str) -> usize {
        self.by_class
            .remove(real_class)
            .map_or(0, |groups| groups.iter().map(|g| g.methods.len()).sum())
    }

    /// Number of installed replacements across all groups.
    pub fn len(&self) -> usize {
        self.by_class
            .values()
            .flatten()
            .map(|g| g.methods.len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_class.is_empty()
    }

    pub fn clear(&mut self) {
        self.by_class.clear();
        self.next_order = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shadow::{Shape, StaticInvocation};
    use crate::value::ValueType;

    fn constant(name: &str, value: i64) -> StaticMethod {
        StaticMethod::new(name, &[], move |_: &StaticInvocation<'_>| Ok(Value::Int(value)))
    }

    #[test]
    fn test_resolve_static_on_own_class() {
        let clock = ClassDescriptor::class("android.os.SystemClock").build();
        let mut statics = StaticRegistry::new();
        statics.register(clock.name(), "ShadowClock", 0, &[constant("uptimeMillis", 7)]);

        assert!(statics.resolve_static(&clock, "uptimeMillis", &[], 33).is_some());
        assert!(statics.resolve_static(&clock, "elapsedRealtime", &[], 33).is_none());
        assert!(statics.resolve_static(&clock, "uptimeMillis", &[Value::Int(1)], 33).is_none());
    }

    #[test]
    fn test_resolve_static_through_superclass() {
        let base = ClassDescriptor::class("Base").build();
        let derived = ClassDescriptor::class("Derived").extends(&base).build();
        let mut statics = StaticRegistry::new();
        statics.register(base.name(), "ShadowBase", 0, &[constant("create", 1)]);

        assert!(statics.resolve_static(&derived, "create", &[], 33).is_some());
    }

    #[test]
    fn test_exact_shape_preferred_over_loose() {
        let class = ClassDescriptor::class("Util").build();
        let mut statics = StaticRegistry::new();
        let exact = StaticMethod::new("parse", &[ValueType::Str], |_| Ok(Value::Int(1)));
        let mut loose = StaticMethod::new("parse", &[], |_| Ok(Value::Int(2)));
        loose.shape = Shape::Loose(1);
        statics.register(class.name(), "ShadowUtil", 0, &[loose, exact]);

        assert_eq!(statics.len(), 2);
        let body = statics.resolve_static(&class, "parse", &[Value::from("x")], 33).unwrap();
        let engine = crate::ShadowEngine::default();
        let args = [Value::from("x")];
        assert_eq!(
            body(&StaticInvocation::new(&engine, "Util", "parse", &args)).unwrap(),
            Value::Int(1)
        );
        assert!(statics.resolve_static(&class, "parse", &[Value::Int(3)], 33).is_some());

        statics.unregister(class.name());
        assert!(statics.is_empty());
    }

    #[test]
    fn test_highest_priority_group_wins() {
        let clock = ClassDescriptor::class("Clock").build();
        let mut statics = StaticRegistry::new();
        statics.register(clock.name(), "HighClock", 10, &[constant("uptimeMillis", 111)]);
        statics.register(clock.name(), "LowClock", 0, &[constant("uptimeMillis", 222)]);
        assert_eq!(statics.winner("Clock"), Some("HighClock"));

        // Same priority: the later registration wins.
        statics.register(clock.name(), "LaterClock", 10, &[constant("elapsedRealtime", 5)]);
        assert_eq!(statics.winner("Clock"), Some("LaterClock"));
    }

    #[test]
    fn test_superseded_group_statics_not_inherited() {
        let clock = ClassDescriptor::class("Clock").build();
        let mut statics = StaticRegistry::new();
        statics.register(
            clock.name(),
            "FullClock",
            0,
            &[constant("uptimeMillis", 1), constant("elapsedRealtime", 2)],
        );
        statics.register(clock.name(), "SlimClock", 0, &[constant("uptimeMillis", 3)]);

        assert!(statics.resolve_static(&clock, "uptimeMillis", &[], 33).is_some());
        assert!(statics.resolve_static(&clock, "elapsedRealtime", &[], 33).is_none());
    }
}
