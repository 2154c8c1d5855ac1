//! Shadow Registry: which shadow class stands in for which platform class.
//!
//! Resolution walks the real class's ancestors (self, superclasses,
//! interfaces) and stops at the first class with an applicable
//! registration. Among applicable registrations on one class the highest
//! priority wins, then the most recently registered.

use crate::class::ClassDescriptor;
use crate::error::ShadowError;
use crate::shadow::{SdkRange, ShadowClassRef};

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};

type Predicate = Arc<dyn Fn(u32) -> bool + Send + Sync>;

/// Applicability and precedence of one registration.
#[derive(Clone, Default)]
pub struct RegisterOptions {
    /// Platform versions the registration applies to
    pub sdk: SdkRange,

    /// Higher wins among registrations on the same class
    pub priority: i32,

    /// Extra applicability check, given the configured SDK level
    pub predicate: Option<Predicate>,
}

impl RegisterOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sdk(mut self, sdk: SdkRange) -> Self {
        self.sdk = sdk;
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn predicate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(u32) -> bool + Send + Sync + 'static,
    {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    /// True if the registration applies at this SDK level.
    pub fn applies(&self, sdk_level: u32) -> bool {
        self.sdk.contains(sdk_level) && self.predicate.as_ref().map_or(true, |p| p(sdk_level))
    }
}

impl std::fmt::Debug for RegisterOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisterOptions")
            .field("sdk", &self.sdk)
            .field("priority", &self.priority)
            .field("predicate", &self.predicate.is_some())
            .finish()
    }
}

struct Registration {
    shadow: ShadowClassRef,
    options: RegisterOptions,
    /// Insertion order, for last-registered-wins
    order: u64,
}

/// Registered shadows by real class name.
pub struct ShadowRegistry {
    sdk_level: u32,
    by_class: HashMap<String, Vec<Registration>>,
    next_order: u64,
    /// Resolved shadow per queried class (None = nothing resolvable)
    cache: HashMap<String, Option<ShadowClassRef>>,
}

impl ShadowRegistry {
    pub fn new(sdk_level: u32) -> Self {
        Self {
            sdk_level,
            by_class: HashMap::new(),
            next_order: 0,
            cache: HashMap::new(),
        }
    }

    pub fn sdk_level(&self) -> u32 {
        self.sdk_level
    }

    /// Adds a registration for `real_class`.
    pub fn register(&mut self, real_class: &str, shadow: ShadowClassRef, options: RegisterOptions) {
        debug!(
            real_class,
            shadow = shadow.name(),
            priority = options.priority,
            "shadow registered"
        );

        let order = self.next_order;
        self.next_order += 1;
        self.by_class
            .entry(real_class.to_string())
            .or_default()
            .push(Registration {
                shadow,
                options,
                order,
            });
        self.cache.clear();
    }

    /// Removes every registration for `real_class`. Returns how many.
    pub fn unregister(&mut self, real_class: &str) -> usize {
        let removed = self.by_class.remove(real_class).map_or(0, |r| r.len());
        if removed > 0 {
            self.cache.clear();
        }
        removed
    }

    /// Best applicable registration declared directly on `class_name`.
    fn best_for(&self, class_name: &str) -> Option<&ShadowClassRef> {
        self.by_class
            .get(class_name)?
            .iter()
            .filter(|r| r.options.applies(self.sdk_level))
            .max_by_key(|r| (r.options.priority, r.order))
            .map(|r| &r.shadow)
    }

    /// Non-failing resolution: `None` if nothing in the ancestor chain is
    /// registered.
    pub fn try_resolve(&mut self, class: &ClassDescriptor) -> Option<ShadowClassRef> {
        if let Some(cached) = self.cache.get(class.name()) {
            return cached.clone();
        }

        let resolved = class
            .ancestors()
            .into_iter()
            .find_map(|ancestor| self.best_for(ancestor.name()))
            .cloned();

        trace!(
            class = class.name(),
            shadow = resolved.as_ref().map(|s| s.name()),
            "shadow resolved"
        );
        self.cache.insert(class.name().to_string(), resolved.clone());
        resolved
    }

    /// Strict resolution, failing with `ShadowNotFound`.
    pub fn resolve(&mut self, class: &ClassDescriptor) -> Result<ShadowClassRef, ShadowError> {
        self.try_resolve(class)
            .ok_or_else(|| ShadowError::not_found(class.name()))
    }

    /// Every registered shadow class, in registration order.
    pub fn shadows(&self) -> Vec<ShadowClassRef> {
        let mut all: Vec<&Registration> = self.by_class.values().flatten().collect();
        all.sort_by_key(|r| r.order);
        all.into_iter().map(|r| Arc::clone(&r.shadow)).collect()
    }

    /// Number of registrations.
    pub fn len(&self) -> usize {
        self.by_class.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_class.is_empty()
    }

    pub fn clear(&mut self) {
        self.by_class.clear();
        self.cache.clear();
        self.next_order = 0;
    }
}

impl std::fmt::Debug for ShadowRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShadowRegistry")
            .field("sdk_level", &self.sdk_level)
            .field("registrations", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::ClassRef;
    use crate::shadow::ShadowClass;
    use proptest::prelude::*;

    fn shadow(name: &str, real: &str) -> ShadowClassRef {
        ShadowClass::builder::<()>(name, real).build()
    }

    fn hierarchy() -> (ClassRef, ClassRef, ClassRef, ClassRef) {
        let object = ClassDescriptor::class("java.lang.Object").build();
        let callback = ClassDescriptor::interface("android.view.KeyEvent.Callback").build();
        let view = ClassDescriptor::class("android.view.View")
            .extends(&object)
            .implements(&callback)
            .build();
        let text_view = ClassDescriptor::class("android.widget.TextView")
            .extends(&view)
            .build();
        (object, callback, view, text_view)
    }

    #[test]
    fn test_resolve_exact_class() {
        let (_, _, view, _) = hierarchy();
        let mut registry = ShadowRegistry::new(33);
        registry.register(view.name(), shadow("ShadowView", view.name()), RegisterOptions::new());

        assert_eq!(registry.resolve(&view).unwrap().name(), "ShadowView");
    }

    #[test]
    fn test_resolve_walks_superclasses_before_interfaces() {
        let (object, callback, _, text_view) = hierarchy();
        let mut registry = ShadowRegistry::new(33);
        registry.register(callback.name(), shadow("ShadowCallback", callback.name()), RegisterOptions::new());
        registry.register(object.name(), shadow("ShadowObject", object.name()), RegisterOptions::new());

        // Object is a superclass, so it outranks the interface.
        assert_eq!(registry.resolve(&text_view).unwrap().name(), "ShadowObject");

        registry.unregister(object.name());
        assert_eq!(registry.resolve(&text_view).unwrap().name(), "ShadowCallback");
    }

    #[test]
    fn test_resolve_not_found_carries_class_name() {
        let (_, _, _, text_view) = hierarchy();
        let mut registry = ShadowRegistry::new(33);

        match registry.resolve(&text_view) {
            Err(ShadowError::ShadowNotFound { class }) => assert_eq!(class, "android.widget.TextView"),
            other => panic!("unexpected {other:?}"),
        }
        assert!(registry.try_resolve(&text_view).is_none());
    }

    #[test]
    fn test_last_registered_wins() {
        let (_, _, view, _) = hierarchy();
        let mut registry = ShadowRegistry::new(33);
        registry.register(view.name(), shadow("Default", view.name()), RegisterOptions::new());
        assert_eq!(registry.resolve(&view).unwrap().name(), "Default");

        registry.register(view.name(), shadow("Override", view.name()), RegisterOptions::new());
        assert_eq!(registry.resolve(&view).unwrap().name(), "Override");
    }

    #[test]
    fn test_priority_beats_order() {
        let (_, _, view, _) = hierarchy();
        let mut registry = ShadowRegistry::new(33);
        registry.register(view.name(), shadow("High", view.name()), RegisterOptions::new().priority(10));
        registry.register(view.name(), shadow("Low", view.name()), RegisterOptions::new());

        assert_eq!(registry.resolve(&view).unwrap().name(), "High");
    }

    #[test]
    fn test_inapplicable_registration_skipped() {
        let (object, _, view, _) = hierarchy();
        let mut registry = ShadowRegistry::new(19);
        registry.register(object.name(), shadow("ShadowObject", object.name()), RegisterOptions::new());
        registry.register(
            view.name(),
            shadow("ModernView", view.name()),
            RegisterOptions::new().sdk(SdkRange::at_least(21)),
        );
        registry.register(
            view.name(),
            shadow("OddView", view.name()),
            RegisterOptions::new().predicate(|level| level % 2 == 0),
        );

        // Neither View registration applies at 19, so the walk continues.
        assert_eq!(registry.resolve(&view).unwrap().name(), "ShadowObject");
    }

    #[test]
    fn test_cache_invalidated_on_register() {
        let (object, _, view, text_view) = hierarchy();
        let mut registry = ShadowRegistry::new(33);
        registry.register(object.name(), shadow("ShadowObject", object.name()), RegisterOptions::new());
        assert_eq!(registry.resolve(&text_view).unwrap().name(), "ShadowObject");

        registry.register(view.name(), shadow("ShadowView", view.name()), RegisterOptions::new());
        assert_eq!(registry.resolve(&text_view).unwrap().name(), "ShadowView");

        registry.clear();
        assert!(registry.is_empty());
        assert!(registry.try_resolve(&text_view).is_none());
    }

    #[test]
    fn test_shadows_in_registration_order() {
        let mut registry = ShadowRegistry::new(33);
        registry.register("B", shadow("ShadowB", "B"), RegisterOptions::new());
        registry.register("A", shadow("ShadowA", "A"), RegisterOptions::new());
        registry.register("B", shadow("ShadowB2", "B"), RegisterOptions::new());

        let names: Vec<String> = registry.shadows().iter().map(|s| s.name().to_string()).collect();
        assert_eq!(names, vec!["ShadowB", "ShadowA", "ShadowB2"]);
        assert_eq!(registry.len(), 3);
    }

    proptest! {
        /// A registration at depth `registered` of a linear chain resolves
        /// for every class at or below it, and for nothing above it.
        #[test]
        fn prop_ancestor_walk(depth in 1usize..8, registered in 0usize..8) {
            let registered = registered % depth;
            let mut chain: Vec<ClassRef> = Vec::new();
            for level in 0..depth {
                let mut builder = ClassDescriptor::class(format!("C{level}"));
                if let Some(parent) = chain.last() {
                    builder = builder.extends(parent);
                }
                chain.push(builder.build());
            }

            let mut registry = ShadowRegistry::new(33);
            let name = format!("C{registered}");
            registry.register(&name, shadow("ShadowC", &name), RegisterOptions::new());

            for (level, class) in chain.iter().enumerate() {
                let resolved = registry.try_resolve(class);
                prop_assert_eq!(resolved.is_some(), level >= registered);
            }
        }
    }
}
