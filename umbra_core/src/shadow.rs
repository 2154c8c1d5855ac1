//! Shadow classes and bound shadow instances.
//!
//! A shadow class declares the operations it implements for one platform
//! class as a capability table keyed by method name and parameter shape.
//! There is no reflection: dispatch is a table lookup against what the
//! shadow author declared.
//!
//! # Hierarchy
//!
//! A shadow for `TextView` that wants to be treated as a `View` shadow
//! declares it with `extends(&shadow_view, |s| &s.view)`. Every `View`
//! operation is inherited (own declarations take precedence), and
//! `ShadowObject::state::<ViewState>()` works on a `TextView` shadow through
//! the projection.
//!
//! ```ignore
//! let shadow_counter = ShadowClass::builder::<CounterState>("ShadowCounter", "Counter")
//!     .method("increment", &[], |s, _| { s.count.fetch_add(1, SeqCst); Ok(Value::Void) })
//!     .method("get", &[], |s, _| Ok(Value::Int(s.count.load(SeqCst))))
//!     .build();
//! ```

use crate::engine::ShadowEngine;
use crate::error::ShadowError;
use crate::object::{RealObject, WeakRealObject};
use crate::value::{Callback, Value, ValueType};

use serde::{Deserialize, Serialize};
use std::any::{type_name, Any, TypeId};
use std::marker::PhantomData;
use std::sync::Arc;

type StateBox = Box<dyn Any + Send + Sync>;
type StateFactory = Arc<dyn Fn() -> StateBox + Send + Sync>;
type Upcast = Arc<dyn for<'a> Fn(&'a dyn Any) -> Option<&'a dyn Any> + Send + Sync>;

/// Type-erased instance operation.
pub type MethodFn =
    Arc<dyn Fn(&dyn Any, &Invocation<'_>) -> Result<Value, ShadowError> + Send + Sync>;

/// Type-erased static operation.
pub type StaticFn = Arc<dyn Fn(&StaticInvocation<'_>) -> Result<Value, ShadowError> + Send + Sync>;

/// Method name used for constructor emulation.
pub const CONSTRUCTOR: &str = "<init>";

fn method_fn<F>(f: F) -> MethodFn
where
    F: Fn(&dyn Any, &Invocation<'_>) -> Result<Value, ShadowError> + Send + Sync + 'static,
{
    Arc::new(f)
}

fn upcast_fn<F>(f: F) -> Upcast
where
    F: for<'a> Fn(&'a dyn Any) -> Option<&'a dyn Any> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Inclusive platform version range an operation or registration applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SdkRange {
    pub min: u32,
    pub max: Option<u32>,
}

impl SdkRange {
    /// Every version.
    pub const ALL: SdkRange = SdkRange { min: 0, max: None };

    /// Versions `min` and later.
    pub fn at_least(min: u32) -> Self {
        Self { min, max: None }
    }

    /// Versions up to and including `max`.
    pub fn at_most(max: u32) -> Self {
        Self { min: 0, max: Some(max) }
    }

    /// Versions `min..=max`.
    pub fn between(min: u32, max: u32) -> Self {
        Self { min, max: Some(max) }
    }

    pub fn contains(&self, level: u32) -> bool {
        level >= self.min && self.max.map_or(true, |max| level <= max)
    }
}

impl Default for SdkRange {
    fn default() -> Self {
        Self::ALL
    }
}

/// Parameter shape an operation matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shape {
    /// Exact parameter types (null fits any reference type)
    Exact(Vec<ValueType>),
    /// Any arguments of this count
    Loose(usize),
}

impl Shape {
    pub fn matches(&self, args: &[Value]) -> bool {
        match self {
            Shape::Exact(params) => {
                params.len() == args.len() && params.iter().zip(args).all(|(p, a)| p.admits(a))
            }
            Shape::Loose(arity) => *arity == args.len(),
        }
    }

    fn is_exact(&self) -> bool {
        matches!(self, Shape::Exact(_))
    }
}

/// Positional arguments of a call, with typed accessors.
#[derive(Debug, Clone, Copy)]
pub struct Arguments<'a> {
    values: &'a [Value],
}

impl<'a> Arguments<'a> {
    pub fn new(values: &'a [Value]) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &'a [Value] {
        self.values
    }

    /// Returns argument `index`, failing with `IllegalArgumentException`.
    pub fn get(&self, index: usize) -> Result<&'a Value, ShadowError> {
        self.values
            .get(index)
            .ok_or_else(|| ShadowError::illegal_argument(format!("missing argument {index}")))
    }

    fn typed<T>(
        &self,
        index: usize,
        expected: &str,
        pick: impl FnOnce(&'a Value) -> Option<T>,
    ) -> Result<T, ShadowError> {
        let value = self.get(index)?;
        pick(value).ok_or_else(|| {
            ShadowError::illegal_argument(format!("argument {index} is not {expected}: {value:?}"))
        })
    }

    pub fn int(&self, index: usize) -> Result<i64, ShadowError> {
        self.typed(index, "an int", Value::as_int)
    }

    pub fn float(&self, index: usize) -> Result<f64, ShadowError> {
        self.typed(index, "a float", Value::as_float)
    }

    pub fn bool(&self, index: usize) -> Result<bool, ShadowError> {
        self.typed(index, "a boolean", Value::as_bool)
    }

    pub fn str(&self, index: usize) -> Result<&'a str, ShadowError> {
        self.typed(index, "a string", Value::as_str)
    }

    pub fn object(&self, index: usize) -> Result<&'a RealObject, ShadowError> {
        self.typed(index, "an object", Value::as_object)
    }

    pub fn callback(&self, index: usize) -> Result<&'a Callback, ShadowError> {
        self.typed(index, "a callback", Value::as_callback)
    }
}

/// Context handed to an instance operation.
pub struct Invocation<'a> {
    engine: &'a ShadowEngine,
    this: &'a RealObject,
    method: &'a str,
    args: Arguments<'a>,
}

impl<'a> Invocation<'a> {
    pub(crate) fn new(
        engine: &'a ShadowEngine,
        this: &'a RealObject,
        method: &'a str,
        args: &'a [Value],
    ) -> Self {
        Self {
            engine,
            this,
            method,
            args: Arguments::new(args),
        }
    }

    /// The engine, for scheduling and for calls on other objects.
    pub fn engine(&self) -> &'a ShadowEngine {
        self.engine
    }

    /// The real object the call was made on.
    pub fn this(&self) -> &'a RealObject {
        self.this
    }

    pub fn method(&self) -> &'a str {
        self.method
    }

    pub fn args(&self) -> Arguments<'a> {
        self.args
    }
}

/// Context handed to a static operation.
pub struct StaticInvocation<'a> {
    engine: &'a ShadowEngine,
    class: &'a str,
    method: &'a str,
    args: Arguments<'a>,
}

impl<'a> StaticInvocation<'a> {
    pub(crate) fn new(
        engine: &'a ShadowEngine,
        class: &'a str,
        method: &'a str,
        args: &'a [Value],
    ) -> Self {
        Self {
            engine,
            class,
            method,
            args: Arguments::new(args),
        }
    }

    pub fn engine(&self) -> &'a ShadowEngine {
        self.engine
    }

    /// The class the static call was made against.
    pub fn class(&self) -> &'a str {
        self.class
    }

    pub fn method(&self) -> &'a str {
        self.method
    }

    pub fn args(&self) -> Arguments<'a> {
        self.args
    }
}

#[derive(Clone)]
struct MethodEntry {
    name: String,
    shape: Shape,
    sdk: SdkRange,
    body: MethodFn,
}

/// A static operation declared by a shadow class.
#[derive(Clone)]
pub struct StaticMethod {
    pub name: String,
    pub shape: Shape,
    pub sdk: SdkRange,
    pub body: StaticFn,
}

impl StaticMethod {
    /// Creates a static operation with an exact shape for every version.
    pub fn new<F>(name: &str, params: &[ValueType], body: F) -> Self
    where
        F: Fn(&StaticInvocation<'_>) -> Result<Value, ShadowError> + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            shape: Shape::Exact(params.to_vec()),
            sdk: SdkRange::ALL,
            body: Arc::new(body),
        }
    }

    pub(crate) fn applies(&self, name: &str, args: &[Value], sdk_level: u32) -> bool {
        self.name == name && self.sdk.contains(sdk_level) && self.shape.matches(args)
    }

    pub(crate) fn is_exact(&self) -> bool {
        self.shape.is_exact()
    }
}

/// Shared pointer to a shadow class.
pub type ShadowClassRef = Arc<ShadowClass>;

/// A shadow class: the declared capability set for one platform class.
pub struct ShadowClass {
    name: String,
    real_class: String,
    state_type: &'static str,
    state_type_id: TypeId,
    factory: StateFactory,
    /// Own declarations first, then inherited ones
    methods: Vec<MethodEntry>,
    statics: Vec<StaticMethod>,
    resetter: Option<fn()>,
    /// Projections from this shadow's state to each ancestor shadow's state
    upcasts: Vec<(TypeId, Upcast)>,
    parent: Option<ShadowClassRef>,
}

impl ShadowClass {
    /// Starts a shadow class whose per-instance state is `S`.
    pub fn builder<S>(name: &str, real_class: &str) -> ShadowClassBuilder<S>
    where
        S: Default + Send + Sync + 'static,
    {
        ShadowClassBuilder {
            name: name.to_string(),
            real_class: real_class.to_string(),
            methods: Vec::new(),
            statics: Vec::new(),
            resetter: None,
            parent: None,
            _state: PhantomData,
        }
    }

    /// A shadow that declares nothing: every call takes the default path.
    pub fn passthrough(real_class: &str) -> ShadowClassRef {
        ShadowClass::builder::<()>("PassthroughShadow", real_class).build()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The platform class this shadow was declared for.
    pub fn real_class(&self) -> &str {
        &self.real_class
    }

    /// Rust type name of the instance state.
    pub fn state_type(&self) -> &'static str {
        self.state_type
    }

    pub fn parent(&self) -> Option<&ShadowClassRef> {
        self.parent.as_ref()
    }

    /// True if this shadow is, or extends, the named shadow class.
    pub fn is_kind_of(&self, shadow_name: &str) -> bool {
        let mut current = Some(self);
        while let Some(class) = current {
            if class.name == shadow_name {
                return true;
            }
            current = class.parent.as_deref();
        }
        false
    }

    /// Finds the operation a call binds to. Exact shapes win over loose
    /// ones; within each, own declarations win over inherited ones.
    pub fn find_method(&self, name: &str, args: &[Value], sdk_level: u32) -> Option<&MethodFn> {
        let candidates = || {
            self.methods
                .iter()
                .filter(move |m| m.name == name && m.sdk.contains(sdk_level) && m.shape.matches(args))
        };

        candidates()
            .find(|m| m.shape.is_exact())
            .or_else(|| candidates().next())
            .map(|m| &m.body)
    }

    /// True if the shadow implements a call of this shape.
    pub fn declares(&self, name: &str, args: &[Value], sdk_level: u32) -> bool {
        self.find_method(name, args, sdk_level).is_some()
    }

    pub fn statics(&self) -> &[StaticMethod] {
        &self.statics
    }

    /// Static-state reset hook, run between tests.
    pub fn resetter(&self) -> Option<fn()> {
        self.resetter
    }

    pub(crate) fn instantiate(self: &Arc<Self>, real: &RealObject) -> ShadowObject {
        ShadowObject {
            class: Arc::clone(self),
            state: (self.factory)(),
            real: real.downgrade(),
        }
    }

    #[cfg(test)]
    pub(crate) fn detached(self: &Arc<Self>) -> ShadowObject {
        ShadowObject {
            class: Arc::clone(self),
            state: (self.factory)(),
            real: WeakRealObject::dangling(),
        }
    }
}

impl std::fmt::Debug for ShadowClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShadowClass")
            .field("name", &self.name)
            .field("real_class", &self.real_class)
            .field("state", &self.state_type)
            .field("methods", &self.methods.len())
            .field("parent", &self.parent.as_ref().map(|p| p.name.clone()))
            .finish()
    }
}

/// Builder for `ShadowClass`.
pub struct ShadowClassBuilder<S> {
    name: String,
    real_class: String,
    methods: Vec<MethodEntry>,
    statics: Vec<StaticMethod>,
    resetter: Option<fn()>,
    parent: Option<(ShadowClassRef, Upcast)>,
    _state: PhantomData<fn() -> S>,
}

impl<S> ShadowClassBuilder<S>
where
    S: Default + Send + Sync + 'static,
{
    fn push<F>(mut self, name: &str, shape: Shape, sdk: SdkRange, body: F) -> Self
    where
        F: Fn(&S, &Invocation<'_>) -> Result<Value, ShadowError> + Send + Sync + 'static,
    {
        let erased = method_fn(move |state, inv| {
            let state = state.downcast_ref::<S>().ok_or_else(|| ShadowError::WrongShadowType {
                shadow: inv.this().class_name().to_string(),
                requested: type_name::<S>(),
            })?;
            body(state, inv)
        });

        self.methods.push(MethodEntry {
            name: name.to_string(),
            shape,
            sdk,
            body: erased,
        });
        self
    }

    /// Declares an instance operation matching these parameter types.
    pub fn method<F>(self, name: &str, params: &[ValueType], body: F) -> Self
    where
        F: Fn(&S, &Invocation<'_>) -> Result<Value, ShadowError> + Send + Sync + 'static,
    {
        self.push(name, Shape::Exact(params.to_vec()), SdkRange::ALL, body)
    }

    /// Declares an instance operation that only exists for some versions.
    pub fn method_in<F>(self, sdk: SdkRange, name: &str, params: &[ValueType], body: F) -> Self
    where
        F: Fn(&S, &Invocation<'_>) -> Result<Value, ShadowError> + Send + Sync + 'static,
    {
        self.push(name, Shape::Exact(params.to_vec()), sdk, body)
    }

    /// Declares an operation matched on argument count alone.
    pub fn loose_method<F>(self, name: &str, arity: usize, body: F) -> Self
    where
        F: Fn(&S, &Invocation<'_>) -> Result<Value, ShadowError> + Send + Sync + 'static,
    {
        self.push(name, Shape::Loose(arity), SdkRange::ALL, body)
    }

    /// Declares the constructor-emulation entry point for these arguments.
    pub fn constructor<F>(self, params: &[ValueType], body: F) -> Self
    where
        F: Fn(&S, &Invocation<'_>) -> Result<(), ShadowError> + Send + Sync + 'static,
    {
        self.push(CONSTRUCTOR, Shape::Exact(params.to_vec()), SdkRange::ALL, move |s, inv| {
            body(s, inv).map(|_| Value::Void)
        })
    }

    /// Declares a static replacement.
    pub fn static_method<F>(mut self, name: &str, params: &[ValueType], body: F) -> Self
    where
        F: Fn(&StaticInvocation<'_>) -> Result<Value, ShadowError> + Send + Sync + 'static,
    {
        self.statics.push(StaticMethod::new(name, params, body));
        self
    }

    /// Sets the hook that clears this shadow's static state between tests.
    pub fn resetter(mut self, reset: fn()) -> Self {
        self.resetter = Some(reset);
        self
    }

    /// Declares that this shadow extends `parent`'s capability set.
    ///
    /// `project` maps this shadow's state to the parent's; parent operations
    /// run against the projected state.
    pub fn extends<P>(mut self, parent: &ShadowClassRef, project: fn(&S) -> &P) -> Self
    where
        P: 'static,
    {
        debug_assert_eq!(
            TypeId::of::<P>(),
            parent.state_type_id,
            "{} projects to {} but {} keeps {}",
            self.name,
            type_name::<P>(),
            parent.name,
            parent.state_type,
        );
        let up = upcast_fn(move |any| any.downcast_ref::<S>().map(|s| project(s) as &dyn Any));
        self.parent = Some((Arc::clone(parent), up));
        self
    }

    pub fn build(self) -> ShadowClassRef {
        let mut methods = self.methods;
        let statics = self.statics;
        let mut upcasts = Vec::new();
        let mut parent_ref = None;

        if let Some((parent, up)) = self.parent {
            for inherited in &parent.methods {
                let up = Arc::clone(&up);
                let body = Arc::clone(&inherited.body);
                let name = parent.name.clone();
                methods.push(MethodEntry {
                    name: inherited.name.clone(),
                    shape: inherited.shape.clone(),
                    sdk: inherited.sdk,
                    body: method_fn(move |state, inv| {
                        let projected = up(state).ok_or_else(|| ShadowError::WrongShadowType {
                            shadow: name.clone(),
                            requested: type_name::<S>(),
                        })?;
                        body(projected, inv)
                    }),
                });
            }

            upcasts.push((parent.state_type_id, Arc::clone(&up)));
            for (type_id, parent_up) in &parent.upcasts {
                let first = Arc::clone(&up);
                let then = Arc::clone(parent_up);
                upcasts.push((*type_id, upcast_fn(move |any| first(any).and_then(|p| then(p)))));
            }
            parent_ref = Some(parent);
        }

        Arc::new(ShadowClass {
            name: self.name,
            real_class: self.real_class,
            state_type: type_name::<S>(),
            state_type_id: TypeId::of::<S>(),
            factory: Arc::new(|| Box::new(S::default()) as StateBox),
            methods,
            statics,
            resetter: self.resetter,
            upcasts,
            parent: parent_ref,
        })
    }
}

/// A shadow instance bound to one real object.
pub struct ShadowObject {
    class: ShadowClassRef,
    state: StateBox,
    /// Back-reference; lookup only, never keeps the real object alive
    real: WeakRealObject,
}

/// Shared pointer to a bound shadow.
pub type ShadowRef = Arc<ShadowObject>;

impl ShadowObject {
    pub fn class(&self) -> &ShadowClassRef {
        &self.class
    }

    pub fn class_name(&self) -> &str {
        &self.class.name
    }

    /// The real object this shadow stands in for, if still alive.
    pub fn real_object(&self) -> Option<RealObject> {
        self.real.upgrade()
    }

    pub(crate) fn state_any(&self) -> &dyn Any {
        &*self.state
    }

    /// Views the shadow's state as `T`: its own state type or the state of
    /// any shadow it extends.
    pub fn state<T: 'static>(&self) -> Option<&T> {
        let any = self.state_any();
        if let Some(state) = any.downcast_ref::<T>() {
            return Some(state);
        }

        let wanted = TypeId::of::<T>();
        self.class
            .upcasts
            .iter()
            .find(|(type_id, _)| *type_id == wanted)
            .and_then(|(_, up)| up(any))
            .and_then(|projected| projected.downcast_ref::<T>())
    }

    /// Like `state`, failing with `WrongShadowType`.
    pub fn require_state<T: 'static>(&self) -> Result<&T, ShadowError> {
        self.state::<T>().ok_or_else(|| ShadowError::WrongShadowType {
            shadow: self.class.name.clone(),
            requested: type_name::<T>(),
        })
    }

    /// True if this shadow is, or extends, the named shadow class.
    pub fn is_kind_of(&self, shadow_name: &str) -> bool {
        self.class.is_kind_of(shadow_name)
    }
}

impl std::fmt::Debug for ShadowObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShadowObject")
            .field("class", &self.class.name)
            .field("real", &self.real)
            .finish()
    }
}
