//! The process-wide shadow engine context.
//!
//! `ShadowEngine` owns every piece of mutable engine state (class path,
//! Shadow Registry, Static Dispatch Registry, Binding Table, execution
//! contexts) behind one handle with an explicit `reset()`. Clones share the
//! same state, the way clones of a simulation context share one clock.
//!
//! Locks are held only for table lookups and updates, never while shadow
//! code runs, so shadow bodies may call back into the engine freely.

use crate::binding::BindingTable;
use crate::class::{ClassPath, ClassRef};
use crate::config::EngineConfig;
use crate::error::ShadowError;
use crate::object::RealObject;
use crate::registry::{RegisterOptions, ShadowRegistry};
use crate::shadow::{ShadowClass, ShadowClassRef, ShadowRef};
use crate::statics::StaticRegistry;

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tracing::{debug, info};
use umbra_env::{ExecutionContexts, Scheduler, TaskHandle, TaskResult};

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A bundle of shadow classes registered together, typically the defaults
/// installed at suite start.
#[derive(Clone, Default)]
pub struct ShadowSet {
    entries: Vec<(ShadowClassRef, RegisterOptions)>,
}

impl ShadowSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a shadow with default options.
    pub fn with(self, shadow: ShadowClassRef) -> Self {
        self.with_options(shadow, RegisterOptions::default())
    }

    pub fn with_options(mut self, shadow: ShadowClassRef, options: RegisterOptions) -> Self {
        self.entries.push((shadow, options));
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = &(ShadowClassRef, RegisterOptions)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

struct EngineInner {
    config: EngineConfig,
    classpath: Mutex<ClassPath>,
    registry: Mutex<ShadowRegistry>,
    statics: Mutex<StaticRegistry>,
    bindings: Mutex<BindingTable>,
    defaults: Mutex<ShadowSet>,
    contexts: ExecutionContexts,
}

/// Handle to the shadow engine. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct ShadowEngine {
    inner: Arc<EngineInner>,
}

impl ShadowEngine {
    pub fn new(config: EngineConfig) -> Self {
        info!(
            sdk_level = config.sdk_level,
            main_context = %config.main_context,
            "shadow engine created"
        );

        let contexts = ExecutionContexts::new(config.main_context.clone(), config.default_idle_state);
        Self {
            inner: Arc::new(EngineInner {
                classpath: Mutex::new(ClassPath::new()),
                registry: Mutex::new(ShadowRegistry::new(config.sdk_level)),
                statics: Mutex::new(StaticRegistry::new()),
                bindings: Mutex::new(BindingTable::new()),
                defaults: Mutex::new(ShadowSet::new()),
                contexts,
                config,
            }),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn sdk_level(&self) -> u32 {
        self.inner.config.sdk_level
    }

    /// A handle that does not keep the engine alive; give this to anything
    /// stored inside the engine (scheduled tasks, shadow state).
    pub fn downgrade(&self) -> WeakEngine {
        WeakEngine {
            inner: Arc::downgrade(&self.inner),
        }
    }

    // ---------------------------------------------------------------
    // Class path
    // ---------------------------------------------------------------

    /// Loads a class (and its ancestors) into the class path.
    pub fn load_class(&self, class: &ClassRef) {
        lock(&self.inner.classpath).load(class);
    }

    /// Looks up a loaded class, failing with `UnknownClass`.
    pub fn class(&self, name: &str) -> Result<ClassRef, ShadowError> {
        lock(&self.inner.classpath).require(name)
    }

    // ---------------------------------------------------------------
    // Registration and resolution
    // ---------------------------------------------------------------

    /// Registers `shadow` for its real class, and its static replacements.
    pub fn register_shadow(&self, shadow: &ShadowClassRef, options: RegisterOptions) {
        if options.applies(self.sdk_level()) {
            lock(&self.inner.statics).register(
                shadow.real_class(),
                shadow.name(),
                options.priority,
                shadow.statics(),
            );
        }
        lock(&self.inner.registry).register(shadow.real_class(), Arc::clone(shadow), options);
    }

    /// Removes every registration (and static replacement) for a class.
    pub fn unregister_shadow(&self, real_class: &str) -> usize {
        lock(&self.inner.statics).unregister(real_class);
        lock(&self.inner.registry).unregister(real_class)
    }

    /// Installs the default shadow set. `reset()` restores exactly this set.
    pub fn bind_default_shadow_set(&self, set: ShadowSet) {
        for (shadow, options) in set.iter() {
            self.register_shadow(shadow, options.clone());
        }
        info!(shadows = set.len(), "default shadow set bound");
        lock(&self.inner.defaults).entries.extend(set.entries);
    }

    /// Strict resolution by class name.
    pub fn resolve(&self, class_name: &str) -> Result<ShadowClassRef, ShadowError> {
        let class = self.class(class_name)?;
        lock(&self.inner.registry).resolve(&class)
    }

    /// Non-failing resolution by class name.
    pub fn try_resolve(&self, class_name: &str) -> Option<ShadowClassRef> {
        let class = self.class(class_name).ok()?;
        lock(&self.inner.registry).try_resolve(&class)
    }

    pub(crate) fn try_resolve_class(&self, class: &ClassRef) -> Option<ShadowClassRef> {
        lock(&self.inner.registry).try_resolve(class)
    }

    pub(crate) fn statics(&self) -> MutexGuard<'_, StaticRegistry> {
        lock(&self.inner.statics)
    }

    // ---------------------------------------------------------------
    // Bindings
    // ---------------------------------------------------------------

    /// Binds a shadow to a real object.
    pub fn bind_shadow(&self, real: &RealObject, shadow: ShadowRef) -> Result<(), ShadowError> {
        lock(&self.inner.bindings).bind(real, shadow)
    }

    /// The shadow currently bound to `real`, without creating one.
    pub fn lookup_shadow(&self, real: &RealObject) -> Option<ShadowRef> {
        lock(&self.inner.bindings).lookup(real)
    }

    pub(crate) fn unbind_shadow(&self, real: &RealObject) -> Option<ShadowRef> {
        lock(&self.inner.bindings).unbind(real)
    }

    /// Number of live bindings (dead ones are pruned first).
    pub fn binding_count(&self) -> usize {
        let mut bindings = lock(&self.inner.bindings);
        bindings.prune();
        bindings.len()
    }

    /// Binds `candidate` unless a shadow appeared in the meantime, in which
    /// case that one is returned.
    fn bind_or_existing(&self, real: &RealObject, candidate: ShadowRef) -> Result<ShadowRef, ShadowError> {
        let mut bindings = lock(&self.inner.bindings);
        if let Some(existing) = bindings.lookup(real) {
            return Ok(existing);
        }
        bindings.bind(real, Arc::clone(&candidate))?;
        Ok(candidate)
    }

    /// The shadow for `real`, creating and binding one from the registry if
    /// needed. Fails with `ShadowNotFound` if nothing is registered.
    pub fn shadow_of(&self, real: &RealObject) -> Result<ShadowRef, ShadowError> {
        if let Some(shadow) = self.lookup_shadow(real) {
            return Ok(shadow);
        }

        let class = real.class_ref();
        let shadow_class = self
            .try_resolve_class(&class)
            .ok_or_else(|| ShadowError::not_found(class.name()))?;

        debug!(object = ?real, shadow = shadow_class.name(), "shadow created lazily");
        self.bind_or_existing(real, Arc::new(shadow_class.instantiate(real)))
    }

    /// Like `shadow_of`, but never fails: an unregistered class gets a
    /// pass-through shadow.
    pub fn shadow_of_lenient(&self, real: &RealObject) -> ShadowRef {
        if let Some(shadow) = self.lookup_shadow(real) {
            return shadow;
        }

        let class = real.class_ref();
        let shadow_class = self
            .try_resolve_class(&class)
            .unwrap_or_else(|| ShadowClass::passthrough(class.name()));

        debug!(object = ?real, shadow = shadow_class.name(), "shadow created lazily");
        let candidate = Arc::new(shadow_class.instantiate(real));
        match self.bind_or_existing(real, Arc::clone(&candidate)) {
            Ok(shadow) => shadow,
            Err(_) => candidate,
        }
    }

    /// Runs `f` against the state of `real`'s shadow viewed as `S`.
    pub fn with_shadow<S, R>(&self, real: &RealObject, f: impl FnOnce(&S) -> R) -> Result<R, ShadowError>
    where
        S: 'static,
    {
        let shadow = self.shadow_of(real)?;
        let state = shadow.require_state::<S>()?;
        Ok(f(state))
    }

    // ---------------------------------------------------------------
    // Execution contexts
    // ---------------------------------------------------------------

    pub fn contexts(&self) -> &ExecutionContexts {
        &self.inner.contexts
    }

    /// The designated main context.
    pub fn main_context(&self) -> Arc<Scheduler> {
        self.inner.contexts.main()
    }

    /// A named context, failing with `UnknownContext`.
    pub fn context(&self, name: &str) -> Result<Arc<Scheduler>, ShadowError> {
        Ok(self.inner.contexts.get(name)?)
    }

    /// A named context, created on first use.
    pub fn context_or_create(&self, name: &str) -> Arc<Scheduler> {
        self.inner.contexts.get_or_create(name)
    }

    /// Posts a task to a named context, `delay` after that context's clock.
    pub fn post<F>(&self, context: &str, delay: Duration, task: F) -> Result<TaskHandle, ShadowError>
    where
        F: FnOnce() -> TaskResult + Send + 'static,
    {
        Ok(self.context(context)?.post(delay, task)?)
    }

    /// Advances a named context's clock, draining what falls due.
    pub fn advance(&self, context: &str, duration: Duration) -> Result<usize, ShadowError> {
        Ok(self.context(context)?.advance(duration)?)
    }

    /// Advances every context by the same duration.
    pub fn advance_all(&self, duration: Duration) -> Result<usize, ShadowError> {
        Ok(self.inner.contexts.advance_all(duration)?)
    }

    pub fn pause(&self, context: &str) -> Result<(), ShadowError> {
        self.context(context)?.pause();
        Ok(())
    }

    pub fn resume(&self, context: &str) -> Result<(), ShadowError> {
        self.context(context)?.resume();
        Ok(())
    }

    /// Cancels a task in whichever context it was posted to.
    pub fn cancel(&self, handle: &TaskHandle) -> Result<(), ShadowError> {
        self.context(handle.context())?.cancel(handle);
        Ok(())
    }

    // ---------------------------------------------------------------
    // Lifecycle
    // ---------------------------------------------------------------

    /// Restores the engine to its post-setup state: registrations back to
    /// the default shadow set, bindings dropped, shadow resetters run, every
    /// context cleared with its clock at zero. Loaded classes stay loaded.
    pub fn reset(&self) {
        // Defaults a test unregistered or overrode still own static state.
        let mut shadows: Vec<ShadowClassRef> = lock(&self.inner.defaults)
            .iter()
            .map(|(shadow, _)| Arc::clone(shadow))
            .collect();
        shadows.extend(lock(&self.inner.registry).shadows());
        let mut seen = HashSet::new();
        let resetters: Vec<fn()> = shadows
            .iter()
            .filter(|s| seen.insert(s.name().to_string()))
            .filter_map(|s| s.resetter())
            .collect();
        for reset in &resetters {
            reset();
        }

        // Shadow state may own real objects and callbacks; drop them with
        // no engine lock held.
        let bindings = std::mem::take(&mut *lock(&self.inner.bindings));
        drop(bindings);

        self.inner.contexts.reset_all();

        lock(&self.inner.registry).clear();
        lock(&self.inner.statics).clear();
        let defaults = lock(&self.inner.defaults).clone();
        for (shadow, options) in defaults.iter() {
            self.register_shadow(shadow, options.clone());
        }

        info!(
            resetters = resetters.len(),
            defaults = defaults.len(),
            "shadow engine reset"
        );
    }
}

impl Default for ShadowEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl std::fmt::Debug for ShadowEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShadowEngine")
            .field("config", &self.inner.config)
            .field("registry", &*lock(&self.inner.registry))
            .field("contexts", &self.inner.contexts.names())
            .finish()
    }
}

/// Non-owning engine handle.
#[derive(Clone)]
pub struct WeakEngine {
    inner: Weak<EngineInner>,
}

impl WeakEngine {
    /// The engine, if it is still alive.
    pub fn upgrade(&self) -> Option<ShadowEngine> {
        self.inner.upgrade().map(|inner| ShadowEngine { inner })
    }
}

impl std::fmt::Debug for WeakEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeakEngine")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}
