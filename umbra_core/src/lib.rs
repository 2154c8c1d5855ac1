//! Umbra Core - Shadow resolution and dispatch engine
//!
//! Runs code written against a closed platform API in-process, with no
//! platform present, by pairing every platform object with an independently
//! implemented shadow:
//! 1. **Resolution**: a Shadow Registry maps platform classes to shadow
//!    classes, walking the class hierarchy for the most specific match
//! 2. **Binding**: a weak, identity-keyed Binding Table gives every live real
//!    object exactly one shadow
//! 3. **Interception**: construction and method calls are routed to shadow
//!    code, with a zero-value default for anything unshadowed
//! 4. **Virtual time**: deferred work goes to per-context virtual schedulers
//!    (see `umbra_env`) that only move when a test advances them
//!
//! ```text
//!  new_instance_of(class, args)          invoke(real, method, args)
//!            |                                     |
//!            v                                     v
//!  +--------------------+   resolve    +------------------------+
//!  |    Interceptor     |------------->|    Shadow Registry     |
//!  +--------------------+              +------------------------+
//!            | bind                                ^ resolve (lazy)
//!            v                                     |
//!  +--------------------+    lookup    +------------------------+
//!  |   Binding Table    |<-------------|     Dispatch Proxy     |
//!  +--------------------+              +------------------------+
//!                                                  | post
//!                                                  v
//!                                      +------------------------+
//!                                      |  Execution Contexts    |
//!                                      +------------------------+
//! ```
//!
//! Everything lives behind one `ShadowEngine` with an explicit `reset()`.

pub mod binding;
pub mod class;
pub mod config;
pub mod engine;
pub mod error;
pub mod interceptor;
pub mod object;
pub mod proxy;
pub mod registry;
pub mod shadow;
pub mod statics;
pub mod value;

// Re-export key types for convenience
pub use binding::BindingTable;
pub use class::{ClassDescriptor, ClassPath, ClassRef, MethodDecl};
pub use config::{EngineConfig, DEFAULT_SDK_LEVEL};
pub use engine::{ShadowEngine, ShadowSet, WeakEngine};
pub use error::{PlatformException, ShadowError};
pub use object::{ObjectId, RealObject, WeakRealObject};
pub use registry::{RegisterOptions, ShadowRegistry};
pub use shadow::{
    Arguments, Invocation, SdkRange, ShadowClass, ShadowClassBuilder, ShadowClassRef,
    ShadowObject, ShadowRef, StaticInvocation, StaticMethod, CONSTRUCTOR,
};
pub use statics::StaticRegistry;
pub use value::{Callback, Value, ValueType};

pub use umbra_env::{IdleState, Scheduler, TaskHandle, TaskResult, MAIN_CONTEXT};
