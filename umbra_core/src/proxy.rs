//! Dispatch Proxy.
//!
//! Every call to a method declared on a platform class goes through
//! `ShadowEngine::invoke` (or `invoke_static`):
//!
//! ```text
//!   invoke(real, "getText", [])
//!        |
//!        v
//!   declared on real class? --no--> NoSuchMethod
//!        | yes
//!        v
//!   bound shadow? --no--> resolve from registry (pass-through if none), bind
//!        |
//!        v
//!   shadow declares name + shape? --yes--> run it, return result or failure
//!        | no
//!        v
//!   zero value of the declared return type
//! ```
//!
//! The proxy keeps no state between calls. Failures raised by shadow
//! bodies come back unchanged.

use crate::class::describe_call;
use crate::engine::ShadowEngine;
use crate::error::ShadowError;
use crate::object::RealObject;
use crate::shadow::{Invocation, StaticInvocation};
use crate::value::Value;

use tracing::{debug, trace};

impl ShadowEngine {
    /// Dispatches an instance call on `real`.
    pub fn invoke(&self, real: &RealObject, method: &str, args: &[Value]) -> Result<Value, ShadowError> {
        let decl = real
            .class()
            .find_method(method, args, false)
            .ok_or_else(|| ShadowError::NoSuchMethod {
                class: real.class_name().to_string(),
                method: describe_call(method, args),
            })?;

        let shadow = self.shadow_of_lenient(real);
        match shadow.class().find_method(method, args, self.sdk_level()) {
            Some(body) => {
                trace!(object = ?real, method, shadow = shadow.class_name(), "dispatching to shadow");
                body(shadow.state_any(), &Invocation::new(self, real, method, args))
            }
            None => {
                debug!(
                    object = ?real,
                    method = %decl.signature(),
                    "no shadow method; returning default"
                );
                Ok(decl.returns.zero())
            }
        }
    }

    /// Dispatches a static call against `class_name`.
    pub fn invoke_static(&self, class_name: &str, method: &str, args: &[Value]) -> Result<Value, ShadowError> {
        let class = self.class(class_name)?;
        let decl = class
            .find_method(method, args, true)
            .ok_or_else(|| ShadowError::NoSuchMethod {
                class: class_name.to_string(),
                method: describe_call(method, args),
            })?;

        let body = self
            .statics()
            .resolve_static(&class, method, args, self.sdk_level());
        match body {
            Some(body) => {
                trace!(class = class_name, method, "dispatching static");
                body(&StaticInvocation::new(self, class_name, method, args))
            }
            None => {
                debug!(
                    class = class_name,
                    method = %decl.signature(),
                    "no static replacement; returning default"
                );
                Ok(decl.returns.zero())
            }
        }
    }
}
