//! Instantiation Interceptor.
//!
//! The only place real-object shells are produced. Construction resolves
//! the shadow class, allocates the shell, binds a fresh shadow and hands the
//! constructor arguments to the shadow's constructor emulation. Each call is
//! self-contained, so a constructor emulation may itself construct other
//! platform objects.

use crate::class::ClassRef;
use crate::engine::ShadowEngine;
use crate::error::ShadowError;
use crate::object::RealObject;
use crate::shadow::{Invocation, ShadowClass, ShadowClassRef, CONSTRUCTOR};
use crate::value::Value;

use std::sync::Arc;
use tracing::debug;

impl ShadowEngine {
    /// Creates an instance of a platform class.
    ///
    /// # Arguments
    ///
    /// * `class_name` - Fully qualified name of a loaded class
    /// * `args` - Constructor arguments, passed to the shadow's constructor
    ///   emulation if it declares one of this shape
    ///
    /// # Returns
    ///
    /// The new real object, already bound to its shadow.
    pub fn new_instance_of(&self, class_name: &str, args: &[Value]) -> Result<RealObject, ShadowError> {
        let class = self.class(class_name)?;
        if class.is_interface() {
            return Err(ShadowError::illegal_argument(format!(
                "cannot instantiate interface {class_name}"
            )));
        }

        let shadow_class = self.construction_shadow(&class)?;
        let real = RealObject::allocate(Arc::clone(&class));
        let shadow = Arc::new(shadow_class.instantiate(&real));
        self.bind_shadow(&real, Arc::clone(&shadow))?;

        debug!(object = ?real, shadow = shadow_class.name(), "instance constructed");

        match shadow_class.find_method(CONSTRUCTOR, args, self.sdk_level()) {
            Some(constructor) => {
                let invocation = Invocation::new(self, &real, CONSTRUCTOR, args);
                if let Err(e) = constructor(shadow.state_any(), &invocation) {
                    self.unbind_shadow(&real);
                    return Err(e);
                }
            }
            None if !args.is_empty() => {
                debug!(
                    class = class_name,
                    args = args.len(),
                    "no constructor emulation for arguments; fields left at defaults"
                );
            }
            None => {}
        }

        Ok(real)
    }

    /// Allocates a shell with no shadow bound, standing in for an object
    /// created outside the engine. Its shadow is created on first dispatch.
    pub fn allocate_unbound(&self, class_name: &str) -> Result<RealObject, ShadowError> {
        let class = self.class(class_name)?;
        Ok(RealObject::allocate(class))
    }

    fn construction_shadow(&self, class: &ClassRef) -> Result<ShadowClassRef, ShadowError> {
        if let Some(shadow) = self.try_resolve_class(class) {
            return Ok(shadow);
        }

        if class.is_data_holder() || !self.config().strict_construction {
            debug!(class = class.name(), "no shadow registered; using pass-through");
            return Ok(ShadowClass::passthrough(class.name()));
        }

        Err(ShadowError::not_found(class.name()))
    }
}
