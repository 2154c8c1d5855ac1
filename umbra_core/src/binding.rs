//! Binding Table: real object identity to bound shadow.
//!
//! Keys are object identities and the stored back-reference is weak, so the
//! table never keeps a real object alive. Entries whose real object has been
//! dropped are treated as absent and pruned periodically.

use crate::error::ShadowError;
use crate::object::{ObjectId, RealObject, WeakRealObject};
use crate::shadow::ShadowRef;

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Binds between prunes of dead entries.
const PRUNE_INTERVAL: usize = 64;

struct Binding {
    real: WeakRealObject,
    shadow: ShadowRef,
}

/// One shadow per live real object.
#[derive(Default)]
pub struct BindingTable {
    entries: HashMap<ObjectId, Binding>,
    binds_since_prune: usize,
}

impl BindingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `shadow` to `real`.
    ///
    /// Re-binding the identical shadow is a no-op; binding a different one
    /// fails with `AlreadyBound`.
    pub fn bind(&mut self, real: &RealObject, shadow: ShadowRef) -> Result<(), ShadowError> {
        if let Some(existing) = self.lookup(real) {
            if Arc::ptr_eq(&existing, &shadow) {
                trace!(object = %real.id(), "shadow re-bound (no-op)");
                return Ok(());
            }
            warn!(
                object = %real.id(),
                existing = existing.class_name(),
                attempted = shadow.class_name(),
                "refusing second shadow binding"
            );
            return Err(ShadowError::AlreadyBound {
                class: real.class_name().to_string(),
                object: real.id(),
                existing: existing.class_name().to_string(),
            });
        }

        debug!(object = ?real, shadow = shadow.class_name(), "shadow bound");
        self.entries.insert(
            real.id(),
            Binding {
                real: real.downgrade(),
                shadow,
            },
        );

        self.binds_since_prune += 1;
        if self.binds_since_prune >= PRUNE_INTERVAL {
            self.prune();
        }
        Ok(())
    }

    /// The shadow bound to `real`, if any.
    pub fn lookup(&self, real: &RealObject) -> Option<ShadowRef> {
        self.entries
            .get(&real.id())
            .filter(|binding| binding.real.is_alive())
            .map(|binding| Arc::clone(&binding.shadow))
    }

    /// Removes the binding for `real`, returning the shadow.
    pub fn unbind(&mut self, real: &RealObject) -> Option<ShadowRef> {
        self.entries.remove(&real.id()).map(|binding| binding.shadow)
    }

    /// Drops entries whose real object is gone. Returns how many.
    pub fn prune(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, binding| binding.real.is_alive());
        self.binds_since_prune = 0;

        let pruned = before - self.entries.len();
        if pruned > 0 {
            trace!(pruned, "dead bindings pruned");
        }
        pruned
    }

    /// Number of entries, including not-yet-pruned dead ones.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.binds_since_prune = 0;
    }
}
