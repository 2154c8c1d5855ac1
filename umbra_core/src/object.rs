//! Real-object shells.
//!
//! A shell is the in-process stand-in for an instance of a platform class:
//! enough identity for reference equality, a class pointer for type checks,
//! and a field table that shadows and application code can read directly.
//! It carries none of the real class's logic.

use crate::class::{ClassDescriptor, ClassRef};
use crate::value::Value;

use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a real object. Never reused within a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub u64);

impl ObjectId {
    fn next() -> Self {
        Self(NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:x}", self.0)
    }
}

struct ObjectShell {
    id: ObjectId,
    class: ClassRef,
    fields: Mutex<BTreeMap<String, Value>>,
}

/// Shared handle to a real-object shell. Cloning shares identity.
#[derive(Clone)]
pub struct RealObject {
    inner: Arc<ObjectShell>,
}

impl RealObject {
    /// Allocates a fresh shell. Only the instantiation path calls this.
    pub(crate) fn allocate(class: ClassRef) -> Self {
        Self {
            inner: Arc::new(ObjectShell {
                id: ObjectId::next(),
                class,
                fields: Mutex::new(BTreeMap::new()),
            }),
        }
    }

    /// Returns the object's identity.
    pub fn id(&self) -> ObjectId {
        self.inner.id
    }

    /// Returns the runtime class.
    pub fn class(&self) -> &ClassDescriptor {
        &self.inner.class
    }

    /// Returns a shared pointer to the runtime class.
    pub fn class_ref(&self) -> ClassRef {
        Arc::clone(&self.inner.class)
    }

    /// Returns the runtime class name.
    pub fn class_name(&self) -> &str {
        self.inner.class.name()
    }

    /// `instanceof` check against the class and all its ancestors.
    pub fn is_instance_of(&self, class_name: &str) -> bool {
        self.inner.class.is_assignable_to(class_name)
    }

    /// Reads a field.
    pub fn field(&self, name: &str) -> Option<Value> {
        self.inner
            .fields
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Writes a field, returning the previous value.
    pub fn set_field(&self, name: &str, value: impl Into<Value>) -> Option<Value> {
        self.inner
            .fields
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), value.into())
    }

    /// Reference equality.
    pub fn ptr_eq(&self, other: &RealObject) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Creates a non-owning reference.
    pub fn downgrade(&self) -> WeakRealObject {
        WeakRealObject {
            id: self.inner.id,
            inner: Arc::downgrade(&self.inner),
        }
    }
}

impl PartialEq for RealObject {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for RealObject {}

impl Hash for RealObject {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl std::fmt::Debug for RealObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.inner.class.simple_name(), self.inner.id)
    }
}

/// Non-owning reference to a real object.
///
/// Shadows hold one of these as their back-reference, so a binding never
/// keeps its real object alive.
#[derive(Clone)]
pub struct WeakRealObject {
    id: ObjectId,
    inner: Weak<ObjectShell>,
}

impl WeakRealObject {
    /// A reference that never upgrades.
    pub fn dangling() -> Self {
        Self {
            id: ObjectId(0),
            inner: Weak::new(),
        }
    }

    /// Identity of the referenced object, valid even after it is gone.
    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// Returns the object if it is still alive.
    pub fn upgrade(&self) -> Option<RealObject> {
        self.inner.upgrade().map(|inner| RealObject { inner })
    }

    /// Returns true while the object is alive.
    pub fn is_alive(&self) -> bool {
        self.inner.strong_count() > 0
    }
}

impl std::fmt::Debug for WeakRealObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Weak({})", self.id)
    }
}
