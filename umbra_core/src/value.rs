//! Dynamic values crossing the platform API boundary.

use crate::error::ShadowError;
use crate::object::RealObject;

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Static type of a parameter or return value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    Void,
    Bool,
    Int,
    Float,
    Str,
    Object,
    List,
    Callback,
}

impl ValueType {
    /// The value an unshadowed method returns: zero, false or null.
    pub fn zero(self) -> Value {
        match self {
            ValueType::Void => Value::Void,
            ValueType::Bool => Value::Bool(false),
            ValueType::Int => Value::Int(0),
            ValueType::Float => Value::Float(0.0),
            ValueType::Str | ValueType::Object | ValueType::List | ValueType::Callback => {
                Value::Null
            }
        }
    }

    /// Returns true for types whose values may be null.
    pub fn is_reference(self) -> bool {
        matches!(
            self,
            ValueType::Str | ValueType::Object | ValueType::List | ValueType::Callback
        )
    }

    /// Returns true if `value` can be passed where this type is expected.
    pub fn admits(self, value: &Value) -> bool {
        match value.value_type() {
            Some(actual) => actual == self,
            None => self.is_reference(),
        }
    }
}

type CallbackFn = dyn Fn(&[Value]) -> Result<Value, ShadowError> + Send + Sync;

/// Application code handed into a platform API (a listener, a runnable).
#[derive(Clone)]
pub struct Callback(Arc<CallbackFn>);

impl Callback {
    /// Wraps a closure.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, ShadowError> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Wraps a closure taking no arguments and returning nothing.
    pub fn runnable<F>(f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self::new(move |_| {
            f();
            Ok(Value::Void)
        })
    }

    /// Invokes the callback.
    pub fn call(&self, args: &[Value]) -> Result<Value, ShadowError> {
        (self.0)(args)
    }

    /// Identity comparison.
    pub fn ptr_eq(&self, other: &Callback) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl std::fmt::Debug for Callback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Callback({:p})", Arc::as_ptr(&self.0))
    }
}

/// A value passed to or returned from a platform method.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Void,
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Object(RealObject),
    List(Vec<Value>),
    Callback(Callback),
}

impl Value {
    /// Runtime type, or `None` for `Null` (which fits any reference type).
    pub fn value_type(&self) -> Option<ValueType> {
        match self {
            Value::Void => Some(ValueType::Void),
            Value::Null => None,
            Value::Bool(_) => Some(ValueType::Bool),
            Value::Int(_) => Some(ValueType::Int),
            Value::Float(_) => Some(ValueType::Float),
            Value::Str(_) => Some(ValueType::Str),
            Value::Object(_) => Some(ValueType::Object),
            Value::List(_) => Some(ValueType::List),
            Value::Callback(_) => Some(ValueType::Callback),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&RealObject> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_callback(&self) -> Option<&Callback> {
        match self {
            Value::Callback(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Void, Value::Void) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            // Reference equality, never structural
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Callback(a), Value::Callback(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value as i64)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

impl From<RealObject> for Value {
    fn from(value: RealObject) -> Self {
        Value::Object(value)
    }
}

impl From<Callback> for Value {
    fn from(value: Callback) -> Self {
        Value::Callback(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_values() {
        assert_eq!(ValueType::Void.zero(), Value::Void);
        assert_eq!(ValueType::Int.zero(), Value::Int(0));
        assert_eq!(ValueType::Bool.zero(), Value::Bool(false));
        assert_eq!(ValueType::Float.zero(), Value::Float(0.0));
        assert_eq!(ValueType::Str.zero(), Value::Null);
        assert_eq!(ValueType::Object.zero(), Value::Null);
    }

    #[test]
    fn test_null_fits_reference_types_only() {
        assert!(ValueType::Object.admits(&Value::Null));
        assert!(ValueType::Str.admits(&Value::Null));
        assert!(!ValueType::Int.admits(&Value::Null));
        assert!(ValueType::Int.admits(&Value::Int(3)));
        assert!(!ValueType::Int.admits(&Value::Float(3.0)));
    }

    #[test]
    fn test_callbacks_compare_by_identity() {
        let a = Callback::runnable(|| {});
        let b = Callback::runnable(|| {});
        assert_eq!(Value::from(a.clone()), Value::from(a.clone()));
        assert_ne!(Value::from(a), Value::from(b));
    }

    #[test]
    fn test_option_conversion() {
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(Some("x")), Value::Str("x".into()));
    }
}
