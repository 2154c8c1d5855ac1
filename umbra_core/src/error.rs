//! Error types for the shadow engine.

use crate::object::ObjectId;
use thiserror::Error;
use umbra_env::EnvError;

/// A domain failure raised by a shadow body, the analogue of a platform
/// exception (`java.lang.IllegalStateException: ...`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformException {
    /// Fully qualified exception class
    pub class: String,

    /// Detail message
    pub message: String,
}

impl PlatformException {
    /// Creates an exception of the given class.
    pub fn new(class: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            message: message.into(),
        }
    }

    /// `java.lang.IllegalStateException`
    pub fn illegal_state(message: impl Into<String>) -> Self {
        Self::new("java.lang.IllegalStateException", message)
    }

    /// `java.lang.IllegalArgumentException`
    pub fn illegal_argument(message: impl Into<String>) -> Self {
        Self::new("java.lang.IllegalArgumentException", message)
    }
}

impl std::fmt::Display for PlatformException {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.class, self.message)
    }
}

/// Errors surfaced by registration, binding, construction and dispatch.
#[derive(Debug, Error)]
pub enum ShadowError {
    /// No registration resolvable anywhere in the class's ancestor chain
    #[error("No shadow registered for {class}")]
    ShadowNotFound { class: String },

    /// A second, different shadow was bound to a real object
    #[error("{class}@{object} is already bound to {existing}")]
    AlreadyBound {
        class: String,
        object: ObjectId,
        existing: String,
    },

    /// The class was never loaded into the class path
    #[error("Unknown platform class: {0}")]
    UnknownClass(String),

    /// The class declares no method with this name and argument shape
    #[error("{class} declares no method {method}")]
    NoSuchMethod { class: String, method: String },

    /// A bound shadow does not provide the requested state type
    #[error("Shadow {shadow} cannot be viewed as {requested}")]
    WrongShadowType {
        shadow: String,
        requested: &'static str,
    },

    /// Raised by a shadow body; passed through dispatch untouched
    #[error("{0}")]
    Thrown(PlatformException),

    /// Configuration could not be read or parsed
    #[error("Configuration error: {0}")]
    Config(String),

    /// Scheduler failure
    #[error(transparent)]
    Env(#[from] EnvError),
}

impl ShadowError {
    /// Creates a not-found error.
    pub fn not_found(class: impl Into<String>) -> Self {
        Self::ShadowNotFound {
            class: class.into(),
        }
    }

    /// Wraps a platform exception.
    pub fn thrown(exception: PlatformException) -> Self {
        Self::Thrown(exception)
    }

    /// Shorthand for an `IllegalArgumentException`.
    pub fn illegal_argument(message: impl Into<String>) -> Self {
        Self::Thrown(PlatformException::illegal_argument(message))
    }

    /// Shorthand for an `IllegalStateException`.
    pub fn illegal_state(message: impl Into<String>) -> Self {
        Self::Thrown(PlatformException::illegal_state(message))
    }

    /// Returns the platform exception, if this error carries one.
    pub fn exception(&self) -> Option<&PlatformException> {
        match self {
            Self::Thrown(exception) => Some(exception),
            _ => None,
        }
    }
}
