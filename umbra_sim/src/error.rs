//! Error type for the sandbox harness.

use thiserror::Error;
use umbra_core::ShadowError;
use umbra_env::EnvError;

/// Failures surfaced while running scenarios.
#[derive(Debug, Error)]
pub enum SimError {
    #[error(transparent)]
    Shadow(#[from] ShadowError),

    #[error(transparent)]
    Env(#[from] EnvError),

    /// A scenario check did not hold
    #[error("Assertion failed: {0}")]
    Assertion(String),

    #[error("Unknown scenario: {0}")]
    UnknownScenario(String),
}

/// Fails with `SimError::Assertion` unless `condition` holds.
pub fn check(condition: bool, message: impl FnOnce() -> String) -> Result<(), SimError> {
    if condition {
        Ok(())
    } else {
        Err(SimError::Assertion(message()))
    }
}

/// Fails with `SimError::Assertion` unless `actual == expected`.
pub fn check_eq<T>(what: &str, actual: T, expected: T) -> Result<(), SimError>
where
    T: PartialEq + std::fmt::Debug,
{
    check(actual == expected, || {
        format!("{what}: expected {expected:?}, got {actual:?}")
    })
}
