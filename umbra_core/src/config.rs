//! Engine configuration.

use crate::error::ShadowError;

use serde::{Deserialize, Serialize};
use std::path::Path;
use umbra_env::{IdleState, MAIN_CONTEXT};

/// Platform version emulated when nothing else is configured.
pub const DEFAULT_SDK_LEVEL: u32 = 33;

/// Configuration of a `ShadowEngine`.
///
/// Every field has a default, so a partial JSON document is valid:
///
/// ```
/// use umbra_core::EngineConfig;
///
/// let config = EngineConfig::from_json_str(r#"{ "sdk_level": 28 }"#).unwrap();
/// assert_eq!(config.sdk_level, 28);
/// assert_eq!(config.main_context, "main");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Emulated platform version; filters registrations and methods
    pub sdk_level: u32,

    /// Idle state every execution context starts in (and returns to on reset)
    pub default_idle_state: IdleState,

    /// Name of the designated main context
    pub main_context: String,

    /// Fail construction of unregistered classes instead of falling back to
    /// a pass-through shadow
    pub strict_construction: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sdk_level: DEFAULT_SDK_LEVEL,
            default_idle_state: IdleState::Running,
            main_context: MAIN_CONTEXT.to_string(),
            strict_construction: true,
        }
    }
}

impl EngineConfig {
    /// Parses a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, ShadowError> {
        serde_json::from_str(json).map_err(|e| ShadowError::Config(e.to_string()))
    }

    /// Reads and parses a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ShadowError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ShadowError::Config(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&text)
    }

    pub fn with_sdk_level(mut self, sdk_level: u32) -> Self {
        self.sdk_level = sdk_level;
        self
    }

    pub fn with_idle_state(mut self, idle_state: IdleState) -> Self {
        self.default_idle_state = idle_state;
        self
    }

    pub fn with_strict_construction(mut self, strict: bool) -> Self {
        self.strict_construction = strict;
        self
    }
}
