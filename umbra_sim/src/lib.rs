//! Umbra sandbox harness
//!
//! Everything a test needs around the engine: a small demonstration
//! platform (class descriptors), the default shadow set for it, a
//! per-test `Sandbox` that resets the engine on drop, and the scenario
//! runner behind the `umbra-sim` CLI.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                        Sandbox                           │
//! │  ┌────────────────────────────────────────────────────┐  │
//! │  │ ShadowEngine (registry, bindings, statics)         │  │
//! │  └────────────────────────────────────────────────────┘  │
//! │        │                              │                  │
//! │  ┌─────▼──────┐                ┌──────▼──────┐           │
//! │  │  platform  │                │   shadows   │           │
//! │  │ (classes)  │                │ (defaults)  │           │
//! │  └────────────┘                └─────────────┘           │
//! │        │                                                 │
//! │  ┌─────▼───────────────────────────────────────────┐     │
//! │  │ ExecutionContexts: "main", workers... (virtual) │     │
//! │  └─────────────────────────────────────────────────┘     │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```
//! use umbra_sim::{platform, Sandbox};
//! use umbra_core::Value;
//!
//! let sandbox = Sandbox::default();
//! let counter = sandbox.engine().new_instance_of(platform::COUNTER, &[]).unwrap();
//! sandbox.engine().invoke(&counter, "increment", &[]).unwrap();
//! assert_eq!(sandbox.engine().invoke(&counter, "get", &[]).unwrap(), Value::Int(1));
//! ```

mod error;
mod runner;
mod sandbox;
pub mod platform;
pub mod scenarios;
pub mod shadows;

pub use error::{check, check_eq, SimError};
pub use runner::{ScenarioResult, ScenarioRunner};
pub use sandbox::Sandbox;
pub use scenarios::ScenarioId;
pub use shadows::default_shadows;
