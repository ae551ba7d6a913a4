//! Readiness Configuration Module
//!
//! Deployment settings loaded from TOML: pipeline timing and concurrency,
//! merge limits, analyzer seeding, storage backend, HTTP and logging.
//!
//! ## Loading Order
//!
//! 1. `READINESS_CONFIG` environment variable (path to TOML file)
//! 2. `readiness.toml` in the current working directory
//! 3. Built-in defaults
//!
//! Components take their settings as explicit structs; `main` loads a
//! `ReadinessConfig` once and hands each section to the part that needs it.

mod readiness_config;
pub mod defaults;
pub mod validation;

pub use readiness_config::*;
