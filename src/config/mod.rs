//! Configuration subsystem.
//!
//! Configuration is read once at startup, validated, and handed to
//! components as immutable values. There is no runtime reload and no global
//! singleton.

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    AdminConfig, AdmissionConfig, GuardConfig, ListenerConfig, ObservabilityConfig,
    RouteLimitConfig,
};
