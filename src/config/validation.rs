//! Configuration validation.
//!
//! Semantic checks on top of serde's syntactic ones. Every violation is
//! reported, not just the first, so an operator fixes a config file in one
//! round trip. A `cleanup_interval_secs` of zero with admission enabled is
//! deliberately not a violation: it disables eviction, which is a documented
//! operational risk rather than an invalid configuration.

use std::fmt;

use crate::config::schema::{GuardConfig, RouteLimitConfig};

/// A single semantic violation in a [`GuardConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    /// Human-readable description.
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate the full configuration, returning every violation found.
pub fn validate_config(config: &GuardConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.is_empty() {
        errors.push(ValidationError {
            field: "listener.bind_address".to_string(),
            message: "must not be empty".to_string(),
        });
    }
    if config.listener.request_timeout_secs == 0 {
        errors.push(ValidationError {
            field: "listener.request_timeout_secs".to_string(),
            message: "must be positive".to_string(),
        });
    }

    validate_route_limits(&config.admission.anonymous, "admission.anonymous", &mut errors);
    validate_route_limits(
        &config.admission.per_identity,
        "admission.per_identity",
        &mut errors,
    );
    validate_route_limits(&config.admission.admin, "admission.admin", &mut errors);

    if config.admission.enabled {
        if config.admission.brute_force_threshold == 0 {
            errors.push(ValidationError {
                field: "admission.brute_force_threshold".to_string(),
                message: "must be positive when admission control is enabled".to_string(),
            });
        }
        if config.admission.brute_force_ban_secs == 0 {
            errors.push(ValidationError {
                field: "admission.brute_force_ban_secs".to_string(),
                message: "must be positive when admission control is enabled".to_string(),
            });
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<std::net::SocketAddr>().is_err()
    {
        errors.push(ValidationError {
            field: "observability.metrics_address".to_string(),
            message: format!(
                "'{}' is not a valid socket address",
                config.observability.metrics_address
            ),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_route_limits(limits: &RouteLimitConfig, field: &str, errors: &mut Vec<ValidationError>) {
    if limits.requests_per_period == 0 {
        errors.push(ValidationError {
            field: format!("{field}.requests_per_period"),
            message: "must be positive".to_string(),
        });
    }
    if limits.period_secs == 0 {
        errors.push(ValidationError {
            field: format!("{field}.period_secs"),
            message: "must be positive".to_string(),
        });
    }
    if limits.burst == 0 {
        errors.push(ValidationError {
            field: format!("{field}.burst"),
            message: "must be positive".to_string(),
        });
    }
}
