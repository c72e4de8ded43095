//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.
//! Components receive these as immutable values at construction; nothing
//! re-reads configuration after startup.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the admission guard.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GuardConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Admission-control settings (rate limits, brute-force bans, cleanup).
    pub admission: AdmissionConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin endpoint settings.
    pub admin: AdminConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Limits for one route class.
///
/// The bucket refill rate is derived: `requests_per_period / period_secs`
/// tokens per second. `burst` is both the bucket capacity and the initial
/// fill level.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RouteLimitConfig {
    /// Requests allowed per period.
    pub requests_per_period: u32,

    /// Period length in seconds.
    pub period_secs: u64,

    /// Burst capacity (maximum tokens held).
    pub burst: u32,
}

impl RouteLimitConfig {
    /// Refill rate in tokens per second.
    pub fn refill_rate(&self) -> f64 {
        f64::from(self.requests_per_period) / self.period_secs as f64
    }

    pub fn period(&self) -> Duration {
        Duration::from_secs(self.period_secs)
    }
}

impl Default for RouteLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_period: 60,
            period_secs: 60,
            burst: 10,
        }
    }
}

/// Admission-control configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdmissionConfig {
    /// Global kill switch: when false, every request is admitted untouched.
    pub enabled: bool,

    /// Cleanup tick interval in seconds. Zero disables the cleanup task;
    /// registries then grow without bound, which is an accepted operational
    /// risk, not an error.
    pub cleanup_interval_secs: u64,

    /// Limits for anonymous write routes (keyed by client IP).
    pub anonymous: RouteLimitConfig,

    /// Limits for per-identity routes (keyed by the caller-supplied
    /// identity header; requests without one bypass this class).
    pub per_identity: RouteLimitConfig,

    /// Limits for administrative routes (keyed by client IP).
    pub admin: RouteLimitConfig,

    /// Authentication failures before an IP is banned from admin routes.
    pub brute_force_threshold: u32,

    /// Ban duration in seconds.
    pub brute_force_ban_secs: u64,
}

impl AdmissionConfig {
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }

    pub fn brute_force_ban_duration(&self) -> Duration {
        Duration::from_secs(self.brute_force_ban_secs)
    }
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cleanup_interval_secs: 300,
            anonymous: RouteLimitConfig {
                requests_per_period: 30,
                period_secs: 60,
                burst: 10,
            },
            per_identity: RouteLimitConfig {
                requests_per_period: 120,
                period_secs: 60,
                burst: 30,
            },
            admin: RouteLimitConfig {
                requests_per_period: 20,
                period_secs: 60,
                burst: 5,
            },
            brute_force_threshold: 5,
            brute_force_ban_secs: 900,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// API key for authentication (Bearer token).
    pub api_key: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
        }
    }
}
