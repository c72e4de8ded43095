//! Admission-control layer for a public telemetry HTTP service.
//!
//! Per incoming request the guard decides admit or reject from two signals:
//! a per-key token-bucket rate limit scoped per route class (anonymous
//! writes, per-identity ingestion, administration) and a brute-force ban
//! derived from repeated authentication failures on admin routes. State is
//! process-local, self-expiring, and never persisted.
//!
//! # Deployment Note
//!
//! Client identity is taken from `X-Forwarded-For` / `X-Real-IP` without an
//! allowlist of trusted proxies. Run this service behind a reverse proxy
//! that controls those headers; exposed directly, clients can choose their
//! own admission keys.

pub mod admission;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;

pub use admission::{AdmissionControl, CleanupScheduler};
pub use config::GuardConfig;
pub use http::GuardServer;
pub use lifecycle::Shutdown;
