//! Admission-control subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → identity.rs (derive admission key from headers / peer address)
//!     → registry.rs (concurrent key → bucket map, one per route class)
//!     → bucket.rs (token-bucket admit check)
//!     → middleware.rs (decision, headers, brute-force accounting)
//!
//! Background:
//!     → cleanup.rs (periodic sweep of idle limiters and lapsed bans)
//! ```
//!
//! # Design Decisions
//! - Per-key granularity everywhere: no global lock serializes unrelated keys
//! - Fail open on missing identity; malformed input becomes an opaque key
//! - State is process-local and never persisted; a restart forgets all
//!   limiter and ban state by design

pub mod bruteforce;
pub mod bucket;
pub mod cleanup;
pub mod identity;
pub mod middleware;
pub mod registry;

pub use bruteforce::BruteForceTracker;
pub use bucket::TokenBucket;
pub use cleanup::CleanupScheduler;
pub use middleware::AdmissionControl;
pub use registry::LimiterRegistry;
