//! Observability subsystem.
//!
//! Structured logs go through `tracing` with the request ID attached by the
//! HTTP layer; counters are exposed through a Prometheus scrape endpoint.

pub mod metrics;
