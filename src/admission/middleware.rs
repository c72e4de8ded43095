//! Admission middleware composing limiters, bans and header emission.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → identity.rs (derive admission key)
//!     → registry.rs (get-or-create bucket for key)
//!     → bucket.rs (try_admit)
//!     → downstream handler on admit, 429 on reject
//!
//! Admin routes additionally:
//!     → bruteforce.rs (ban check before the limiter,
//!       failure recording after the handler's status is known)
//! ```
//!
//! # Design Decisions
//! - Admission never fails: every request gets a deterministic decision
//! - The kill switch (`enabled = false`) passes requests through untouched,
//!   with no headers and no state updates
//! - Rate-limit headers are attached to admitted and rejected responses
//!   alike; `Retry-After` only on rejection, never below one second

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderName, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::admission::bruteforce::BruteForceTracker;
use crate::admission::identity;
use crate::admission::registry::LimiterRegistry;
use crate::config::AdmissionConfig;
use crate::observability::metrics;

const LIMIT_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-limit");
const REMAINING_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
const RESET_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Shared admission state: one limiter registry per route class plus the
/// brute-force tracker for admin routes.
pub struct AdmissionControl {
    enabled: bool,
    anonymous: LimiterRegistry,
    per_identity: LimiterRegistry,
    admin: LimiterRegistry,
    bruteforce: BruteForceTracker,
}

/// Outcome of one rate-limit check, carrying everything the response
/// headers need.
struct Decision {
    admitted: bool,
    limit: u32,
    remaining: u64,
    reset_unix: u64,
    retry_after_secs: u64,
}

impl AdmissionControl {
    pub fn new(config: &AdmissionConfig) -> Self {
        Self {
            enabled: config.enabled,
            anonymous: LimiterRegistry::new(config.anonymous.clone()),
            per_identity: LimiterRegistry::new(config.per_identity.clone()),
            admin: LimiterRegistry::new(config.admin.clone()),
            bruteforce: BruteForceTracker::new(
                config.brute_force_threshold,
                config.brute_force_ban_duration(),
            ),
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Sweep all registries and the brute-force tracker.
    ///
    /// Returns `(limiter_entries_removed, ban_entries_removed)`.
    pub fn sweep(&self, idle_threshold: Duration) -> (usize, usize) {
        let limiters = self.anonymous.sweep(idle_threshold)
            + self.per_identity.sweep(idle_threshold)
            + self.admin.sweep(idle_threshold);
        let bans = self.bruteforce.sweep(std::time::Instant::now());
        (limiters, bans)
    }

    /// Tracked entry counts per class, for logging and tests.
    pub fn entry_counts(&self) -> (usize, usize, usize, usize) {
        (
            self.anonymous.len(),
            self.per_identity.len(),
            self.admin.len(),
            self.bruteforce.len(),
        )
    }

    #[cfg(test)]
    pub(crate) fn touch_anonymous(&self, key: &str) {
        self.anonymous.get_or_create(key);
    }

    /// Run one token-bucket check for `key` against a route class registry.
    ///
    /// Consume-and-report happens under a single bucket lock so the
    /// remaining count matches the admit decision it accompanies.
    fn check(&self, registry: &LimiterRegistry, key: &str) -> Decision {
        let entry = registry.get_or_create(key);
        let limits = registry.limits();

        let (admitted, remaining, wait) = entry.with_bucket(|bucket| {
            let admitted = bucket.try_admit();
            let remaining = bucket.tokens_remaining();
            let wait = if admitted {
                Duration::ZERO
            } else {
                bucket.time_until_next_token()
            };
            (admitted, remaining, wait)
        });

        Decision {
            admitted,
            limit: limits.requests_per_period,
            remaining,
            reset_unix: unix_now() + limits.period_secs,
            retry_after_secs: retry_after_secs(wait),
        }
    }
}

/// Middleware for anonymous write routes, keyed by client IP.
pub async fn anonymous_write_limit(
    State(control): State<Arc<AdmissionControl>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !control.enabled {
        return next.run(request).await;
    }
    let key = identity::client_ip(&request);
    limit_and_run(&control, &control.anonymous, "anonymous", key, request, next).await
}

/// Middleware for per-identity routes, keyed by the caller-supplied
/// identity header. Requests without one bypass the limiter (fail-open:
/// no identity means no way to isolate abuse).
pub async fn per_identity_limit(
    State(control): State<Arc<AdmissionControl>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !control.enabled {
        return next.run(request).await;
    }
    let Some(key) = identity::caller_identity(&request) else {
        return next.run(request).await;
    };
    limit_and_run(
        &control,
        &control.per_identity,
        "per_identity",
        key,
        request,
        next,
    )
    .await
}

/// Middleware for administrative routes: ban check, then IP-keyed rate
/// limit, then failure accounting against the downstream status code.
pub async fn admin_limit(
    State(control): State<Arc<AdmissionControl>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !control.enabled {
        return next.run(request).await;
    }

    let ip = identity::client_ip(&request);

    // An active ban short-circuits before the limiter is touched.
    if let Some(remaining) = control.bruteforce.ban_remaining(&ip) {
        tracing::warn!(client = %ip, remaining_secs = remaining.as_secs(), "Rejecting banned IP");
        metrics::record_rejected("admin", "banned");
        return ban_response(remaining);
    }

    let decision = control.check(&control.admin, &ip);
    if !decision.admitted {
        tracing::warn!(class = "admin", client = %ip, "Rate limit exceeded");
        metrics::record_rejected("admin", "rate_limit");
        return rejection_response(&decision);
    }

    metrics::record_admitted("admin");
    let mut response = next.run(request).await;

    // The ban decision needs the status the handler actually wrote, so the
    // tracker is fed only after the downstream future resolves.
    if matches!(
        response.status(),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
    ) {
        control.bruteforce.record_failure(&ip);
    }

    attach_limit_headers(&mut response, &decision);
    response
}

async fn limit_and_run(
    control: &AdmissionControl,
    registry: &LimiterRegistry,
    class: &'static str,
    key: String,
    request: Request<Body>,
    next: Next,
) -> Response {
    let decision = control.check(registry, &key);

    if !decision.admitted {
        tracing::warn!(class = class, client = %key, "Rate limit exceeded");
        metrics::record_rejected(class, "rate_limit");
        return rejection_response(&decision);
    }

    metrics::record_admitted(class);
    let mut response = next.run(request).await;
    attach_limit_headers(&mut response, &decision);
    response
}

fn attach_limit_headers(response: &mut Response, decision: &Decision) {
    let headers = response.headers_mut();
    headers.insert(LIMIT_HEADER, HeaderValue::from(decision.limit));
    headers.insert(REMAINING_HEADER, HeaderValue::from(decision.remaining));
    headers.insert(RESET_HEADER, HeaderValue::from(decision.reset_unix));
}

fn rejection_response(decision: &Decision) -> Response {
    let body = serde_json::json!({
        "code": "rate_limit_exceeded",
        "message": format!(
            "Rate limit exceeded. Retry after {} seconds.",
            decision.retry_after_secs
        ),
        "retry_after": decision.retry_after_secs,
    });

    let mut response = (StatusCode::TOO_MANY_REQUESTS, axum::Json(body)).into_response();
    attach_limit_headers(&mut response, decision);
    response.headers_mut().insert(
        header::RETRY_AFTER,
        HeaderValue::from(decision.retry_after_secs),
    );
    response
}

fn ban_response(remaining: Duration) -> Response {
    let retry_after = retry_after_secs(remaining);
    let body = serde_json::json!({
        "code": "temporarily_banned",
        "message": format!(
            "Temporarily banned after repeated authentication failures. Retry after {} seconds.",
            retry_after
        ),
        "retry_after": retry_after,
    });

    let mut response = (StatusCode::TOO_MANY_REQUESTS, axum::Json(body)).into_response();
    response
        .headers_mut()
        .insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
    response
}

/// Whole seconds for a `Retry-After` header, rounded up, never below one.
fn retry_after_secs(wait: Duration) -> u64 {
    (wait.as_secs_f64().ceil() as u64).max(1)
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
