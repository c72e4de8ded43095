//! Integration tests driving the assembled router through tower.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::middleware;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use ingress_guard::admission::middleware::admin_limit;
use ingress_guard::admission::AdmissionControl;
use ingress_guard::config::{GuardConfig, RouteLimitConfig};
use ingress_guard::GuardServer;

const API_KEY: &str = "test-admin-key";

fn config_with(adjust: impl FnOnce(&mut GuardConfig)) -> GuardConfig {
    let mut config = GuardConfig::default();
    config.admin.api_key = API_KEY.to_string();
    adjust(&mut config);
    config
}

fn router(config: GuardConfig) -> Router {
    GuardServer::new(config).router()
}

fn post(uri: &str, headers: &[(&str, &str)]) -> Request<Body> {
    let mut builder = Request::builder().method("POST").uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder.body(Body::empty()).unwrap()
}

fn admin_get(headers: &[(&str, &str)]) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri("/admin/stats");
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder.body(Body::empty()).unwrap()
}

fn header_u64(response: &Response, name: &str) -> Option<u64> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}

async fn json_body(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn burst_admits_then_rejects_then_recovers() {
    let app = router(config_with(|c| {
        c.admission.anonymous = RouteLimitConfig {
            requests_per_period: 1,
            period_secs: 1,
            burst: 1,
        };
    }));

    let client = [("x-forwarded-for", "203.0.113.1")];

    let first = app.clone().oneshot(post("/api/register", &client)).await.unwrap();
    assert_eq!(first.status(), StatusCode::CREATED);

    let second = app.clone().oneshot(post("/api/register", &client)).await.unwrap();
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(header_u64(&second, "retry-after").unwrap() >= 1);

    let body = json_body(second).await;
    assert_eq!(body["code"], "rate_limit_exceeded");

    // One token regenerates after the one-second period.
    tokio::time::sleep(Duration::from_millis(1100)).await;
    let third = app.clone().oneshot(post("/api/register", &client)).await.unwrap();
    assert_eq!(third.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn distinct_ips_have_independent_buckets() {
    let app = router(config_with(|c| {
        c.admission.anonymous = RouteLimitConfig {
            requests_per_period: 1,
            period_secs: 3600,
            burst: 1,
        };
    }));

    let a = [("x-forwarded-for", "203.0.113.1")];
    let b = [("x-forwarded-for", "203.0.113.2")];

    assert_eq!(
        app.clone().oneshot(post("/api/activate", &a)).await.unwrap().status(),
        StatusCode::OK
    );
    assert_eq!(
        app.clone().oneshot(post("/api/activate", &a)).await.unwrap().status(),
        StatusCode::TOO_MANY_REQUESTS
    );

    // B is untouched by A's exhaustion.
    assert_eq!(
        app.clone().oneshot(post("/api/activate", &b)).await.unwrap().status(),
        StatusCode::OK
    );
}

#[tokio::test]
async fn rate_limit_headers_on_admitted_responses() {
    let app = router(config_with(|c| {
        c.admission.anonymous = RouteLimitConfig {
            requests_per_period: 30,
            period_secs: 60,
            burst: 10,
        };
    }));

    let response = app
        .clone()
        .oneshot(post("/api/register", &[("x-forwarded-for", "198.51.100.9")]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(header_u64(&response, "x-ratelimit-limit"), Some(30));
    assert_eq!(header_u64(&response, "x-ratelimit-remaining"), Some(9));

    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs();
    let reset = header_u64(&response, "x-ratelimit-reset").unwrap();
    assert!(reset >= now + 55 && reset <= now + 65);
}

#[tokio::test]
async fn kill_switch_admits_everything_without_headers() {
    let app = router(config_with(|c| {
        c.admission.enabled = false;
        c.admission.anonymous = RouteLimitConfig {
            requests_per_period: 1,
            period_secs: 3600,
            burst: 1,
        };
    }));

    let client = [("x-forwarded-for", "203.0.113.1")];
    for _ in 0..5 {
        let response = app.clone().oneshot(post("/api/register", &client)).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert!(response.headers().get("x-ratelimit-limit").is_none());
    }
}

#[tokio::test]
async fn missing_identity_bypasses_per_identity_limit() {
    let app = router(config_with(|c| {
        c.admission.per_identity = RouteLimitConfig {
            requests_per_period: 1,
            period_secs: 3600,
            burst: 1,
        };
    }));

    // No identity header: admitted unconditionally, no limit headers.
    for _ in 0..5 {
        let response = app.clone().oneshot(post("/api/ingest", &[])).await.unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert!(response.headers().get("x-ratelimit-limit").is_none());
    }
}

#[tokio::test]
async fn identity_keyed_ingest_limits_are_isolated() {
    let app = router(config_with(|c| {
        c.admission.per_identity = RouteLimitConfig {
            requests_per_period: 1,
            period_secs: 3600,
            burst: 1,
        };
    }));

    let inst_a = [("x-instance-id", "inst-a")];
    let inst_b = [("x-instance-id", "inst-b")];

    assert_eq!(
        app.clone().oneshot(post("/api/ingest", &inst_a)).await.unwrap().status(),
        StatusCode::ACCEPTED
    );
    assert_eq!(
        app.clone().oneshot(post("/api/ingest", &inst_a)).await.unwrap().status(),
        StatusCode::TOO_MANY_REQUESTS
    );
    assert_eq!(
        app.clone().oneshot(post("/api/ingest", &inst_b)).await.unwrap().status(),
        StatusCode::ACCEPTED
    );
}

#[tokio::test]
async fn repeated_auth_failures_ban_the_ip() {
    let app = router(config_with(|c| {
        c.admission.brute_force_threshold = 2;
        c.admission.brute_force_ban_secs = 60;
    }));

    let attacker = ("x-forwarded-for", "192.0.2.66");
    let bad_auth = [attacker, ("authorization", "Bearer wrong")];

    for _ in 0..2 {
        let response = app.clone().oneshot(admin_get(&bad_auth)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    // Tokens are nowhere near exhausted (default admin burst is 5), yet the
    // ban rejects even a correctly authenticated request.
    let bearer = format!("Bearer {API_KEY}");
    let good_auth = [attacker, ("authorization", bearer.as_str())];
    let banned = app.clone().oneshot(admin_get(&good_auth)).await.unwrap();
    assert_eq!(banned.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(header_u64(&banned, "retry-after").unwrap() >= 1);

    let body = json_body(banned).await;
    assert_eq!(body["code"], "temporarily_banned");

    // A different IP is unaffected.
    let other = [("x-forwarded-for", "192.0.2.67"), ("authorization", bearer.as_str())];
    let response = app.clone().oneshot(admin_get(&other)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn ban_lapses_after_duration() {
    let app = router(config_with(|c| {
        c.admission.brute_force_threshold = 1;
        c.admission.brute_force_ban_secs = 1;
    }));

    let client = ("x-forwarded-for", "192.0.2.50");
    let bearer = format!("Bearer {API_KEY}");
    let bad_auth = [client, ("authorization", "Bearer wrong")];
    let good_auth = [client, ("authorization", bearer.as_str())];

    let response = app.clone().oneshot(admin_get(&bad_auth)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let banned = app.clone().oneshot(admin_get(&good_auth)).await.unwrap();
    assert_eq!(banned.status(), StatusCode::TOO_MANY_REQUESTS);

    tokio::time::sleep(Duration::from_millis(1200)).await;

    let recovered = app.clone().oneshot(admin_get(&good_auth)).await.unwrap();
    assert_eq!(recovered.status(), StatusCode::OK);
}

#[tokio::test]
async fn failure_count_survives_interleaved_success() {
    // Two failures, one success, one more failure: the cumulative count
    // reaches the threshold of three. Successes never reset the counter.
    let app = router(config_with(|c| {
        c.admission.brute_force_threshold = 3;
        c.admission.brute_force_ban_secs = 60;
    }));

    let client = ("x-forwarded-for", "192.0.2.80");
    let bearer = format!("Bearer {API_KEY}");
    let bad_auth = [client, ("authorization", "Bearer wrong")];
    let good_auth = [client, ("authorization", bearer.as_str())];

    for _ in 0..2 {
        let response = app.clone().oneshot(admin_get(&bad_auth)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    let success = app.clone().oneshot(admin_get(&good_auth)).await.unwrap();
    assert_eq!(success.status(), StatusCode::OK);

    let third_failure = app.clone().oneshot(admin_get(&bad_auth)).await.unwrap();
    assert_eq!(third_failure.status(), StatusCode::UNAUTHORIZED);

    let banned = app.clone().oneshot(admin_get(&good_auth)).await.unwrap();
    assert_eq!(banned.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn non_auth_statuses_never_ban() {
    // A handler that always answers 400: however often it is hit, the
    // brute-force tracker stays out of it.
    let config = config_with(|c| {
        c.admission.brute_force_threshold = 2;
        c.admission.brute_force_ban_secs = 60;
    });
    let control = Arc::new(AdmissionControl::new(&config.admission));

    let app = Router::new()
        .route("/admin/broken", get(|| async { StatusCode::BAD_REQUEST }))
        .route_layer(middleware::from_fn_with_state(control, admin_limit));

    let client = [("x-forwarded-for", "192.0.2.99")];
    for _ in 0..4 {
        let mut builder = Request::builder().method("GET").uri("/admin/broken");
        for (name, value) in &client {
            builder = builder.header(*name, *value);
        }
        let response = app
            .clone()
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap();
        // Never 429: a 400 is not an authentication failure.
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn healthz_is_never_rate_limited() {
    let app = router(config_with(|c| {
        c.admission.anonymous = RouteLimitConfig {
            requests_per_period: 1,
            period_secs: 3600,
            burst: 1,
        };
    }));

    for _ in 0..10 {
        let request = Request::builder()
            .uri("/healthz")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}

#[tokio::test]
async fn concurrent_same_key_requests_never_over_admit() {
    let app = router(config_with(|c| {
        c.admission.anonymous = RouteLimitConfig {
            requests_per_period: 1,
            period_secs: 3600,
            burst: 4,
        };
    }));

    let mut handles = Vec::new();
    for _ in 0..16 {
        let app = app.clone();
        handles.push(tokio::spawn(async move {
            let response = app
                .oneshot(post("/api/register", &[("x-forwarded-for", "203.0.113.77")]))
                .await
                .unwrap();
            response.status() == StatusCode::CREATED
        }));
    }

    let mut admitted = 0;
    for handle in handles {
        if handle.await.unwrap() {
            admitted += 1;
        }
    }

    // Burst is 4 and the hourly refill cannot regenerate a token mid-test.
    assert_eq!(admitted, 4);
}
