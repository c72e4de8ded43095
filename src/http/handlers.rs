//! Stand-in downstream handlers.
//!
//! The registration/activation/ingest business logic (persistence,
//! signature verification, badge rendering) lives outside this crate. These
//! handlers give the admission middleware a realistic surface to wrap and
//! are intentionally thin.

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;

use crate::http::server::AppState;

/// `POST /api/register`: anonymous write; issues an instance identifier.
pub async fn register() -> impl IntoResponse {
    let instance_id = uuid::Uuid::new_v4();
    tracing::debug!(instance_id = %instance_id, "Registered new instance");
    (
        StatusCode::CREATED,
        Json(json!({ "instance_id": instance_id })),
    )
}

/// `POST /api/activate`: anonymous write.
pub async fn activate() -> impl IntoResponse {
    Json(json!({ "status": "activated" }))
}

/// `POST /api/ingest`: per-identity telemetry ingestion.
pub async fn ingest() -> impl IntoResponse {
    (StatusCode::ACCEPTED, Json(json!({ "status": "accepted" })))
}

/// `GET /admin/stats`: admission registry counters.
pub async fn admin_stats(State(state): State<AppState>) -> impl IntoResponse {
    let (anonymous, per_identity, admin, banned) = state.admission.entry_counts();
    Json(json!({
        "limiters": {
            "anonymous": anonymous,
            "per_identity": per_identity,
            "admin": admin,
        },
        "brute_force_entries": banned,
    }))
}

/// `GET /healthz`: liveness probe, never rate limited.
pub async fn healthz() -> &'static str {
    "ok"
}

/// Bearer-token authentication for admin routes.
///
/// Runs inside the admission wrapper so the 401 it produces is the status
/// the brute-force tracker observes.
pub async fn admin_auth(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let auth_header = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok());

    if let Some(auth_val) = auth_header {
        if auth_val == format!("Bearer {}", state.admin_api_key) {
            return Ok(next.run(request).await);
        }
    }

    Err(StatusCode::UNAUTHORIZED)
}
