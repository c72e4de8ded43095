//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with all route classes
//! - Wire the admission middleware per route class
//! - Wire ambient middleware (tracing, timeout, request ID)
//! - Spawn the cleanup scheduler
//! - Serve with graceful shutdown

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::admission::middleware::{admin_limit, anonymous_write_limit, per_identity_limit};
use crate::admission::{AdmissionControl, CleanupScheduler};
use crate::config::GuardConfig;
use crate::http::handlers;
use crate::lifecycle::Shutdown;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub admission: Arc<AdmissionControl>,
    pub admin_api_key: Arc<str>,
}

/// HTTP server for the admission guard.
pub struct GuardServer {
    router: Router,
    config: GuardConfig,
    admission: Arc<AdmissionControl>,
}

impl GuardServer {
    /// Create a new server with the given configuration.
    pub fn new(config: GuardConfig) -> Self {
        let admission = Arc::new(AdmissionControl::new(&config.admission));
        let state = AppState {
            admission: admission.clone(),
            admin_api_key: config.admin.api_key.as_str().into(),
        };

        let router = Self::build_router(&config, state);
        Self {
            router,
            config,
            admission,
        }
    }

    /// Build the Axum router with per-route-class admission wrappers.
    fn build_router(config: &GuardConfig, state: AppState) -> Router {
        let admission = state.admission.clone();

        let anonymous_routes = Router::new()
            .route("/api/register", post(handlers::register))
            .route("/api/activate", post(handlers::activate))
            .route_layer(middleware::from_fn_with_state(
                admission.clone(),
                anonymous_write_limit,
            ));

        let per_identity_routes = Router::new()
            .route("/api/ingest", post(handlers::ingest))
            .route_layer(middleware::from_fn_with_state(
                admission.clone(),
                per_identity_limit,
            ));

        // Auth is applied first so the admission wrapper sits outside it and
        // observes the 401 it writes.
        let admin_routes = Router::new()
            .route("/admin/stats", get(handlers::admin_stats))
            .route_layer(middleware::from_fn_with_state(
                state.clone(),
                handlers::admin_auth,
            ))
            .route_layer(middleware::from_fn_with_state(admission, admin_limit));

        Router::new()
            .merge(anonymous_routes)
            .merge(per_identity_routes)
            .merge(admin_routes)
            .route("/healthz", get(handlers::healthz))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.listener.request_timeout_secs,
            )))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(TraceLayer::new_for_http())
    }

    /// The assembled router, for driving the server in-process in tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener, shutdown: &Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            admission_enabled = self.config.admission.enabled,
            "HTTP server starting"
        );

        // The cleanup scheduler only runs when there is state to reclaim.
        let cleanup_interval = self.config.admission.cleanup_interval();
        if self.config.admission.enabled && !cleanup_interval.is_zero() {
            let scheduler = CleanupScheduler::new(self.admission.clone(), cleanup_interval);
            let rx = shutdown.subscribe();
            tokio::spawn(async move {
                scheduler.run(rx).await;
            });
        } else if self.config.admission.enabled {
            tracing::warn!(
                "Cleanup disabled (cleanup_interval_secs = 0); limiter registries will grow without bound"
            );
        }

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        let mut rx = shutdown.subscribe();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = rx.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
