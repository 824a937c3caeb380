//! HTTP Endpoints
//!
//! - `POST /webhooks/call-control`: provider events, always answered 200
//! - `GET /health`, `GET /ready`, `GET /metrics`
//! - `GET /api/calls`, `GET /api/calls/:call_id`: live session snapshots

use axum::{
    body::Bytes,
    extract::{Json, Path, State},
    http::{HeaderValue, Method, StatusCode},
    routing::{get, post},
    Extension, Router,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use callguard_core::CallSession;
use callguard_screening::ScreeningOutcome;

use crate::auth::auth_middleware;
use crate::metrics::{metrics_handler, record_webhook};
use crate::state::AppState;
use crate::webhook::parse_webhook;
use crate::ServerError;

pub fn create_router(state: AppState) -> Router {
    let (cors_layer, timeout) = {
        let config = state.config.read();
        if !config.server.auth.enabled {
            tracing::warn!(
                "API authentication is disabled. Set CALLGUARD__SERVER__AUTH__ENABLED=true for production."
            );
        }
        (
            build_cors_layer(&config.server.cors_origins, config.server.cors_enabled),
            Duration::from_secs(config.server.timeout_seconds),
        )
    };

    // No request timeout on webhooks: handling must run to completion
    let bounded = Router::new()
        .route("/api/calls", get(list_calls))
        .route("/api/calls/:call_id", get(get_call))
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(metrics_handler))
        .layer(TimeoutLayer::new(timeout));

    Router::new()
        .route("/webhooks/call-control", post(call_control_webhook))
        .merge(bounded)
        .layer(axum::middleware::from_fn(auth_middleware))
        .layer(Extension(state.config.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .with_state(state)
}

/// Configured origins, or localhost only when none are usable
fn build_cors_layer(origins: &[String], enabled: bool) -> CorsLayer {
    if !enabled {
        tracing::warn!("CORS is disabled - allowing all origins (NOT FOR PRODUCTION)");
        return CorsLayer::permissive();
    }

    let parsed_origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| {
            origin.parse::<HeaderValue>().ok().or_else(|| {
                tracing::warn!("Invalid CORS origin: {}", origin);
                None
            })
        })
        .collect();

    if parsed_origins.is_empty() {
        tracing::info!("No usable CORS origins configured, defaulting to localhost:3000");
        return CorsLayer::new()
            .allow_origin(HeaderValue::from_static("http://localhost:3000"))
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers(Any);
    }

    tracing::info!("CORS configured with {} origins", parsed_origins.len());
    CorsLayer::new()
        .allow_origin(parsed_origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
}

/// Provider webhook. Malformed bodies are acknowledged too, so the
/// provider never retries a delivery we cannot use.
///
/// Handling runs on its own task so a dropped connection cannot abort it
/// between ending the session and issuing the final action.
async fn call_control_webhook(State(state): State<AppState>, body: Bytes) -> Json<ScreeningOutcome> {
    let started = Instant::now();

    match parse_webhook(&body) {
        Ok(event) => {
            let kind = event.kind.clone();
            let call_id = event.call_id.clone();
            let engine = Arc::clone(&state.engine);
            let outcome = match tokio::spawn(async move { engine.handle(&event).await }).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!(call_id = %call_id, error = %e, "Webhook task failed");
                    ScreeningOutcome::internal_error(call_id, "event handling aborted")
                },
            };
            record_webhook(Some(&kind), outcome.status, started.elapsed());
            Json(outcome)
        },
        Err(e) => {
            tracing::warn!(error = %e, bytes = body.len(), "Rejected webhook payload");
            let outcome = ScreeningOutcome::invalid_payload(e.to_string());
            record_webhook(None, outcome.status, started.elapsed());
            Json(outcome)
        },
    }
}

async fn list_calls(State(state): State<AppState>) -> Json<serde_json::Value> {
    let calls = state.sessions().snapshot().await;
    Json(serde_json::json!({
        "count": calls.len(),
        "calls": calls,
    }))
}

async fn get_call(
    State(state): State<AppState>,
    Path(call_id): Path<String>,
) -> Result<Json<CallSession>, StatusCode> {
    state
        .sessions()
        .snapshot_one(&call_id)
        .await
        .map(Json)
        .ok_or_else(|| ServerError::CallNotFound(call_id).into())
}

async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    let uptime = (chrono::Utc::now() - state.started_at).num_seconds().max(0);
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": uptime,
    }))
}

/// Ready when actions can actually reach the provider (or are simulated)
async fn readiness_check(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    let has_credentials = state.config.read().telephony.has_credentials();
    let dry_run = state.engine.is_dry_run();
    let ready = dry_run || has_credentials;

    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(serde_json::json!({
            "ready": ready,
            "dry_run": dry_run,
            "credentials": has_credentials,
            "sessions": state.sessions().len(),
            "alerts_in_flight": state.engine.alerts().in_flight(),
            "line_directory": state.engine.directory_kind(),
        })),
    )
}
