//! Prometheus metrics
//!
//! The recorder is installed once at startup; `/metrics` renders it.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

use callguard_core::CallEventKind;
use callguard_screening::OutcomeStatus;

use crate::state::AppState;

/// Install the global Prometheus recorder. Returns `None` if one is
/// already installed (e.g. a second server in the same process).
pub fn init_metrics() -> Option<PrometheusHandle> {
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            describe();
            Some(handle)
        },
        Err(e) => {
            tracing::warn!(error = %e, "Prometheus recorder not installed");
            None
        },
    }
}

fn describe() {
    metrics::describe_counter!("callguard_webhooks_total", "Webhooks handled by event and outcome");
    metrics::describe_counter!(
        "callguard_action_failures_total",
        "Call-control actions the provider did not accept"
    );
    metrics::describe_counter!("callguard_alerts_total", "Owner alerts by kind and delivery result");
    metrics::describe_histogram!(
        "callguard_webhook_duration_seconds",
        "Time from webhook receipt to response"
    );
    metrics::describe_gauge!("callguard_active_sessions", "Sessions held by the registry");
}

/// Label for an event kind; unknown provider types collapse to `other`
fn event_label(kind: Option<&CallEventKind>) -> &'static str {
    match kind {
        Some(CallEventKind::Initiated) => "call.initiated",
        Some(CallEventKind::Answered) => "call.answered",
        Some(CallEventKind::GatherEnded) => "call.gather.ended",
        Some(CallEventKind::Hangup) => "call.hangup",
        Some(CallEventKind::Other(_)) => "other",
        None => "unparsed",
    }
}

pub fn record_webhook(kind: Option<&CallEventKind>, status: OutcomeStatus, elapsed: Duration) {
    metrics::counter!(
        "callguard_webhooks_total",
        "event" => event_label(kind),
        "status" => status.as_str()
    )
    .increment(1);
    metrics::histogram!("callguard_webhook_duration_seconds").record(elapsed.as_secs_f64());
}

pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    match &state.metrics {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (StatusCode::SERVICE_UNAVAILABLE, "metrics disabled\n".to_string()),
    }
}
