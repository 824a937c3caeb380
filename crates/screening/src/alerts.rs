//! Owner alerts
//!
//! Alerts never block or fail call handling. Each dispatch runs on its own
//! task inside a [`JoinSet`] owned by the dispatcher, so delivery failures
//! are logged and counted, and shutdown can wait for in-flight sends via
//! [`AlertDispatcher::drain`].

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinSet;
use uuid::Uuid;

use callguard_core::{AlertKind, Line, Notifier, PhoneNumber};
use callguard_telephony::format_alert;

/// One alert as handed to the notifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlertEvent {
    pub id: Uuid,
    pub call_id: String,
    pub kind: AlertKind,
    pub line_number: PhoneNumber,
    pub caller_display: String,
    pub recipients: Vec<PhoneNumber>,
    pub sender: PhoneNumber,
    pub timestamp: DateTime<Utc>,
}

pub struct AlertDispatcher {
    notifier: Arc<dyn Notifier>,
    /// Shared messaging sender; the line's own number when unset
    sender_override: Option<PhoneNumber>,
    tasks: Mutex<JoinSet<()>>,
}

impl AlertDispatcher {
    pub fn new(notifier: Arc<dyn Notifier>, sender_override: Option<PhoneNumber>) -> Self {
        Self {
            notifier,
            sender_override,
            tasks: Mutex::new(JoinSet::new()),
        }
    }

    /// Queue an alert about `call_id` to every recipient of `line` and
    /// return immediately. Must be called from within a tokio runtime.
    pub fn dispatch(
        &self,
        call_id: &str,
        kind: AlertKind,
        line: &Line,
        caller_display: &str,
    ) -> AlertEvent {
        let event = AlertEvent {
            id: Uuid::new_v4(),
            call_id: call_id.to_string(),
            kind,
            line_number: line.public_number.clone(),
            caller_display: caller_display.to_string(),
            recipients: line.alert_recipients(),
            sender: self
                .sender_override
                .clone()
                .unwrap_or_else(|| line.public_number.clone()),
            timestamp: Utc::now(),
        };

        let notifier = Arc::clone(&self.notifier);
        let job = event.clone();
        let mut tasks = self.tasks.lock();
        reap(&mut tasks);
        tasks.spawn(async move { deliver(notifier.as_ref(), &job).await });

        tracing::debug!(
            call_id = %event.call_id,
            alert_id = %event.id,
            kind = %kind,
            recipients = event.recipients.len(),
            "Alert queued"
        );
        event
    }

    /// Alerts queued but not yet finished
    pub fn in_flight(&self) -> usize {
        let mut tasks = self.tasks.lock();
        reap(&mut tasks);
        tasks.len()
    }

    /// Wait for every queued alert to finish
    pub async fn drain(&self) {
        let mut pending = std::mem::take(&mut *self.tasks.lock());
        if pending.is_empty() {
            return;
        }
        tracing::info!(pending = pending.len(), "Waiting for in-flight alerts");
        while let Some(result) = pending.join_next().await {
            if let Err(e) = result {
                tracing::error!(error = %e, "Alert task aborted");
            }
        }
    }
}

/// Collect finished tasks so the set does not grow without bound
fn reap(tasks: &mut JoinSet<()>) {
    while let Some(result) = tasks.try_join_next() {
        if let Err(e) = result {
            tracing::error!(error = %e, "Alert task aborted");
        }
    }
}

async fn deliver(notifier: &dyn Notifier, event: &AlertEvent) {
    let text = format_alert(event.kind, &event.caller_display, &event.line_number);

    for recipient in &event.recipients {
        match notifier.send(&event.sender, recipient, &text).await {
            Ok(()) => {
                metrics::counter!(
                    "callguard_alerts_total",
                    "kind" => event.kind.as_str(),
                    "result" => "sent"
                )
                .increment(1);
                tracing::info!(
                    call_id = %event.call_id,
                    alert_id = %event.id,
                    kind = %event.kind,
                    to = %recipient,
                    "Alert sent"
                );
            },
            Err(e) => {
                metrics::counter!(
                    "callguard_alerts_total",
                    "kind" => event.kind.as_str(),
                    "result" => "failed"
                )
                .increment(1);
                tracing::warn!(
                    call_id = %event.call_id,
                    alert_id = %event.id,
                    kind = %event.kind,
                    to = %recipient,
                    error = %e,
                    "Alert delivery failed"
                );
            },
        }
    }
}
