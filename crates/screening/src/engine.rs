//! Screening engine
//!
//! One entry point, [`ScreeningEngine::handle`], consumes a decoded webhook
//! event and returns exactly one [`ScreeningOutcome`]. Per call, events are
//! serialized through the session slot's lock; across calls there is no
//! shared lock.
//!
//! ```text
//! New --initiated--> Answered --answered--> Screening --gather.ended--> Ended
//!                        |  spam / trusted / no line  -----------------> Ended
//!   any --hangup--> Ended
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use callguard_config::{PromptsConfig, ScreeningConfig};
use callguard_core::{
    AlertKind, CallAction, CallControl, CallEvent, CallEventKind, CallSession, Classification,
    EndReason, GatherSpec, GatherStatus, Line, LineDirectory, Stage,
};

use crate::alerts::AlertDispatcher;
use crate::classifier::Classifier;
use crate::outcome::{ActionFailure, IgnoreReason, OutcomeStatus, ScreeningOutcome};
use crate::registry::SessionRegistry;

/// Where a gather result sends the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatherRoute {
    Medical,
    Family,
    Reject,
}

/// Exact single-digit match; anything else, including no input, rejects
pub fn route_digits(digits: Option<&str>) -> GatherRoute {
    match digits.map(str::trim) {
        Some("1") => GatherRoute::Medical,
        Some("2") => GatherRoute::Family,
        _ => GatherRoute::Reject,
    }
}

pub struct ScreeningEngine {
    directory: Arc<dyn LineDirectory>,
    call_control: Arc<dyn CallControl>,
    alerts: Arc<AlertDispatcher>,
    registry: Arc<SessionRegistry>,
    classifier: Classifier,
    prompts: PromptsConfig,
    gather_timeout: Duration,
    valid_digits: String,
}

impl ScreeningEngine {
    pub fn new(
        directory: Arc<dyn LineDirectory>,
        call_control: Arc<dyn CallControl>,
        alerts: Arc<AlertDispatcher>,
        registry: Arc<SessionRegistry>,
        config: &ScreeningConfig,
    ) -> Self {
        Self {
            directory,
            call_control,
            alerts,
            registry,
            classifier: Classifier::from_config(config),
            prompts: config.prompts.clone(),
            gather_timeout: Duration::from_secs(config.gather_timeout_secs),
            valid_digits: config.valid_digits.clone(),
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn alerts(&self) -> &Arc<AlertDispatcher> {
        &self.alerts
    }

    pub fn directory_kind(&self) -> &'static str {
        self.directory.kind()
    }

    pub fn is_dry_run(&self) -> bool {
        self.call_control.is_dry_run()
    }

    /// Process one event. Never fails: every problem becomes part of the outcome.
    pub async fn handle(&self, event: &CallEvent) -> ScreeningOutcome {
        let started = Instant::now();
        let call_id = event.call_id.trim();
        if call_id.is_empty() {
            return ScreeningOutcome::invalid_payload("missing call_id");
        }

        let slot = match &event.kind {
            CallEventKind::Other(event_type) => {
                tracing::debug!(call_id = %call_id, event_type = %event_type, "Ignoring unsupported event");
                return ScreeningOutcome::ignored(call_id, IgnoreReason::UnsupportedEvent);
            },
            CallEventKind::Initiated | CallEventKind::Answered => self.registry.get_or_create(call_id),
            CallEventKind::GatherEnded | CallEventKind::Hangup => match self.registry.get(call_id) {
                Some(slot) => slot,
                None => {
                    tracing::debug!(call_id = %call_id, event = event.kind.as_str(), "No session for event");
                    return ScreeningOutcome::ignored(call_id, IgnoreReason::UnknownCall);
                },
            },
        };

        let mut session = slot.lock().await;
        let outcome = self.transition(&mut session, event).await;
        if session.stage.is_terminal() {
            slot.mark_ended();
        }
        if !outcome.is_ignored() {
            session.touch();
            slot.touch();
        }
        drop(session);

        tracing::info!(
            call_id = %call_id,
            event = event.kind.as_str(),
            status = outcome.status.as_str(),
            reason = outcome.reason.map(|r| r.as_str()),
            failures = outcome.failures.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Webhook handled"
        );
        outcome
    }

    async fn transition(&self, session: &mut CallSession, event: &CallEvent) -> ScreeningOutcome {
        use CallEventKind as E;
        use Stage as S;

        match (session.stage, &event.kind) {
            (_, E::Other(_)) => ScreeningOutcome::ignored(&session.call_id, IgnoreReason::UnsupportedEvent),
            (S::Ended, _) => ScreeningOutcome::ignored(&session.call_id, IgnoreReason::AfterEnd),
            (_, E::Hangup) => self.on_hangup(session),
            (S::New, E::Initiated) => self.on_initiated(session, event).await,
            (S::Answered | S::Screening, E::Initiated) => {
                ScreeningOutcome::ignored(&session.call_id, IgnoreReason::Duplicate)
            },
            (S::New | S::Answered, E::Answered) => self.on_answered(session, event).await,
            (S::Screening, E::Answered) => {
                ScreeningOutcome::ignored(&session.call_id, IgnoreReason::Duplicate)
            },
            (S::Screening, E::GatherEnded) => self.on_gather_ended(session, event).await,
            (S::New | S::Answered, E::GatherEnded) => {
                ScreeningOutcome::ignored(&session.call_id, IgnoreReason::OutOfOrder)
            },
        }
    }

    async fn on_initiated(&self, session: &mut CallSession, event: &CallEvent) -> ScreeningOutcome {
        session.absorb_parties(
            event.from.as_ref(),
            event.to.as_ref(),
            event.caller_display_name.as_deref(),
        );
        if let Err(e) = session.advance(Stage::Answered) {
            tracing::error!(call_id = %session.call_id, error = %e, "Unexpected transition");
        }

        let mut failures = Vec::new();
        self.issue(&session.call_id, CallAction::Answer, &mut failures).await;

        ScreeningOutcome::new(OutcomeStatus::Answered, &session.call_id)
            .with_stage(session.stage)
            .with_failures(failures)
    }

    async fn on_answered(&self, session: &mut CallSession, event: &CallEvent) -> ScreeningOutcome {
        session.absorb_parties(
            event.from.as_ref(),
            event.to.as_ref(),
            event.caller_display_name.as_deref(),
        );

        let line = match self.resolve_line(session).await {
            Some(line) => line,
            None => {
                session.end(EndReason::NoConfig);
                return ScreeningOutcome::new(OutcomeStatus::NoConfig, &session.call_id)
                    .with_stage(session.stage);
            },
        };

        let classification = self.classifier.classify(
            session.from_number.as_ref(),
            &session.caller_display_name,
            &line,
        );
        session.classification = classification;
        tracing::info!(
            call_id = %session.call_id,
            classification = classification.as_str(),
            line = %line.public_number,
            "Caller classified"
        );

        let mut failures = Vec::new();
        let status = match classification {
            Classification::Spam => {
                session.end(EndReason::SpamBlocked);
                self.alert(session, AlertKind::SpamBlocked, &line);
                self.issue(&session.call_id, CallAction::Hangup, &mut failures).await;
                OutcomeStatus::SpamBlocked
            },
            Classification::Trusted => {
                session.end(EndReason::TrustedForwarded);
                self.alert(session, AlertKind::TrustedCall, &line);
                let transfer = CallAction::Transfer {
                    to: line.owner_transfer_number.clone(),
                };
                self.issue(&session.call_id, transfer, &mut failures).await;
                OutcomeStatus::TrustedForwarded
            },
            Classification::Unknown | Classification::Unclassified => {
                self.alert(session, AlertKind::UnknownScreening, &line);
                let gather = CallAction::GatherWithPrompt(self.gather_spec());
                let accepted = self.issue(&session.call_id, gather, &mut failures).await;
                if accepted {
                    if let Err(e) = session.advance(Stage::Screening) {
                        tracing::error!(call_id = %session.call_id, error = %e, "Unexpected transition");
                    }
                    OutcomeStatus::ScreeningStarted
                } else {
                    // Without a prompt no gather.ended will ever arrive
                    session.end(EndReason::Rejected);
                    self.issue(&session.call_id, CallAction::Hangup, &mut failures).await;
                    OutcomeStatus::Rejected
                }
            },
        };
        session.line = Some(line);

        ScreeningOutcome::new(status, &session.call_id)
            .with_classification(classification)
            .with_stage(session.stage)
            .with_failures(failures)
    }

    async fn on_gather_ended(&self, session: &mut CallSession, event: &CallEvent) -> ScreeningOutcome {
        if event.gather_status == Some(GatherStatus::CallHangup) {
            session.end(EndReason::Hangup);
            return ScreeningOutcome::new(OutcomeStatus::CallEnded, &session.call_id)
                .with_classification(session.classification)
                .with_stage(session.stage)
                .with_detail("caller hung up during prompt");
        }

        let route = match event.gather_status {
            Some(GatherStatus::Timeout) | Some(GatherStatus::Invalid) => GatherRoute::Reject,
            _ => route_digits(event.digits.as_deref()),
        };
        tracing::info!(
            call_id = %session.call_id,
            digits = ?event.digits,
            route = ?route,
            "Screening input received"
        );

        let owner = session.line.as_ref().map(|l| l.owner_transfer_number.clone());
        let mut failures = Vec::new();
        let status = match (route, owner) {
            (GatherRoute::Medical, Some(owner)) => {
                session.end(EndReason::MedicalTransferred);
                self.speak_then(session, &self.prompts.medical_ack, CallAction::Transfer { to: owner }, &mut failures)
                    .await;
                OutcomeStatus::MedicalTransferred
            },
            (GatherRoute::Family, Some(owner)) => {
                session.end(EndReason::FamilyTransferred);
                self.speak_then(session, &self.prompts.family_ack, CallAction::Transfer { to: owner }, &mut failures)
                    .await;
                OutcomeStatus::FamilyTransferred
            },
            (GatherRoute::Reject, _) => {
                session.end(EndReason::Rejected);
                self.speak_then(session, &self.prompts.rejection, CallAction::Hangup, &mut failures)
                    .await;
                OutcomeStatus::Rejected
            },
            (GatherRoute::Medical | GatherRoute::Family, None) => {
                tracing::warn!(call_id = %session.call_id, "Screening session lost its line, hanging up");
                session.end(EndReason::Rejected);
                self.issue(&session.call_id, CallAction::Hangup, &mut failures).await;
                OutcomeStatus::Rejected
            },
        };

        ScreeningOutcome::new(status, &session.call_id)
            .with_classification(session.classification)
            .with_stage(session.stage)
            .with_failures(failures)
    }

    fn on_hangup(&self, session: &mut CallSession) -> ScreeningOutcome {
        let from = session.stage;
        session.end(EndReason::Hangup);
        tracing::debug!(call_id = %session.call_id, from = %from, "Provider reported hangup");
        ScreeningOutcome::new(OutcomeStatus::CallEnded, &session.call_id)
            .with_classification(session.classification)
            .with_stage(session.stage)
    }

    /// Line for the dialed number; lookup errors degrade to "no line"
    async fn resolve_line(&self, session: &CallSession) -> Option<Line> {
        let Some(to) = session.to_number.as_ref() else {
            tracing::warn!(call_id = %session.call_id, "Answered event without a called number");
            return None;
        };
        match self.directory.resolve(to).await {
            Ok(Some(line)) => Some(line),
            Ok(None) => {
                tracing::info!(call_id = %session.call_id, to = %to, "No line configured for number");
                None
            },
            Err(e) => {
                tracing::warn!(
                    call_id = %session.call_id,
                    to = %to,
                    directory = self.directory.kind(),
                    error = %e,
                    "Line lookup failed"
                );
                None
            },
        }
    }

    fn gather_spec(&self) -> GatherSpec {
        GatherSpec {
            prompt: self.prompts.menu.clone(),
            valid_digits: self.valid_digits.clone(),
            timeout: self.gather_timeout,
            digit_count: 1,
        }
    }

    /// Speak, then the terminal action regardless of whether speaking worked
    async fn speak_then(
        &self,
        session: &CallSession,
        text: &str,
        terminal: CallAction,
        failures: &mut Vec<ActionFailure>,
    ) {
        let speak = CallAction::Speak {
            text: text.to_string(),
        };
        self.issue(&session.call_id, speak, failures).await;
        self.issue(&session.call_id, terminal, failures).await;
    }

    /// Send one action. Failures are recorded, never retried.
    async fn issue(
        &self,
        call_id: &str,
        action: CallAction,
        failures: &mut Vec<ActionFailure>,
    ) -> bool {
        match self.call_control.execute(call_id, &action).await {
            Ok(()) => true,
            Err(e) => {
                metrics::counter!(
                    "callguard_action_failures_total",
                    "action" => action.name(),
                    "reason" => e.reason()
                )
                .increment(1);
                failures.push(ActionFailure::new(action.name(), &e));
                false
            },
        }
    }

    /// Queue an owner alert unless already sent for this call or opted out
    fn alert(&self, session: &mut CallSession, kind: AlertKind, line: &Line) {
        if !line.alerts.allows(kind) {
            tracing::debug!(call_id = %session.call_id, kind = %kind, "Alert disabled for line");
            return;
        }
        if !session.mark_alert(kind) {
            return;
        }
        let caller = session.caller_display();
        self.alerts.dispatch(&session.call_id, kind, line, &caller);
    }
}
