//! What happened when one webhook was processed
//!
//! Returned to the provider as the webhook response body and logged. It is
//! a record, not an error channel: provider failures show up in `failures`
//! while the response itself is still a success.

use serde::Serialize;

use callguard_core::{CallControlError, Classification, Stage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Answered,
    SpamBlocked,
    TrustedForwarded,
    ScreeningStarted,
    MedicalTransferred,
    FamilyTransferred,
    Rejected,
    NoConfig,
    CallEnded,
    Ignored,
    InvalidPayload,
    InternalError,
}

impl OutcomeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Answered => "answered",
            Self::SpamBlocked => "spam_blocked",
            Self::TrustedForwarded => "trusted_forwarded",
            Self::ScreeningStarted => "screening_started",
            Self::MedicalTransferred => "medical_transferred",
            Self::FamilyTransferred => "family_transferred",
            Self::Rejected => "rejected",
            Self::NoConfig => "no_config",
            Self::CallEnded => "call_ended",
            Self::Ignored => "ignored",
            Self::InvalidPayload => "invalid_payload",
            Self::InternalError => "internal_error",
        }
    }
}

/// Why an event produced no actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IgnoreReason {
    /// Same event already handled for this stage
    Duplicate,
    /// Session already ended
    AfterEnd,
    /// Event belongs to a stage the session has not reached
    OutOfOrder,
    /// Non-initiating event for a call we have no session for
    UnknownCall,
    UnsupportedEvent,
}

impl IgnoreReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Duplicate => "duplicate",
            Self::AfterEnd => "after_end",
            Self::OutOfOrder => "out_of_order",
            Self::UnknownCall => "unknown_call",
            Self::UnsupportedEvent => "unsupported_event",
        }
    }
}

/// A call-control action the provider did not accept
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionFailure {
    pub action: &'static str,
    pub reason: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    pub message: String,
}

impl ActionFailure {
    pub fn new(action: &'static str, err: &CallControlError) -> Self {
        Self {
            action,
            reason: err.reason(),
            status_code: err.status_code(),
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScreeningOutcome {
    pub status: OutcomeStatus,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub call_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<IgnoreReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classification: Option<Classification>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<ActionFailure>,
}

impl ScreeningOutcome {
    pub fn new(status: OutcomeStatus, call_id: impl Into<String>) -> Self {
        Self {
            status,
            call_id: call_id.into(),
            reason: None,
            classification: None,
            stage: None,
            detail: None,
            failures: Vec::new(),
        }
    }

    pub fn ignored(call_id: impl Into<String>, reason: IgnoreReason) -> Self {
        let mut outcome = Self::new(OutcomeStatus::Ignored, call_id);
        outcome.reason = Some(reason);
        outcome
    }

    pub fn invalid_payload(detail: impl Into<String>) -> Self {
        let mut outcome = Self::new(OutcomeStatus::InvalidPayload, String::new());
        outcome.detail = Some(detail.into());
        outcome
    }

    /// Event processing aborted before producing an outcome
    pub fn internal_error(call_id: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(OutcomeStatus::InternalError, call_id).with_detail(detail)
    }

    pub fn with_classification(mut self, classification: Classification) -> Self {
        if classification != Classification::Unclassified {
            self.classification = Some(classification);
        }
        self
    }

    pub fn with_stage(mut self, stage: Stage) -> Self {
        self.stage = Some(stage);
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_failures(mut self, failures: Vec<ActionFailure>) -> Self {
        self.failures = failures;
        self
    }

    pub fn is_ignored(&self) -> bool {
        self.status == OutcomeStatus::Ignored
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ignored_json_shape() {
        let json = serde_json::to_value(ScreeningOutcome::ignored("c1", IgnoreReason::AfterEnd)).unwrap();
        assert_eq!(json["status"], "ignored");
        assert_eq!(json["reason"], "after_end");
        assert_eq!(json["call_id"], "c1");
        assert!(json.get("failures").is_none());
        assert!(json.get("classification").is_none());
    }

    #[test]
    fn test_failure_carries_provider_status() {
        let err = CallControlError::Provider {
            status: 422,
            body: "gone".to_string(),
        };
        let outcome = ScreeningOutcome::new(OutcomeStatus::TrustedForwarded, "c1")
            .with_classification(Classification::Trusted)
            .with_stage(Stage::Ended)
            .with_failures(vec![ActionFailure::new("transfer", &err)]);

        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["classification"], "trusted");
        assert_eq!(json["stage"], "ended");
        assert_eq!(json["failures"][0]["action"], "transfer");
        assert_eq!(json["failures"][0]["reason"], "provider_rejected");
        assert_eq!(json["failures"][0]["status_code"], 422);
    }

    #[test]
    fn test_unclassified_is_omitted() {
        let outcome = ScreeningOutcome::new(OutcomeStatus::Answered, "c1")
            .with_classification(Classification::Unclassified);
        assert!(outcome.classification.is_none());
    }
}
