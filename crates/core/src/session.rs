//! Per-call session state
//!
//! One [`CallSession`] exists per in-progress call. Stages only move
//! forward; `Ended` absorbs every termination path.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::{Error, Line, PhoneNumber, Result};

/// Screening stage of a call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Seen, nothing issued yet
    New,
    /// Answer issued, waiting for the provider to confirm
    Answered,
    /// DTMF prompt issued, waiting for digits
    Screening,
    /// Terminal
    Ended,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Answered => "answered",
            Self::Screening => "screening",
            Self::Ended => "ended",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ended)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifier verdict for a caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Trusted,
    Spam,
    Unknown,
    /// Not classified yet (or never will be, e.g. no line configured)
    Unclassified,
}

impl Classification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trusted => "trusted",
            Self::Spam => "spam",
            Self::Unknown => "unknown",
            Self::Unclassified => "unclassified",
        }
    }
}

impl Default for Classification {
    fn default() -> Self {
        Self::Unclassified
    }
}

/// Why a session reached `Ended`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    NoConfig,
    SpamBlocked,
    TrustedForwarded,
    MedicalTransferred,
    FamilyTransferred,
    Rejected,
    /// Provider reported the call is gone
    Hangup,
}

impl EndReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoConfig => "no_config",
            Self::SpamBlocked => "spam_blocked",
            Self::TrustedForwarded => "trusted_forwarded",
            Self::MedicalTransferred => "medical_transferred",
            Self::FamilyTransferred => "family_transferred",
            Self::Rejected => "rejected",
            Self::Hangup => "hangup",
        }
    }
}

/// Alert kinds sent to the line owner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    SpamBlocked,
    UnknownScreening,
    TrustedCall,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SpamBlocked => "spam_blocked",
            Self::UnknownScreening => "unknown_screening",
            Self::TrustedCall => "trusted_call",
        }
    }
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of one in-progress call
#[derive(Debug, Clone, Serialize)]
pub struct CallSession {
    pub call_id: String,
    pub from_number: Option<PhoneNumber>,
    pub to_number: Option<PhoneNumber>,
    pub caller_display_name: String,
    pub stage: Stage,
    pub classification: Classification,
    /// Alert kinds already dispatched for this call
    pub alerts_sent: BTreeSet<AlertKind>,
    pub end_reason: Option<EndReason>,
    /// Line resolved when the call was classified
    #[serde(skip)]
    pub line: Option<Line>,
    pub created_at: DateTime<Utc>,
    pub last_event_at: DateTime<Utc>,
}

impl CallSession {
    pub fn new(call_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            call_id: call_id.into(),
            from_number: None,
            to_number: None,
            caller_display_name: String::new(),
            stage: Stage::New,
            classification: Classification::Unclassified,
            alerts_sent: BTreeSet::new(),
            end_reason: None,
            line: None,
            created_at: now,
            last_event_at: now,
        }
    }

    /// Fill caller details that are still unknown. Later events never
    /// overwrite what an earlier event already established.
    pub fn absorb_parties(
        &mut self,
        from: Option<&PhoneNumber>,
        to: Option<&PhoneNumber>,
        display_name: Option<&str>,
    ) {
        if self.from_number.is_none() {
            self.from_number = from.cloned();
        }
        if self.to_number.is_none() {
            self.to_number = to.cloned();
        }
        if self.caller_display_name.is_empty() {
            if let Some(name) = display_name {
                self.caller_display_name = name.trim().to_string();
            }
        }
    }

    /// Move forward to `next`. Moving backwards, or leaving `Ended`, is rejected.
    pub fn advance(&mut self, next: Stage) -> Result<()> {
        if self.stage.is_terminal() || next <= self.stage {
            return Err(Error::InvalidTransition {
                from: self.stage.to_string(),
                to: next.to_string(),
            });
        }
        tracing::debug!(call_id = %self.call_id, from = %self.stage, to = %next, "Stage transition");
        self.stage = next;
        Ok(())
    }

    /// Force the session into `Ended`. Returns false if it already was.
    pub fn end(&mut self, reason: EndReason) -> bool {
        if self.stage.is_terminal() {
            return false;
        }
        tracing::debug!(call_id = %self.call_id, from = %self.stage, reason = reason.as_str(), "Session ended");
        self.stage = Stage::Ended;
        self.end_reason = Some(reason);
        true
    }

    /// Record that an alert kind is about to be sent. Returns false when it
    /// was already sent for this call.
    pub fn mark_alert(&mut self, kind: AlertKind) -> bool {
        self.alerts_sent.insert(kind)
    }

    pub fn touch(&mut self) {
        self.last_event_at = Utc::now();
    }

    /// Human text identifying the caller in alerts
    pub fn caller_display(&self) -> String {
        if !self.caller_display_name.is_empty() {
            return self.caller_display_name.clone();
        }
        match &self.from_number {
            Some(n) => n.to_string(),
            None => "Unknown caller".to_string(),
        }
    }
}
