//! Inbound call events
//!
//! Provider webhooks are decoded at the HTTP boundary into [`CallEvent`];
//! everything past that point works with normalized numbers only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::PhoneNumber;

/// Call lifecycle occurrence reported by the telephony provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallEventKind {
    Initiated,
    Answered,
    GatherEnded,
    Hangup,
    /// Any event type the engine does not act on
    Other(String),
}

impl CallEventKind {
    /// Map a provider `event_type` string
    pub fn from_event_type(event_type: &str) -> Self {
        match event_type.trim() {
            "call.initiated" => Self::Initiated,
            "call.answered" => Self::Answered,
            "call.gather.ended" | "gather.ended" => Self::GatherEnded,
            "call.hangup" | "call.ended" => Self::Hangup,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Initiated => "call.initiated",
            Self::Answered => "call.answered",
            Self::GatherEnded => "call.gather.ended",
            Self::Hangup => "call.hangup",
            Self::Other(s) => s.as_str(),
        }
    }
}

/// How a gather finished, as reported by the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatherStatus {
    Valid,
    Invalid,
    Timeout,
    CallHangup,
}

impl GatherStatus {
    pub fn from_provider(status: &str) -> Option<Self> {
        match status.trim().to_ascii_lowercase().as_str() {
            "valid" => Some(Self::Valid),
            "invalid" => Some(Self::Invalid),
            "timeout" => Some(Self::Timeout),
            "call_hangup" | "hangup" => Some(Self::CallHangup),
            _ => None,
        }
    }
}

/// A decoded webhook event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallEvent {
    pub kind: CallEventKind,
    pub call_id: String,
    pub from: Option<PhoneNumber>,
    pub to: Option<PhoneNumber>,
    pub caller_display_name: Option<String>,
    /// Collected DTMF digits (gather events only)
    pub digits: Option<String>,
    pub gather_status: Option<GatherStatus>,
    /// Provider-asserted occurrence time
    pub occurred_at: Option<DateTime<Utc>>,
}

impl CallEvent {
    pub fn new(kind: CallEventKind, call_id: impl Into<String>) -> Self {
        Self {
            kind,
            call_id: call_id.into(),
            from: None,
            to: None,
            caller_display_name: None,
            digits: None,
            gather_status: None,
            occurred_at: None,
        }
    }

    pub fn with_parties(mut self, from: Option<PhoneNumber>, to: Option<PhoneNumber>) -> Self {
        self.from = from;
        self.to = to;
        self
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.caller_display_name = Some(name.into());
        self
    }

    pub fn with_digits(mut self, digits: impl Into<String>) -> Self {
        self.digits = Some(digits.into());
        self
    }

    pub fn with_gather_status(mut self, status: GatherStatus) -> Self {
        self.gather_status = Some(status);
        self
    }
}
