//! Outbound call-control actions

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::PhoneNumber;

/// Parameters of a DTMF prompt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatherSpec {
    /// Menu read to the caller
    pub prompt: String,
    /// Accepted DTMF keys, e.g. `"123"`
    pub valid_digits: String,
    /// Provider-side wait for input
    #[serde(with = "duration_millis")]
    pub timeout: Duration,
    /// Digits to collect
    pub digit_count: u8,
}

/// An imperative instruction to the telephony provider about one call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum CallAction {
    Answer,
    Speak { text: String },
    GatherWithPrompt(GatherSpec),
    Transfer { to: PhoneNumber },
    Hangup,
}

impl CallAction {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Answer => "answer",
            Self::Speak { .. } => "speak",
            Self::GatherWithPrompt(_) => "gather",
            Self::Transfer { .. } => "transfer",
            Self::Hangup => "hangup",
        }
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}
