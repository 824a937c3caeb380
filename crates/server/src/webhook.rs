//! Webhook decoding
//!
//! Providers deliver either a flat `{event_type, payload}` body or the
//! `{"data": {...}}` envelope. Party fields arrive as a bare number string
//! or as an object carrying `phone_number`. All of it is folded into one
//! [`CallEvent`] with normalized numbers.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

use callguard_core::{CallEvent, CallEventKind, GatherStatus, PhoneNumber};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum WebhookError {
    #[error("Malformed JSON: {0}")]
    Json(String),

    #[error("Missing event_type")]
    MissingEventType,

    #[error("Missing call_id")]
    MissingCallId,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Envelope {
    Wrapped { data: EventBody },
    Flat(EventBody),
}

#[derive(Debug, Deserialize)]
struct EventBody {
    #[serde(default)]
    event_type: Option<String>,
    #[serde(default)]
    occurred_at: Option<DateTime<Utc>>,
    #[serde(default)]
    payload: Payload,
}

#[derive(Debug, Default, Deserialize)]
struct Payload {
    #[serde(default)]
    call_id: Option<String>,
    #[serde(default)]
    call_control_id: Option<String>,
    #[serde(default)]
    from: Option<PartyField>,
    #[serde(default)]
    to: Option<PartyField>,
    #[serde(default)]
    caller_display_name: Option<String>,
    #[serde(default)]
    caller_id_name: Option<String>,
    #[serde(default)]
    digits: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

/// `"+1813..."` or `{"phone_number": "+1813..."}`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PartyField {
    Number(String),
    Object {
        #[serde(default)]
        phone_number: Option<String>,
    },
    Unrecognized(serde_json::Value),
}

impl PartyField {
    fn normalize(&self) -> Option<PhoneNumber> {
        match self {
            PartyField::Number(raw) => PhoneNumber::parse(raw),
            PartyField::Object { phone_number } => phone_number.as_deref().and_then(PhoneNumber::parse),
            PartyField::Unrecognized(_) => None,
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Decode a raw webhook body
pub fn parse_webhook(body: &[u8]) -> Result<CallEvent, WebhookError> {
    let envelope: Envelope =
        serde_json::from_slice(body).map_err(|e| WebhookError::Json(e.to_string()))?;
    let body = match envelope {
        Envelope::Wrapped { data } => data,
        Envelope::Flat(body) => body,
    };

    let event_type = non_empty(body.event_type).ok_or(WebhookError::MissingEventType)?;
    let payload = body.payload;
    let call_id = non_empty(payload.call_id)
        .or_else(|| non_empty(payload.call_control_id))
        .ok_or(WebhookError::MissingCallId)?;

    let mut event = CallEvent::new(CallEventKind::from_event_type(&event_type), call_id).with_parties(
        payload.from.as_ref().and_then(PartyField::normalize),
        payload.to.as_ref().and_then(PartyField::normalize),
    );
    event.caller_display_name = non_empty(payload.caller_display_name).or_else(|| non_empty(payload.caller_id_name));
    event.digits = payload.digits;
    event.gather_status = payload.status.as_deref().and_then(GatherStatus::from_provider);
    event.occurred_at = body.occurred_at;
    Ok(event)
}
