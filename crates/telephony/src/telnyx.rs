//! Telnyx Call Control client
//!
//! Maps each [`CallAction`] onto one `POST /v2/calls/{call_id}/actions/{verb}`.

use async_trait::async_trait;
use serde_json::json;

use callguard_config::TelephonyConfig;
use callguard_core::{validate_call_id, CallAction, CallControl, CallControlError};

use crate::http::ProviderHttp;

/// Text-to-speech parameters applied to speak and gather prompts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceOptions {
    pub voice: String,
    pub language: String,
}

impl VoiceOptions {
    pub fn from_config(config: &TelephonyConfig) -> Self {
        Self {
            voice: config.voice.clone(),
            language: config.language.clone(),
        }
    }
}

impl Default for VoiceOptions {
    fn default() -> Self {
        Self::from_config(&TelephonyConfig::default())
    }
}

pub struct TelnyxCallControl {
    http: ProviderHttp,
    voice: VoiceOptions,
}

impl TelnyxCallControl {
    pub fn new(http: ProviderHttp, voice: VoiceOptions) -> Self {
        if !http.has_credentials() {
            tracing::warn!("Telnyx call control created without an API key; actions will fail");
        }
        Self { http, voice }
    }

    /// Provider verb and request body for an action
    fn request_for(&self, action: &CallAction) -> (&'static str, serde_json::Value) {
        match action {
            CallAction::Answer => ("answer", json!({})),
            CallAction::Speak { text } => (
                "speak",
                json!({
                    "payload": text,
                    "voice": self.voice.voice,
                    "language": self.voice.language,
                }),
            ),
            CallAction::GatherWithPrompt(spec) => (
                "gather_using_speak",
                json!({
                    "payload": spec.prompt,
                    "voice": self.voice.voice,
                    "language": self.voice.language,
                    "valid_digits": spec.valid_digits,
                    "minimum_digits": spec.digit_count,
                    "maximum_digits": spec.digit_count,
                    "timeout_millis": spec.timeout.as_millis() as u64,
                }),
            ),
            CallAction::Transfer { to } => ("transfer", json!({ "to": to.as_str() })),
            CallAction::Hangup => ("hangup", json!({})),
        }
    }
}

#[async_trait]
impl CallControl for TelnyxCallControl {
    async fn execute(&self, call_id: &str, action: &CallAction) -> Result<(), CallControlError> {
        validate_call_id(call_id)?;
        let (verb, body) = self.request_for(action);

        match self
            .http
            .post_json(&["v2", "calls", call_id, "actions", verb], &body)
            .await
        {
            Ok(()) => {
                tracing::debug!(call_id = %call_id, action = verb, "Call-control action accepted");
                Ok(())
            },
            Err(e) => {
                let err = CallControlError::from(e);
                tracing::warn!(
                    call_id = %call_id,
                    action = verb,
                    reason = err.reason(),
                    status = ?err.status_code(),
                    error = %err,
                    "Call-control action failed"
                );
                Err(err)
            },
        }
    }
}
