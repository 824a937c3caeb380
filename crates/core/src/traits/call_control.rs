//! Call-control trait

use async_trait::async_trait;
use thiserror::Error;

use crate::CallAction;

/// Failure of a single call-control action
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CallControlError {
    #[error("Provider credentials are not configured")]
    MissingCredentials,

    #[error("Call id must not be empty")]
    InvalidCallId,

    #[error("Request timed out")]
    Timeout,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Provider rejected action (HTTP {status}): {body}")]
    Provider { status: u16, body: String },

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl CallControlError {
    /// Stable machine-readable reason
    pub fn reason(&self) -> &'static str {
        match self {
            Self::MissingCredentials => "missing_credentials",
            Self::InvalidCallId => "invalid_call_id",
            Self::Timeout => "timeout",
            Self::Network(_) => "network",
            Self::Provider { .. } => "provider_rejected",
            Self::Configuration(_) => "configuration",
        }
    }

    /// HTTP status returned by the provider, if the request got that far
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Provider { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Issues call-control actions for a single call.
///
/// Implementations make exactly one outbound request per invocation and
/// never retry: repeating `answer` or `transfer` against a call in an
/// unknown state can double the action.
#[async_trait]
pub trait CallControl: Send + Sync {
    async fn execute(&self, call_id: &str, action: &CallAction) -> Result<(), CallControlError>;

    /// True when actions are simulated rather than sent
    fn is_dry_run(&self) -> bool {
        false
    }
}

/// Reject blank call identifiers before anything else happens
pub fn validate_call_id(call_id: &str) -> Result<(), CallControlError> {
    if call_id.trim().is_empty() {
        return Err(CallControlError::InvalidCallId);
    }
    Ok(())
}
