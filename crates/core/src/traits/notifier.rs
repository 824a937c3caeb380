//! Text alert trait

use async_trait::async_trait;
use thiserror::Error;

use crate::PhoneNumber;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotifyError {
    #[error("Messaging credentials are not configured")]
    MissingCredentials,

    #[error("Request timed out")]
    Timeout,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Gateway rejected message (HTTP {status}): {body}")]
    Gateway { status: u16, body: String },

    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Sends a short text message
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, from: &PhoneNumber, to: &PhoneNumber, text: &str)
        -> Result<(), NotifyError>;

    fn is_dry_run(&self) -> bool {
        false
    }
}
