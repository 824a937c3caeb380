//! Telephony provider adapters
//!
//! - [`TelnyxCallControl`]: call-control verbs (answer, speak, gather, transfer, hangup)
//! - [`TelnyxSmsNotifier`]: outbound text alerts
//! - [`DryRunCallControl`] / [`DryRunNotifier`]: in-process simulators used when
//!   `DRY_RUN` is set or no credentials exist
//!
//! The factory functions pick the right implementation from [`TelephonyConfig`].

pub mod dry_run;
pub mod http;
pub mod messages;
pub mod sms;
pub mod telnyx;

pub use dry_run::{DryRunCallControl, DryRunNotifier, IssuedAction, SentMessage};
pub use http::{ProviderHttp, ProviderHttpError};
pub use messages::format_alert;
pub use sms::TelnyxSmsNotifier;
pub use telnyx::{TelnyxCallControl, VoiceOptions};

use std::sync::Arc;

use callguard_config::TelephonyConfig;
use callguard_core::{CallControl, Notifier};
use thiserror::Error;

/// Failure to construct a provider client
#[derive(Error, Debug)]
pub enum TelephonyError {
    #[error("Invalid provider base URL {url}: {message}")]
    InvalidBaseUrl { url: String, message: String },

    #[error("HTTP client error: {0}")]
    Client(String),
}

/// Build the call-control client selected by configuration
pub fn create_call_control(config: &TelephonyConfig) -> Result<Arc<dyn CallControl>, TelephonyError> {
    if config.dry_run {
        tracing::info!("Call control running in dry-run mode");
        return Ok(Arc::new(DryRunCallControl::new()));
    }
    let http = ProviderHttp::from_config(config)?;
    Ok(Arc::new(TelnyxCallControl::new(http, VoiceOptions::from_config(config))))
}

/// Build the alert notifier selected by configuration
pub fn create_notifier(config: &TelephonyConfig) -> Result<Arc<dyn Notifier>, TelephonyError> {
    if config.dry_run {
        tracing::info!("Notifier running in dry-run mode");
        return Ok(Arc::new(DryRunNotifier::new()));
    }
    let http = ProviderHttp::from_config(config)?;
    Ok(Arc::new(TelnyxSmsNotifier::new(http)))
}
