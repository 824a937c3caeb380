//! CallGuard Server
//!
//! Provides the provider webhook endpoint plus health, metrics and call
//! inspection routes around the screening engine.

pub mod auth;
pub mod http;
pub mod metrics;
pub mod state;
pub mod webhook;

pub use auth::auth_middleware;
pub use http::create_router;
pub use metrics::{init_metrics, record_webhook};
pub use state::AppState;
pub use webhook::{parse_webhook, WebhookError};

use thiserror::Error;

/// Server errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Call not found: {0}")]
    CallNotFound(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Startup error: {0}")]
    Startup(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ServerError> for axum::http::StatusCode {
    fn from(err: ServerError) -> Self {
        match err {
            ServerError::CallNotFound(_) => axum::http::StatusCode::NOT_FOUND,
            ServerError::Auth(_) => axum::http::StatusCode::UNAUTHORIZED,
            ServerError::InvalidRequest(_) => axum::http::StatusCode::BAD_REQUEST,
            ServerError::Startup(_) => axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            ServerError::Internal(_) => axum::http::StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<callguard_core::DirectoryError> for ServerError {
    fn from(err: callguard_core::DirectoryError) -> Self {
        ServerError::Startup(err.to_string())
    }
}

impl From<callguard_telephony::TelephonyError> for ServerError {
    fn from(err: callguard_telephony::TelephonyError) -> Self {
        ServerError::Startup(err.to_string())
    }
}
