//! Bearer-token authentication for the call inspection API
//!
//! Provider webhooks and health checks are listed in `server.auth.public_paths`.
//! A public prefix matches whole path segments: `/health` opens `/health`
//! and `/health/live`, never `/healthz`.

use axum::{
    extract::Request,
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use parking_lot::RwLock;
use std::sync::Arc;

use callguard_config::Settings;

/// What a request must present before reaching its handler
#[derive(Debug, PartialEq, Eq)]
enum Access {
    Open,
    Token(String),
    Misconfigured,
}

#[derive(Debug, PartialEq, Eq)]
enum Rejection {
    MissingHeader,
    MalformedHeader,
    WrongToken,
    Misconfigured,
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::MissingHeader => (StatusCode::UNAUTHORIZED, "Missing Authorization header"),
            Self::MalformedHeader => (
                StatusCode::BAD_REQUEST,
                "Invalid Authorization header format. Expected: Bearer <token>",
            ),
            Self::WrongToken => (StatusCode::UNAUTHORIZED, "Invalid API key"),
            Self::Misconfigured => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Server authentication not configured",
            ),
        };
        (status, message).into_response()
    }
}

/// `path` equals `prefix` or lies below it
fn is_under(path: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        return false;
    }
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

fn required_access(settings: &Settings, path: &str) -> Access {
    let auth = &settings.server.auth;
    if !auth.enabled || auth.public_paths.iter().any(|p| is_under(path, p)) {
        return Access::Open;
    }
    match auth.api_key.as_deref().map(str::trim) {
        Some(key) if !key.is_empty() => Access::Token(key.to_string()),
        _ => Access::Misconfigured,
    }
}

fn check_bearer(headers: &HeaderMap, expected: &str) -> Result<(), Rejection> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(Rejection::MissingHeader)?
        .to_str()
        .map_err(|_| Rejection::MalformedHeader)?;

    let token = match value.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") => token.trim(),
        _ => return Err(Rejection::MalformedHeader),
    };

    if tokens_match(token.as_bytes(), expected.as_bytes()) {
        Ok(())
    } else {
        Err(Rejection::WrongToken)
    }
}

/// Length leaks, content does not
fn tokens_match(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

pub async fn auth_middleware(request: Request, next: Next) -> Response {
    let Some(config) = request.extensions().get::<Arc<RwLock<Settings>>>().cloned() else {
        tracing::error!("Config extension not found in request");
        return Rejection::Misconfigured.into_response();
    };

    let access = required_access(&config.read(), request.uri().path());
    let verdict = match access {
        Access::Open => Ok(()),
        Access::Token(expected) => check_bearer(request.headers(), &expected),
        Access::Misconfigured => {
            tracing::error!("Auth is enabled but no API key is configured");
            Err(Rejection::Misconfigured)
        },
    };

    match verdict {
        Ok(()) => next.run(request).await,
        Err(rejection) => {
            if rejection == Rejection::WrongToken {
                tracing::warn!(path = %request.uri().path(), "Invalid API key");
            }
            rejection.into_response()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn settings(enabled: bool, key: Option<&str>) -> Settings {
        let mut settings = Settings::default();
        settings.server.auth.enabled = enabled;
        settings.server.auth.api_key = key.map(String::from);
        settings
    }

    fn auth_header(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_public_prefix_matches_whole_segments() {
        assert!(is_under("/webhooks/call-control", "/webhooks"));
        assert!(is_under("/health", "/health"));
        assert!(is_under("/health", "/health/"));
        assert!(!is_under("/healthz", "/health"));
        assert!(!is_under("/api/calls", "/"));
    }

    #[test]
    fn test_required_access() {
        let s = settings(true, Some("k"));
        assert_eq!(required_access(&s, "/webhooks/call-control"), Access::Open);
        assert_eq!(required_access(&s, "/metrics"), Access::Open);
        assert_eq!(required_access(&s, "/api/calls"), Access::Token("k".to_string()));
        assert_eq!(required_access(&s, "/metricsdump"), Access::Token("k".to_string()));

        assert_eq!(required_access(&settings(true, Some("  ")), "/api/calls"), Access::Misconfigured);
        assert_eq!(required_access(&settings(false, None), "/api/calls"), Access::Open);
    }

    #[test]
    fn test_check_bearer() {
        assert_eq!(check_bearer(&HeaderMap::new(), "k"), Err(Rejection::MissingHeader));
        assert_eq!(check_bearer(&auth_header("Basic k"), "k"), Err(Rejection::MalformedHeader));
        assert_eq!(check_bearer(&auth_header("k"), "k"), Err(Rejection::MalformedHeader));
        assert_eq!(check_bearer(&auth_header("Bearer x"), "k"), Err(Rejection::WrongToken));
        assert_eq!(check_bearer(&auth_header("bearer k"), "k"), Ok(()));
    }

    #[test]
    fn test_tokens_match() {
        assert!(tokens_match(b"secret", b"secret"));
        assert!(!tokens_match(b"secret", b"secre"));
        assert!(!tokens_match(b"secret", b"secreT"));
    }
}
