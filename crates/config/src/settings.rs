//! Main settings module

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::constants::{lines, screening, sessions, telephony};
use crate::ConfigError;

/// Runtime environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeEnvironment {
    /// Relaxed validation, warnings only
    #[default]
    Development,
    Staging,
    Production,
}

impl RuntimeEnvironment {
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    /// Check if strict validation should be applied
    pub fn is_strict(&self) -> bool {
        matches!(self, Self::Production | Self::Staging)
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub environment: RuntimeEnvironment,

    #[serde(default)]
    pub server: ServerConfig,

    /// Call-control and messaging provider
    #[serde(default)]
    pub telephony: TelephonyConfig,

    /// Classification and prompt behaviour
    #[serde(default)]
    pub screening: ScreeningConfig,

    /// Session registry limits
    #[serde(default)]
    pub sessions: SessionsConfig,

    /// Where line policies come from
    #[serde(default)]
    pub lines: LinesConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    #[serde(default)]
    pub cors_origins: Vec<String>,

    #[serde(default)]
    pub auth: AuthConfig,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_timeout() -> u64 {
    30
}
fn default_true() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            timeout_seconds: default_timeout(),
            cors_enabled: true,
            cors_origins: Vec::new(),
            auth: AuthConfig::default(),
        }
    }
}

/// Bearer-token authentication for the operational API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub api_key: Option<String>,

    /// Path prefixes that bypass authentication
    #[serde(default = "default_public_paths")]
    pub public_paths: Vec<String>,
}

fn default_public_paths() -> Vec<String> {
    vec![
        "/health".to_string(),
        "/ready".to_string(),
        "/metrics".to_string(),
        "/webhooks".to_string(),
    ]
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: None,
            public_paths: default_public_paths(),
        }
    }
}

/// Telephony provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelephonyConfig {
    /// Simulate every call-control action and alert
    #[serde(default)]
    pub dry_run: bool,

    /// Provider API credential
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Upper bound on each outbound request
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Voice used for speak and gather prompts
    #[serde(default = "default_voice")]
    pub voice: String,

    #[serde(default = "default_language")]
    pub language: String,

    /// Sender number for alerts; the line's public number when unset
    #[serde(default)]
    pub alert_sender: Option<String>,
}

fn default_base_url() -> String {
    telephony::BASE_URL.to_string()
}
fn default_request_timeout_ms() -> u64 {
    telephony::REQUEST_TIMEOUT_MS
}
fn default_voice() -> String {
    telephony::VOICE.to_string()
}
fn default_language() -> String {
    telephony::LANGUAGE.to_string()
}

impl Default for TelephonyConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            api_key: None,
            base_url: default_base_url(),
            request_timeout_ms: default_request_timeout_ms(),
            voice: default_voice(),
            language: default_language(),
            alert_sender: None,
        }
    }
}

impl TelephonyConfig {
    pub fn has_credentials(&self) -> bool {
        self.api_key.as_deref().map_or(false, |k| !k.trim().is_empty())
    }
}

/// Screening behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreeningConfig {
    /// How long the provider waits for a digit
    #[serde(default = "default_gather_timeout_secs")]
    pub gather_timeout_secs: u64,

    /// Accepted DTMF keys for the screening menu
    #[serde(default = "default_valid_digits")]
    pub valid_digits: String,

    /// Case-insensitive substrings of caller names treated as spam
    #[serde(default = "default_spam_keywords")]
    pub spam_keywords: Vec<String>,

    #[serde(default)]
    pub prompts: PromptsConfig,
}

fn default_gather_timeout_secs() -> u64 {
    screening::GATHER_TIMEOUT_SECS
}
fn default_valid_digits() -> String {
    screening::VALID_DIGITS.to_string()
}
fn default_spam_keywords() -> Vec<String> {
    screening::SPAM_KEYWORDS.iter().map(|k| k.to_string()).collect()
}

impl Default for ScreeningConfig {
    fn default() -> Self {
        Self {
            gather_timeout_secs: default_gather_timeout_secs(),
            valid_digits: default_valid_digits(),
            spam_keywords: default_spam_keywords(),
            prompts: PromptsConfig::default(),
        }
    }
}

/// Text spoken to callers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptsConfig {
    #[serde(default = "default_menu")]
    pub menu: String,
    #[serde(default = "default_medical_ack")]
    pub medical_ack: String,
    #[serde(default = "default_family_ack")]
    pub family_ack: String,
    #[serde(default = "default_rejection")]
    pub rejection: String,
}

fn default_menu() -> String {
    screening::MENU_PROMPT.to_string()
}
fn default_medical_ack() -> String {
    screening::MEDICAL_ACK.to_string()
}
fn default_family_ack() -> String {
    screening::FAMILY_ACK.to_string()
}
fn default_rejection() -> String {
    screening::REJECTION.to_string()
}

impl Default for PromptsConfig {
    fn default() -> Self {
        Self {
            menu: default_menu(),
            medical_ack: default_medical_ack(),
            family_ack: default_family_ack(),
            rejection: default_rejection(),
        }
    }
}

/// Session registry eviction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    /// Evict non-terminal sessions idle this long
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,

    /// Keep ended sessions this long so late duplicates stay no-ops
    #[serde(default = "default_ended_retention_secs")]
    pub ended_retention_secs: u64,

    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

fn default_idle_timeout_secs() -> u64 {
    sessions::IDLE_TIMEOUT_SECS
}
fn default_ended_retention_secs() -> u64 {
    sessions::ENDED_RETENTION_SECS
}
fn default_sweep_interval_secs() -> u64 {
    sessions::SWEEP_INTERVAL_SECS
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: default_idle_timeout_secs(),
            ended_retention_secs: default_ended_retention_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

/// Line directory sources
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinesConfig {
    /// YAML file of lines, used as the cold-start fallback
    #[serde(default = "default_lines_file")]
    pub file: String,

    /// Base URL of the account service (`GET {url}/lines/{number}`)
    #[serde(default)]
    pub directory_url: Option<String>,

    #[serde(default = "default_directory_timeout_ms")]
    pub directory_timeout_ms: u64,
}

fn default_lines_file() -> String {
    lines::FILE.to_string()
}
fn default_directory_timeout_ms() -> u64 {
    lines::DIRECTORY_TIMEOUT_MS
}

impl Default for LinesConfig {
    fn default() -> Self {
        Self {
            file: default_lines_file(),
            directory_url: None,
            directory_timeout_ms: default_directory_timeout_ms(),
        }
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub log_json: bool,

    /// Expose Prometheus metrics at /metrics
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: false,
            metrics_enabled: true,
        }
    }
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_server()?;
        self.validate_screening()?;
        self.validate_sessions()?;
        self.validate_telephony()?;
        Ok(())
    }

    /// One event does a line lookup and at most two provider calls
    fn validate_server(&self) -> Result<(), ConfigError> {
        let budget_ms = self.server.timeout_seconds.saturating_mul(1000);
        let worst_case_ms = self
            .telephony
            .request_timeout_ms
            .saturating_mul(2)
            .saturating_add(self.lines.directory_timeout_ms);

        if budget_ms <= worst_case_ms {
            return Err(ConfigError::InvalidValue {
                field: "server.timeout_seconds".to_string(),
                message: format!(
                    "Must exceed {} ms (two provider requests plus a line lookup), got {} s",
                    worst_case_ms, self.server.timeout_seconds
                ),
            });
        }
        Ok(())
    }

    fn validate_screening(&self) -> Result<(), ConfigError> {
        let s = &self.screening;

        if s.gather_timeout_secs == 0 || s.gather_timeout_secs > screening::MAX_GATHER_TIMEOUT_SECS
        {
            return Err(ConfigError::InvalidValue {
                field: "screening.gather_timeout_secs".to_string(),
                message: format!(
                    "Must be between 1 and {}, got {}",
                    screening::MAX_GATHER_TIMEOUT_SECS,
                    s.gather_timeout_secs
                ),
            });
        }

        let digits = s.valid_digits.trim();
        if digits.is_empty() || digits.chars().count() > screening::MAX_MENU_OPTIONS {
            return Err(ConfigError::InvalidValue {
                field: "screening.valid_digits".to_string(),
                message: format!(
                    "Must offer 1 to {} options, got {:?}",
                    screening::MAX_MENU_OPTIONS,
                    s.valid_digits
                ),
            });
        }
        if let Some(bad) = digits
            .chars()
            .find(|c| !(c.is_ascii_digit() || *c == '*' || *c == '#'))
        {
            return Err(ConfigError::InvalidValue {
                field: "screening.valid_digits".to_string(),
                message: format!("{:?} is not a DTMF key", bad),
            });
        }

        if s.spam_keywords.iter().any(|k| k.trim().is_empty()) {
            return Err(ConfigError::InvalidValue {
                field: "screening.spam_keywords".to_string(),
                message: "Keywords must not be blank".to_string(),
            });
        }

        if s.prompts.menu.trim().is_empty() {
            return Err(ConfigError::MissingField("screening.prompts.menu".to_string()));
        }

        Ok(())
    }

    fn validate_sessions(&self) -> Result<(), ConfigError> {
        let s = &self.sessions;
        for (field, value) in [
            ("sessions.idle_timeout_secs", s.idle_timeout_secs),
            ("sessions.ended_retention_secs", s.ended_retention_secs),
            ("sessions.sweep_interval_secs", s.sweep_interval_secs),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    message: "Must be greater than zero".to_string(),
                });
            }
        }
        Ok(())
    }

    fn validate_telephony(&self) -> Result<(), ConfigError> {
        let t = &self.telephony;

        if t.request_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "telephony.request_timeout_ms".to_string(),
                message: "Must be greater than zero".to_string(),
            });
        }

        if !t.dry_run && !t.has_credentials() {
            if self.environment.is_strict() {
                return Err(ConfigError::MissingField("telephony.api_key".to_string()));
            }
            tracing::warn!(
                "No telephony API key configured and dry_run is off; every call-control action will fail with missing_credentials"
            );
        }

        Ok(())
    }

    /// Apply plain environment overrides on top of the layered config.
    ///
    /// `lookup` is `std::env::var` in production; tests pass a map.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("DRY_RUN") {
            self.telephony.dry_run = parse_bool(&raw).ok_or_else(|| {
                ConfigError::Environment(format!("DRY_RUN must be a boolean, got {:?}", raw))
            })?;
        }
        if let Some(key) = lookup("TELNYX_API_KEY").filter(|k| !k.trim().is_empty()) {
            self.telephony.api_key = Some(key);
        }
        if let Some(sender) = lookup("CALLGUARD_ALERT_SENDER").filter(|s| !s.trim().is_empty()) {
            self.telephony.alert_sender = Some(sender);
        }
        Ok(())
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

/// Load settings from files and environment
///
/// Priority (highest to lowest):
/// 1. `DRY_RUN`, `TELNYX_API_KEY`, `CALLGUARD_ALERT_SENDER`
/// 2. Environment variables (`CALLGUARD__` prefix)
/// 3. config/{env}.yaml (if env specified)
/// 4. config/default.yaml
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    load_settings_from(Path::new("config"), env)
}

/// Same as [`load_settings`] with an explicit config directory
pub fn load_settings_from(dir: &Path, env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    builder = builder.add_source(File::from(dir.join("default")).required(false));

    if let Some(env_name) = env {
        builder = builder.add_source(File::from(dir.join(env_name)).required(false));
    }

    builder = builder.add_source(
        Environment::with_prefix("CALLGUARD")
            .separator("__")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("screening.spam_keywords")
            .with_list_parse_key("server.cors_origins")
            .with_list_parse_key("server.auth.public_paths"),
    );

    let config = builder.build()?;
    let mut settings: Settings = config.try_deserialize()?;

    settings.apply_overrides(|key| std::env::var(key).ok())?;
    settings.validate()?;

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.screening.gather_timeout_secs, 10);
        assert_eq!(settings.screening.valid_digits, "123");
        assert!(settings.screening.spam_keywords.contains(&"robocall".to_string()));
        assert_eq!(settings.sessions.idle_timeout_secs, 600);
        assert!(!settings.telephony.dry_run);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_gather_timeout_validation() {
        let mut settings = Settings::default();
        settings.screening.gather_timeout_secs = 0;
        assert!(settings.validate().is_err());

        settings.screening.gather_timeout_secs = 61;
        assert!(settings.validate().is_err());

        settings.screening.gather_timeout_secs = 15;
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_valid_digits_validation() {
        let mut settings = Settings::default();
        settings.screening.valid_digits = "".to_string();
        assert!(settings.validate_screening().is_err());

        settings.screening.valid_digits = "1234".to_string();
        assert!(settings.validate_screening().is_err());

        settings.screening.valid_digits = "1a".to_string();
        assert!(settings.validate_screening().is_err());

        settings.screening.valid_digits = "12#".to_string();
        assert!(settings.validate_screening().is_ok());
    }

    #[test]
    fn test_server_timeout_covers_event_handling() {
        let mut settings = Settings::default();
        assert!(settings.validate_server().is_ok());

        settings.server.timeout_seconds = 20;
        assert!(settings.validate_server().is_err());

        settings.telephony.request_timeout_ms = 5_000;
        assert!(settings.validate_server().is_ok());

        settings.lines.directory_timeout_ms = 10_000;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_blank_spam_keyword_rejected() {
        let mut settings = Settings::default();
        settings.screening.spam_keywords.push("  ".to_string());
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_zero_session_timeouts_rejected() {
        let mut settings = Settings::default();
        settings.sessions.ended_retention_secs = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_missing_credentials_strict_only() {
        let mut settings = Settings::default();
        settings.telephony.api_key = None;
        assert!(settings.validate().is_ok());

        settings.environment = RuntimeEnvironment::Production;
        assert!(settings.validate().is_err());

        settings.telephony.dry_run = true;
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let mut settings = Settings::default();
        settings
            .apply_overrides(lookup(&[
                ("DRY_RUN", "true"),
                ("TELNYX_API_KEY", "KEY123"),
                ("CALLGUARD_ALERT_SENDER", "+18135550199"),
            ]))
            .unwrap();
        assert!(settings.telephony.dry_run);
        assert_eq!(settings.telephony.api_key.as_deref(), Some("KEY123"));
        assert_eq!(settings.telephony.alert_sender.as_deref(), Some("+18135550199"));

        settings.apply_overrides(lookup(&[("DRY_RUN", "0")])).unwrap();
        assert!(!settings.telephony.dry_run);

        assert!(settings
            .apply_overrides(lookup(&[("DRY_RUN", "maybe")]))
            .is_err());
    }

    #[test]
    fn test_blank_api_key_override_ignored() {
        let mut settings = Settings::default();
        settings.telephony.api_key = Some("FROM_FILE".to_string());
        settings
            .apply_overrides(lookup(&[("TELNYX_API_KEY", "  ")]))
            .unwrap();
        assert_eq!(settings.telephony.api_key.as_deref(), Some("FROM_FILE"));
    }
}
