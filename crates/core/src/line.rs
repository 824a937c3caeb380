//! Protected line policy
//!
//! A [`Line`] is owned by the subscriber management system. The screening
//! engine only ever reads it, once per inbound call.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::{AlertKind, PhoneNumber};

/// Which alerts the line owner wants to receive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertSettings {
    /// Master switch for all alerts
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Alert when a spam call is blocked
    #[serde(default = "default_true")]
    pub on_spam: bool,
    /// Alert when an unknown caller enters screening
    #[serde(default = "default_true")]
    pub on_unknown: bool,
}

fn default_true() -> bool {
    true
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            on_spam: true,
            on_unknown: true,
        }
    }
}

impl AlertSettings {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            on_spam: false,
            on_unknown: false,
        }
    }

    /// Whether the owner opted into this alert kind
    pub fn allows(&self, kind: AlertKind) -> bool {
        self.enabled
            && match kind {
                AlertKind::SpamBlocked => self.on_spam,
                AlertKind::UnknownScreening => self.on_unknown,
                AlertKind::TrustedCall => true,
            }
    }
}

/// A subscriber's protected phone number and its screening policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Line {
    /// The public (called) number; unique key
    pub public_number: PhoneNumber,
    /// Where verified and trusted calls are connected
    pub owner_transfer_number: PhoneNumber,
    /// Owner-managed allowlist
    #[serde(default)]
    pub trusted_numbers: BTreeSet<PhoneNumber>,
    /// Optional second recipient for alerts
    #[serde(default)]
    pub secondary_alert_number: Option<PhoneNumber>,
    #[serde(default)]
    pub alerts: AlertSettings,
    /// Hang up on callers whose display name looks like spam
    #[serde(default = "default_true")]
    pub spam_auto_block: bool,
}

impl Line {
    pub fn new(public_number: PhoneNumber, owner_transfer_number: PhoneNumber) -> Self {
        Self {
            public_number,
            owner_transfer_number,
            trusted_numbers: BTreeSet::new(),
            secondary_alert_number: None,
            alerts: AlertSettings::default(),
            spam_auto_block: true,
        }
    }

    pub fn with_trusted(mut self, number: PhoneNumber) -> Self {
        self.trusted_numbers.insert(number);
        self
    }

    pub fn with_secondary_alert(mut self, number: PhoneNumber) -> Self {
        self.secondary_alert_number = Some(number);
        self
    }

    pub fn with_alerts(mut self, alerts: AlertSettings) -> Self {
        self.alerts = alerts;
        self
    }

    pub fn with_spam_auto_block(mut self, enabled: bool) -> Self {
        self.spam_auto_block = enabled;
        self
    }

    pub fn is_trusted(&self, number: &PhoneNumber) -> bool {
        self.trusted_numbers.contains(number)
    }

    /// Owner first, then the secondary contact if it differs
    pub fn alert_recipients(&self) -> Vec<PhoneNumber> {
        let mut recipients = vec![self.owner_transfer_number.clone()];
        if let Some(secondary) = &self.secondary_alert_number {
            if secondary != &self.owner_transfer_number {
                recipients.push(secondary.clone());
            }
        }
        recipients
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(s: &str) -> PhoneNumber {
        PhoneNumber::parse(s).unwrap()
    }

    #[test]
    fn test_yaml_defaults() {
        let yaml = r#"
public_number: "813-555-0100"
owner_transfer_number: "+17545550000"
trusted_numbers: ["(754) 555-1234"]
"#;
        let line: Line = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(line.public_number.as_str(), "+18135550100");
        assert!(line.is_trusted(&num("+17545551234")));
        assert!(line.spam_auto_block);
        assert_eq!(line.alerts, AlertSettings::default());
        assert!(line.secondary_alert_number.is_none());
    }

    #[test]
    fn test_alert_gating() {
        let alerts = AlertSettings {
            enabled: true,
            on_spam: false,
            on_unknown: true,
        };
        assert!(!alerts.allows(AlertKind::SpamBlocked));
        assert!(alerts.allows(AlertKind::UnknownScreening));
        assert!(alerts.allows(AlertKind::TrustedCall));
        assert!(!AlertSettings::disabled().allows(AlertKind::TrustedCall));
    }

    #[test]
    fn test_alert_recipients_dedup() {
        let line = Line::new(num("+18135550100"), num("+17545550000"))
            .with_secondary_alert(num("+17545550000"));
        assert_eq!(line.alert_recipients().len(), 1);

        let line = line.with_secondary_alert(num("+17545559999"));
        assert_eq!(
            line.alert_recipients(),
            vec![num("+17545550000"), num("+17545559999")]
        );
    }
}
