//! Alert message text

use callguard_core::{AlertKind, PhoneNumber};

/// Longest caller text copied into an alert
const MAX_CALLER_CHARS: usize = 40;

/// Render the SMS body for an alert about a call to `line`
pub fn format_alert(kind: AlertKind, caller: &str, line: &PhoneNumber) -> String {
    let caller = clip(caller.trim());
    match kind {
        AlertKind::SpamBlocked => format!(
            "CallGuard blocked a likely spam call from {} to your line {}.",
            caller, line
        ),
        AlertKind::UnknownScreening => format!(
            "CallGuard is screening an unknown caller ({}) on your line {}.",
            caller, line
        ),
        AlertKind::TrustedCall => format!(
            "Trusted caller {} is being connected to you from your line {}.",
            caller, line
        ),
    }
}

fn clip(caller: &str) -> String {
    if caller.is_empty() {
        return "Unknown caller".to_string();
    }
    if caller.chars().count() <= MAX_CALLER_CHARS {
        return caller.to_string();
    }
    let mut clipped: String = caller.chars().take(MAX_CALLER_CHARS).collect();
    clipped.push('…');
    clipped
}
