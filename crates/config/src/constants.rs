//! Default values shared by the settings tree

/// Telephony provider
pub mod telephony {
    pub const BASE_URL: &str = "https://api.telnyx.com";
    pub const REQUEST_TIMEOUT_MS: u64 = 10_000;
    pub const VOICE: &str = "female";
    pub const LANGUAGE: &str = "en-US";
}

/// Screening prompt and gather defaults
pub mod screening {
    pub const GATHER_TIMEOUT_SECS: u64 = 10;
    pub const MAX_GATHER_TIMEOUT_SECS: u64 = 60;
    pub const VALID_DIGITS: &str = "123";
    /// Upper bound on menu options offered to a caller
    pub const MAX_MENU_OPTIONS: usize = 3;

    pub const SPAM_KEYWORDS: &[&str] = &["spam", "scam", "robocall", "telemarketer"];

    pub const MENU_PROMPT: &str = "You have reached a screened line. \
        If you are calling from a medical or professional office, press 1. \
        If you are a friend or family member, press 2. \
        For anything else, press 3.";
    pub const MEDICAL_ACK: &str = "Thank you. Connecting you now.";
    pub const FAMILY_ACK: &str = "Thanks. Please hold while we connect you.";
    pub const REJECTION: &str = "This line does not accept unsolicited calls. Goodbye.";
}

/// Session registry
pub mod sessions {
    pub const IDLE_TIMEOUT_SECS: u64 = 600;
    pub const ENDED_RETENTION_SECS: u64 = 300;
    pub const SWEEP_INTERVAL_SECS: u64 = 60;
}

/// Line directory
pub mod lines {
    pub const FILE: &str = "config/lines.yaml";
    pub const DIRECTORY_TIMEOUT_MS: u64 = 100;
}
