//! Caller classification
//!
//! Pure function of (caller number, display name, line policy). Spam is
//! checked first so a spoofed trusted number with a spam caller name is
//! still blocked.

use callguard_config::ScreeningConfig;
use callguard_core::{Classification, Line, PhoneNumber};

/// Keyword deny-list classifier
#[derive(Debug, Clone)]
pub struct Classifier {
    /// Lowercased keywords
    keywords: Vec<String>,
}

impl Classifier {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut keywords: Vec<String> = keywords
            .into_iter()
            .map(|k| k.as_ref().trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        keywords.sort();
        keywords.dedup();
        Self { keywords }
    }

    pub fn from_config(config: &ScreeningConfig) -> Self {
        Self::new(&config.spam_keywords)
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    /// Case-insensitive substring match against the deny-list
    pub fn is_spam_name(&self, display_name: &str) -> bool {
        if display_name.trim().is_empty() {
            return false;
        }
        let name = display_name.to_lowercase();
        self.keywords.iter().any(|k| name.contains(k.as_str()))
    }

    pub fn classify(
        &self,
        from: Option<&PhoneNumber>,
        display_name: &str,
        line: &Line,
    ) -> Classification {
        if line.spam_auto_block && self.is_spam_name(display_name) {
            return Classification::Spam;
        }
        if from.map_or(false, |n| line.is_trusted(n)) {
            return Classification::Trusted;
        }
        Classification::Unknown
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::from_config(&ScreeningConfig::default())
    }
}
