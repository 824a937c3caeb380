//! Phone number normalization
//!
//! Every number that enters the system (webhook parties, line policy,
//! trusted lists) goes through [`PhoneNumber::parse`] so that comparisons
//! downstream are plain string equality on a canonical `+<digits>` form.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::Error;

/// Country code assumed for bare 10-digit numbers.
const DEFAULT_COUNTRY_CODE: &str = "1";

/// A telephone number in canonical E.164-like form (`+` followed by digits)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PhoneNumber(String);

impl PhoneNumber {
    /// Normalize free-form input into a canonical number.
    ///
    /// Accepts `+1 (813) 555-0001`, `8135550001`, `tel:+18135550001`,
    /// `sip:+18135550001@carrier.example` and similar. Returns `None` when
    /// the input carries no digits at all.
    pub fn parse(raw: &str) -> Option<Self> {
        let mut s = raw.trim();
        for scheme in ["sip:", "sips:", "tel:"] {
            // Compare bytes; `scheme.len()` can land inside a multi-byte char
            if s.len() >= scheme.len()
                && s.as_bytes()[..scheme.len()].eq_ignore_ascii_case(scheme.as_bytes())
            {
                s = &s[scheme.len()..];
                break;
            }
        }
        if let Some(at) = s.find('@') {
            s = &s[..at];
        }

        let explicit_plus = s.trim_start().starts_with('+');
        let digits: String = s.chars().filter(|c| c.is_ascii_digit()).collect();
        if digits.is_empty() {
            return None;
        }

        let canonical = if explicit_plus {
            format!("+{}", digits)
        } else if digits.len() == 10 {
            format!("+{}{}", DEFAULT_COUNTRY_CODE, digits)
        } else {
            format!("+{}", digits)
        };

        Some(Self(canonical))
    }

    /// Canonical string form, always starting with `+`
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Digits without the leading `+`
    pub fn digits(&self) -> &str {
        &self.0[1..]
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PhoneNumber {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::str::FromStr for PhoneNumber {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| Error::InvalidPhoneNumber(s.to_string()))
    }
}

impl Serialize for PhoneNumber {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for PhoneNumber {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        PhoneNumber::parse(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid phone number: {:?}", raw)))
    }
}
