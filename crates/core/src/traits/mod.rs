//! Collaborator traits
//!
//! The screening engine talks to the outside world only through these:
//! - [`LineDirectory`] resolves a dialed number to its [`crate::Line`]
//! - [`CallControl`] issues actions against the telephony provider
//! - [`Notifier`] sends text alerts to the line owner

mod call_control;
mod directory;
mod notifier;

pub use call_control::{validate_call_id, CallControl, CallControlError};
pub use directory::{DirectoryError, LineDirectory};
pub use notifier::{Notifier, NotifyError};
