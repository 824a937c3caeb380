//! Core traits and types for the call screening engine
//!
//! This crate provides the foundational types shared by every other crate:
//! - Normalized phone numbers
//! - Line policy (the protected number and its screening preferences)
//! - Per-call session state and the stage machine vocabulary
//! - Inbound call events and outbound call-control actions
//! - Collaborator traits (line directory, call control, notifier)
//! - Error types

pub mod action;
pub mod error;
pub mod event;
pub mod line;
pub mod phone;
pub mod session;
pub mod traits;

pub use action::{CallAction, GatherSpec};
pub use error::{Error, Result};
pub use event::{CallEvent, CallEventKind, GatherStatus};
pub use line::{AlertSettings, Line};
pub use phone::PhoneNumber;
pub use session::{AlertKind, CallSession, Classification, EndReason, Stage};

pub use traits::{
    validate_call_id, CallControl, CallControlError, DirectoryError, LineDirectory, Notifier,
    NotifyError,
};
