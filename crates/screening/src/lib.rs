//! Call Screening Protocol Engine
//!
//! Drives each inbound call through `New -> Answered -> Screening -> Ended`
//! in response to provider webhooks:
//! - [`Classifier`]: trusted / spam / unknown verdict (pure)
//! - [`SessionRegistry`]: per-call state with per-key locking and idle eviction
//! - [`directory`]: line policy lookup (account service, YAML fallback)
//! - [`AlertDispatcher`]: supervised fire-and-forget owner alerts
//! - [`ScreeningEngine`]: the state machine tying it together

pub mod alerts;
pub mod classifier;
pub mod directory;
pub mod engine;
pub mod outcome;
pub mod registry;

pub use alerts::{AlertDispatcher, AlertEvent};
pub use classifier::Classifier;
pub use directory::{
    create_line_directory, FallbackLineDirectory, HttpLineDirectory, StaticLineDirectory,
};
pub use engine::{route_digits, GatherRoute, ScreeningEngine};
pub use outcome::{ActionFailure, IgnoreReason, OutcomeStatus, ScreeningOutcome};
pub use registry::{RegistryConfig, SessionRegistry, SessionSlot};
