//! Line directory trait

use async_trait::async_trait;
use thiserror::Error;

use crate::{Line, PhoneNumber};

#[derive(Error, Debug)]
pub enum DirectoryError {
    #[error("Line directory unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid line data: {0}")]
    InvalidData(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Resolves a public number to its line policy.
///
/// `Ok(None)` means the number is not provisioned; that is a normal
/// outcome, not an error.
#[async_trait]
pub trait LineDirectory: Send + Sync {
    async fn resolve(&self, public_number: &PhoneNumber) -> Result<Option<Line>, DirectoryError>;

    /// Short label for logs and readiness output
    fn kind(&self) -> &'static str;
}
