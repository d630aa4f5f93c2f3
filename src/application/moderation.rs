//! Content moderation seam used by the write paths.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GateError {
    /// The remote check failed or timed out.
    #[error("moderation service unavailable: {0}")]
    Unavailable(String),
    /// The circuit breaker is open; no call was attempted.
    #[error("moderation circuit open")]
    CircuitOpen,
}

/// Decides whether user-supplied text may be stored.
#[async_trait]
pub trait ContentGate: Send + Sync {
    async fn is_clean(&self, text: &str) -> Result<bool, GateError>;
}
