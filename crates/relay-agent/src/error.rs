//! Error types for relay-agent

use relay_ai::{RunId, RunStatus};
use std::time::Duration;
use thiserror::Error;

/// Result type alias using relay-agent Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while driving a conversation
#[derive(Error, Debug)]
pub enum Error {
    /// An error from the assistant service layer
    #[error(transparent)]
    Ai(#[from] relay_ai::Error),

    /// Reading or writing the session store failed
    #[error("Session store error: {0}")]
    Store(#[from] std::io::Error),

    /// The resource manifest could not be read or written
    #[error("Resource manifest error: {0}")]
    Manifest(String),

    /// Remote resources could not be prepared
    #[error("Bootstrap failed: {0}")]
    Bootstrap(String),

    /// The run stopped without completing
    #[error("Run {run_id} ended with status {status}{}", reason.as_ref().map(|r| format!(": {}", r)).unwrap_or_default())]
    RunFailed {
        run_id: RunId,
        status: RunStatus,
        reason: Option<String>,
    },

    /// The run did not complete before the poll deadline
    #[error("Run {run_id} did not complete within {waited:?}")]
    PollTimeout { run_id: RunId, waited: Duration },

    /// The interaction was cancelled by the caller
    #[error("Cancelled")]
    Cancelled,

    /// The run completed but produced no assistant message
    #[error("Run {run_id} completed without an assistant reply")]
    NoReply { run_id: RunId },
}

impl Error {
    /// Whether the error ended the interaction on purpose rather than by fault
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}
