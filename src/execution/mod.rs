//! Execution engine: request lifecycle, wire types and result normalization.

use serde::Serialize;
use thiserror::Error;

pub mod normalize;
pub mod progress;
pub mod session;
pub mod transport;

pub use normalize::{normalize_response, FALLBACK_FAILURE_MESSAGE};
pub use progress::{ProgressPresenter, ProgressSettings};
pub use session::ExecutionSession;
pub use transport::{ExecutionTransport, HttpTransport, RawResponse};

/// Immutable snapshot of the editor text taken when a run is accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceText(String);

impl SourceText {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SourceText {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for SourceText {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Body of `POST /api/execute`.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionRequest {
    pub code: String,
}

impl ExecutionRequest {
    pub fn new(source: &SourceText) -> Self {
        Self {
            code: source.as_str().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionResult {
    Success { output: String },
    Failure { message: String },
}

impl ExecutionResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionResult::Success { .. })
    }

    /// The text shown to the user, verbatim.
    pub fn text(&self) -> &str {
        match self {
            ExecutionResult::Success { output } => output,
            ExecutionResult::Failure { message } => message,
        }
    }
}

impl From<ExecutionError> for ExecutionResult {
    fn from(err: ExecutionError) -> Self {
        ExecutionResult::Failure {
            message: err.user_message(),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    /// The request could not be sent, or the reply was not the expected shape.
    #[error("{0}")]
    Transport(String),
    /// The service itself reported a failure.
    #[error("{message}")]
    Remote { status: u16, message: String },
}

impl ExecutionError {
    pub fn transport(err: impl std::fmt::Display) -> Self {
        ExecutionError::Transport(err.to_string())
    }

    /// Transport faults get a generic prefix; remote messages are passed through as-is.
    pub fn user_message(&self) -> String {
        match self {
            ExecutionError::Transport(description) => format!("Error: {description}"),
            ExecutionError::Remote { message, .. } => message.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunState {
    #[default]
    Idle,
    Running,
}

/// Identifies one accepted run within a session.
pub type RunId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Started(RunId),
    /// A run was already in flight; nothing happened.
    AlreadyRunning,
}

/// Messages fed back into the session's event loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    ProgressTick { run: RunId },
    Finished { run: RunId, result: ExecutionResult },
}
