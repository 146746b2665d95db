//! Error types for command execution

use std::sync::Arc;

use thiserror::Error;

use crate::output::ProcessResult;

/// Unified error type for command execution
///
/// Every clone of a [`CommandFuture`](crate::CommandFuture) observes the same
/// outcome, so the error is cheaply cloneable.
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// The process ran and exited with a nonzero status
    #[error("{}", .0.message())]
    NonZeroExit(Box<ProcessResult>),

    /// The process was terminated by a signal
    #[error("{}", .0.message())]
    Signaled(Box<ProcessResult>),

    /// The shell (or the command) could not be launched
    #[error("failed to spawn process: {reason}")]
    SpawnFailed {
        /// The reason for the spawn failure
        reason: String,
    },

    /// A pipe was configured in a way that cannot work
    #[error("invalid pipe: {reason}")]
    PipeMisuse {
        /// What was wrong with the pipe
        reason: String,
    },

    /// A command template did not match its arguments
    #[error("invalid command template: {reason}")]
    Template {
        /// What was wrong with the template
        reason: String,
    },

    /// The process-wide configuration was installed twice
    #[error("the global shell configuration is already initialized")]
    AlreadyInitialized,

    /// Listing or signalling processes failed
    #[error(transparent)]
    ProcessTree(Arc<process_tree::Error>),

    /// I/O error
    #[error(transparent)]
    Io(Arc<std::io::Error>),
}

impl Error {
    /// Create a spawn failed error
    pub fn spawn_failed(reason: impl Into<String>) -> Self {
        Self::SpawnFailed {
            reason: reason.into(),
        }
    }

    /// Create a pipe misuse error
    pub fn pipe_misuse(reason: impl Into<String>) -> Self {
        Self::PipeMisuse {
            reason: reason.into(),
        }
    }

    /// Create a template error
    pub fn template(reason: impl Into<String>) -> Self {
        Self::Template {
            reason: reason.into(),
        }
    }

    /// The captured outcome, when the process actually ran
    pub fn result(&self) -> Option<&ProcessResult> {
        match self {
            Error::NonZeroExit(result) | Error::Signaled(result) => Some(&**result),
            _ => None,
        }
    }

    /// Exit code of the failed process, if it ran and exited normally
    pub fn exit_code(&self) -> Option<i32> {
        self.result().and_then(ProcessResult::exit_code)
    }

    /// Whether this failure is worth another attempt by [`Retry`](crate::Retry)
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::NonZeroExit(_) | Error::Signaled(_))
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(Arc::new(e))
    }
}

impl From<process_tree::Error> for Error {
    fn from(e: process_tree::Error) -> Self {
        Self::ProcessTree(Arc::new(e))
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
