//! Error types for process listing and signalling

use crate::signal::Signal;
use thiserror::Error;

/// Errors raised while listing or signalling processes
#[derive(Error, Debug)]
pub enum Error {
    /// The process listing command could not be run or failed
    #[error("failed to list processes: {reason}")]
    ListFailed {
        /// Why the listing failed
        reason: String,
    },

    /// A line of the process listing could not be understood
    #[error("unparseable process listing line: {line:?}")]
    Parse {
        /// The offending line
        line: String,
    },

    /// The target process does not exist (anymore)
    #[error("no such process: {pid}")]
    NoSuchProcess {
        /// The pid that was signalled
        pid: u32,
    },

    /// Delivering a signal failed for another reason
    #[error("failed to send {signal} to process {pid}: {reason}")]
    SignalFailed {
        /// The pid that was signalled
        pid: u32,
        /// The signal that could not be delivered
        signal: Signal,
        /// The reason reported by the OS
        reason: String,
    },

    /// I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn list_failed(reason: impl Into<String>) -> Self {
        Self::ListFailed {
            reason: reason.into(),
        }
    }

    pub(crate) fn parse(line: impl Into<String>) -> Self {
        Self::Parse { line: line.into() }
    }

    pub(crate) fn signal_failed(pid: u32, signal: Signal, reason: impl Into<String>) -> Self {
        Self::SignalFailed {
            pid,
            signal,
            reason: reason.into(),
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
