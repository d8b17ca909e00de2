//! Error types for the injector boundary and the command relay.

use std::time::Duration;

use thiserror::Error;

use crate::audio::FileError;

/// Which relay operation an error or result belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Injection,
    Cancellation,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::Injection => write!(f, "injection"),
            Operation::Cancellation => write!(f, "cancellation"),
        }
    }
}

/// Failures at the native library boundary.
#[derive(Debug, Error)]
pub enum InjectorError {
    #[error("{library} not found. Ensure the DLL is in the application directory.")]
    LibraryNotFound { library: String, reason: String },

    #[error("The {symbol} function was not found in {library}.")]
    EntryPointNotFound { symbol: &'static str, library: String, reason: String },

    #[error("The {field} contains a NUL character and cannot be passed to the injector library.")]
    InvalidString { field: &'static str },
}

impl InjectorError {
    /// Loader detail behind the user-facing message, if any.
    pub fn reason(&self) -> Option<&str> {
        match self {
            InjectorError::LibraryNotFound { reason, .. } | InjectorError::EntryPointNotFound { reason, .. } => Some(reason.as_str()),
            InjectorError::InvalidString { .. } => None,
        }
    }
}

/// Errors reported by the command relay.
///
/// The `Display` text is the message shown to the user.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Please select an audio file first.")]
    MissingAudioFile,

    #[error("Please select a capture device.")]
    MissingDevice,

    #[error(transparent)]
    File(#[from] FileError),

    #[error("Error during audio {op}: {source}")]
    Boundary {
        op: Operation,
        #[source]
        source: InjectorError,
    },

    #[error("Error during audio {op}: the injector library did not return within {}", humanize(.after))]
    TimedOut { op: Operation, after: Duration },

    #[error("Error during audio {op}: {reason}")]
    Worker { op: Operation, reason: String },
}

fn humanize(duration: &Duration) -> String {
    if duration.subsec_millis() == 0 {
        format!("{}s", duration.as_secs())
    } else {
        format!("{}ms", duration.as_millis())
    }
}
