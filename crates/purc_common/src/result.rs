//! The internal-error/user-diagnostic split used throughout the front end.

/// The standard result type for fallible internal operations.
///
/// `Ok` contains the result value (which may be partial or degraded after
/// error recovery). `Err` indicates an unrecoverable internal error — a bug
/// in PurC, not a problem with the HVML source being parsed. User-facing
/// parse and VDOM errors are reported through a `DiagnosticSink` instead,
/// and the producing operation still returns `Ok`.
pub type PurcResult<T> = Result<T, InternalError>;

/// An internal error indicating a bug in PurC, not a user input problem.
///
/// These should never occur during normal operation; if one does, it
/// means an internal invariant was violated.
#[derive(Debug, thiserror::Error)]
#[error("internal error: {message}")]
pub struct InternalError {
    /// Description of the internal error.
    pub message: String,
}

impl InternalError {
    /// Creates a new internal error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<String> for InternalError {
    fn from(message: String) -> Self {
        Self { message }
    }
}
