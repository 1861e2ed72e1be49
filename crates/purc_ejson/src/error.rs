//! The sub-parser's abort signal.

use purc_diagnostics::ErrorKind;
use purc_source::Span;
use std::fmt;

/// Raised when the eJSON/JSONEE sub-parser cannot continue building the
/// current tree.
///
/// The triggering [`purc_diagnostics::Diagnostic`] has already been pushed
/// onto the sink; this type exists so callers (and tests) can inspect what
/// happened without re-reading the sink.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct EjsonError {
    /// The error kind that aborted parsing.
    pub kind: ErrorKind,
    /// The span at which the error was detected.
    pub span: Span,
}

impl EjsonError {
    pub(crate) fn new(kind: ErrorKind, span: Span) -> Self {
        Self { kind, span }
    }
}

impl fmt::Display for EjsonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind.name())
    }
}

impl std::error::Error for EjsonError {}
