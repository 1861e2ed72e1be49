//! The result of a successful front-end load: a document plus whatever
//! recoverable diagnostics were logged while building it.

use purc_diagnostics::Diagnostic;
use purc_vdom::Document;

/// A parsed document and the diagnostics accumulated while parsing it.
///
/// Recoverable tag/VDOM errors are logged here and parsing continues;
/// only a lexical abort returns [`crate::LoadError`] instead of a
/// [`LoadedDocument`] — a document reaching this struct always finished
/// parsing, even if `diagnostics` is non-empty.
#[derive(Debug)]
pub struct LoadedDocument {
    /// The parsed document tree.
    pub document: Document,
    /// Every diagnostic logged while parsing, in emission order.
    pub diagnostics: Vec<Diagnostic>,
    /// Byte length of the source text this document was parsed from, used
    /// as the document cache's per-entry size for its soft byte limit.
    pub(crate) source_len: usize,
}

impl LoadedDocument {
    /// `true` if any diagnostic logged during parsing was error-severity.
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.severity.is_error())
    }

    /// The source byte length this document counts as, for cache accounting.
    pub fn byte_size(&self) -> u64 {
        self.source_len as u64
    }
}
