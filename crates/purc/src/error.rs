//! Failure modes of the front-end entry points.
//!
//! A recoverable tag/VDOM error never fails a load — it's logged onto
//! [`crate::LoadedDocument::diagnostics`] and parsing continues. Only a
//! lexical abort (`next_token()` returning nothing), an I/O failure, or
//! a failed fetch reach this type.

use std::path::PathBuf;

use purc_diagnostics::Diagnostic;

/// Why a `load_from_…` call failed to produce a [`crate::LoadedDocument`].
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// Reading the source (a file, or the stream `load_from_stream` was
    /// given) failed before parsing could start.
    #[error("failed to read '{}': {source}", path.display())]
    Io {
        /// The path (or stream label) that failed to read.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Tokenization aborted on a lexical error; no document was produced.
    #[error("parsing aborted on a lexical error{}", diagnostic.as_ref().map(|d| format!(": {}", d.message)).unwrap_or_default())]
    Lexical {
        /// The tokenizer's last diagnostic, if one was recorded.
        diagnostic: Option<Diagnostic>,
    },

    /// `load_from_url` could not retrieve the document.
    #[error(transparent)]
    Fetch(#[from] purc_cache::CacheError),
}
