//! Registry of loaded HVML documents, for resolving diagnostic spans back
//! to human-readable locations.

use crate::file_id::FileId;
use crate::resolved_span::ResolvedSpan;
use crate::source_file::SourceFile;
use crate::span::Span;
use purc_common::ContentHash;
use std::io;
use std::path::{Path, PathBuf};

/// Owns loaded document text and resolves [`FileId`] + byte offsets to
/// line/column coordinates for diagnostics.
///
/// This is deliberately separate from the parsing pipeline itself: a
/// `Frontend` parse doesn't register its source here, since the document
/// cache it consults is keyed and served by content, not by `FileId`, and
/// a cache hit has no source text to re-render a snippet from anyway. A
/// `SourceDb` is for callers that want to *render* diagnostics — `purc_cli`
/// loads the file into one right before printing — and is free to hold
/// several documents at once if a caller parses more than one file per run.
pub struct SourceDb {
    files: Vec<SourceFile>,
}

impl SourceDb {
    /// Creates an empty source database.
    pub fn new() -> Self {
        Self { files: Vec::new() }
    }

    /// Loads a source file from the filesystem and returns its [`FileId`].
    ///
    /// If `path` was already registered and its content hasn't changed
    /// since, returns the existing `FileId` rather than registering a
    /// duplicate entry — relevant for a CLI invocation that resolves spans
    /// against the same file more than once in a run.
    pub fn load_file(&mut self, path: &Path) -> Result<FileId, io::Error> {
        let content = std::fs::read_to_string(path)?;
        let hash = ContentHash::from_bytes(content.as_bytes());
        if let Some(existing) = self
            .files
            .iter()
            .find(|f| f.path == path && f.content_hash == hash)
        {
            return Ok(existing.id);
        }
        let id = FileId::from_raw(self.files.len() as u32);
        let file = SourceFile::new(id, path.to_path_buf(), content);
        self.files.push(file);
        Ok(id)
    }

    /// Adds a source file from an in-memory string (useful for tests).
    ///
    /// The `name` parameter is used as the file path in diagnostics.
    pub fn add_source(&mut self, name: impl Into<PathBuf>, content: String) -> FileId {
        let id = FileId::from_raw(self.files.len() as u32);
        let file = SourceFile::new(id, name.into(), content);
        self.files.push(file);
        id
    }

    /// Returns the [`SourceFile`] for the given [`FileId`].
    ///
    /// # Panics
    ///
    /// Panics if the `FileId` is invalid.
    pub fn get_file(&self, id: FileId) -> &SourceFile {
        &self.files[id.as_raw() as usize]
    }

    /// Resolves a [`Span`] to human-readable line/column coordinates.
    pub fn resolve_span(&self, span: Span) -> ResolvedSpan {
        let file = self.get_file(span.file);
        let (start_line, start_col) = file.line_col(span.start);
        let (end_line, end_col) = file.line_col(span.end.saturating_sub(1).max(span.start));
        ResolvedSpan {
            file_path: file.path.clone(),
            start_line,
            start_col,
            end_line,
            end_col,
        }
    }

    /// Returns the source text corresponding to a [`Span`].
    pub fn snippet(&self, span: Span) -> &str {
        let file = self.get_file(span.file);
        file.snippet(span.start, span.end)
    }
}

impl Default for SourceDb {
    fn default() -> Self {
        Self::new()
    }
}
