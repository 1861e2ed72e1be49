//! Source file management, span tracking, and the streaming character
//! reader.
//!
//! This crate provides [`SourceDb`] for loading and managing whole source
//! files, [`FileId`] and [`Span`] for tracking source locations,
//! [`ResolvedSpan`] for converting byte offsets to human-readable
//! line/column coordinates, and [`Reader`] for streaming, position-tracked
//! UTF-8 decoding with one-character lookback.

#![warn(missing_docs)]

pub mod file_id;
pub mod reader;
pub mod resolved_span;
pub mod source_db;
pub mod source_file;
pub mod span;

pub use file_id::FileId;
pub use reader::{InvalidUtf8, PositionedChar, Reader, ReaderPos};
pub use resolved_span::ResolvedSpan;
pub use source_db::SourceDb;
pub use source_file::SourceFile;
pub use span::Span;
