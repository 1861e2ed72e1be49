//! Public front-end entry points.
//!
//! [`load_from_stream`] runs the parsing pipeline — tokenizer
//! (`purc_tokenizer`) feeding the insertion-mode generator (`purc_vdom`)
//! — over a byte stream. [`Frontend`] wraps it with the MD5-keyed
//! document cache (`purc_cache`) that
//! `load_from_string`/`load_from_file`/`load_from_url` consult.
//!
//! This crate performs no network I/O itself: `load_from_url` takes a
//! caller-supplied [`UrlFetcher`], matching the non-goal that the parser
//! core never reaches out to the network on its own.

#![warn(missing_docs)]

mod document;
mod error;
mod fetcher;
mod frontend;

pub use document::LoadedDocument;
pub use error::LoadError;
pub use fetcher::{FetchResponse, UrlFetcher};
pub use frontend::{load_from_stream, Frontend};
/// Alias for the cache crate's fetch-failure type, reused here rather
/// than duplicating an identical set of variants.
pub use purc_cache::CacheError as FetchError;
