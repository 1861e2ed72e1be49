//! The front end's document cache.
//!
//! Provides an in-memory, MD5-keyed, TTL-expiring cache of parsed
//! documents, so loading the same URL, file, or inline string twice in one
//! process skips reparsing. See [`DocumentCache`] and [`CacheKey`].

#![warn(missing_docs)]

pub mod cache;
pub mod error;
pub mod key;

pub use cache::{DocumentCache, SourceKind};
pub use error::CacheError;
pub use key::CacheKey;
