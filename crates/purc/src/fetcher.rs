//! The URL-fetching collaborator `load_from_url` delegates to.
//!
//! URL input is treated opaquely: the core requests bytes via an abstract
//! fetcher collaborator. This crate performs no network I/O itself and
//! ships no [`UrlFetcher`] implementation — the caller supplies one.

use purc_cache::CacheError;

/// A successful fetch: a status code, a response body, and an optional
/// MIME type. Only a 2xx `status` is accepted by [`crate::Frontend::load_from_url`];
/// anything else is turned into an error before parsing is attempted.
pub struct FetchResponse {
    /// The HTTP-style status code.
    pub status: u16,
    /// The raw response body.
    pub body: Vec<u8>,
    /// The response's declared MIME type, if any.
    pub mime: Option<String>,
}

/// Fetches the bytes behind a URL.
///
/// Implementations own all networking, TLS, and redirect policy; this
/// crate only calls `fetch` and interprets the result.
pub trait UrlFetcher {
    /// Fetches `url`, aborting after `timeout_s` seconds.
    fn fetch(&self, url: &str, timeout_s: u32) -> Result<FetchResponse, CacheError>;
}
