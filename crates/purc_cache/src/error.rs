//! Error types for cache operations.

/// Errors that can occur during cache operations.
///
/// The document cache itself is fail-safe — a lookup miss is never an
/// error — but fetching the document to populate a miss can fail, and
/// those failures are reported through this type.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Fetching a URL-sourced document failed.
    #[error("failed to fetch '{url}': {reason}")]
    Fetch {
        /// The URL that failed to fetch.
        url: String,
        /// Description of the failure.
        reason: String,
    },

    /// Fetching a URL-sourced document exceeded the configured timeout.
    #[error("fetching '{url}' timed out after {timeout_secs}s")]
    FetchTimeout {
        /// The URL that timed out.
        url: String,
        /// The configured timeout, in seconds.
        timeout_secs: u32,
    },
}
