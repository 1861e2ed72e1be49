//! Content-addressed cache keys.

use md5::{Digest, Md5};
use std::fmt;

/// An MD5 digest used as a document cache key.
///
/// MD5 (not the faster XXH3 used elsewhere, see
/// [`purc_common::ContentHash`]) is used for the document cache's key
/// format, since cache keys are derived from externally-visible input
/// (a URL string or file content) rather than used for internal
/// change-detection.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct CacheKey([u8; 16]);

impl CacheKey {
    /// Computes a cache key from raw bytes (a URL string, a file's
    /// content, or an inline HVML string).
    pub fn from_bytes(data: &[u8]) -> Self {
        let mut hasher = Md5::new();
        hasher.update(data);
        let digest = hasher.finalize();
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&digest);
        Self(bytes)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}
