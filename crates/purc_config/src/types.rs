//! Configuration types deserialized from `purc.toml`.

use serde::Deserialize;

/// The parser configuration, controlling resource limits and cache policy
/// for a front-end session.
///
/// Every field has a default matching the values the front end uses when
/// no configuration file is present, so a bare `[parser]` section (or no
/// file at all) is always valid.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Maximum nesting depth the eJSON/JSONEE sub-parser will descend to
    /// before emitting `MAX_DEPTH_EXCEEDED` and aborting the current
    /// expression.
    pub max_ejson_depth: u32,
    /// How long a URL-fetched document stays valid in the document cache,
    /// in seconds.
    pub url_cache_ttl_secs: u64,
    /// How long a string- or file-sourced document stays valid in the
    /// document cache, in seconds.
    pub string_cache_ttl_secs: u64,
    /// Soft limit, in bytes, on the total size of cached document content.
    /// Once exceeded, least-recently-used entries are evicted until the
    /// cache is back under the limit.
    pub cache_soft_byte_limit: u64,
    /// Timeout, in seconds, for fetching a document from a URL.
    pub fetch_timeout_secs: u32,
    /// When `true`, treats a missing or non-HVML-conformant `DOCTYPE` as a
    /// parse error rather than a recoverable warning.
    pub strict_quirks: bool,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            max_ejson_depth: 64,
            url_cache_ttl_secs: 60,
            string_cache_ttl_secs: 3600,
            cache_soft_byte_limit: 16 * 1024 * 1024,
            fetch_timeout_secs: 30,
            strict_quirks: false,
        }
    }
}

/// The top-level configuration parsed from `purc.toml`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FrontEndConfig {
    /// Parser resource limits and cache policy.
    pub parser: ParserConfig,
}

impl Default for FrontEndConfig {
    fn default() -> Self {
        Self {
            parser: ParserConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::load_config_from_str;

    #[test]
    fn defaults_match_spec() {
        let config = ParserConfig::default();
        assert_eq!(config.max_ejson_depth, 64);
        assert_eq!(config.url_cache_ttl_secs, 60);
        assert_eq!(config.string_cache_ttl_secs, 3600);
        assert_eq!(config.cache_soft_byte_limit, 16 * 1024 * 1024);
        assert_eq!(config.fetch_timeout_secs, 30);
        assert!(!config.strict_quirks);
    }

    #[test]
    fn empty_document_uses_defaults() {
        let config = load_config_from_str("").unwrap();
        assert_eq!(config, FrontEndConfig::default());
    }

    #[test]
    fn partial_override() {
        let toml = r#"
[parser]
max_ejson_depth = 128
strict_quirks = true
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.parser.max_ejson_depth, 128);
        assert!(config.parser.strict_quirks);
        assert_eq!(config.parser.url_cache_ttl_secs, 60);
    }
}
