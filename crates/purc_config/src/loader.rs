//! Configuration file loading and validation.

use crate::error::ConfigError;
use crate::types::FrontEndConfig;
use std::path::Path;

/// Loads and validates a `purc.toml` configuration from a project directory.
///
/// Reads `<project_dir>/purc.toml`, parses it, and validates field values.
/// Every field of [`FrontEndConfig`] has a default, so a missing file is an
/// I/O error but an empty file is not.
pub fn load_config(project_dir: &Path) -> Result<FrontEndConfig, ConfigError> {
    let config_path = project_dir.join("purc.toml");
    let content = std::fs::read_to_string(&config_path)?;
    load_config_from_str(&content)
}

/// Parses and validates a `purc.toml` configuration from a string.
///
/// Useful for testing without filesystem dependencies.
pub fn load_config_from_str(content: &str) -> Result<FrontEndConfig, ConfigError> {
    let config: FrontEndConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

/// Validates that configuration values are internally consistent.
fn validate_config(config: &FrontEndConfig) -> Result<(), ConfigError> {
    if config.parser.max_ejson_depth == 0 {
        return Err(ConfigError::ValidationError(
            "parser.max_ejson_depth must be nonzero".to_string(),
        ));
    }
    if config.parser.cache_soft_byte_limit == 0 {
        return Err(ConfigError::ValidationError(
            "parser.cache_soft_byte_limit must be nonzero".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_minimal_config() {
        let config = load_config_from_str("").unwrap();
        assert_eq!(config.parser.max_ejson_depth, 64);
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
[parser]
max_ejson_depth = 32
url_cache_ttl_secs = 10
string_cache_ttl_secs = 100
cache_soft_byte_limit = 1048576
fetch_timeout_secs = 5
strict_quirks = true
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.parser.max_ejson_depth, 32);
        assert_eq!(config.parser.url_cache_ttl_secs, 10);
        assert_eq!(config.parser.string_cache_ttl_secs, 100);
        assert_eq!(config.parser.cache_soft_byte_limit, 1048576);
        assert_eq!(config.parser.fetch_timeout_secs, 5);
        assert!(config.parser.strict_quirks);
    }

    #[test]
    fn zero_max_depth_errors() {
        let toml = "[parser]\nmax_ejson_depth = 0\n";
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn zero_cache_limit_errors() {
        let toml = "[parser]\ncache_soft_byte_limit = 0\n";
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn invalid_toml_errors() {
        let toml = "this is not valid toml {{{}}}";
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn io_error_from_nonexistent_dir() {
        let err = load_config(Path::new("/nonexistent/dir")).unwrap_err();
        assert!(matches!(err, ConfigError::IoError(_)));
    }
}
