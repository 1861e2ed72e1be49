//! Parsing and validation of `purc.toml` front-end configuration files.
//!
//! This crate reads the optional project configuration file and produces a
//! strongly-typed [`FrontEndConfig`], falling back to documented defaults
//! for every field that is absent.

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod types;

pub use error::ConfigError;
pub use loader::{load_config, load_config_from_str};
pub use types::{FrontEndConfig, ParserConfig};
