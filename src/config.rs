// In: src/config.rs

//! The single source of truth for exchange-layer configuration.
//!
//! `ExchangeConfig` is created once at the application boundary (from defaults,
//! the environment, or a JSON document) and handed to the library loader and to
//! every `Session`. Sessions keep their own copy; nothing reads configuration
//! from global state after that point.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::ExchangeError;

/// Environment variable overriding the directory (or file) of the engine library.
pub const LIBRARY_PATH_ENV: &str = "GMT_LIBRARY_PATH";

//==================================================================================
// I. The Unified ExchangeConfig
//==================================================================================

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ExchangeConfig {
    /// Directory containing the engine shared library, or the library file itself.
    /// Searched before any other location.
    #[serde(default)]
    pub library_path: Option<PathBuf>,

    /// If true, `gmt-config --libs` is consulted for the library directory.
    #[serde(default = "default_true")]
    pub use_gmt_config: bool,

    /// Tag passed to the engine when a session is created.
    #[serde(default = "default_session_name")]
    pub session_name: String,

    /// Padding (in nodes) the engine applies around grids it allocates.
    /// `None` uses the engine's own `GMT_PAD_DEFAULT`.
    #[serde(default)]
    pub pad: Option<u32>,

    /// Diagnostic lines containing this marker are retained for error messages.
    #[serde(default = "default_error_marker")]
    pub error_marker: String,

    /// If true, opening a session fails when the engine is older than
    /// `minimum_version`.
    #[serde(default = "default_true")]
    pub check_version: bool,

    #[serde(default = "default_minimum_version")]
    pub minimum_version: String,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            library_path: None,
            use_gmt_config: true,
            session_name: default_session_name(),
            pad: None,
            error_marker: default_error_marker(),
            check_version: true,
            minimum_version: default_minimum_version(),
        }
    }
}

impl ExchangeConfig {
    /// Defaults, with `library_path` taken from `GMT_LIBRARY_PATH` when set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(path) = std::env::var_os(LIBRARY_PATH_ENV) {
            if !path.is_empty() {
                config.library_path = Some(PathBuf::from(path));
            }
        }
        config
    }

    /// Parses a JSON document; absent fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ExchangeError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Helper for `serde` to default a boolean field to true.
fn default_true() -> bool {
    true
}

fn default_session_name() -> String {
    "gmt-exchange-session".to_string()
}

fn default_error_marker() -> String {
    "[ERROR]".to_string()
}

fn default_minimum_version() -> String {
    "6.4.0".to_string()
}
