//! Pass configuration
//!
//! `PassOptions` is threaded unchanged into every side-effect query the
//! optimizer makes. `Config` is the on-disk form (`arbor.toml`):
//!
//! ```toml
//! max_iterations = 4
//!
//! [options]
//! ignore_implicit_traps = true
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ArborError, Result};

/// Options controlling how conservative the analyses are
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PassOptions {
    /// Treat loads, stores, integer division and float truncation as if they
    /// could never trap
    pub ignore_implicit_traps: bool,
}

/// Runner configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub options: PassOptions,
    /// Cap on fixed-point iterations per function
    pub max_iterations: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            options: PassOptions::default(),
            max_iterations: 10,
        }
    }
}

impl Config {
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| ArborError::config_error(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ArborError::io_error(format!("{}: {e}", path.display())))?;
        Self::from_toml(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.max_iterations, 10);
        assert!(!config.options.ignore_implicit_traps);
    }

    #[test]
    fn test_config_overrides() {
        let config = Config::from_toml("max_iterations = 3\n[options]\nignore_implicit_traps = true\n").unwrap();
        assert_eq!(config.max_iterations, 3);
        assert!(config.options.ignore_implicit_traps);
    }

    #[test]
    fn test_config_rejects_bad_types() {
        let err = Config::from_toml("max_iterations = \"many\"").unwrap_err();
        assert!(matches!(err, ArborError::Config { .. }));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = Config::load(Path::new("/nonexistent/arbor.toml")).unwrap_err();
        assert!(matches!(err, ArborError::Io { .. }));
    }
}
