//! Coordinator configuration via `strata-mapper.toml`
//!
//! A default file is written on first start. To change settings, edit the
//! file and restart the process.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use strata_concurrency::{Propagation, TransactionDefinition, DEFAULT_QUEUE_DEPTH};
use strata_core::{Error, Result};

/// Config file name.
pub const CONFIG_FILE_NAME: &str = "strata-mapper.toml";

/// Coordinator configuration loaded from `strata-mapper.toml`.
///
/// # Example
///
/// ```toml
/// propagation = "required"
/// timeout_secs = 30
/// reclaim_queue_depth = 4096
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Default propagation when a caller passes no definition.
    #[serde(default)]
    pub propagation: Propagation,
    /// Seconds an unattended transaction may hold its session; `0` disables.
    #[serde(default)]
    pub timeout_secs: u64,
    /// Maximum number of armed reclamation timers.
    #[serde(default = "default_queue_depth")]
    pub reclaim_queue_depth: usize,
}

fn default_queue_depth() -> usize {
    DEFAULT_QUEUE_DEPTH
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            propagation: Propagation::Required,
            timeout_secs: 0,
            reclaim_queue_depth: default_queue_depth(),
        }
    }
}

impl CoordinatorConfig {
    /// The definition applied when a caller passes none.
    pub fn definition(&self) -> TransactionDefinition {
        TransactionDefinition::new(self.propagation).with_timeout(Duration::from_secs(self.timeout_secs))
    }

    /// Check values serde cannot.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if `reclaim_queue_depth` is zero.
    pub fn validate(&self) -> Result<()> {
        if self.reclaim_queue_depth == 0 {
            return Err(Error::config(
                "reclaim_queue_depth must be at least 1",
            ));
        }
        Ok(())
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# strata-mapper coordinator configuration
#
# Propagation when a caller passes no definition:
#   "required"  = join the existing transaction or begin a new one (default)
#   "supports"  = join an existing transaction, otherwise run in auto-commit
#   "mandatory" = join an existing transaction, fail if there is none
propagation = "required"

# Seconds an unattended transaction may hold its session before it is
# rolled back and released. 0 disables reclamation.
timeout_secs = 0

# Maximum number of armed reclamation timers.
reclaim_queue_depth = 4096
"#
    }

    /// Parse config from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the text cannot be parsed or is invalid.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: CoordinatorConfig = toml::from_str(content)
            .map_err(|e| Error::config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content).map_err(|e| match e {
            Error::Config { reason } => {
                Error::config(format!("{} ({})", reason, path.display()))
            }
            other => other,
        })
    }

    /// Write the default config file if it does not already exist.
    ///
    /// Returns `Ok(())` whether the file was created or already existed.
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|e| {
                Error::config(format!(
                    "Failed to write default config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content).map_err(|e| {
            Error::config(format!(
                "Failed to write config file '{}': {}",
                path.display(),
                e
            ))
        })
    }
}
