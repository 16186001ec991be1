//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use crate::error::Result;
use crate::orchestrator::CopyMode;
use std::path::{Path, PathBuf};

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    ///
    /// Endpoints may be left out here and supplied on the command line, so
    /// only option values are validated at this point.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        validation::validate_options(&config.options)?;
        Ok(config)
    }

    /// Validate the configuration for a run in the given mode.
    pub fn validate(&self, mode: CopyMode) -> Result<()> {
        validation::validate(self, mode)
    }

    /// Snapshot path for this run.
    ///
    /// An explicit path wins; otherwise the snapshot is named after the
    /// source table inside the snapshot directory.
    pub fn snapshot_path(&self) -> Option<PathBuf> {
        if let Some(path) = &self.snapshot.path {
            return Some(path.clone());
        }
        self.source
            .as_ref()
            .map(|s| self.snapshot.dir.join(format!("{}.csv", s.table)))
    }
}

/// Mask secrets in a JDBC or ADO.NET connection string.
///
/// Every `password=` / `pwd=` key keeps its name and loses its value.
pub fn redact_connection_url(url: &str) -> String {
    url.split(';')
        .map(|part| match part.split_once('=') {
            Some((key, _)) if is_secret_key(key) => format!("{}=[REDACTED]", key),
            _ => part.to_string(),
        })
        .collect::<Vec<_>>()
        .join(";")
}

fn is_secret_key(key: &str) -> bool {
    let key = key.trim().to_ascii_lowercase();
    key == "password" || key == "pwd"
}
