//! Configuration validation.

use super::{Config, CopyOptions, EndpointConfig};
use crate::core::identifier::validate_identifier;
use crate::error::{CopyError, Result};
use crate::orchestrator::CopyMode;

/// Validate the configuration for a run in the given mode.
pub fn validate(config: &Config, mode: CopyMode) -> Result<()> {
    if mode.exports() {
        let source = config
            .source
            .as_ref()
            .ok_or_else(|| CopyError::Config("source endpoint is required".into()))?;
        validate_endpoint("source", source)?;
    }

    if mode.imports() {
        let target = config
            .target
            .as_ref()
            .ok_or_else(|| CopyError::Config("target endpoint is required".into()))?;
        validate_endpoint("target", target)?;
    }

    if mode.imports() && !mode.exports() && config.snapshot.path.is_none() {
        return Err(CopyError::Config(
            "snapshot.path is required for import".into(),
        ));
    }

    if mode == CopyMode::Export && config.snapshot_path().is_none() {
        return Err(CopyError::Config(
            "snapshot.path is required for export".into(),
        ));
    }

    // Copying a table onto itself would drop the source before it is read back.
    if let (CopyMode::Copy, Some(source), Some(target)) =
        (mode, config.source.as_ref(), config.target.as_ref())
    {
        if source == target {
            return Err(CopyError::Config(
                "source and target cannot be the same table".into(),
            ));
        }
    }

    validate_options(&config.options)
}

fn validate_endpoint(side: &str, endpoint: &EndpointConfig) -> Result<()> {
    if endpoint.connection_url.trim().is_empty() {
        return Err(CopyError::Config(format!(
            "{}.connection_url is required",
            side
        )));
    }
    validate_identifier(&endpoint.schema)
        .map_err(|e| CopyError::Config(format!("{}.schema: {}", side, e)))?;
    validate_identifier(&endpoint.table)
        .map_err(|e| CopyError::Config(format!("{}.table: {}", side, e)))?;
    Ok(())
}

/// Validate option values that do not depend on the run mode.
pub fn validate_options(options: &CopyOptions) -> Result<()> {
    if options.pk_marker.trim().is_empty() {
        return Err(CopyError::Config(
            "options.pk_marker cannot be empty".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn valid_config() -> Config {
        Config {
            source: Some(EndpointConfig::new(
                "Server=tcp:src,1433;Database=hr",
                "dbo",
                "Employees",
            )),
            target: Some(EndpointConfig::new(
                "Server=tcp:dst,1433;Database=hr",
                "dbo",
                "Employees",
            )),
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_copy_config() {
        assert!(validate(&valid_config(), CopyMode::Copy).is_ok());
    }

    #[test]
    fn test_copy_requires_both_endpoints() {
        let mut config = valid_config();
        config.target = None;
        assert!(validate(&config, CopyMode::Copy).is_err());
        assert!(validate(&config, CopyMode::Export).is_ok());
    }

    #[test]
    fn test_import_requires_snapshot_path() {
        let mut config = valid_config();
        config.source = None;
        assert!(validate(&config, CopyMode::Import).is_err());
        config.snapshot.path = Some(PathBuf::from("Employees.csv"));
        assert!(validate(&config, CopyMode::Import).is_ok());
    }

    #[test]
    fn test_rejects_empty_table_name() {
        let mut config = valid_config();
        if let Some(source) = config.source.as_mut() {
            source.table = String::new();
        }
        let err = validate(&config, CopyMode::Export).unwrap_err();
        assert!(err.to_string().contains("source.table"));
    }

    #[test]
    fn test_rejects_copy_onto_itself() {
        let mut config = valid_config();
        config.target = config.source.clone();
        assert!(validate(&config, CopyMode::Copy).is_err());
    }

    #[test]
    fn test_rejects_empty_pk_marker() {
        let mut config = valid_config();
        config.options.pk_marker = " ".into();
        assert!(validate(&config, CopyMode::Copy).is_err());
    }
}
