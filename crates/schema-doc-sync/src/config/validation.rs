//! Configuration validation.

use super::Config;
use crate::error::{Result, SyncError};
use crate::identifier::validate_identifier;

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    if config.target.host.is_empty() {
        return Err(SyncError::Config("target.host is required".into()));
    }
    if config.target.database.is_empty() {
        return Err(SyncError::Config("target.database is required".into()));
    }
    if config.target.user.is_empty() {
        return Err(SyncError::Config("target.user is required".into()));
    }
    if config.target.port == 0 {
        return Err(SyncError::Config("target.port must be non-zero".into()));
    }
    validate_identifier(&config.target.schema)
        .map_err(|e| SyncError::Config(format!("target.schema: {}", e)))?;

    if config.sync.entity_collection.trim().is_empty() {
        return Err(SyncError::Config(
            "sync.entity_collection must not be empty".into(),
        ));
    }

    if let Some(path) = &config.documentation.path {
        if path.as_os_str().is_empty() {
            return Err(SyncError::Config(
                "documentation.path must not be empty when set".into(),
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DocumentationConfig, SyncConfig, TargetConfig};
    use std::path::PathBuf;

    fn valid_config() -> Config {
        Config {
            target: TargetConfig {
                host: "localhost".to_string(),
                port: 1433,
                database: "shop".to_string(),
                user: "sa".to_string(),
                password: "password".to_string(),
                schema: "dbo".to_string(),
                encrypt: "false".to_string(),
                trust_server_cert: true,
            },
            documentation: DocumentationConfig::default(),
            sync: SyncConfig::default(),
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(validate(&valid_config()).is_ok());
    }

    #[test]
    fn test_missing_target_host() {
        let mut config = valid_config();
        config.target.host = "".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_missing_target_user() {
        let mut config = valid_config();
        config.target.user = "".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_invalid_schema() {
        let mut config = valid_config();
        config.target.schema = "".to_string();
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("target.schema"));
    }

    #[test]
    fn test_empty_entity_collection() {
        let mut config = valid_config();
        config.sync.entity_collection = "  ".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_empty_documentation_path() {
        let mut config = valid_config();
        config.documentation.path = Some(PathBuf::new());
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_target_config_debug_redacts_password() {
        let mut config = valid_config();
        config.target.password = "super_secret_password_456".to_string();
        let debug_output = format!("{:?}", config.target);
        assert!(
            debug_output.contains("[REDACTED]"),
            "Debug output should contain [REDACTED]"
        );
        assert!(
            !debug_output.contains("super_secret_password_456"),
            "Debug output should not contain actual password value"
        );
    }
}
