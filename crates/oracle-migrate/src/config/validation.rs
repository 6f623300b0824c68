//! Configuration validation.

use super::{Config, ConnectionConfig};
use crate::error::{MigrateError, Result};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    validate_connection("source", &config.source)?;
    validate_connection("target", &config.target)?;

    if let Some(0) = config.migration.workers {
        return Err(MigrateError::Config(
            "migration.workers must be at least 1".into(),
        ));
    }
    if let Some(0) = config.migration.batch_size {
        return Err(MigrateError::Config(
            "migration.batch_size must be at least 1".into(),
        ));
    }
    if let Some(0) = config.migration.fetch_size {
        return Err(MigrateError::Config(
            "migration.fetch_size must be at least 1".into(),
        ));
    }

    Ok(())
}

fn validate_connection(side: &str, conn: &ConnectionConfig) -> Result<()> {
    if conn.endpoint.trim().is_empty() {
        return Err(MigrateError::Config(format!("{side}.endpoint is required")));
    }
    if conn.user.trim().is_empty() {
        return Err(MigrateError::Config(format!("{side}.user is required")));
    }
    if conn.schema.trim().is_empty() {
        return Err(MigrateError::Config(format!("{side}.schema is required")));
    }
    crate::core::identifier::validate_identifier(&conn.schema)
        .map_err(|e| MigrateError::Config(format!("{side}.schema: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MigrationConfig;

    fn valid_config() -> Config {
        Config {
            source: ConnectionConfig {
                endpoint: "ORCL".to_string(),
                user: "scott".to_string(),
                secret: "tiger".to_string(),
                schema: "hr".to_string(),
            },
            target: ConnectionConfig {
                endpoint: "ORCL".to_string(),
                user: "stage".to_string(),
                secret: "stage".to_string(),
                schema: "stage".to_string(),
            },
            migration: MigrationConfig::default(),
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(validate(&valid_config()).is_ok());
    }

    #[test]
    fn test_missing_source_endpoint() {
        let mut config = valid_config();
        config.source.endpoint = "  ".to_string();
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("source.endpoint is required"));
    }

    #[test]
    fn test_missing_target_schema() {
        let mut config = valid_config();
        config.target.schema = String::new();
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("target.schema is required"));
    }

    #[test]
    fn test_quoted_schema_rejected() {
        let mut config = valid_config();
        config.target.schema = "st\"age".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_empty_secret_allowed() {
        let mut config = valid_config();
        config.source.secret = String::new();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_zero_workers_rejected() {
        let mut config = valid_config();
        config.migration.workers = Some(0);
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_zero_batch_and_fetch_rejected() {
        let mut config = valid_config();
        config.migration.batch_size = Some(0);
        assert!(validate(&config).is_err());

        let mut config = valid_config();
        config.migration.fetch_size = Some(0);
        assert!(validate(&config).is_err());
    }
}
