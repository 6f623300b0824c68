//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use crate::error::Result;
use std::path::Path;
use tracing::warn;

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }
}

impl ConnectionConfig {
    /// Build the ODBC connection string.
    ///
    /// An endpoint containing `=` is taken as a connection string and
    /// extended with the credentials; anything else is a DSN name.
    pub fn connection_string(&self) -> String {
        let base = if self.endpoint.contains('=') {
            self.endpoint.trim().trim_end_matches(';').to_string()
        } else {
            format!("DSN={}", odbc_value(self.endpoint.trim()))
        };
        format!(
            "{};UID={};PWD={}",
            base,
            odbc_value(&self.user),
            odbc_value(&self.secret)
        )
    }
}

/// Brace-quote an attribute value when it would break the key/value syntax.
fn odbc_value(value: &str) -> String {
    let needs_quoting = value.contains([';', '{', '}'])
        || value.starts_with(' ')
        || value.ends_with(' ');
    if needs_quoting {
        format!("{{{}}}", value.replace('}', "}}"))
    } else {
        value.to_string()
    }
}

/// Parse a user-supplied batch size, falling back to the default on
/// unparsable or non-positive input.
pub fn parse_batch_size(input: Option<&str>, default: usize) -> usize {
    let Some(raw) = input.map(str::trim).filter(|s| !s.is_empty()) else {
        return default;
    };
    match raw.parse::<i64>() {
        Ok(n) if n > 0 => n as usize,
        _ => {
            warn!("Invalid batch size {:?}; using {}", raw, default);
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    const YAML: &str = r#"
source:
  endpoint: ORCL_SRC
  user: scott
  password: "tiger;1"
  schema: hr
target:
  endpoint: "Driver={Oracle 21 ODBC driver};Dbq=//db:1521/XEPDB1;"
  user: stage
  secret: s3cret
  schema: stage
migration:
  workers: 3
  tables: [EMP, DEPT]
"#;

    #[test]
    fn test_from_yaml_with_defaults() {
        let config = Config::from_yaml(YAML).unwrap();
        assert_eq!(config.source.secret, "tiger;1");
        assert_eq!(config.migration.workers(), 3);
        assert_eq!(config.migration.batch_size(), 1000);
        assert_eq!(config.migration.fetch_size(), 1000);
        assert_eq!(
            config.migration.tables.as_deref(),
            Some(&["EMP".to_string(), "DEPT".to_string()][..])
        );
    }

    #[test]
    fn test_load_from_file() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), YAML).unwrap();
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.target.schema, "stage");
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let err = Config::load("/nonexistent/oracle-migrate.yaml").unwrap_err();
        assert!(matches!(err, crate::error::MigrateError::Io(_)));
    }

    #[test]
    fn test_connection_strings() {
        let config = Config::from_yaml(YAML).unwrap();
        assert_eq!(
            config.source.connection_string(),
            "DSN=ORCL_SRC;UID=scott;PWD={tiger;1}"
        );
        assert_eq!(
            config.target.connection_string(),
            "Driver={Oracle 21 ODBC driver};Dbq=//db:1521/XEPDB1;UID=stage;PWD=s3cret"
        );
    }

    #[test]
    fn test_debug_redacts_secret() {
        let config = Config::from_yaml(YAML).unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("s3cret"));
        assert!(!debug.contains("tiger"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_parse_batch_size() {
        assert_eq!(parse_batch_size(Some("500"), 1000), 500);
        assert_eq!(parse_batch_size(Some(" 250 "), 1000), 250);
        assert_eq!(parse_batch_size(Some("abc"), 1000), 1000);
        assert_eq!(parse_batch_size(Some("0"), 1000), 1000);
        assert_eq!(parse_batch_size(Some("-5"), 1000), 1000);
        assert_eq!(parse_batch_size(Some(""), 1000), 1000);
        assert_eq!(parse_batch_size(None, 1000), 1000);
    }
}
