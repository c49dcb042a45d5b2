//! Configuration loading and validation.
//!
//! Settings come either from a YAML file or from the process environment
//! (optionally seeded from a `.env` file). They are read once at startup;
//! request handling only ever sees the resulting immutable [`Settings`].

mod types;
mod validation;

pub use types::*;

use std::path::Path;
use std::str::FromStr;

use crate::error::{MigrateError, Result};

impl Settings {
    /// Load settings from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse settings from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let settings: Settings = serde_yaml::from_str(yaml)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Build settings from the process environment.
    ///
    /// A `.env` file in the working directory is loaded first when present.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Settings::default();

        let source = &mut settings.source;
        if let Some(v) = lookup("MYSQL_HOST") {
            source.host = v;
        }
        if let Some(v) = lookup("MYSQL_PORT") {
            source.port = parse_var("MYSQL_PORT", &v)?;
        }
        if let Some(v) = lookup("MYSQL_DATABASE") {
            source.database = v;
        }
        if let Some(v) = lookup("MYSQL_USER") {
            source.user = v;
        }
        if let Some(v) = lookup("MYSQL_PASSWORD") {
            source.password = v;
        }

        let postgres = &mut settings.postgres;
        if let Some(v) = lookup("POSTGRES_HOST") {
            postgres.host = v;
        }
        if let Some(v) = lookup("POSTGRES_PORT") {
            postgres.port = parse_var("POSTGRES_PORT", &v)?;
        }
        if let Some(v) = lookup("POSTGRES_DB") {
            postgres.database = v;
        }
        if let Some(v) = lookup("POSTGRES_USER") {
            postgres.user = v;
        }
        if let Some(v) = lookup("POSTGRES_PASSWORD") {
            postgres.password = v;
        }
        if let Some(v) = lookup("POSTGRES_SCHEMA") {
            postgres.schema = v;
        }
        if let Some(v) = lookup("POSTGRES_SSLMODE") {
            postgres.ssl_mode = v;
        }

        if let Some(v) = lookup("MONGO_URI") {
            settings.mongodb.uri = v;
        }
        if let Some(v) = lookup("MONGO_DATABASE") {
            settings.mongodb.database = v;
        }

        if let Some(v) = lookup("DEBUG") {
            settings.debug = v.eq_ignore_ascii_case("true");
        }
        if let Some(v) = lookup("LOG_LEVEL") {
            settings.log_level = v.to_lowercase();
        }

        settings.validate()?;
        Ok(settings)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }
}

fn parse_var<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| MigrateError::Config(format!("{} has an invalid value: '{}'", key, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_environment_is_empty() {
        let settings = Settings::from_lookup(|_| None).unwrap();
        assert_eq!(settings.source.host, "localhost");
        assert_eq!(settings.source.port, 3306);
        assert_eq!(settings.postgres.port, 5432);
        assert_eq!(settings.postgres.schema, "public");
        assert_eq!(settings.mongodb.uri, "mongodb://localhost:27017/");
        assert!(!settings.debug);
        assert_eq!(settings.log_level, "info");
    }

    #[test]
    fn test_environment_overrides() {
        let settings = Settings::from_lookup(lookup_from(&[
            ("MYSQL_HOST", "mysql.internal"),
            ("MYSQL_PORT", "3307"),
            ("MYSQL_DATABASE", "shop"),
            ("POSTGRES_DB", "warehouse"),
            ("MONGO_DATABASE", "archive"),
            ("DEBUG", "True"),
            ("LOG_LEVEL", "WARN"),
        ]))
        .unwrap();

        assert_eq!(settings.source.host, "mysql.internal");
        assert_eq!(settings.source.port, 3307);
        assert_eq!(settings.source.database, "shop");
        assert_eq!(settings.postgres.database, "warehouse");
        assert_eq!(settings.mongodb.database, "archive");
        assert!(settings.debug);
        assert_eq!(settings.log_level, "warn");
        assert_eq!(settings.effective_log_level(), "debug");
    }

    #[test]
    fn test_invalid_port_in_environment() {
        let err = Settings::from_lookup(lookup_from(&[("POSTGRES_PORT", "fivefourthreetwo")]))
            .unwrap_err();
        assert!(matches!(err, MigrateError::Config(_)));
        assert!(err.to_string().contains("POSTGRES_PORT"));
    }

    #[test]
    fn test_from_yaml_partial_sections() {
        let yaml = r#"
source:
  host: db.example.com
  database: shop
  user: reader
  password: secret
mongodb:
  database: archive
"#;
        let settings = Settings::from_yaml(yaml).unwrap();
        assert_eq!(settings.source.host, "db.example.com");
        assert_eq!(settings.source.port, 3306);
        assert_eq!(settings.postgres.host, "localhost");
        assert_eq!(settings.mongodb.database, "archive");
        assert_eq!(settings.mongodb.uri, "mongodb://localhost:27017/");
    }

    #[test]
    fn test_from_yaml_accepts_prefixed_source_fields() {
        let yaml = r#"
source:
  mysql_host: legacy.example.com
  mysql_port: 3310
  mysql_database: shop
  mysql_user: reader
  mysql_password: secret
"#;
        let settings = Settings::from_yaml(yaml).unwrap();
        assert_eq!(settings.source.host, "legacy.example.com");
        assert_eq!(settings.source.port, 3310);
    }

    #[test]
    fn test_from_yaml_rejects_invalid_log_level() {
        let result = Settings::from_yaml("log_level: chatty\n");
        assert!(matches!(result, Err(MigrateError::Config(_))));
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let result = Settings::load("definitely_not_here.yaml");
        assert!(matches!(result, Err(MigrateError::Io(_))));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "postgres:").unwrap();
        writeln!(file, "  database: warehouse").unwrap();
        writeln!(file, "  ssl_mode: disable").unwrap();

        let settings = Settings::load(file.path()).unwrap();
        assert_eq!(settings.postgres.database, "warehouse");
        assert_eq!(settings.postgres.ssl_mode, "disable");
    }

    #[test]
    fn test_request_credentials_have_no_defaults() {
        let err = SourceConfig::from_request(serde_json::json!({
            "mysql_host": "db.internal",
            "mysql_port": 3306,
            "mysql_user": "reader",
            "mysql_password": "pw"
        }))
        .unwrap_err();
        assert!(matches!(err, MigrateError::Config(_)));
        assert!(err.to_string().contains("missing field `database`"));

        let err = RelationalTargetConfig::from_request(serde_json::json!({
            "host": "pg.internal",
            "port": 5432,
            "database": "warehouse",
            "password": "secret"
        }))
        .unwrap_err();
        assert!(err.to_string().contains("missing field `user`"));

        let err = DocumentTargetConfig::from_request(serde_json::json!({
            "uri": "mongodb://localhost:27017/"
        }))
        .unwrap_err();
        assert!(err.to_string().contains("missing field `database`"));
    }

    #[test]
    fn test_request_credentials_keep_optional_target_fields() {
        let target = RelationalTargetConfig::from_request(serde_json::json!({
            "host": "pg.internal",
            "port": 5432,
            "database": "warehouse",
            "user": "loader",
            "password": ""
        }))
        .unwrap();
        assert_eq!(target.schema, "public");
        assert_eq!(target.ssl_mode, "prefer");
        assert_eq!(target.password, "");
    }
}
