//! Configuration validation.

use super::Settings;
use crate::drivers::common::SslMode;
use crate::error::{MigrateError, Result};

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate the configuration.
///
/// Credentials are only checked for shape here; whether they work is left to
/// the connection attempt.
pub fn validate(settings: &Settings) -> Result<()> {
    if !LOG_LEVELS.contains(&settings.log_level.to_lowercase().as_str()) {
        return Err(MigrateError::Config(format!(
            "log_level must be one of {}, got '{}'",
            LOG_LEVELS.join(", "),
            settings.log_level
        )));
    }

    if settings.source.port == 0 {
        return Err(MigrateError::Config("source.port must be non-zero".into()));
    }
    if settings.postgres.port == 0 {
        return Err(MigrateError::Config("postgres.port must be non-zero".into()));
    }

    SslMode::parse(&settings.postgres.ssl_mode)?;

    if !settings.mongodb.uri.starts_with("mongodb://")
        && !settings.mongodb.uri.starts_with("mongodb+srv://")
    {
        return Err(MigrateError::Config(format!(
            "mongodb.uri must use the mongodb:// or mongodb+srv:// scheme, got '{}'",
            settings.mongodb.redacted_uri()
        )));
    }

    Ok(())
}
