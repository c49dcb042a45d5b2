//! Error types for analysis and migration.

use thiserror::Error;

/// Main error type for schema-shift operations.
///
/// Driver errors are classified into the connection / auth / missing database /
/// operation buckets by the driver modules. Anything they cannot place ends up
/// in [`MigrateError::Unexpected`] with the driver message embedded.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Configuration error (invalid YAML, bad environment value, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Host/port unreachable or connection dropped.
    #[error("{0}")]
    Connection(String),

    /// Credentials rejected by the server.
    #[error("{0}")]
    Auth(String),

    /// The named database does not exist.
    #[error("{0}")]
    MissingDatabase(String),

    /// Target kind not recognized.
    #[error("Unsupported target database: {0}. Supported targets: postgresql, mongodb")]
    UnsupportedTarget(String),

    /// A database rejected an operation, or a value could not be read.
    #[error("{0}")]
    Operation(String),

    /// Anything the classifiers did not recognize.
    #[error("{0}")]
    Unexpected(String),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MigrateError {
    /// Create an Unexpected error from any displayable value.
    pub fn unexpected(message: impl std::fmt::Display) -> Self {
        MigrateError::Unexpected(message.to_string())
    }

    /// True for errors caused by the caller's input rather than the system.
    pub fn is_client_error(&self) -> bool {
        !matches!(
            self,
            MigrateError::Unexpected(_) | MigrateError::Io(_) | MigrateError::Json(_)
        )
    }

    /// Process exit code used by the command-line front-end.
    pub fn exit_code(&self) -> u8 {
        match self {
            MigrateError::Config(_) | MigrateError::Yaml(_) => 1,
            MigrateError::Connection(_) => 2,
            MigrateError::Auth(_) => 3,
            MigrateError::MissingDatabase(_) => 4,
            MigrateError::UnsupportedTarget(_) => 5,
            MigrateError::Operation(_) => 6,
            MigrateError::Io(_) => 7,
            MigrateError::Unexpected(_) | MigrateError::Json(_) => 8,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for schema-shift operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
