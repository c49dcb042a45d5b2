//! Schema introspection of the source database.
//!
//! [`SchemaIntrospector::introspect`] never returns an error: every failure
//! is folded into [`SchemaModel::failed`] with a message fit for the caller.

use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::SourceConfig;
use crate::core::schema::SchemaModel;
use crate::core::traits::SourceReader;
use crate::drivers::MysqlReader;
use crate::error::{MigrateError, Result};

/// Reads the live schema of a MySQL source.
#[derive(Debug, Clone)]
pub struct SchemaIntrospector {
    config: SourceConfig,
}

impl SchemaIntrospector {
    pub fn new(config: SourceConfig) -> Self {
        Self { config }
    }

    /// Connect, read every table and foreign key, and disconnect.
    pub async fn introspect(&self) -> SchemaModel {
        let span = info_span!(
            "introspect",
            run_id = %Uuid::new_v4(),
            host = %self.config.host,
            database = %self.config.database
        );

        async {
            let mut reader = match MysqlReader::connect(&self.config).await {
                Ok(reader) => reader,
                Err(e) => return SchemaModel::failed(analysis_error(&e)),
            };

            let result = build_schema_model(&mut reader).await;

            if let Err(e) = reader.close().await {
                warn!("Closing the MySQL connection failed: {}", e);
            }

            match result {
                Ok(model) => {
                    info!(
                        "Introspected {} tables and {} relationships",
                        model.tables.len(),
                        model.relationships.len()
                    );
                    model
                }
                Err(e) => SchemaModel::failed(analysis_error(&e)),
            }
        }
        .instrument(span)
        .await
    }
}

/// Build the model from an open reader.
///
/// Tables keep enumeration order; relationships are collected table by table
/// once every table has been described.
pub async fn build_schema_model<S: SourceReader>(reader: &mut S) -> Result<SchemaModel> {
    let tables = reader.extract_tables().await?;

    let mut relationships = Vec::new();
    for table in &tables {
        relationships.extend(reader.load_relationships(&table.name).await?);
    }

    Ok(SchemaModel::new(tables, relationships))
}

/// Caller-facing message for a failed introspection.
fn analysis_error(err: &MigrateError) -> String {
    match err {
        MigrateError::Unexpected(msg) => format!("Unexpected error during analysis: {}", msg),
        other => other.to_string(),
    }
}
