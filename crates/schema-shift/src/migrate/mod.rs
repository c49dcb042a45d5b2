//! One-shot migration of every source table into a target store.
//!
//! A run opens one source and one target connection, moves tables strictly
//! one after another, and closes both connections on every exit path. The
//! result is reported for the whole run as a [`MigrationOutcome`].

use serde::{Deserialize, Serialize};
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::{DocumentTargetConfig, RelationalTargetConfig, SourceConfig};
use crate::core::traits::{ColumnMapping, DocumentWriter, RelationalWriter, SourceReader};
use crate::drivers::{MongoWriter, MysqlReader, PostgresWriter};
use crate::error::{MigrateError, Result};
use crate::recommend::TargetKind;
use crate::typemap::{document_from_row, map_relational_type};

/// Target store plus its credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferTarget {
    Relational(RelationalTargetConfig),
    Document(DocumentTargetConfig),
}

impl TransferTarget {
    /// Resolve a target kind name and a credentials object.
    ///
    /// The kind is checked first so an unsupported target is rejected
    /// regardless of what the credentials look like.
    pub fn from_request(kind: &str, credentials: serde_json::Value) -> Result<Self> {
        match kind.parse::<TargetKind>()? {
            TargetKind::Relational => {
                RelationalTargetConfig::from_request(credentials).map(TransferTarget::Relational)
            }
            TargetKind::Document => {
                DocumentTargetConfig::from_request(credentials).map(TransferTarget::Document)
            }
        }
    }

    pub fn kind(&self) -> TargetKind {
        match self {
            TransferTarget::Relational(_) => TargetKind::Relational,
            TransferTarget::Document(_) => TargetKind::Document,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MigrationStatus {
    Success,
    Error,
}

/// Result of one migration run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationOutcome {
    pub status: MigrationStatus,
    pub details: String,
}

impl MigrationOutcome {
    pub fn success(details: impl Into<String>) -> Self {
        Self {
            status: MigrationStatus::Success,
            details: details.into(),
        }
    }

    pub fn error(details: impl Into<String>) -> Self {
        Self {
            status: MigrationStatus::Error,
            details: details.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == MigrationStatus::Success
    }

    /// Build the outcome of a run that enumerated `Ok(n)` tables or failed.
    fn from_result(kind: TargetKind, result: Result<usize>) -> Self {
        match result {
            Ok(tables) => Self::success(format!(
                "Migrated {} tables to {}.",
                tables,
                kind.product_name()
            )),
            Err(MigrateError::Unexpected(msg)) => Self::error(format!(
                "Unexpected error during {} migration: {}",
                kind.product_name(),
                msg
            )),
            Err(e) => Self::error(e.to_string()),
        }
    }
}

/// Runs migrations from a MySQL source.
#[derive(Debug, Clone, Copy, Default)]
pub struct MigrationEngine;

impl MigrationEngine {
    pub fn new() -> Self {
        Self
    }

    /// Migrate every table of the source into the target.
    pub async fn migrate(&self, source: &SourceConfig, target: &TransferTarget) -> MigrationOutcome {
        let kind = target.kind();
        let span = info_span!(
            "migrate",
            run_id = %Uuid::new_v4(),
            target = %kind,
            source_database = %source.database
        );

        async {
            info!("Starting migration to {}", kind.product_name());
            let result = match target {
                TransferTarget::Relational(config) => run_relational(source, config).await,
                TransferTarget::Document(config) => run_documents(source, config).await,
            };
            if let Err(e) = &result {
                warn!("Migration failed: {}", e);
            }
            MigrationOutcome::from_result(kind, result)
        }
        .instrument(span)
        .await
    }
}

async fn run_relational(source: &SourceConfig, target: &RelationalTargetConfig) -> Result<usize> {
    let reader = MysqlReader::connect_for_migration(source).await?;
    let writer = match PostgresWriter::connect(target).await {
        Ok(writer) => writer,
        Err(e) => {
            close_reader(reader).await;
            return Err(e);
        }
    };
    transfer_relational(reader, writer).await
}

async fn run_documents(source: &SourceConfig, target: &DocumentTargetConfig) -> Result<usize> {
    let reader = MysqlReader::connect_for_migration(source).await?;
    let writer = match MongoWriter::connect(target).await {
        Ok(writer) => writer,
        Err(e) => {
            close_reader(reader).await;
            return Err(e);
        }
    };
    transfer_documents(reader, writer).await
}

/// Run the relational path over open connections, then close both.
pub async fn transfer_relational<S, W>(mut reader: S, mut writer: W) -> Result<usize>
where
    S: SourceReader,
    W: RelationalWriter,
{
    let result = migrate_relational(&mut reader, &mut writer).await;
    close_reader(reader).await;
    let db_type = writer.db_type().to_string();
    if let Err(e) = writer.close().await {
        warn!("Closing the {} connection failed: {}", db_type, e);
    }
    result
}

/// Run the document path over open connections, then close both.
pub async fn transfer_documents<S, W>(mut reader: S, mut writer: W) -> Result<usize>
where
    S: SourceReader,
    W: DocumentWriter,
{
    let result = migrate_documents(&mut reader, &mut writer).await;
    close_reader(reader).await;
    let db_type = writer.db_type().to_string();
    if let Err(e) = writer.close().await {
        warn!("Closing the {} connection failed: {}", db_type, e);
    }
    result
}

async fn close_reader<S: SourceReader>(reader: S) {
    if let Err(e) = reader.close().await {
        warn!("Closing the source connection failed: {}", e);
    }
}

/// Rebuild every source table in the relational target and commit once.
///
/// Returns the number of tables enumerated.
pub async fn migrate_relational<S, W>(reader: &mut S, writer: &mut W) -> Result<usize>
where
    S: SourceReader,
    W: RelationalWriter,
{
    let tables = reader.extract_tables().await?;

    for table in &tables {
        let mappings: Vec<ColumnMapping> = table
            .columns
            .iter()
            .map(|c| ColumnMapping::new(&c.name, &c.source_type, map_relational_type(&c.source_type)))
            .collect();

        writer.drop_table(&table.name).await?;
        writer.create_table(&table.name, &mappings).await?;

        let rows = reader.fetch_rows(table).await?;
        let written = writer.insert_rows(&table.name, &mappings, &rows).await?;
        info!("Migrated {}: {} rows", table.name, written);
    }

    writer.commit().await?;
    Ok(tables.len())
}

/// Copy every non-empty source table into a same-named collection.
///
/// Tables without rows are skipped entirely, leaving any existing collection
/// of that name as it was. Returns the number of tables enumerated, skipped
/// ones included.
pub async fn migrate_documents<S, W>(reader: &mut S, writer: &mut W) -> Result<usize>
where
    S: SourceReader,
    W: DocumentWriter,
{
    let tables = reader.extract_tables().await?;

    for table in &tables {
        let rows = reader.fetch_rows(table).await?;
        if rows.is_empty() {
            debug!("Skipping {}: no rows", table.name);
            continue;
        }

        let columns = table.column_names();
        let documents: Vec<bson::Document> = rows
            .into_iter()
            .map(|row| document_from_row(&columns, row))
            .collect();

        let collection = sanitize_collection_name(&table.name);
        writer.drop_collection(&collection).await?;
        let written = writer.insert_documents(&collection, documents).await?;
        info!("Migrated {} -> {}: {} documents", table.name, collection, written);
    }

    Ok(tables.len())
}

/// Collection name for a source table: `$` is not allowed, so it becomes `_`.
pub fn sanitize_collection_name(table: &str) -> String {
    table.replace('$', "_")
}
