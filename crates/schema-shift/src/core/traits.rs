//! Traits at the driver seams.
//!
//! - [`SourceReader`]: reads schema and rows from the source database
//! - [`RelationalWriter`]: rebuilds tables in a relational target
//! - [`DocumentWriter`]: rebuilds collections in a document target
//!
//! Each implementation owns exactly one connection. Methods take `&mut self`
//! because a connection is never shared, and `close` consumes the handle so
//! it cannot be used afterwards.

use async_trait::async_trait;

use crate::error::Result;
use crate::typemap::RelationalType;

use super::schema::{Relationship, Table};
use super::value::Row;

/// A source column paired with the relational type it maps to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMapping {
    pub name: String,
    pub source_type: String,
    pub target_type: RelationalType,
}

impl ColumnMapping {
    pub fn new(
        name: impl Into<String>,
        source_type: impl Into<String>,
        target_type: RelationalType,
    ) -> Self {
        Self {
            name: name.into(),
            source_type: source_type.into(),
            target_type,
        }
    }
}

/// Read schema and data from a source database.
#[async_trait]
pub trait SourceReader: Send {
    /// Base table names in enumeration order.
    async fn list_tables(&mut self) -> Result<Vec<String>>;

    /// Column metadata for one table, in declaration order.
    async fn describe_table(&mut self, table: &str) -> Result<Table>;

    /// Foreign keys declared on one table, in discovery order.
    async fn load_relationships(&mut self, table: &str) -> Result<Vec<Relationship>>;

    /// Every row of a table, values in `table.columns` order.
    async fn fetch_rows(&mut self, table: &Table) -> Result<Vec<Row>>;

    /// Get the database type identifier (e.g., "mysql").
    fn db_type(&self) -> &str;

    /// Close the connection.
    async fn close(self) -> Result<()>
    where
        Self: Sized;

    /// Enumerate and describe every table.
    async fn extract_tables(&mut self) -> Result<Vec<Table>> {
        let names = self.list_tables().await?;
        let mut tables = Vec::with_capacity(names.len());
        for name in &names {
            tables.push(self.describe_table(name).await?);
        }
        Ok(tables)
    }
}

/// Write tables and rows to a relational target.
///
/// Everything between connect and [`commit`](RelationalWriter::commit) is one
/// transaction; closing without committing discards it.
#[async_trait]
pub trait RelationalWriter: Send {
    /// Drop the table and anything depending on it, if it exists.
    async fn drop_table(&mut self, table: &str) -> Result<()>;

    /// Create a table with the given column types.
    async fn create_table(&mut self, table: &str, columns: &[ColumnMapping]) -> Result<()>;

    /// Insert rows with parameterized statements. Returns rows written.
    async fn insert_rows(
        &mut self,
        table: &str,
        columns: &[ColumnMapping],
        rows: &[Row],
    ) -> Result<u64>;

    /// Commit everything written so far.
    async fn commit(&mut self) -> Result<()>;

    fn db_type(&self) -> &str;

    async fn close(self) -> Result<()>
    where
        Self: Sized;
}

/// Write documents to a document target. There is no transaction.
#[async_trait]
pub trait DocumentWriter: Send {
    /// Drop a collection; dropping a missing collection is not an error.
    async fn drop_collection(&mut self, collection: &str) -> Result<()>;

    /// Bulk insert documents. Returns documents written.
    async fn insert_documents(
        &mut self,
        collection: &str,
        documents: Vec<bson::Document>,
    ) -> Result<u64>;

    fn db_type(&self) -> &str;

    async fn close(self) -> Result<()>
    where
        Self: Sized;
}
