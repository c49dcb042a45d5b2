//! In-memory reader and writers for engine tests.
//!
//! Each fake keeps its state behind a shared handle so a test can inspect it
//! after the engine has consumed and closed the fake.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::error::{MigrateError, Result};

use super::schema::{Relationship, Table};
use super::traits::{ColumnMapping, DocumentWriter, RelationalWriter, SourceReader};
use super::value::Row;

fn lock<T>(state: &Arc<Mutex<T>>) -> MutexGuard<'_, T> {
    state.lock().unwrap()
}

#[derive(Debug, Default)]
pub(crate) struct SourceState {
    pub tables: Vec<(Table, Vec<Row>)>,
    pub relationships: Vec<Relationship>,
    pub fail_fetch_on: Option<String>,
    pub fetched: Vec<String>,
    pub closed: bool,
}

/// A source database held in memory.
#[derive(Debug, Clone, Default)]
pub(crate) struct MemorySource {
    state: Arc<Mutex<SourceState>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(self, table: Table, rows: Vec<Row>) -> Self {
        lock(&self.state).tables.push((table, rows));
        self
    }

    pub fn with_relationship(self, relationship: Relationship) -> Self {
        lock(&self.state).relationships.push(relationship);
        self
    }

    /// Make `fetch_rows` fail for one table.
    pub fn failing_fetch(self, table: &str) -> Self {
        lock(&self.state).fail_fetch_on = Some(table.to_string());
        self
    }

    pub fn state(&self) -> MutexGuard<'_, SourceState> {
        lock(&self.state)
    }
}

#[async_trait]
impl SourceReader for MemorySource {
    async fn list_tables(&mut self) -> Result<Vec<String>> {
        Ok(lock(&self.state)
            .tables
            .iter()
            .map(|(t, _)| t.name.clone())
            .collect())
    }

    async fn describe_table(&mut self, table: &str) -> Result<Table> {
        lock(&self.state)
            .tables
            .iter()
            .find(|(t, _)| t.name == table)
            .map(|(t, _)| t.clone())
            .ok_or_else(|| MigrateError::Operation(format!("no such table: {}", table)))
    }

    async fn load_relationships(&mut self, table: &str) -> Result<Vec<Relationship>> {
        Ok(lock(&self.state)
            .relationships
            .iter()
            .filter(|r| r.table == table)
            .cloned()
            .collect())
    }

    async fn fetch_rows(&mut self, table: &Table) -> Result<Vec<Row>> {
        let mut state = lock(&self.state);
        if state.fail_fetch_on.as_deref() == Some(table.name.as_str()) {
            return Err(MigrateError::Connection("Lost connection to MySQL server".into()));
        }
        state.fetched.push(table.name.clone());
        state
            .tables
            .iter()
            .find(|(t, _)| t.name == table.name)
            .map(|(_, rows)| rows.clone())
            .ok_or_else(|| MigrateError::Operation(format!("no such table: {}", table.name)))
    }

    fn db_type(&self) -> &str {
        "memory"
    }

    async fn close(self) -> Result<()> {
        lock(&self.state).closed = true;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct MemoryTable {
    pub columns: Vec<ColumnMapping>,
    pub rows: Vec<Row>,
}

#[derive(Debug, Default)]
pub(crate) struct RelationalState {
    pub committed: BTreeMap<String, MemoryTable>,
    pub working: BTreeMap<String, MemoryTable>,
    pub fail_insert_on: Option<String>,
    pub commits: usize,
    pub closed: bool,
}

/// A transactional relational target held in memory.
///
/// Writes go to a working copy that only `commit` publishes. Closing discards
/// anything uncommitted.
#[derive(Debug, Clone, Default)]
pub(crate) struct MemoryRelationalTarget {
    state: Arc<Mutex<RelationalState>>,
}

impl MemoryRelationalTarget {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a table that already exists before the migration.
    pub fn with_existing(self, name: &str, columns: Vec<ColumnMapping>, rows: Vec<Row>) -> Self {
        {
            let mut state = lock(&self.state);
            let table = MemoryTable { columns, rows };
            state.committed.insert(name.to_string(), table.clone());
            state.working.insert(name.to_string(), table);
        }
        self
    }

    pub fn failing_insert(self, table: &str) -> Self {
        lock(&self.state).fail_insert_on = Some(table.to_string());
        self
    }

    pub fn state(&self) -> MutexGuard<'_, RelationalState> {
        lock(&self.state)
    }
}

#[async_trait]
impl RelationalWriter for MemoryRelationalTarget {
    async fn drop_table(&mut self, table: &str) -> Result<()> {
        lock(&self.state).working.remove(table);
        Ok(())
    }

    async fn create_table(&mut self, table: &str, columns: &[ColumnMapping]) -> Result<()> {
        let mut state = lock(&self.state);
        if state.working.contains_key(table) {
            return Err(MigrateError::Operation(format!(
                "relation \"{}\" already exists",
                table
            )));
        }
        state.working.insert(
            table.to_string(),
            MemoryTable {
                columns: columns.to_vec(),
                rows: Vec::new(),
            },
        );
        Ok(())
    }

    async fn insert_rows(
        &mut self,
        table: &str,
        _columns: &[ColumnMapping],
        rows: &[Row],
    ) -> Result<u64> {
        let mut state = lock(&self.state);
        if state.fail_insert_on.as_deref() == Some(table) {
            return Err(MigrateError::Operation(format!(
                "PostgreSQL operation failed: insert into {} rejected",
                table
            )));
        }
        let target = state.working.get_mut(table).ok_or_else(|| {
            MigrateError::Operation(format!("relation \"{}\" does not exist", table))
        })?;
        target.rows.extend(rows.iter().cloned());
        Ok(rows.len() as u64)
    }

    async fn commit(&mut self) -> Result<()> {
        let mut state = lock(&self.state);
        state.committed = state.working.clone();
        state.commits += 1;
        Ok(())
    }

    fn db_type(&self) -> &str {
        "memory"
    }

    async fn close(self) -> Result<()> {
        let mut state = lock(&self.state);
        state.working = state.committed.clone();
        state.closed = true;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub(crate) struct DocumentState {
    pub collections: BTreeMap<String, Vec<bson::Document>>,
    pub dropped: Vec<String>,
    pub fail_insert_on: Option<String>,
    pub closed: bool,
}

/// A document target held in memory. Writes apply immediately.
#[derive(Debug, Clone, Default)]
pub(crate) struct MemoryDocumentTarget {
    state: Arc<Mutex<DocumentState>>,
}

impl MemoryDocumentTarget {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_existing(self, name: &str, documents: Vec<bson::Document>) -> Self {
        lock(&self.state)
            .collections
            .insert(name.to_string(), documents);
        self
    }

    pub fn failing_insert(self, collection: &str) -> Self {
        lock(&self.state).fail_insert_on = Some(collection.to_string());
        self
    }

    pub fn state(&self) -> MutexGuard<'_, DocumentState> {
        lock(&self.state)
    }
}

#[async_trait]
impl DocumentWriter for MemoryDocumentTarget {
    async fn drop_collection(&mut self, collection: &str) -> Result<()> {
        let mut state = lock(&self.state);
        state.collections.remove(collection);
        state.dropped.push(collection.to_string());
        Ok(())
    }

    async fn insert_documents(
        &mut self,
        collection: &str,
        documents: Vec<bson::Document>,
    ) -> Result<u64> {
        let mut state = lock(&self.state);
        if state.fail_insert_on.as_deref() == Some(collection) {
            return Err(MigrateError::Operation(format!(
                "MongoDB operation failed: insert into {} rejected",
                collection
            )));
        }
        let count = documents.len() as u64;
        state
            .collections
            .entry(collection.to_string())
            .or_default()
            .extend(documents);
        Ok(count)
    }

    fn db_type(&self) -> &str {
        "memory"
    }

    async fn close(self) -> Result<()> {
        lock(&self.state).closed = true;
        Ok(())
    }
}
