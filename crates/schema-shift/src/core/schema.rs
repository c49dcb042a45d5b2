//! Schema model produced by introspection.
//!
//! The serialized field names follow the analyze response wire shape:
//! columns are `{name, type, nullable, primary_key}`, tables are
//! `{name, columns, primary_keys}`.

use serde::{Deserialize, Serialize};

/// Column metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Column name.
    pub name: String,

    /// Declared type exactly as the source reports it (e.g. "int(11)").
    #[serde(rename = "type")]
    pub source_type: String,

    /// Whether the column allows NULL.
    pub nullable: bool,

    /// Whether the column is part of the primary key.
    #[serde(rename = "primary_key")]
    pub is_primary_key: bool,
}

impl Column {
    pub fn new(
        name: impl Into<String>,
        source_type: impl Into<String>,
        nullable: bool,
        is_primary_key: bool,
    ) -> Self {
        Self {
            name: name.into(),
            source_type: source_type.into(),
            nullable,
            is_primary_key,
        }
    }
}

/// Table metadata.
///
/// `primary_keys` is always derived from the columns' key flags, so the two
/// can never disagree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    /// Table name.
    pub name: String,

    /// Columns in declaration order.
    pub columns: Vec<Column>,

    /// Primary key column names, in declaration order.
    pub primary_keys: Vec<String>,
}

impl Table {
    /// Build a table, deriving the primary key set from the columns.
    pub fn new(name: impl Into<String>, columns: Vec<Column>) -> Self {
        let primary_keys = columns
            .iter()
            .filter(|c| c.is_primary_key)
            .map(|c| c.name.clone())
            .collect();
        Self {
            name: name.into(),
            columns,
            primary_keys,
        }
    }

    /// Column names in declaration order.
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }
}

/// Foreign-key edge `table.column -> ref_table.ref_column`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    pub table: String,
    pub column: String,
    pub ref_table: String,
    pub ref_column: String,
}

impl Relationship {
    pub fn new(
        table: impl Into<String>,
        column: impl Into<String>,
        ref_table: impl Into<String>,
        ref_column: impl Into<String>,
    ) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
            ref_table: ref_table.into(),
            ref_column: ref_column.into(),
        }
    }
}

/// Result of introspecting a source database.
///
/// Either a populated model or, on failure, an empty model with `error` set.
/// Use [`SchemaModel::new`] and [`SchemaModel::failed`] to keep the two
/// outcomes exclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaModel {
    pub tables: Vec<Table>,
    pub relationships: Vec<Relationship>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SchemaModel {
    /// A successful model.
    pub fn new(tables: Vec<Table>, relationships: Vec<Relationship>) -> Self {
        Self {
            tables,
            relationships,
            error: None,
        }
    }

    /// The failure variant: no tables, no relationships, an error message.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            tables: Vec::new(),
            relationships: Vec::new(),
            error: Some(error.into()),
        }
    }

    /// Relationships per table; zero for an empty model.
    pub fn relational_ratio(&self) -> f64 {
        if self.tables.is_empty() {
            0.0
        } else {
            self.relationships.len() as f64 / self.tables.len() as f64
        }
    }
}
