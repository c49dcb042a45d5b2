//! Core abstractions shared by the introspector and the migration engine.
//!
//! - [`schema`]: table, column and relationship metadata
//! - [`value`]: row cell values
//! - [`traits`]: reader and writer traits implemented by `drivers`

pub mod schema;
pub mod traits;
pub mod value;

#[cfg(test)]
pub(crate) mod memory;

pub use schema::{Column, Relationship, SchemaModel, Table};
pub use traits::{ColumnMapping, DocumentWriter, RelationalWriter, SourceReader};
pub use value::{Row, SqlValue};
