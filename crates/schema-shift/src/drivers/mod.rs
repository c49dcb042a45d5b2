//! Database driver implementations of the core traits.
//!
//! - [`mysql`]: MySQL/MariaDB source reader
//! - [`postgres`]: PostgreSQL relational target writer
//! - [`mongodb`]: MongoDB document target writer
//! - [`common`]: Shared utilities (TLS)
//!
//! Every driver also owns the classification of its native errors into
//! [`MigrateError`](crate::error::MigrateError) variants.

pub mod common;
pub mod mongodb;
pub mod mysql;
pub mod postgres;

pub use common::{SslMode, TlsBuilder};
pub use self::mongodb::MongoWriter;
pub use mysql::MysqlReader;
pub use postgres::PostgresWriter;
