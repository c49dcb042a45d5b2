//! PostgreSQL relational target driver.
//!
//! - [`PostgresWriter`]: table rebuild and parameterized row insert

mod writer;

pub use writer::{classify_postgres_error, PostgresWriter};
