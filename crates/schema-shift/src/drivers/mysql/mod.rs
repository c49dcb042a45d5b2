//! MySQL/MariaDB source driver.
//!
//! - [`MysqlReader`]: schema introspection and row extraction
//!
//! # Supported Versions
//!
//! - MySQL 5.7+, 8.0+
//! - MariaDB 10.2+

mod reader;

pub use reader::{classify_mysql_error, MysqlReader, ReadContext};
