//! # schema-shift
//!
//! MySQL schema analysis and one-shot migration to PostgreSQL or MongoDB.
//!
//! This library provides:
//!
//! - **Introspection** of a live MySQL database into a [`SchemaModel`]
//! - **Recommendation** of a target store from the shape of that model
//! - **Migration** of every table into a PostgreSQL schema (one transaction)
//!   or a MongoDB database (one collection per non-empty table)
//!
//! ## Example
//!
//! ```rust,no_run
//! use schema_shift::{api, MigrateError, Settings};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), MigrateError> {
//!     let settings = Settings::from_env()?;
//!     let source = serde_json::to_value(&settings.source)?;
//!     match api::analyze(source).await {
//!         Ok(response) => println!("{}", response.summary),
//!         Err(e) => eprintln!("analysis failed: {}", e),
//!     }
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod core;
pub mod drivers;
pub mod error;
pub mod introspect;
pub mod migrate;
pub mod recommend;
pub mod typemap;

// Re-exports for convenient access
pub use api::{AnalyzeResponse, ApiError, TransferRequest};
pub use config::{DocumentTargetConfig, RelationalTargetConfig, Settings, SourceConfig};
pub use core::{Column, Relationship, SchemaModel, SqlValue, Table};
pub use error::{MigrateError, Result};
pub use introspect::SchemaIntrospector;
pub use migrate::{MigrationEngine, MigrationOutcome, MigrationStatus, TransferTarget};
pub use recommend::{Recommendation, RecommendationEngine, TargetKind};
