//! MongoDB target writer implementation.

use async_trait::async_trait;
use bson::{doc, Document};
use mongodb::error::ErrorKind;
use mongodb::{Client, Database};
use tracing::{debug, info};

use crate::config::DocumentTargetConfig;
use crate::core::traits::DocumentWriter;
use crate::error::{MigrateError, Result};

/// MongoDB target writer implementation.
#[derive(Debug)]
pub struct MongoWriter {
    client: Client,
    database: Database,
}

impl MongoWriter {
    /// Connect to the document store.
    ///
    /// The driver connects lazily, so a `ping` forces server selection here
    /// and an unreachable server fails the connect rather than the first write.
    pub async fn connect(config: &DocumentTargetConfig) -> Result<Self> {
        let client = Client::with_uri_str(&config.uri)
            .await
            .map_err(|e| classify_mongo_error(&e))?;

        let database = if config.database.is_empty() {
            client.default_database().ok_or_else(|| {
                MigrateError::Config(
                    "MongoDB database name is required (in the credentials or the URI)".into(),
                )
            })?
        } else {
            client.database(&config.database)
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| classify_mongo_error(&e))?;

        info!(
            "Connected to MongoDB target: {}/{}",
            config.redacted_uri(),
            database.name()
        );

        Ok(Self { client, database })
    }
}

#[async_trait]
impl DocumentWriter for MongoWriter {
    async fn drop_collection(&mut self, collection: &str) -> Result<()> {
        self.database
            .collection::<Document>(collection)
            .drop()
            .await
            .map_err(|e| classify_mongo_error(&e))?;

        debug!("Dropped collection {}", collection);
        Ok(())
    }

    async fn insert_documents(
        &mut self,
        collection: &str,
        documents: Vec<Document>,
    ) -> Result<u64> {
        if documents.is_empty() {
            return Ok(0);
        }

        let result = self
            .database
            .collection::<Document>(collection)
            .insert_many(documents)
            .await
            .map_err(|e| classify_mongo_error(&e))?;

        let inserted = result.inserted_ids.len() as u64;
        debug!("Inserted {} documents into {}", inserted, collection);
        Ok(inserted)
    }

    fn db_type(&self) -> &str {
        "mongodb"
    }

    async fn close(self) -> Result<()> {
        self.client.shutdown().await;
        Ok(())
    }
}

/// Classify a MongoDB driver error.
pub fn classify_mongo_error(err: &mongodb::error::Error) -> MigrateError {
    match err.kind.as_ref() {
        ErrorKind::ServerSelection { .. } => MigrateError::Connection(
            "MongoDB server not accessible - check host and port".into(),
        ),
        ErrorKind::Io(_) | ErrorKind::ConnectionPoolCleared { .. } | ErrorKind::DnsResolve { .. } => {
            MigrateError::Connection(
                "MongoDB connection failed - check URI and network connectivity".into(),
            )
        }
        ErrorKind::Authentication { .. } => MigrateError::Auth(
            "MongoDB authentication failed - check username and password".into(),
        ),
        ErrorKind::Command(_) | ErrorKind::Write(_) | ErrorKind::InsertMany(_) => {
            MigrateError::Operation(format!("MongoDB operation failed: {}", err))
        }
        ErrorKind::InvalidArgument { .. } => {
            MigrateError::Config(format!("Invalid MongoDB URI or argument: {}", err))
        }
        _ => MigrateError::unexpected(err),
    }
}
