//! PostgreSQL target writer implementation.
//!
//! One tokio-postgres connection per writer. A transaction is opened right
//! after connecting and committed once by the caller; dropping the connection
//! without committing rolls everything back.

use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_postgres::error::SqlState;
use tokio_postgres::types::{ToSql, Type};
use tokio_postgres::{Client, Config as PgConfig, NoTls};
use tracing::{debug, info, warn};

use crate::config::RelationalTargetConfig;
use crate::core::traits::{ColumnMapping, RelationalWriter};
use crate::core::value::Row;
use crate::drivers::common::TlsBuilder;
use crate::error::{MigrateError, Result};
use crate::typemap::to_pg_text;

/// Connection attempt timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// PostgreSQL target writer implementation.
pub struct PostgresWriter {
    client: Client,
    connection: JoinHandle<()>,
    schema: String,
    database: String,
    schema_ready: bool,
}

impl PostgresWriter {
    /// Connect to the target and open the migration transaction.
    pub async fn connect(config: &RelationalTargetConfig) -> Result<Self> {
        let tls = TlsBuilder::parse(&config.ssl_mode)?;

        let mut pg_config = PgConfig::new();
        pg_config.host(&config.host);
        pg_config.port(config.port);
        pg_config.dbname(&config.database);
        pg_config.user(&config.user);
        pg_config.password(&config.password);
        pg_config.connect_timeout(CONNECT_TIMEOUT);
        pg_config.ssl_mode(tls.ssl_mode().as_pg());

        let classify = |e: tokio_postgres::Error| classify_postgres_error(&e, &config.database);

        let (client, connection) = match tls.build()? {
            None => {
                warn!("PostgreSQL TLS is disabled. Credentials will be transmitted in plaintext.");
                let (client, conn) = pg_config.connect(NoTls).await.map_err(classify)?;
                let handle = tokio::spawn(async move {
                    if let Err(e) = conn.await {
                        debug!("PostgreSQL connection ended with error: {}", e);
                    }
                });
                (client, handle)
            }
            Some(connector) => {
                let (client, conn) = pg_config.connect(connector).await.map_err(classify)?;
                let handle = tokio::spawn(async move {
                    if let Err(e) = conn.await {
                        debug!("PostgreSQL connection ended with error: {}", e);
                    }
                });
                (client, handle)
            }
        };

        client.batch_execute("BEGIN").await.map_err(classify)?;

        info!(
            "Connected to PostgreSQL target: {}:{}/{}",
            config.host, config.port, config.database
        );

        Ok(Self {
            client,
            connection,
            schema: config.schema.clone(),
            database: config.database.clone(),
            schema_ready: false,
        })
    }

    fn classify(&self, err: tokio_postgres::Error) -> MigrateError {
        classify_postgres_error(&err, &self.database)
    }

    async fn ensure_schema(&mut self) -> Result<()> {
        if self.schema_ready {
            return Ok(());
        }
        let sql = format!("CREATE SCHEMA IF NOT EXISTS {}", quote_ident(&self.schema));
        self.client
            .batch_execute(&sql)
            .await
            .map_err(|e| self.classify(e))?;
        self.schema_ready = true;
        Ok(())
    }
}

/// Quote a PostgreSQL identifier.
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Qualify a table name with schema.
fn qualify_table(schema: &str, table: &str) -> String {
    format!("{}.{}", quote_ident(schema), quote_ident(table))
}

/// Generate table DDL.
fn generate_ddl(schema: &str, table: &str, columns: &[ColumnMapping]) -> String {
    let col_defs: Vec<String> = columns
        .iter()
        .map(|c| format!("{} {}", quote_ident(&c.name), c.target_type.as_sql()))
        .collect();

    format!(
        "CREATE TABLE {} (\n    {}\n)",
        qualify_table(schema, table),
        col_defs.join(",\n    ")
    )
}

/// Parameterized INSERT with every parameter bound as text and cast to the
/// column type server-side.
fn generate_insert(schema: &str, table: &str, columns: &[ColumnMapping]) -> String {
    if columns.is_empty() {
        return format!("INSERT INTO {} DEFAULT VALUES", qualify_table(schema, table));
    }

    let col_list: Vec<String> = columns.iter().map(|c| quote_ident(&c.name)).collect();
    let placeholders: Vec<String> = columns
        .iter()
        .enumerate()
        .map(|(i, c)| format!("${}::{}", i + 1, c.target_type.as_sql()))
        .collect();

    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        qualify_table(schema, table),
        col_list.join(", "),
        placeholders.join(", ")
    )
}

#[async_trait]
impl RelationalWriter for PostgresWriter {
    async fn drop_table(&mut self, table: &str) -> Result<()> {
        let sql = format!(
            "DROP TABLE IF EXISTS {} CASCADE",
            qualify_table(&self.schema, table)
        );
        self.client
            .batch_execute(&sql)
            .await
            .map_err(|e| self.classify(e))?;

        debug!("Dropped table {}.{}", self.schema, table);
        Ok(())
    }

    async fn create_table(&mut self, table: &str, columns: &[ColumnMapping]) -> Result<()> {
        self.ensure_schema().await?;

        let ddl = generate_ddl(&self.schema, table, columns);
        self.client
            .batch_execute(&ddl)
            .await
            .map_err(|e| self.classify(e))?;

        debug!("Created table {}.{}", self.schema, table);
        Ok(())
    }

    async fn insert_rows(
        &mut self,
        table: &str,
        columns: &[ColumnMapping],
        rows: &[Row],
    ) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let sql = generate_insert(&self.schema, table, columns);
        let param_types = vec![Type::TEXT; columns.len()];
        let stmt = self
            .client
            .prepare_typed(&sql, &param_types)
            .await
            .map_err(|e| self.classify(e))?;

        let mut written = 0u64;
        for row in rows {
            let params: Vec<Option<String>> = row
                .iter()
                .zip(columns)
                .map(|(value, col)| to_pg_text(value, col.target_type))
                .collect();
            let refs: Vec<&(dyn ToSql + Sync)> = params
                .iter()
                .map(|p| p as &(dyn ToSql + Sync))
                .collect();

            written += self
                .client
                .execute(&stmt, &refs)
                .await
                .map_err(|e| self.classify(e))?;
        }

        debug!("Inserted {} rows into {}.{}", written, self.schema, table);
        Ok(written)
    }

    async fn commit(&mut self) -> Result<()> {
        self.client
            .batch_execute("COMMIT")
            .await
            .map_err(|e| self.classify(e))?;
        info!("Committed PostgreSQL migration transaction");
        Ok(())
    }

    fn db_type(&self) -> &str {
        "postgres"
    }

    async fn close(self) -> Result<()> {
        let Self {
            client, connection, ..
        } = self;
        drop(client);
        if let Err(e) = connection.await {
            warn!("PostgreSQL connection task failed: {}", e);
        }
        Ok(())
    }
}

/// Classify a tokio-postgres error.
///
/// Server errors are sorted by SQLSTATE. Errors without one come from the
/// transport and count as connection failures, except client-side encoding
/// problems which are unexpected.
pub fn classify_postgres_error(err: &tokio_postgres::Error, database: &str) -> MigrateError {
    if let Some(db) = err.as_db_error() {
        let code = db.code();
        if *code == SqlState::INVALID_PASSWORD
            || *code == SqlState::INVALID_AUTHORIZATION_SPECIFICATION
        {
            return MigrateError::Auth(
                "PostgreSQL authentication failed - check username and password".into(),
            );
        }
        if *code == SqlState::INVALID_CATALOG_NAME {
            return MigrateError::MissingDatabase(format!(
                "PostgreSQL database '{}' does not exist or access denied",
                database
            ));
        }
        return MigrateError::Operation(format!("PostgreSQL operation failed: {}", db.message()));
    }

    let is_transport = err.is_closed()
        || std::error::Error::source(err)
            .map(|s| s.is::<std::io::Error>())
            .unwrap_or(false);
    if is_transport {
        MigrateError::Connection(
            "PostgreSQL connection failed - check host, port, and credentials".into(),
        )
    } else {
        MigrateError::unexpected(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::typemap::RelationalType;

    fn columns() -> Vec<ColumnMapping> {
        vec![
            ColumnMapping::new("id", "int(11)", RelationalType::Integer),
            ColumnMapping::new("name", "varchar(50)", RelationalType::Text),
        ]
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("users"), "\"users\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
        assert_eq!(qualify_table("public", "Users"), "\"public\".\"Users\"");
    }

    #[test]
    fn test_generate_ddl() {
        let ddl = generate_ddl("public", "users", &columns());
        assert_eq!(
            ddl,
            "CREATE TABLE \"public\".\"users\" (\n    \"id\" INTEGER,\n    \"name\" TEXT\n)"
        );
    }

    #[test]
    fn test_generate_insert_casts_text_params() {
        let sql = generate_insert("public", "users", &columns());
        assert_eq!(
            sql,
            "INSERT INTO \"public\".\"users\" (\"id\", \"name\") VALUES ($1::INTEGER, $2::TEXT)"
        );
    }

    #[test]
    fn test_generate_insert_without_columns() {
        let sql = generate_insert("public", "empty", &[]);
        assert_eq!(sql, "INSERT INTO \"public\".\"empty\" DEFAULT VALUES");
    }

    #[tokio::test]
    async fn test_connect_refused_is_connection_error() {
        let config = RelationalTargetConfig {
            host: "127.0.0.1".into(),
            port: 1,
            database: "warehouse".into(),
            user: "postgres".into(),
            password: "postgres".into(),
            schema: "public".into(),
            ssl_mode: "disable".into(),
        };
        match PostgresWriter::connect(&config).await {
            Err(MigrateError::Connection(msg)) => {
                assert!(msg.starts_with("PostgreSQL connection failed"))
            }
            Err(other) => panic!("expected connection error, got {:?}", other),
            Ok(_) => panic!("expected connection error, got a connection"),
        }
    }
}
