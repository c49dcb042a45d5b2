//! MySQL/MariaDB source reader implementation.
//!
//! Holds a single SQLx connection rather than a pool, so every source call
//! makes exactly one connection attempt.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::mysql::{
    MySqlConnectOptions, MySqlConnection, MySqlDatabaseError, MySqlRow, MySqlSslMode,
};
use sqlx::{Connection, Row as _, ValueRef as _};
use tracing::{debug, info};

use crate::config::SourceConfig;
use crate::core::schema::{Column, Relationship, Table};
use crate::core::traits::SourceReader;
use crate::core::value::{Row, SqlValue};
use crate::error::{MigrateError, Result};

/// Connection attempt timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// MySQL server error: access denied for user.
const ER_ACCESS_DENIED_ERROR: u16 = 1045;

/// MySQL server error: unknown database.
const ER_BAD_DB_ERROR: u16 = 1049;

/// What a source connection is used for; decides how server errors read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadContext {
    Analysis,
    Migration,
}

/// MySQL/MariaDB source reader implementation.
pub struct MysqlReader {
    conn: MySqlConnection,
    host: String,
    port: u16,
    database: String,
    context: ReadContext,
}

impl MysqlReader {
    /// Open a connection to the source database for schema analysis.
    pub async fn connect(config: &SourceConfig) -> Result<Self> {
        Self::connect_in(config, ReadContext::Analysis).await
    }

    /// Open a connection to the source database for a migration run.
    pub async fn connect_for_migration(config: &SourceConfig) -> Result<Self> {
        Self::connect_in(config, ReadContext::Migration).await
    }

    async fn connect_in(config: &SourceConfig, context: ReadContext) -> Result<Self> {
        let options = MySqlConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .database(&config.database)
            .username(&config.user)
            .password(&config.password)
            .ssl_mode(MySqlSslMode::Preferred);

        let conn = match tokio::time::timeout(
            CONNECT_TIMEOUT,
            MySqlConnection::connect_with(&options),
        )
        .await
        {
            Ok(Ok(conn)) => conn,
            Ok(Err(e)) => return Err(classify_mysql_error(e, context, config)),
            Err(_) => return Err(not_accessible(&config.host, config.port)),
        };

        info!(
            "Connected to MySQL source: {}:{}/{}",
            config.host, config.port, config.database
        );

        Ok(Self {
            conn,
            host: config.host.clone(),
            port: config.port,
            database: config.database.clone(),
            context,
        })
    }

    fn classify(&self, err: sqlx::Error) -> MigrateError {
        classify_with(err, self.context, &self.host, self.port, &self.database)
    }

    /// Quote a MySQL identifier.
    fn quote_ident(name: &str) -> String {
        format!("`{}`", name.replace('`', "``"))
    }

    /// Convert a MySQL row to values in column order.
    ///
    /// A non-NULL cell that decodes as nothing fails the whole read.
    fn row_to_values(row: &MySqlRow, table: &str, columns: &[Column]) -> Result<Row> {
        columns
            .iter()
            .enumerate()
            .map(|(i, col)| {
                let is_null = row.try_get_raw(i).map(|r| r.is_null()).unwrap_or(true);
                if is_null {
                    return Ok(SqlValue::Null);
                }

                let (base, unsigned) = base_type(&col.source_type);
                Self::decode_typed(row, i, &base, unsigned)
                    .or_else(|| Self::decode_fallback(row, i))
                    .ok_or_else(|| undecodable(table, col))
            })
            .collect()
    }

    fn decode_typed(row: &MySqlRow, i: usize, base: &str, unsigned: bool) -> Option<SqlValue> {
        match base {
            "tinyint" | "smallint" | "mediumint" | "int" | "integer" | "bigint" => {
                if unsigned {
                    row.try_get::<u64, _>(i).ok().map(|v| match i64::try_from(v) {
                        Ok(signed) => SqlValue::I64(signed),
                        Err(_) => SqlValue::Text(v.to_string()),
                    })
                } else {
                    row.try_get::<i64, _>(i).ok().map(SqlValue::I64)
                }
            }
            "year" => row
                .try_get::<u16, _>(i)
                .ok()
                .map(|v| SqlValue::I64(i64::from(v))),
            "bit" => row.try_get::<u64, _>(i).ok().map(|v| match i64::try_from(v) {
                Ok(signed) => SqlValue::I64(signed),
                Err(_) => SqlValue::Text(v.to_string()),
            }),

            "float" | "double" | "real" => row
                .try_get::<f64, _>(i)
                .or_else(|_| row.try_get::<f32, _>(i).map(f64::from))
                .ok()
                .map(SqlValue::F64),

            "decimal" | "numeric" => row
                .try_get::<rust_decimal::Decimal, _>(i)
                .ok()
                .map(SqlValue::Decimal),

            "date" => row
                .try_get::<chrono::NaiveDate, _>(i)
                .ok()
                .map(SqlValue::Date),
            "time" => row
                .try_get::<chrono::NaiveTime, _>(i)
                .ok()
                .map(SqlValue::Time),
            "datetime" | "timestamp" => row
                .try_get::<chrono::NaiveDateTime, _>(i)
                .ok()
                .map(SqlValue::DateTime),

            "binary" | "varbinary" | "blob" | "tinyblob" | "mediumblob" | "longblob" => row
                .try_get::<Vec<u8>, _>(i)
                .ok()
                .map(SqlValue::Bytes),

            "json" => row
                .try_get_unchecked::<String, _>(i)
                .ok()
                .map(SqlValue::Text),

            _ => row.try_get::<String, _>(i).ok().map(SqlValue::Text),
        }
    }

    /// Decode as text, then as raw bytes.
    fn decode_fallback(row: &MySqlRow, i: usize) -> Option<SqlValue> {
        if let Ok(s) = row.try_get::<String, _>(i) {
            return Some(SqlValue::Text(s));
        }
        row.try_get::<Vec<u8>, _>(i)
            .ok()
            .map(|bytes| match String::from_utf8(bytes) {
                Ok(s) => SqlValue::Text(s),
                Err(e) => SqlValue::Bytes(e.into_bytes()),
            })
    }
}

#[async_trait]
impl SourceReader for MysqlReader {
    async fn list_tables(&mut self) -> Result<Vec<String>> {
        // CAST to CHAR: information_schema may report VARBINARY under some collations
        let query = r#"
            SELECT CAST(TABLE_NAME AS CHAR(255)) AS TABLE_NAME
            FROM INFORMATION_SCHEMA.TABLES
            WHERE TABLE_SCHEMA = ? AND TABLE_TYPE = 'BASE TABLE'
            ORDER BY TABLE_NAME
        "#;

        let rows: Vec<MySqlRow> = sqlx::query(query)
            .bind(&self.database)
            .fetch_all(&mut self.conn)
            .await
            .map_err(|e| self.classify(e))?;

        let names = rows
            .iter()
            .map(|row| row.try_get::<String, _>("TABLE_NAME"))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| self.classify(e))?;

        info!(
            "Found {} tables in MySQL database '{}'",
            names.len(),
            self.database
        );
        Ok(names)
    }

    async fn describe_table(&mut self, table: &str) -> Result<Table> {
        let query = r#"
            SELECT
                CAST(COLUMN_NAME AS CHAR(255)) AS COLUMN_NAME,
                CAST(COLUMN_TYPE AS CHAR) AS COLUMN_TYPE,
                CAST(IF(IS_NULLABLE = 'YES', 1, 0) AS SIGNED) AS is_nullable,
                CAST(IF(COLUMN_KEY = 'PRI', 1, 0) AS SIGNED) AS is_pk
            FROM INFORMATION_SCHEMA.COLUMNS
            WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ?
            ORDER BY ORDINAL_POSITION
        "#;

        let rows: Vec<MySqlRow> = sqlx::query(query)
            .bind(&self.database)
            .bind(table)
            .fetch_all(&mut self.conn)
            .await
            .map_err(|e| self.classify(e))?;

        let columns = rows
            .iter()
            .map(column_from_row)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| self.classify(e))?;

        debug!("Loaded {} columns for {}", columns.len(), table);
        Ok(Table::new(table, columns))
    }

    async fn load_relationships(&mut self, table: &str) -> Result<Vec<Relationship>> {
        let query = r#"
            SELECT
                CAST(COLUMN_NAME AS CHAR(255)) AS COLUMN_NAME,
                CAST(REFERENCED_TABLE_NAME AS CHAR(255)) AS REFERENCED_TABLE_NAME,
                CAST(REFERENCED_COLUMN_NAME AS CHAR(255)) AS REFERENCED_COLUMN_NAME
            FROM INFORMATION_SCHEMA.KEY_COLUMN_USAGE
            WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ? AND REFERENCED_TABLE_NAME IS NOT NULL
            ORDER BY CONSTRAINT_NAME, ORDINAL_POSITION
        "#;

        let rows: Vec<MySqlRow> = sqlx::query(query)
            .bind(&self.database)
            .bind(table)
            .fetch_all(&mut self.conn)
            .await
            .map_err(|e| self.classify(e))?;

        let relationships = rows
            .iter()
            .map(|row| relationship_from_row(table, row))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| self.classify(e))?;

        debug!("Loaded {} foreign keys for {}", relationships.len(), table);
        Ok(relationships)
    }

    async fn fetch_rows(&mut self, table: &Table) -> Result<Vec<Row>> {
        if table.columns.is_empty() {
            return Ok(Vec::new());
        }

        let col_list = table
            .columns
            .iter()
            .map(|c| Self::quote_ident(&c.name))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!("SELECT {} FROM {}", col_list, Self::quote_ident(&table.name));

        let rows: Vec<MySqlRow> = sqlx::query(&sql)
            .fetch_all(&mut self.conn)
            .await
            .map_err(|e| self.classify(e))?;

        debug!("Read {} rows from {}", rows.len(), table.name);
        rows.iter()
            .map(|row| Self::row_to_values(row, &table.name, &table.columns))
            .collect()
    }

    fn db_type(&self) -> &str {
        "mysql"
    }

    async fn close(self) -> Result<()> {
        let Self {
            conn,
            host,
            port,
            database,
            context,
        } = self;
        conn.close()
            .await
            .map_err(|e| classify_with(e, context, &host, port, &database))
    }
}

fn column_from_row(row: &MySqlRow) -> sqlx::Result<Column> {
    Ok(Column::new(
        row.try_get::<String, _>("COLUMN_NAME")?,
        row.try_get::<String, _>("COLUMN_TYPE")?,
        row.try_get::<i64, _>("is_nullable")? == 1,
        row.try_get::<i64, _>("is_pk")? == 1,
    ))
}

fn relationship_from_row(table: &str, row: &MySqlRow) -> sqlx::Result<Relationship> {
    Ok(Relationship::new(
        table,
        row.try_get::<String, _>("COLUMN_NAME")?,
        row.try_get::<String, _>("REFERENCED_TABLE_NAME")?,
        row.try_get::<String, _>("REFERENCED_COLUMN_NAME")?,
    ))
}

/// Lowercase base type and unsigned flag from a raw column type
/// (e.g. "int(10) unsigned" -> ("int", true)).
fn base_type(source_type: &str) -> (String, bool) {
    let lower = source_type.to_lowercase();
    let base = lower
        .split(|c: char| c == '(' || c == ' ')
        .next()
        .unwrap_or_default()
        .to_string();
    let unsigned = lower.contains("unsigned");
    (base, unsigned)
}

fn undecodable(table: &str, column: &Column) -> MigrateError {
    MigrateError::Operation(format!(
        "Could not decode {}.{} ({})",
        table, column.name, column.source_type
    ))
}

fn not_accessible(host: &str, port: u16) -> MigrateError {
    MigrateError::Connection(format!("MySQL server not accessible at {}:{}", host, port))
}

/// Classify a MySQL driver error for the given source.
pub fn classify_mysql_error(
    err: sqlx::Error,
    context: ReadContext,
    config: &SourceConfig,
) -> MigrateError {
    classify_with(err, context, &config.host, config.port, &config.database)
}

fn classify_with(
    err: sqlx::Error,
    context: ReadContext,
    host: &str,
    port: u16,
    database: &str,
) -> MigrateError {
    match &err {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => not_accessible(host, port),
        sqlx::Error::Database(db) => {
            let number = db
                .try_downcast_ref::<MySqlDatabaseError>()
                .map(|e| e.number());
            classify_server_error(context, number, db.message(), database)
        }
        _ => MigrateError::unexpected(&err),
    }
}

/// Classify an error reported by the MySQL server itself.
///
/// Analysis names a missing database; a migration run only singles out
/// bad credentials.
fn classify_server_error(
    context: ReadContext,
    number: Option<u16>,
    message: &str,
    database: &str,
) -> MigrateError {
    match (context, number) {
        (_, Some(ER_ACCESS_DENIED_ERROR)) => MigrateError::Auth(
            "MySQL authentication failed - check username and password".into(),
        ),
        (ReadContext::Analysis, Some(ER_BAD_DB_ERROR)) => {
            MigrateError::MissingDatabase(format!("Database '{}' does not exist", database))
        }
        (ReadContext::Analysis, _) => {
            MigrateError::Operation(format!("MySQL connection error: {}", message))
        }
        (ReadContext::Migration, _) => {
            MigrateError::Operation(format!("MySQL error during migration: {}", message))
        }
    }
}
