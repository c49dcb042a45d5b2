//! Transport-facing operations.
//!
//! [`analyze`] and [`transfer`] are what an HTTP or RPC layer calls. They
//! take plain request payloads, run the work on its own task and sort every
//! failure into a client or server [`ApiError`].

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

use crate::config::SourceConfig;
use crate::core::schema::SchemaModel;
use crate::error::MigrateError;
use crate::introspect::SchemaIntrospector;
use crate::migrate::{MigrationEngine, MigrationOutcome, TransferTarget};
use crate::recommend::{Recommendation, RecommendationEngine, TargetKind};

/// Failure of an API call, split by who caused it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// The request or the databases it names are at fault.
    #[error("{0}")]
    BadRequest(String),

    /// Something failed on our side.
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    /// HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::BadRequest(_) => 400,
            ApiError::Internal(_) => 500,
        }
    }

    pub fn detail(&self) -> &str {
        match self {
            ApiError::BadRequest(d) | ApiError::Internal(d) => d,
        }
    }

    /// Process exit code used by the command-line front-end.
    pub fn exit_code(&self) -> u8 {
        match self {
            ApiError::BadRequest(_) => 2,
            ApiError::Internal(_) => 3,
        }
    }
}

impl From<MigrateError> for ApiError {
    fn from(err: MigrateError) -> Self {
        if err.is_client_error() {
            ApiError::BadRequest(err.to_string())
        } else {
            ApiError::Internal(err.to_string())
        }
    }
}

impl Serialize for ApiError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Body<'a> {
            detail: &'a str,
        }
        Body {
            detail: self.detail(),
        }
        .serialize(serializer)
    }
}

/// Response of a successful analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzeResponse {
    pub analysis: SchemaModel,
    pub recommendation: TargetKind,
    pub summary: String,
}

impl AnalyzeResponse {
    pub fn new(analysis: SchemaModel, recommendation: Recommendation) -> Self {
        let summary = format!(
            "Recommended target DB: {} based on schema analysis.\n\nReason: {}",
            recommendation.target, recommendation.explanation
        );
        Self {
            analysis,
            recommendation: recommendation.target,
            summary,
        }
    }
}

/// A transfer request.
///
/// Credentials stay untyped until `target_db` has been checked, so an
/// unsupported target is reported as such whatever credentials came with it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferRequest {
    pub target_db: String,

    #[serde(alias = "mysql_credentials")]
    pub source_credentials: serde_json::Value,

    #[serde(default)]
    pub target_credentials: serde_json::Value,
}

/// Introspect the source and recommend a target store.
///
/// `source_credentials` must carry host, port, database, user and password.
pub async fn analyze(source_credentials: serde_json::Value) -> Result<AnalyzeResponse, ApiError> {
    let source = SourceConfig::from_request(source_credentials)?;
    let task = tokio::spawn(async move {
        let mut model = SchemaIntrospector::new(source).introspect().await;
        if let Some(detail) = model.error.take() {
            return Err(ApiError::BadRequest(detail));
        }
        let recommendation = RecommendationEngine::new().recommend(&model);
        Ok(AnalyzeResponse::new(model, recommendation))
    });

    task.await.map_err(|e| {
        error!("Analysis task failed: {}", e);
        ApiError::Internal(format!("Internal server error during analysis: {}", e))
    })?
}

/// Migrate every source table into the requested target.
pub async fn transfer(request: TransferRequest) -> Result<MigrationOutcome, ApiError> {
    let target = TransferTarget::from_request(&request.target_db, request.target_credentials)?;
    let source = SourceConfig::from_request(request.source_credentials)?;

    let task = tokio::spawn(async move {
        let outcome = MigrationEngine::new().migrate(&source, &target).await;
        if outcome.is_success() {
            Ok(outcome)
        } else {
            Err(ApiError::BadRequest(outcome.details))
        }
    });

    task.await.map_err(|e| {
        error!("Migration task failed: {}", e);
        ApiError::Internal(format!("Internal server error during migration: {}", e))
    })?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::{Column, Table};
    use serde_json::json;

    fn unreachable_source() -> serde_json::Value {
        json!({
            "host": "127.0.0.1",
            "port": 1,
            "database": "shop",
            "user": "root",
            "password": "password"
        })
    }

    fn unreachable_postgres() -> serde_json::Value {
        json!({
            "host": "127.0.0.1",
            "port": 1,
            "database": "dw",
            "user": "loader",
            "password": "secret"
        })
    }

    #[test]
    fn test_error_status_and_body() {
        let err = ApiError::BadRequest("Database 'shop' does not exist".into());
        assert_eq!(err.status_code(), 400);
        assert_eq!(
            serde_json::to_value(&err).unwrap(),
            json!({ "detail": "Database 'shop' does not exist" })
        );
        assert_eq!(ApiError::Internal("boom".into()).status_code(), 500);
    }

    #[test]
    fn test_migrate_errors_split_by_cause() {
        let err: ApiError = MigrateError::UnsupportedTarget("oracle".into()).into();
        assert_eq!(err.status_code(), 400);

        let err: ApiError = MigrateError::unexpected("worker gone").into();
        assert_eq!(err, ApiError::Internal("worker gone".into()));
    }

    #[test]
    fn test_summary_wording() {
        let model = SchemaModel::new(
            vec![Table::new(
                "attachments",
                vec![Column::new("data", "BLOB", true, false)],
            )],
            vec![],
        );
        let recommendation = RecommendationEngine::new().recommend(&model);
        let response = AnalyzeResponse::new(model, recommendation);

        assert_eq!(response.recommendation, TargetKind::Document);
        assert_eq!(
            response.summary,
            "Recommended target DB: mongodb based on schema analysis.\n\n\
             Reason: Table attachments has unstructured or large object columns (BLOB)."
        );

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["recommendation"], "mongodb");
        assert_eq!(json["analysis"]["tables"][0]["columns"][0]["type"], "BLOB");
        assert_eq!(json["analysis"]["tables"][0]["columns"][0]["primary_key"], false);
        assert!(json["analysis"].get("error").is_none());
    }

    #[test]
    fn test_transfer_request_accepts_original_field_names() {
        let request: TransferRequest = serde_json::from_value(json!({
            "target_db": "mongodb",
            "mysql_credentials": {
                "mysql_host": "db.internal",
                "mysql_port": 3307,
                "mysql_database": "shop",
                "mysql_user": "reader",
                "mysql_password": "pw"
            },
            "target_credentials": { "uri": "mongodb://localhost:27017/", "database": "shop" }
        }))
        .unwrap();

        let source = SourceConfig::from_request(request.source_credentials).unwrap();
        assert_eq!(source.host, "db.internal");
        assert_eq!(source.port, 3307);
        assert_eq!(source.user, "reader");
        assert_eq!(request.target_credentials["database"], "shop");
    }

    #[tokio::test]
    async fn test_transfer_rejects_unsupported_target() {
        let err = transfer(TransferRequest {
            target_db: "cassandra".into(),
            source_credentials: unreachable_source(),
            target_credentials: json!({}),
        })
        .await
        .unwrap_err();

        assert_eq!(
            err,
            ApiError::BadRequest(
                "Unsupported target database: cassandra. Supported targets: postgresql, mongodb"
                    .into()
            )
        );
    }

    #[tokio::test]
    async fn test_transfer_rejects_malformed_credentials() {
        let err = transfer(TransferRequest {
            target_db: "postgresql".into(),
            source_credentials: unreachable_source(),
            target_credentials: json!({ "port": "not a number" }),
        })
        .await
        .unwrap_err();

        assert_eq!(err.status_code(), 400);
        assert!(err.detail().contains("invalid PostgreSQL target credentials"));
    }

    #[tokio::test]
    async fn test_transfer_failure_is_client_error() {
        let err = transfer(TransferRequest {
            target_db: "postgresql".into(),
            source_credentials: unreachable_source(),
            target_credentials: unreachable_postgres(),
        })
        .await
        .unwrap_err();

        assert_eq!(
            err,
            ApiError::BadRequest("MySQL server not accessible at 127.0.0.1:1".into())
        );
    }

    #[tokio::test]
    async fn test_transfer_requires_every_target_credential() {
        let mut target = unreachable_postgres();
        target.as_object_mut().unwrap().remove("password");

        let err = transfer(TransferRequest {
            target_db: "postgresql".into(),
            source_credentials: unreachable_source(),
            target_credentials: target,
        })
        .await
        .unwrap_err();

        assert_eq!(err.status_code(), 400);
        assert!(err.detail().contains("invalid PostgreSQL target credentials"));
        assert!(err.detail().contains("missing field `password`"));

        let err = transfer(TransferRequest {
            target_db: "mongodb".into(),
            source_credentials: unreachable_source(),
            target_credentials: json!({ "uri": "mongodb://127.0.0.1:1/" }),
        })
        .await
        .unwrap_err();

        assert_eq!(err.status_code(), 400);
        assert!(err.detail().contains("missing field `database`"));
    }

    #[tokio::test]
    async fn test_transfer_requires_every_source_credential() {
        let err = transfer(TransferRequest {
            target_db: "postgresql".into(),
            source_credentials: json!({ "host": "127.0.0.1", "port": 1, "database": "shop" }),
            target_credentials: unreachable_postgres(),
        })
        .await
        .unwrap_err();

        assert_eq!(err.status_code(), 400);
        assert!(err.detail().contains("invalid MySQL source credentials"));
        assert!(err.detail().contains("missing field `user`"));
    }

    #[tokio::test]
    async fn test_analyze_requires_every_source_credential() {
        let mut source = unreachable_source();
        source.as_object_mut().unwrap().remove("database");

        let err = analyze(source).await.unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert!(err.detail().contains("missing field `database`"));
    }

    #[tokio::test]
    async fn test_analyze_unreachable_source_is_client_error() {
        let err = analyze(unreachable_source()).await.unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.detail(), "MySQL server not accessible at 127.0.0.1:1");
    }
}
