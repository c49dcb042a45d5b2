//! Target store recommendation.
//!
//! A pure function of the [`SchemaModel`]: rules are evaluated in order and
//! the first match decides the target.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::schema::SchemaModel;
use crate::error::MigrateError;

/// Relationships per table above which a schema counts as highly relational.
const HIGHLY_RELATIONAL_RATIO: f64 = 0.3;

/// Relationships per table above which a schema still prefers a relational store.
const SOME_RELATIONSHIPS_RATIO: f64 = 0.1;

/// Source types that suggest unstructured or nested payloads.
const ADVANCED_TYPES: &[&str] = &[
    "CLOB", "BLOB", "LONG", "RAW", "LONG RAW", "JSON", "ARRAY", "OBJECT",
];

/// Large-object types that push a loosely related schema to a document store.
const LARGE_OBJECT_TYPES: &[&str] = &["CLOB", "BLOB", "LONG", "RAW", "LONG RAW", "JSON"];

/// Kind of target store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    /// PostgreSQL.
    #[serde(rename = "postgresql")]
    Relational,
    /// MongoDB.
    #[serde(rename = "mongodb")]
    Document,
}

impl TargetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetKind::Relational => "postgresql",
            TargetKind::Document => "mongodb",
        }
    }

    /// Display name used in messages.
    pub fn product_name(&self) -> &'static str {
        match self {
            TargetKind::Relational => "PostgreSQL",
            TargetKind::Document => "MongoDB",
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetKind {
    type Err = MigrateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "postgresql" | "postgres" | "pg" => Ok(TargetKind::Relational),
            "mongodb" | "mongo" => Ok(TargetKind::Document),
            _ => Err(MigrateError::UnsupportedTarget(s.to_string())),
        }
    }
}

/// A recommended target with a human-readable reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub target: TargetKind,
    pub explanation: String,
}

impl Recommendation {
    fn new(target: TargetKind, explanation: impl Into<String>) -> Self {
        Self {
            target,
            explanation: explanation.into(),
        }
    }
}

/// Scores a schema model against the recommendation rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecommendationEngine;

impl RecommendationEngine {
    pub fn new() -> Self {
        Self
    }

    /// Recommend a target store for a successfully introspected schema.
    ///
    /// Callers check [`SchemaModel::error`] first; an error model has no
    /// tables and would simply get the empty-schema default.
    pub fn recommend(&self, model: &SchemaModel) -> Recommendation {
        let tables = model.tables.len();
        let relationships = model.relationships.len();

        if tables == 0 {
            return Recommendation::new(
                TargetKind::Relational,
                "No tables found, defaulting to PostgreSQL.",
            );
        }

        let rel_ratio = model.relational_ratio();

        if rel_ratio > HIGHLY_RELATIONAL_RATIO {
            let explanation = if uses_types(model, ADVANCED_TYPES) {
                "Schema is highly relational but uses advanced types (e.g., JSON, arrays, objects), \
                 so PostgreSQL is a better fit."
                    .to_string()
            } else {
                format!(
                    "Schema is highly relational ({} relationships for {} tables). \
                     PostgreSQL is a good fit.",
                    relationships, tables
                )
            };
            return Recommendation::new(TargetKind::Relational, explanation);
        }

        for table in &model.tables {
            if let Some(col) = table
                .columns
                .iter()
                .find(|c| is_one_of(&c.source_type, LARGE_OBJECT_TYPES))
            {
                return Recommendation::new(
                    TargetKind::Document,
                    format!(
                        "Table {} has unstructured or large object columns ({}).",
                        table.name, col.source_type
                    ),
                );
            }
        }

        if rel_ratio > SOME_RELATIONSHIPS_RATIO {
            let explanation = if uses_types(model, ADVANCED_TYPES) {
                format!(
                    "Some relationships detected ({}), and schema uses advanced types, \
                     so PostgreSQL is a better fit.",
                    relationships
                )
            } else {
                format!(
                    "Some relationships detected ({}). PostgreSQL is a good fit.",
                    relationships
                )
            };
            return Recommendation::new(TargetKind::Relational, explanation);
        }

        Recommendation::new(
            TargetKind::Document,
            "Few relationships and no large object columns detected, so MongoDB is a good fit.",
        )
    }
}

/// Exact membership of the raw type string, case included.
fn is_one_of(source_type: &str, set: &[&str]) -> bool {
    set.iter().any(|candidate| *candidate == source_type)
}

fn uses_types(model: &SchemaModel, set: &[&str]) -> bool {
    model
        .tables
        .iter()
        .flat_map(|t| t.columns.iter())
        .any(|c| is_one_of(&c.source_type, set))
}
