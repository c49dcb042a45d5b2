//! Type mapping from MySQL source types to target representations.
//!
//! Relational targets get a column type classified from the raw source type
//! string. Document targets get each value coerced into something BSON can
//! hold natively.

use std::fmt;

use bson::spec::BinarySubtype;
use bson::{Binary, Bson, Document};
use rust_decimal::prelude::ToPrimitive;

use crate::core::SqlValue;

/// Column type created in a relational target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationalType {
    Integer,
    Text,
    Timestamp,
    Numeric,
}

impl RelationalType {
    /// The SQL spelling used in DDL and parameter casts.
    pub fn as_sql(&self) -> &'static str {
        match self {
            RelationalType::Integer => "INTEGER",
            RelationalType::Text => "TEXT",
            RelationalType::Timestamp => "TIMESTAMP",
            RelationalType::Numeric => "NUMERIC",
        }
    }
}

impl fmt::Display for RelationalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Classify a source column type.
///
/// Substring match on the lowercased type, first hit wins, so "tinyint(1)"
/// and "point" both land on Integer and "datetime" lands on Timestamp.
pub fn map_relational_type(source_type: &str) -> RelationalType {
    let t = source_type.to_lowercase();
    if t.contains("int") {
        RelationalType::Integer
    } else if t.contains("char") || t.contains("text") {
        RelationalType::Text
    } else if t.contains("date") || t.contains("time") {
        RelationalType::Timestamp
    } else if t.contains("float") || t.contains("double") || t.contains("decimal") {
        RelationalType::Numeric
    } else {
        RelationalType::Text
    }
}

/// Coerce a value for storage in a document.
///
/// Decimals become doubles, temporal values become ISO-8601 strings, and
/// everything else is returned unchanged.
pub fn coerce_for_document(value: SqlValue) -> SqlValue {
    match value {
        SqlValue::Decimal(d) => match d.to_f64() {
            Some(f) => SqlValue::F64(f),
            None => SqlValue::Text(d.to_string()),
        },
        SqlValue::Date(d) => SqlValue::Text(d.format("%Y-%m-%d").to_string()),
        SqlValue::Time(t) => SqlValue::Text(t.to_string()),
        SqlValue::DateTime(dt) => SqlValue::Text(dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string()),
        other => other,
    }
}

/// Convert a value to BSON.
///
/// Integers that fit 32 bits are stored as int32, the rest as int64.
pub fn to_bson(value: &SqlValue) -> Bson {
    match value {
        SqlValue::Null => Bson::Null,
        SqlValue::I64(v) => match i32::try_from(*v) {
            Ok(small) => Bson::Int32(small),
            Err(_) => Bson::Int64(*v),
        },
        SqlValue::F64(v) => Bson::Double(*v),
        SqlValue::Decimal(d) => d
            .to_f64()
            .map(Bson::Double)
            .unwrap_or_else(|| Bson::String(d.to_string())),
        SqlValue::Text(s) => Bson::String(s.clone()),
        SqlValue::Bytes(b) => Bson::Binary(Binary {
            subtype: BinarySubtype::Generic,
            bytes: b.clone(),
        }),
        SqlValue::Date(d) => Bson::String(d.format("%Y-%m-%d").to_string()),
        SqlValue::Time(t) => Bson::String(t.to_string()),
        SqlValue::DateTime(dt) => Bson::String(dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string()),
    }
}

/// Build one document from a row, fields in column order.
pub fn document_from_row(columns: &[String], row: Vec<SqlValue>) -> Document {
    let mut doc = Document::new();
    for (name, value) in columns.iter().zip(row) {
        doc.insert(name.clone(), to_bson(&coerce_for_document(value)));
    }
    doc
}

/// Render a value as the text parameter bound for a relational insert.
///
/// The statement casts each parameter to its column type server-side, so the
/// text only has to be in a form PostgreSQL's input functions accept. `None`
/// binds SQL NULL.
pub fn to_pg_text(value: &SqlValue, target: RelationalType) -> Option<String> {
    match value {
        SqlValue::Null => None,
        SqlValue::I64(v) => Some(v.to_string()),
        SqlValue::F64(v) => Some(v.to_string()),
        SqlValue::Decimal(d) => Some(d.to_string()),
        SqlValue::Text(s) => Some(s.clone()),
        SqlValue::Bytes(b) => Some(format!("\\x{}", hex::encode(b))),
        SqlValue::Date(d) => Some(d.format("%Y-%m-%d").to_string()),
        // A bare time of day does not parse as a timestamp; anchor it to the epoch.
        SqlValue::Time(t) if target == RelationalType::Timestamp => {
            Some(format!("1970-01-01 {}", t))
        }
        SqlValue::Time(t) => Some(t.to_string()),
        SqlValue::DateTime(dt) => Some(dt.format("%Y-%m-%d %H:%M:%S%.f").to_string()),
    }
}
