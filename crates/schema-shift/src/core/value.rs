//! Row cell values read from the source database.
//!
//! Tables are materialized one at a time, so values are always owned.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;

/// A single row, one value per column in column order.
pub type Row = Vec<SqlValue>;

/// SQL value enum for type-safe row handling.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// NULL.
    Null,

    /// Any integer width, signed or unsigned up to `i64::MAX`.
    I64(i64),

    /// 64-bit floating point (float/double/real).
    F64(f64),

    /// Exact decimal (decimal/numeric).
    Decimal(Decimal),

    /// Text data (char, varchar, text, enum, set, json).
    Text(String),

    /// Binary data (binary, varbinary, blob).
    Bytes(Vec<u8>),

    /// Timestamp without timezone (datetime/timestamp).
    DateTime(NaiveDateTime),

    /// Date without time component.
    Date(NaiveDate),

    /// Time without date component.
    Time(NaiveTime),
}
