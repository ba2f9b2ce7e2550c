//! Conversion of rows returned by the SQL engine into data frames.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use common::errors::{AppError, AppResult};
use common::models::frame::{Field, FieldType, Frame};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::postgres::types::Oid;
use sqlx::postgres::{PgRow, Postgres};
use sqlx::{Column, Decode, Row, Type, TypeInfo};

/// Name of every frame produced by this backend.
pub const FRAME_NAME: &str = "tail";

/// Logical timestamp column added by `TAIL`, in milliseconds.
const MZ_TIMESTAMP: &str = "mz_timestamp";

/// How a column is decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ColumnKind {
    MzTimestamp,
    Char,
    Int2,
    Int4,
    Int8,
    Float4,
    Float8,
    Numeric,
    Oid,
    Bool,
    Text,
    Json,
    Date,
    Timestamp,
    TimestampTz,
    Unsupported(String),
}

impl ColumnKind {
    fn classify(column_name: &str, type_name: &str) -> Self {
        if column_name == MZ_TIMESTAMP {
            return Self::MzTimestamp;
        }
        match type_name {
            "\"CHAR\"" | "CHAR" => Self::Char,
            "INT2" => Self::Int2,
            "INT4" => Self::Int4,
            "INT8" => Self::Int8,
            "FLOAT4" => Self::Float4,
            "FLOAT8" => Self::Float8,
            "NUMERIC" => Self::Numeric,
            "OID" => Self::Oid,
            "BOOL" => Self::Bool,
            "TEXT" | "VARCHAR" | "NAME" | "BPCHAR" => Self::Text,
            "JSON" | "JSONB" => Self::Json,
            "DATE" => Self::Date,
            "TIMESTAMP" => Self::Timestamp,
            "TIMESTAMPTZ" => Self::TimestampTz,
            other => Self::Unsupported(other.to_string()),
        }
    }

    fn field_type(&self) -> FieldType {
        match self {
            Self::MzTimestamp | Self::Date | Self::Timestamp | Self::TimestampTz => FieldType::Time,
            Self::Char
            | Self::Int2
            | Self::Int4
            | Self::Int8
            | Self::Float4
            | Self::Float8
            | Self::Numeric
            | Self::Oid => FieldType::Number,
            Self::Bool => FieldType::Boolean,
            Self::Text | Self::Json | Self::Unsupported(_) => FieldType::String,
        }
    }
}

fn load_column<'r, T, F>(rows: &'r [PgRow], index: usize, to_value: F) -> AppResult<Vec<Value>>
where
    T: Decode<'r, Postgres> + Type<Postgres>,
    F: Fn(T) -> Value,
{
    rows.iter()
        .map(|row| {
            row.try_get::<Option<T>, _>(index)
                .map(|v| v.map_or(Value::Null, &to_value))
                .map_err(|e| AppError::Data(e.to_string()))
        })
        .collect()
}

fn decimal_millis(d: Decimal) -> Value {
    d.to_i64()
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .map_or(Value::Null, |t| Value::from(t.timestamp_millis()))
}

fn date_millis(d: NaiveDate) -> Value {
    d.and_hms_opt(0, 0, 0)
        .map_or(Value::Null, |t| Value::from(t.and_utc().timestamp_millis()))
}

fn column_values(rows: &[PgRow], index: usize, kind: &ColumnKind) -> AppResult<Vec<Value>> {
    match kind {
        ColumnKind::MzTimestamp => load_column::<Decimal, _>(rows, index, decimal_millis),
        ColumnKind::Char => load_column::<i8, _>(rows, index, Value::from),
        ColumnKind::Int2 => load_column::<i16, _>(rows, index, Value::from),
        ColumnKind::Int4 => load_column::<i32, _>(rows, index, Value::from),
        ColumnKind::Int8 => load_column::<i64, _>(rows, index, Value::from),
        ColumnKind::Float4 => load_column::<f32, _>(rows, index, Value::from),
        ColumnKind::Float8 => load_column::<f64, _>(rows, index, Value::from),
        ColumnKind::Numeric => {
            load_column::<Decimal, _>(rows, index, |d| d.to_f64().map_or(Value::Null, Value::from))
        }
        ColumnKind::Oid => load_column::<Oid, _>(rows, index, |oid| Value::from(oid.0)),
        ColumnKind::Bool => load_column::<bool, _>(rows, index, Value::from),
        ColumnKind::Text => load_column::<String, _>(rows, index, Value::from),
        ColumnKind::Json => load_column::<Value, _>(rows, index, |v| Value::from(v.to_string())),
        ColumnKind::Date => load_column::<NaiveDate, _>(rows, index, date_millis),
        ColumnKind::Timestamp => load_column::<NaiveDateTime, _>(rows, index, |t| {
            Value::from(t.and_utc().timestamp_millis())
        }),
        ColumnKind::TimestampTz => load_column::<DateTime<Utc>, _>(rows, index, |t| {
            Value::from(t.timestamp_millis())
        }),
        ColumnKind::Unsupported(type_name) => Ok(std::iter::repeat_with(|| {
            Value::from(format!("unsupported column type {type_name}"))
        })
        .take(rows.len())
        .collect()),
    }
}

/// Converts rows returned from the SQL engine into a frame.
///
/// Columns are taken from the first row; an empty result gives an empty frame.
pub fn rows_to_frame(rows: &[PgRow]) -> AppResult<Frame> {
    let mut frame = Frame::new(FRAME_NAME);
    let Some(first) = rows.first() else {
        return Ok(frame);
    };

    for (index, column) in first.columns().iter().enumerate() {
        let name = column.name();
        let kind = ColumnKind::classify(name, column.type_info().name());
        let values = column_values(rows, index, &kind)?;
        frame.add_field(Field::new(name, kind.field_type(), values));
    }
    frame.check()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::prelude::FromPrimitive;

    #[test]
    fn test_mz_timestamp_wins_over_type() {
        assert_eq!(ColumnKind::classify("mz_timestamp", "NUMERIC"), ColumnKind::MzTimestamp);
        assert_eq!(ColumnKind::classify("total", "NUMERIC"), ColumnKind::Numeric);
        assert_eq!(ColumnKind::MzTimestamp.field_type(), FieldType::Time);
    }

    #[test]
    fn test_classify_types() {
        assert_eq!(ColumnKind::classify("a", "INT8").field_type(), FieldType::Number);
        assert_eq!(ColumnKind::classify("a", "VARCHAR").field_type(), FieldType::String);
        assert_eq!(ColumnKind::classify("a", "BOOL").field_type(), FieldType::Boolean);
        assert_eq!(ColumnKind::classify("a", "TIMESTAMPTZ").field_type(), FieldType::Time);
        assert_eq!(ColumnKind::classify("a", "JSONB"), ColumnKind::Json);
        assert_eq!(
            ColumnKind::classify("a", "INTERVAL"),
            ColumnKind::Unsupported("INTERVAL".into())
        );
    }

    #[test]
    fn test_decimal_millis() {
        let d = Decimal::from_i64(1_640_995_200_123).unwrap();
        assert_eq!(decimal_millis(d), Value::from(1_640_995_200_123i64));
        assert_eq!(decimal_millis(Decimal::MAX), Value::Null);
    }

    #[test]
    fn test_date_millis_is_midnight_utc() {
        let d = NaiveDate::from_ymd_opt(2022, 1, 1).unwrap();
        assert_eq!(date_millis(d), Value::from(1_640_995_200_000i64));
    }

    #[test]
    fn test_empty_rows_give_empty_frame() {
        let frame = rows_to_frame(&[]).unwrap();
        assert_eq!(frame.name, FRAME_NAME);
        assert!(frame.fields.is_empty());
    }
}
