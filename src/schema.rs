//! Schema & validation (spec §3, §4.B).

use crate::status::{KdbResult, Status};
use crate::value::{DataType, Value};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Per-column/field value constraints (all optional).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Constraints {
    pub min_length: Option<u32>,
    pub max_length: Option<u32>,
    pub one_of: Option<Vec<String>>,
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
}

impl Constraints {
    pub fn none() -> Self {
        Self::default()
    }

    fn check(&self, value: &Value) -> KdbResult<()> {
        if value.is_null() {
            return Ok(());
        }
        if let Value::String(s) = value {
            if let Some(min) = self.min_length {
                if (s.len() as u32) < min {
                    return Err(Status::invalid_argument(format!(
                        "string length {} below minLength {}",
                        s.len(),
                        min
                    )));
                }
            }
            if let Some(max) = self.max_length {
                if (s.len() as u32) > max {
                    return Err(Status::invalid_argument(format!(
                        "string length {} above maxLength {}",
                        s.len(),
                        max
                    )));
                }
            }
            if let Some(allowed) = &self.one_of {
                if !allowed.iter().any(|a| a == s) {
                    return Err(Status::invalid_argument(format!(
                        "value '{}' not in oneOf list",
                        s
                    )));
                }
            }
        }
        if matches!(value, Value::Integer(_) | Value::Float(_)) {
            let v = value.as_float()?;
            if let Some(min) = self.min_value {
                if v < min {
                    return Err(Status::invalid_argument(format!(
                        "value {} below minValue {}",
                        v, min
                    )));
                }
            }
            if let Some(max) = self.max_value {
                if v > max {
                    return Err(Status::invalid_argument(format!(
                        "value {} above maxValue {}",
                        v, max
                    )));
                }
            }
        }
        Ok(())
    }
}

/// A single column/field declaration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Column {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
    pub unique: bool,
    pub constraints: Constraints,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: true,
            unique: false,
            constraints: Constraints::none(),
        }
    }

    pub fn nullable(mut self, v: bool) -> Self {
        self.nullable = v;
        self
    }

    pub fn unique(mut self, v: bool) -> Self {
        self.unique = v;
        self
    }

    pub fn with_constraints(mut self, c: Constraints) -> Self {
        self.constraints = c;
        self
    }

    /// Checks nullability, type (Float accepts Integer), and constraints
    /// for a single value against this column.
    pub fn validate(&self, value: &Value) -> KdbResult<()> {
        if value.is_null() {
            if self.nullable {
                return Ok(());
            }
            return Err(Status::invalid_argument(format!(
                "column '{}' is not nullable",
                self.name
            )));
        }
        let ok_type = value.data_type() == self.data_type
            || (self.data_type == DataType::Float && value.data_type() == DataType::Integer);
        if !ok_type {
            return Err(Status::invalid_argument(format!(
                "column '{}' expects {} but got {}",
                self.name,
                self.data_type,
                value.data_type()
            )));
        }
        self.constraints.check(value)
    }
}

/// Ordered table schema with a name index and optional primary key.
///
/// Not `#[derive(Serialize, Deserialize)]`: §4.K's JSON form for a schema is
/// a specific wire shape (full column metadata, constraints as explicit
/// nulls-for-unset), built by `serialize::json` directly from `columns`/
/// `primary_key` rather than by a generic derive.
#[derive(Debug, Clone)]
pub struct TableSchema {
    pub columns: Vec<Column>,
    index: FxHashMap<String, usize>,
    pub primary_key: Option<String>,
}

impl TableSchema {
    pub fn new(columns: Vec<Column>) -> KdbResult<Self> {
        let mut index = FxHashMap::default();
        for (i, c) in columns.iter().enumerate() {
            index.insert(c.name.clone(), i);
        }
        Ok(Self {
            columns,
            index,
            primary_key: None,
        })
    }

    pub fn with_primary_key(mut self, name: impl Into<String>) -> KdbResult<Self> {
        let name = name.into();
        if !self.index.contains_key(&name) {
            return Err(Status::invalid_argument(format!(
                "primary key column '{}' does not exist",
                name
            )));
        }
        self.primary_key = Some(name);
        Ok(self)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

}

/// Mapping `fieldName -> Column` (unordered; unknown document fields allowed).
///
/// Also hand-serialized by `serialize::json`, for the same reason as
/// [`TableSchema`].
#[derive(Debug, Clone)]
pub struct DocumentSchema {
    pub fields: FxHashMap<String, Column>,
}

impl DocumentSchema {
    pub fn new(fields: FxHashMap<String, Column>) -> Self {
        Self { fields }
    }

    pub fn get(&self, name: &str) -> Option<&Column> {
        self.fields.get(name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }
}

/// Time granularity for time-series timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Granularity {
    Nanoseconds,
    Microseconds,
    Milliseconds,
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl Granularity {
    /// Divisor to convert a raw timestamp cell into epoch seconds.
    pub fn seconds_divisor(self) -> i64 {
        match self {
            Granularity::Nanoseconds => 1_000_000_000,
            Granularity::Microseconds => 1_000_000,
            Granularity::Milliseconds => 1_000,
            Granularity::Seconds => 1,
            Granularity::Minutes => 1, // handled via factor below
            Granularity::Hours => 1,
            Granularity::Days => 1,
        }
    }

    /// Multiplier applied to a whole-unit count to get epoch seconds
    /// (used for Minutes/Hours/Days, whose divisor above is 1 because the
    /// raw timestamp is already stored in the unit's own count).
    pub fn unit_seconds(self) -> i64 {
        match self {
            Granularity::Minutes => 60,
            Granularity::Hours => 3600,
            Granularity::Days => 86400,
            _ => 1,
        }
    }

    /// Convert a raw stored timestamp to floored epoch seconds.
    pub fn to_epoch_seconds(self, raw: i64) -> i64 {
        match self {
            Granularity::Nanoseconds | Granularity::Microseconds | Granularity::Milliseconds => {
                floor_div(raw, self.seconds_divisor())
            }
            Granularity::Seconds => raw,
            Granularity::Minutes | Granularity::Hours | Granularity::Days => {
                raw * self.unit_seconds()
            }
        }
    }
}

/// Mathematical floor division (floors toward negative infinity, unlike
/// Rust's truncating `/`), required for negative timestamps (spec §3, §4.H).
pub fn floor_div(a: i64, b: i64) -> i64 {
    let q = a / b;
    let r = a % b;
    if (r != 0) && ((r < 0) != (b < 0)) {
        q - 1
    } else {
        q
    }
}

/// Bucket partition width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Partition {
    Hourly,
    Daily,
}

impl Partition {
    pub fn width_seconds(self) -> i64 {
        match self {
            Partition::Hourly => 3600,
            Partition::Daily => 86400,
        }
    }

    pub fn bucket_start(self, epoch_seconds: i64) -> i64 {
        floor_div(epoch_seconds, self.width_seconds()) * self.width_seconds()
    }
}

/// `{ttlSeconds, maxRows, dropOldest}` retention policy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetentionPolicy {
    pub ttl_seconds: u64,
    pub max_rows: u64,
    pub drop_oldest: bool,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            ttl_seconds: 0,
            max_rows: 0,
            drop_oldest: false,
        }
    }
}

/// `{timestampColumn, granularity, tagColumns, valueColumns, retentionPolicy}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeSeriesSchema {
    pub timestamp_column: String,
    pub granularity: Granularity,
    pub tag_columns: Vec<Column>,
    pub value_columns: Vec<Column>,
    pub partition: Partition,
    pub retention: RetentionPolicy,
}

impl TimeSeriesSchema {
    /// Derived table schema: `[timestamp:Integer non-null] ++ tags ++ values`.
    pub fn derived_table_schema(&self) -> KdbResult<TableSchema> {
        let mut cols = Vec::with_capacity(1 + self.tag_columns.len() + self.value_columns.len());
        cols.push(Column::new(self.timestamp_column.clone(), DataType::Integer).nullable(false));
        cols.extend(self.tag_columns.iter().cloned());
        cols.extend(self.value_columns.iter().cloned());
        TableSchema::new(cols)
    }
}

/// `validateRow(schema, row) -> Ok(()) | Err(message)` per spec §4.B.
pub fn validate_row(schema: &TableSchema, values: &[Value]) -> KdbResult<()> {
    if values.len() != schema.columns.len() {
        return Err(Status::invalid_argument(format!(
            "row arity {} does not match schema arity {}",
            values.len(),
            schema.columns.len()
        )));
    }
    for (col, val) in schema.columns.iter().zip(values.iter()) {
        col.validate(val)?;
    }
    Ok(())
}

/// `validateDocument(schema, doc) -> Ok(()) | Err(message)`: declared
/// non-nullable fields must be present and non-null; unknown keys ignored.
pub fn validate_document(
    schema: &DocumentSchema,
    doc: &FxHashMap<String, Value>,
) -> KdbResult<()> {
    for (name, col) in &schema.fields {
        match doc.get(name) {
            Some(v) => col.validate(v)?,
            None => {
                if !col.nullable {
                    return Err(Status::invalid_argument(format!(
                        "field '{}' is required",
                        name
                    )));
                }
            }
        }
    }
    Ok(())
}

/// `validateUnique` over fixed-arity rows: for every unique column, hash
/// `toString()` (or the literal sentinel for null when `ignore_nulls` is
/// false) and report the first duplicate.
pub fn validate_unique_rows<'a>(
    schema: &TableSchema,
    rows: impl Iterator<Item = &'a [Value]> + Clone,
    ignore_nulls: bool,
) -> KdbResult<()> {
    for (i, col) in schema.columns.iter().enumerate() {
        if !col.unique {
            continue;
        }
        let mut seen: FxHashMap<String, ()> = FxHashMap::default();
        for row in rows.clone() {
            let v = &row[i];
            if ignore_nulls && v.is_null() {
                continue;
            }
            let key = v.to_string_form();
            if seen.insert(key, ()).is_some() {
                return Err(Status::failed_precondition(format!(
                    "uniqueness violation on column '{}'",
                    col.name
                )));
            }
        }
    }
    Ok(())
}

/// `validateUnique` over named documents.
pub fn validate_unique_docs<'a>(
    schema: &DocumentSchema,
    docs: impl Iterator<Item = &'a FxHashMap<String, Value>> + Clone,
    ignore_nulls: bool,
) -> KdbResult<()> {
    for (name, col) in &schema.fields {
        if !col.unique {
            continue;
        }
        let mut seen: FxHashMap<String, ()> = FxHashMap::default();
        for doc in docs.clone() {
            let v = doc.get(name);
            let is_null = v.map(|v| v.is_null()).unwrap_or(true);
            if ignore_nulls && is_null {
                continue;
            }
            let key = v.map(|v| v.to_string_form()).unwrap_or_else(|| "<null>".to_string());
            if seen.insert(key, ()).is_some() {
                return Err(Status::failed_precondition(format!(
                    "uniqueness violation on field '{}'",
                    name
                )));
            }
        }
    }
    Ok(())
}
