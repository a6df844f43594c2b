//! Self-describing JSON forms (spec §4.K). Schemas are hand-built here
//! rather than derived, since `TableSchema`/`DocumentSchema` intentionally
//! don't implement `serde::{Serialize,Deserialize}` (see `schema.rs`).

use crate::row::{Document, Row};
use crate::schema::{Column, Constraints, DocumentSchema, TableSchema};
use crate::status::{KdbResult, Status};
use crate::value::{DataType, Value};
use rustc_hash::FxHashMap;
use serde_json::{json, Value as Json};

fn data_type_name(dt: DataType) -> &'static str {
    match dt {
        DataType::Null => "Null",
        DataType::Integer => "Integer",
        DataType::Float => "Float",
        DataType::String => "String",
        DataType::Boolean => "Boolean",
    }
}

fn data_type_from_name(s: &str) -> KdbResult<DataType> {
    match s {
        "Null" => Ok(DataType::Null),
        "Integer" => Ok(DataType::Integer),
        "Float" => Ok(DataType::Float),
        "String" => Ok(DataType::String),
        "Boolean" => Ok(DataType::Boolean),
        other => Err(Status::invalid_argument(format!("unknown data type '{}'", other))),
    }
}

/// `{"t": "null|int|float|string|bool", "v": payload}`.
pub fn value_to_json(v: &Value) -> Json {
    match v {
        Value::Null => json!({"t": "null", "v": Json::Null}),
        Value::Integer(i) => json!({"t": "int", "v": i}),
        Value::Float(f) => json!({"t": "float", "v": f}),
        Value::String(s) => json!({"t": "string", "v": s}),
        Value::Boolean(b) => json!({"t": "bool", "v": b}),
    }
}

pub fn value_from_json(j: &Json) -> KdbResult<Value> {
    let t = j.get("t").and_then(|v| v.as_str()).ok_or_else(|| Status::invalid_argument("value json missing 't'"))?;
    let v = j.get("v").ok_or_else(|| Status::invalid_argument("value json missing 'v'"))?;
    match t {
        "null" => Ok(Value::Null),
        "int" => v.as_i64().map(Value::Integer).ok_or_else(|| Status::invalid_argument("expected integer 'v'")),
        "float" => v.as_f64().map(Value::Float).ok_or_else(|| Status::invalid_argument("expected float 'v'")),
        "string" => v.as_str().map(|s| Value::String(s.to_string())).ok_or_else(|| Status::invalid_argument("expected string 'v'")),
        "bool" => v.as_bool().map(Value::Boolean).ok_or_else(|| Status::invalid_argument("expected bool 'v'")),
        other => Err(Status::invalid_argument(format!("unknown value tag '{}'", other))),
    }
}

/// `{"values": [...], "version": 1}`.
pub fn row_to_json(row: &Row) -> Json {
    json!({
        "values": row.values().iter().map(value_to_json).collect::<Vec<_>>(),
        "version": 1,
    })
}

pub fn row_from_json(j: &Json) -> KdbResult<Row> {
    let values = j
        .get("values")
        .and_then(|v| v.as_array())
        .ok_or_else(|| Status::invalid_argument("row json missing 'values'"))?;
    let mut out = Vec::with_capacity(values.len());
    for v in values {
        out.push(value_from_json(v)?);
    }
    Ok(Row::new(out))
}

fn constraints_to_json(c: &Constraints) -> Json {
    json!({
        "minLength": c.min_length,
        "maxLength": c.max_length,
        "oneOf": c.one_of,
        "minValue": c.min_value,
        "maxValue": c.max_value,
    })
}

fn constraints_from_json(j: &Json) -> KdbResult<Constraints> {
    Ok(Constraints {
        min_length: j.get("minLength").and_then(|v| v.as_u64()).map(|v| v as u32),
        max_length: j.get("maxLength").and_then(|v| v.as_u64()).map(|v| v as u32),
        one_of: j.get("oneOf").and_then(|v| v.as_array()).map(|arr| {
            arr.iter().filter_map(|s| s.as_str().map(|s| s.to_string())).collect()
        }),
        min_value: j.get("minValue").and_then(|v| v.as_f64()),
        max_value: j.get("maxValue").and_then(|v| v.as_f64()),
    })
}

fn column_to_json(c: &Column) -> Json {
    json!({
        "name": c.name,
        "type": data_type_name(c.data_type),
        "nullable": c.nullable,
        "unique": c.unique,
        "constraints": constraints_to_json(&c.constraints),
    })
}

fn column_from_json(j: &Json) -> KdbResult<Column> {
    let name = j.get("name").and_then(|v| v.as_str()).ok_or_else(|| Status::invalid_argument("column missing 'name'"))?.to_string();
    let data_type = data_type_from_name(
        j.get("type").and_then(|v| v.as_str()).ok_or_else(|| Status::invalid_argument("column missing 'type'"))?,
    )?;
    let nullable = j.get("nullable").and_then(|v| v.as_bool()).unwrap_or(true);
    let unique = j.get("unique").and_then(|v| v.as_bool()).unwrap_or(false);
    let constraints = j
        .get("constraints")
        .map(constraints_from_json)
        .transpose()?
        .unwrap_or_default();
    Ok(Column { name, data_type, nullable, unique, constraints })
}

pub fn table_schema_to_json(schema: &TableSchema) -> Json {
    json!({
        "columns": schema.columns.iter().map(column_to_json).collect::<Vec<_>>(),
        "primaryKey": schema.primary_key,
    })
}

pub fn table_schema_from_json(j: &Json) -> KdbResult<TableSchema> {
    let cols_json = j.get("columns").and_then(|v| v.as_array()).ok_or_else(|| Status::invalid_argument("schema missing 'columns'"))?;
    let mut cols = Vec::with_capacity(cols_json.len());
    for c in cols_json {
        cols.push(column_from_json(c)?);
    }
    let mut schema = TableSchema::new(cols)?;
    if let Some(pk) = j.get("primaryKey").and_then(|v| v.as_str()) {
        schema = schema.with_primary_key(pk)?;
    }
    Ok(schema)
}

pub fn document_schema_to_json(schema: &DocumentSchema) -> Json {
    let mut fields = serde_json::Map::new();
    for (name, col) in &schema.fields {
        fields.insert(name.clone(), column_to_json(col));
    }
    json!({ "fields": Json::Object(fields) })
}

pub fn document_schema_from_json(j: &Json) -> KdbResult<DocumentSchema> {
    let obj = j.get("fields").and_then(|v| v.as_object()).ok_or_else(|| Status::invalid_argument("schema missing 'fields'"))?;
    let mut fields = FxHashMap::default();
    for (name, col_json) in obj {
        fields.insert(name.clone(), column_from_json(col_json)?);
    }
    Ok(DocumentSchema::new(fields))
}

pub fn document_to_json(doc: &Document) -> Json {
    let mut obj = serde_json::Map::new();
    for (name, v) in doc.fields() {
        obj.insert(name.clone(), value_to_json(v));
    }
    Json::Object(obj)
}

pub fn document_from_json(j: &Json) -> KdbResult<Document> {
    let obj = j.as_object().ok_or_else(|| Status::invalid_argument("document json must be an object"))?;
    let mut fields = FxHashMap::default();
    for (name, v) in obj {
        fields.insert(name.clone(), value_from_json(v)?);
    }
    Ok(Document::from_map(fields))
}
