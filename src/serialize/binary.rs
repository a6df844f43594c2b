//! Versioned binary encoding (spec §4.K), hand-rolled byte-packing in the
//! style of the teacher's `bytes.rs`/`util.rs` get/set helpers rather than
//! a generic serializer, since the wire format is bit-exact.
//!
//! Endianness: native on the target, as the spec leaves it unfixed; this
//! crate fixes little-endian throughout (documented open-question
//! decision, see DESIGN.md) so round-trips are portable across hosts.

use crate::row::{Document, Row};
use crate::schema::{Column, Constraints, DocumentSchema, TableSchema};
use crate::status::{KdbResult, Status};
use crate::value::{DataType, Value};
use rustc_hash::FxHashMap;

pub const MAGIC: u32 = 0x4B44_4256; // "KDBV" little-endian
pub const VERSION: u8 = 1;

fn write_header(out: &mut Vec<u8>) {
    out.extend_from_slice(&MAGIC.to_le_bytes());
    out.push(VERSION);
}

fn read_header(buf: &[u8], pos: &mut usize) -> KdbResult<()> {
    let magic = read_u32(buf, pos)?;
    if magic != MAGIC {
        return Err(Status::invalid_argument("bad magic in binary stream"));
    }
    let version = read_u8(buf, pos)?;
    if version != VERSION {
        return Err(Status::invalid_argument(format!("unsupported binary version {}", version)));
    }
    Ok(())
}

fn need(buf: &[u8], pos: usize, len: usize) -> KdbResult<()> {
    if pos + len > buf.len() {
        Err(Status::invalid_argument("truncated binary stream"))
    } else {
        Ok(())
    }
}

fn read_u8(buf: &[u8], pos: &mut usize) -> KdbResult<u8> {
    need(buf, *pos, 1)?;
    let v = buf[*pos];
    *pos += 1;
    Ok(v)
}

fn read_u32(buf: &[u8], pos: &mut usize) -> KdbResult<u32> {
    need(buf, *pos, 4)?;
    let v = u32::from_le_bytes(buf[*pos..*pos + 4].try_into().unwrap());
    *pos += 4;
    Ok(v)
}

fn read_i64(buf: &[u8], pos: &mut usize) -> KdbResult<i64> {
    need(buf, *pos, 8)?;
    let v = i64::from_le_bytes(buf[*pos..*pos + 8].try_into().unwrap());
    *pos += 8;
    Ok(v)
}

fn read_f64(buf: &[u8], pos: &mut usize) -> KdbResult<f64> {
    need(buf, *pos, 8)?;
    let v = f64::from_le_bytes(buf[*pos..*pos + 8].try_into().unwrap());
    *pos += 8;
    Ok(v)
}

fn write_string(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(&(s.len() as u32).to_le_bytes());
    out.extend_from_slice(s.as_bytes());
}

fn read_string(buf: &[u8], pos: &mut usize) -> KdbResult<String> {
    let len = read_u32(buf, pos)? as usize;
    need(buf, *pos, len)?;
    let s = std::str::from_utf8(&buf[*pos..*pos + len])
        .map_err(|_| Status::invalid_argument("invalid UTF-8 in binary stream"))?
        .to_string();
    *pos += len;
    Ok(s)
}

fn data_type_tag(dt: DataType) -> u8 {
    match dt {
        DataType::Null => 0,
        DataType::Integer => 1,
        DataType::Float => 2,
        DataType::String => 3,
        DataType::Boolean => 4,
    }
}

fn data_type_from_tag(tag: u8) -> KdbResult<DataType> {
    match tag {
        0 => Ok(DataType::Null),
        1 => Ok(DataType::Integer),
        2 => Ok(DataType::Float),
        3 => Ok(DataType::String),
        4 => Ok(DataType::Boolean),
        other => Err(Status::invalid_argument(format!("unknown data type tag {}", other))),
    }
}

pub fn write_value(out: &mut Vec<u8>, v: &Value) {
    match v {
        Value::Null => out.push(0),
        Value::Integer(i) => {
            out.push(1);
            out.extend_from_slice(&i.to_le_bytes());
        }
        Value::Float(f) => {
            out.push(2);
            out.extend_from_slice(&f.to_le_bytes());
        }
        Value::String(s) => {
            out.push(3);
            write_string(out, s);
        }
        Value::Boolean(b) => {
            out.push(4);
            out.push(if *b { 1 } else { 0 });
        }
    }
}

pub fn read_value(buf: &[u8], pos: &mut usize) -> KdbResult<Value> {
    match read_u8(buf, pos)? {
        0 => Ok(Value::Null),
        1 => Ok(Value::Integer(read_i64(buf, pos)?)),
        2 => Ok(Value::Float(read_f64(buf, pos)?)),
        3 => Ok(Value::String(read_string(buf, pos)?)),
        4 => Ok(Value::Boolean(read_u8(buf, pos)? != 0)),
        other => Err(Status::invalid_argument(format!("unknown value tag {}", other))),
    }
}

pub fn write_row(row: &Row) -> Vec<u8> {
    let mut out = Vec::new();
    write_header(&mut out);
    out.extend_from_slice(&(row.arity() as u32).to_le_bytes());
    for v in row.values() {
        if v.is_null() {
            out.push(1);
        } else {
            out.push(0);
            write_value(&mut out, v);
        }
    }
    out
}

pub fn read_row(buf: &[u8]) -> KdbResult<Row> {
    let mut pos = 0;
    read_header(buf, &mut pos)?;
    let arity = read_u32(buf, &mut pos)? as usize;
    let mut values = Vec::with_capacity(arity);
    for _ in 0..arity {
        let is_null = read_u8(buf, &mut pos)? != 0;
        if is_null {
            values.push(Value::Null);
        } else {
            values.push(read_value(buf, &mut pos)?);
        }
    }
    Ok(Row::new(values))
}

fn write_constraints(out: &mut Vec<u8>, c: &Constraints) {
    write_opt_u32(out, c.min_length);
    write_opt_u32(out, c.max_length);
    match &c.one_of {
        Some(list) => {
            out.push(1);
            out.extend_from_slice(&(list.len() as u32).to_le_bytes());
            for s in list {
                write_string(out, s);
            }
        }
        None => out.push(0),
    }
    write_opt_f64(out, c.min_value);
    write_opt_f64(out, c.max_value);
}

fn write_opt_u32(out: &mut Vec<u8>, v: Option<u32>) {
    match v {
        Some(x) => {
            out.push(1);
            out.extend_from_slice(&x.to_le_bytes());
        }
        None => out.push(0),
    }
}

fn read_opt_u32(buf: &[u8], pos: &mut usize) -> KdbResult<Option<u32>> {
    if read_u8(buf, pos)? == 0 {
        Ok(None)
    } else {
        Ok(Some(read_u32(buf, pos)?))
    }
}

fn write_opt_f64(out: &mut Vec<u8>, v: Option<f64>) {
    match v {
        Some(x) => {
            out.push(1);
            out.extend_from_slice(&x.to_le_bytes());
        }
        None => out.push(0),
    }
}

fn read_opt_f64(buf: &[u8], pos: &mut usize) -> KdbResult<Option<f64>> {
    if read_u8(buf, pos)? == 0 {
        Ok(None)
    } else {
        Ok(Some(read_f64(buf, pos)?))
    }
}

fn read_constraints(buf: &[u8], pos: &mut usize) -> KdbResult<Constraints> {
    let min_length = read_opt_u32(buf, pos)?;
    let max_length = read_opt_u32(buf, pos)?;
    let one_of = if read_u8(buf, pos)? == 1 {
        let n = read_u32(buf, pos)? as usize;
        let mut v = Vec::with_capacity(n);
        for _ in 0..n {
            v.push(read_string(buf, pos)?);
        }
        Some(v)
    } else {
        None
    };
    let min_value = read_opt_f64(buf, pos)?;
    let max_value = read_opt_f64(buf, pos)?;
    Ok(Constraints { min_length, max_length, one_of, min_value, max_value })
}

fn write_column(out: &mut Vec<u8>, col: &Column) {
    write_string(out, &col.name);
    out.push(data_type_tag(col.data_type));
    out.push(if col.nullable { 1 } else { 0 });
    out.push(if col.unique { 1 } else { 0 });
    write_constraints(out, &col.constraints);
}

fn read_column(buf: &[u8], pos: &mut usize) -> KdbResult<Column> {
    let name = read_string(buf, pos)?;
    let data_type = data_type_from_tag(read_u8(buf, pos)?)?;
    let nullable = read_u8(buf, pos)? != 0;
    let unique = read_u8(buf, pos)? != 0;
    let constraints = read_constraints(buf, pos)?;
    Ok(Column { name, data_type, nullable, unique, constraints })
}

pub fn write_table_schema(schema: &TableSchema) -> Vec<u8> {
    let mut out = Vec::new();
    write_header(&mut out);
    out.extend_from_slice(&(schema.columns.len() as u32).to_le_bytes());
    for col in &schema.columns {
        write_column(&mut out, col);
    }
    match &schema.primary_key {
        Some(pk) => {
            out.push(1);
            write_string(&mut out, pk);
        }
        None => out.push(0),
    }
    out
}

pub fn read_table_schema(buf: &[u8]) -> KdbResult<TableSchema> {
    let mut pos = 0;
    read_header(buf, &mut pos)?;
    let count = read_u32(buf, &mut pos)? as usize;
    let mut cols = Vec::with_capacity(count);
    for _ in 0..count {
        cols.push(read_column(buf, &mut pos)?);
    }
    let mut schema = TableSchema::new(cols)?;
    if read_u8(buf, &mut pos)? == 1 {
        let pk = read_string(buf, &mut pos)?;
        schema = schema.with_primary_key(pk)?;
    }
    Ok(schema)
}

pub fn write_document_schema(schema: &DocumentSchema) -> Vec<u8> {
    let mut out = Vec::new();
    write_header(&mut out);
    out.extend_from_slice(&(schema.fields.len() as u32).to_le_bytes());
    for (name, col) in &schema.fields {
        write_string(&mut out, name);
        write_column(&mut out, col);
    }
    out
}

pub fn read_document_schema(buf: &[u8]) -> KdbResult<DocumentSchema> {
    let mut pos = 0;
    read_header(buf, &mut pos)?;
    let count = read_u32(buf, &mut pos)? as usize;
    let mut fields = FxHashMap::default();
    for _ in 0..count {
        let name = read_string(buf, &mut pos)?;
        let col = read_column(buf, &mut pos)?;
        fields.insert(name, col);
    }
    Ok(DocumentSchema::new(fields))
}

pub fn write_document(doc: &Document) -> Vec<u8> {
    let mut out = Vec::new();
    write_header(&mut out);
    out.extend_from_slice(&(doc.fields().len() as u32).to_le_bytes());
    for (name, v) in doc.fields() {
        write_string(&mut out, name);
        write_value(&mut out, v);
    }
    out
}

pub fn read_document(buf: &[u8]) -> KdbResult<Document> {
    let mut pos = 0;
    read_header(buf, &mut pos)?;
    let count = read_u32(buf, &mut pos)? as usize;
    let mut fields = FxHashMap::default();
    for _ in 0..count {
        let name = read_string(buf, &mut pos)?;
        let value = read_value(buf, &mut pos)?;
        fields.insert(name, value);
    }
    Ok(Document::from_map(fields))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_round_trips_every_variant() {
        for v in [Value::null(), Value::integer(-7), Value::float(1.5), Value::string("hi"), Value::boolean(true)] {
            let mut buf = Vec::new();
            write_value(&mut buf, &v);
            let mut pos = 0;
            assert_eq!(read_value(&buf, &mut pos).unwrap(), v);
        }
    }

    #[test]
    fn row_round_trips_with_nulls() {
        let row = Row::new(vec![Value::integer(1), Value::null(), Value::string("x")]);
        let bytes = write_row(&row);
        assert_eq!(read_row(&bytes).unwrap(), row);
    }

    #[test]
    fn scenario_s5_table_schema_round_trip_preserves_constraints() {
        let schema = TableSchema::new(vec![
            Column::new("name", DataType::String).with_constraints(Constraints {
                min_length: Some(1),
                max_length: Some(64),
                ..Constraints::none()
            }),
            Column::new("age", DataType::Integer).with_constraints(Constraints {
                min_value: Some(0.0),
                ..Constraints::none()
            }),
        ])
        .unwrap();
        let bytes = write_table_schema(&schema);
        let back = read_table_schema(&bytes).unwrap();
        assert_eq!(back.columns[0].constraints.min_length, Some(1));
        assert_eq!(back.columns[1].constraints.min_value, Some(0.0));

        use crate::schema::validate_row;
        let row_ok = vec![Value::string("ab"), Value::integer(5)];
        let row_bad = vec![Value::string(""), Value::integer(5)];
        assert!(validate_row(&schema, &row_ok).is_ok());
        assert!(validate_row(&back, &row_ok).is_ok());
        assert!(validate_row(&schema, &row_bad).is_err());
        assert!(validate_row(&back, &row_bad).is_err());
    }

    #[test]
    fn document_round_trips() {
        let mut doc = Document::new();
        doc.set("a", Value::integer(1));
        doc.set("b", Value::string("x"));
        let bytes = write_document(&doc);
        let back = read_document(&bytes).unwrap();
        assert_eq!(back.get("a"), Some(&Value::integer(1)));
        assert_eq!(back.get("b"), Some(&Value::string("x")));
    }

    #[test]
    fn bad_magic_is_rejected() {
        let bytes = vec![0u8, 0, 0, 0, 1];
        assert!(read_row(&bytes).is_err());
    }
}
