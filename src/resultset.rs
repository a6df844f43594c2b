//! Tabular result set, CSV/JSON rendering, and pagination (spec §4.J).

use crate::status::{KdbResult, Status};
use crate::value::{DataType, Value};
use serde_json::json;

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnMeta {
    pub name: String,
    pub data_type: DataType,
}

/// Deep-owned rows of [`Value`]; column order is fixed at construction.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    columns: Vec<ColumnMeta>,
    rows: Vec<Vec<Value>>,
}

impl ResultSet {
    pub fn new(columns: Vec<ColumnMeta>) -> Self {
        Self { columns, rows: Vec::new() }
    }

    pub fn push_row(&mut self, row: Vec<Value>) {
        debug_assert_eq!(row.len(), self.columns.len());
        self.rows.push(row);
    }

    pub fn columns(&self) -> &[ColumnMeta] {
        &self.columns
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn cell(&self, row: usize, col: usize) -> KdbResult<&Value> {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .ok_or_else(|| Status::invalid_argument(format!("no cell at ({}, {})", row, col)))
    }

    pub fn row(&self, i: usize) -> Option<&[Value]> {
        self.rows.get(i).map(|r| r.as_slice())
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    /// `page_size == 0` means "everything in one page". Returns the rows
    /// belonging to `page_index` (0-based).
    pub fn page(&self, page_size: usize, page_index: usize) -> KdbResult<&[Vec<Value>]> {
        if page_size == 0 {
            return if page_index == 0 {
                Ok(&self.rows)
            } else {
                Err(Status::invalid_argument("page_index out of range for single-page result"))
            };
        }
        let start = page_size
            .checked_mul(page_index)
            .ok_or_else(|| Status::invalid_argument("page_index overflow"))?;
        if start >= self.rows.len() && !(start == 0 && self.rows.is_empty()) {
            return Err(Status::invalid_argument("page_index out of range"));
        }
        let end = (start + page_size).min(self.rows.len());
        Ok(&self.rows[start..end])
    }

    pub fn page_count(&self, page_size: usize) -> usize {
        if page_size == 0 {
            return 1;
        }
        if self.rows.is_empty() {
            return 0;
        }
        (self.rows.len() + page_size - 1) / page_size
    }

    /// Render as CSV with the given delimiter/quote char; a field is quoted
    /// when it contains the delimiter, the quote char, a newline, or when
    /// `always_quote` is set. A header row of column names is always
    /// emitted first.
    pub fn to_csv(&self, delimiter: char, quote: char, always_quote: bool) -> String {
        let mut out = String::new();
        write_csv_row(&mut out, self.columns.iter().map(|c| c.name.clone()), delimiter, quote, always_quote);
        for row in &self.rows {
            write_csv_row(&mut out, row.iter().map(|v| v.to_display_string()), delimiter, quote, always_quote);
        }
        out
    }

    /// `array_of_objects = true` -> `[{"col": val, ...}, ...]`;
    /// otherwise -> `{"columns": [...], "types": [...], "rows": [[...], ...]}`.
    pub fn to_json(&self, array_of_objects: bool) -> serde_json::Value {
        if array_of_objects {
            let arr: Vec<serde_json::Value> = self
                .rows
                .iter()
                .map(|row| {
                    let mut obj = serde_json::Map::new();
                    for (col, val) in self.columns.iter().zip(row.iter()) {
                        obj.insert(col.name.clone(), value_to_json(val));
                    }
                    serde_json::Value::Object(obj)
                })
                .collect();
            serde_json::Value::Array(arr)
        } else {
            json!({
                "columns": self.columns.iter().map(|c| c.name.clone()).collect::<Vec<_>>(),
                "types": self.columns.iter().map(|c| c.data_type.to_string()).collect::<Vec<_>>(),
                "rows": self.rows.iter().map(|r| r.iter().map(value_to_json).collect::<Vec<_>>()).collect::<Vec<_>>(),
            })
        }
    }
}

fn value_to_json(v: &Value) -> serde_json::Value {
    match v {
        Value::Null => serde_json::Value::Null,
        Value::Integer(i) => json!(i),
        Value::Float(f) => json!(f),
        Value::Boolean(b) => json!(b),
        Value::String(s) => json!(s.as_str()),
    }
}

fn write_csv_row(out: &mut String, fields: impl Iterator<Item = String>, delimiter: char, quote: char, always_quote: bool) {
    let mut first = true;
    for field in fields {
        if !first {
            out.push(delimiter);
        }
        first = false;
        let needs_quote = always_quote
            || field.contains(delimiter)
            || field.contains(quote)
            || field.contains('\n')
            || field.contains('\r');
        if needs_quote {
            out.push(quote);
            for c in field.chars() {
                if c == quote {
                    out.push(quote);
                }
                out.push(c);
            }
            out.push(quote);
        } else {
            out.push_str(&field);
        }
    }
    out.push('\n');
}

/// Cursor over a [`ResultSet`] (spec §4.J): `reset`/`next`/`current`.
pub struct Cursor<'a> {
    rs: &'a ResultSet,
    pos: Option<usize>,
}

impl<'a> Cursor<'a> {
    pub fn new(rs: &'a ResultSet) -> Self {
        Self { rs, pos: None }
    }

    pub fn reset(&mut self) {
        self.pos = None;
    }

    /// Advances the cursor and returns whether a row is now available.
    pub fn next(&mut self) -> bool {
        let next_pos = match self.pos {
            None => 0,
            Some(p) => p + 1,
        };
        if next_pos < self.rs.row_count() {
            self.pos = Some(next_pos);
            true
        } else {
            self.pos = Some(self.rs.row_count());
            false
        }
    }

    pub fn current(&self) -> Option<&'a [Value]> {
        self.pos.and_then(|p| self.rs.row(p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ResultSet {
        let mut rs = ResultSet::new(vec![
            ColumnMeta { name: "id".into(), data_type: DataType::Integer },
            ColumnMeta { name: "name".into(), data_type: DataType::String },
        ]);
        rs.push_row(vec![Value::integer(1), Value::string("Ada")]);
        rs.push_row(vec![Value::integer(2), Value::string("a,b")]);
        rs
    }

    #[test]
    fn csv_quotes_fields_containing_delimiter() {
        let rs = sample();
        let csv = rs.to_csv(',', '"', false);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "id,name");
        assert_eq!(lines[1], "1,Ada");
        assert_eq!(lines[2], "2,\"a,b\"");
    }

    #[test]
    fn json_array_of_objects_shape() {
        let rs = sample();
        let j = rs.to_json(true);
        assert_eq!(j[0]["id"], json!(1));
        assert_eq!(j[1]["name"], json!("a,b"));
    }

    #[test]
    fn json_columns_rows_shape() {
        let rs = sample();
        let j = rs.to_json(false);
        assert_eq!(j["columns"], json!(["id", "name"]));
        assert_eq!(j["rows"][0][0], json!(1));
    }

    #[test]
    fn pagination_zero_page_size_is_single_page() {
        let rs = sample();
        assert_eq!(rs.page(0, 0).unwrap().len(), 2);
        assert!(rs.page(0, 1).is_err());
    }

    #[test]
    fn pagination_splits_rows() {
        let rs = sample();
        assert_eq!(rs.page_count(1), 2);
        assert_eq!(rs.page(1, 0).unwrap().len(), 1);
        assert_eq!(rs.page(1, 1).unwrap().len(), 1);
        assert!(rs.page(1, 2).is_err());
    }

    #[test]
    fn cursor_walks_rows_in_order() {
        let rs = sample();
        let mut cur = Cursor::new(&rs);
        assert!(cur.current().is_none());
        assert!(cur.next());
        assert_eq!(cur.current().unwrap()[0], Value::integer(1));
        assert!(cur.next());
        assert_eq!(cur.current().unwrap()[0], Value::integer(2));
        assert!(!cur.next());
        assert!(cur.current().is_none());
    }
}
