//! Row / RowShallow / Document containers (spec §3, §4.C).
//!
//! `Row` is the teacher's deep-owning fixed-arity record (compare
//! `table::Row` in the teacher crate, which pairs a `Vec<Value>` with a
//! shared `ColInfo`); `RowShallow` adds the "shared ownership handle" cell
//! the teacher's `Value` enum itself gets via `Rc<String>`/`Rc<Vec<u8>>` —
//! here lifted to the whole-cell level so a row can be cheaply aliased and
//! later materialized into a deep `Row`.

use crate::status::{KdbResult, Status};
use crate::value::Value;
use rustc_hash::FxHashMap;
use std::rc::Rc;

/// Fixed-arity, deep-owning sequence of values. Arity must equal the owning
/// schema's column count (checked by the engines, not here).
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    values: Vec<Value>,
}

impl Row {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    pub fn with_arity(arity: usize) -> Self {
        Self {
            values: vec![Value::Null; arity],
        }
    }

    pub fn arity(&self) -> usize {
        self.values.len()
    }

    pub fn get(&self, i: usize) -> Option<&Value> {
        self.values.get(i)
    }

    /// Bounds-checked cell assignment.
    pub fn set(&mut self, i: usize, v: Value) -> KdbResult<()> {
        if i >= self.values.len() {
            return Err(Status::invalid_argument(format!(
                "row index {} out of bounds (arity {})",
                i,
                self.values.len()
            )));
        }
        self.values[i] = v;
        Ok(())
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// Deep clone (values own their data already; `Clone` is the deep copy).
    pub fn clone_deep(&self) -> Row {
        self.clone()
    }
}

impl From<Vec<Value>> for Row {
    fn from(values: Vec<Value>) -> Self {
        Row::new(values)
    }
}

/// Same shape as [`Row`], but cells are shared-ownership handles
/// (`Rc<Value>`), so cloning the row aliases cells instead of deep-copying
/// them. Reassigning a slot replaces the handle; it never mutates the
/// value the old handle pointed at (spec §5).
#[derive(Debug, Clone)]
pub struct RowShallow {
    cells: Vec<Rc<Value>>,
}

impl RowShallow {
    pub fn new(cells: Vec<Rc<Value>>) -> Self {
        Self { cells }
    }

    /// Clone once from a deep `Row`, wrapping each value in a fresh `Rc`.
    pub fn from_clones(row: &Row) -> Self {
        Self {
            cells: row.values.iter().cloned().map(Rc::new).collect(),
        }
    }

    pub fn arity(&self) -> usize {
        self.cells.len()
    }

    pub fn get(&self, i: usize) -> Option<&Value> {
        self.cells.get(i).map(|rc| rc.as_ref())
    }

    pub fn set(&mut self, i: usize, v: Value) -> KdbResult<()> {
        if i >= self.cells.len() {
            return Err(Status::invalid_argument(format!(
                "row index {} out of bounds (arity {})",
                i,
                self.cells.len()
            )));
        }
        self.cells[i] = Rc::new(v);
        Ok(())
    }

    /// Materialize into an owned, deep `Row` (clones every cell's value).
    pub fn to_row_deep(&self) -> Row {
        Row::new(self.cells.iter().map(|rc| (**rc).clone()).collect())
    }
}

/// Mapping `fieldName -> Option<Value>`, deep-copied on entry/exit from the
/// document engine.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    fields: FxHashMap<String, Value>,
}

impl Document {
    pub fn new() -> Self {
        Self {
            fields: FxHashMap::default(),
        }
    }

    pub fn from_map(fields: FxHashMap<String, Value>) -> Self {
        Self { fields }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.fields.insert(name.into(), value);
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.fields.remove(name)
    }

    pub fn fields(&self) -> &FxHashMap<String, Value> {
        &self.fields
    }

    pub fn into_fields(self) -> FxHashMap<String, Value> {
        self.fields
    }

    /// Deep clone for crossing the document-engine boundary.
    pub fn clone_deep(&self) -> Document {
        self.clone()
    }

    /// Project this document down to the given field names (spec §4.F
    /// query projection); unknown names are simply absent from the result.
    pub fn project(&self, names: &[String]) -> Document {
        if names.is_empty() {
            return self.clone_deep();
        }
        let mut out = FxHashMap::default();
        for n in names {
            if let Some(v) = self.fields.get(n) {
                out.insert(n.clone(), v.clone());
            }
        }
        Document::from_map(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_set_bounds_checked() {
        let mut r = Row::with_arity(2);
        assert!(r.set(0, Value::integer(1)).is_ok());
        assert!(r.set(2, Value::integer(1)).is_err());
    }

    #[test]
    fn row_clone_is_deep() {
        let r = Row::new(vec![Value::string("a")]);
        let mut c = r.clone_deep();
        c.set(0, Value::string("b")).unwrap();
        assert_eq!(r.get(0), Some(&Value::string("a")));
        assert_eq!(c.get(0), Some(&Value::string("b")));
    }

    #[test]
    fn row_shallow_aliases_then_reassign_replaces_handle_not_target() {
        let deep = Row::new(vec![Value::integer(1), Value::integer(2)]);
        let shallow = RowShallow::from_clones(&deep);
        let mut alias = shallow.clone();
        alias.set(0, Value::integer(99)).unwrap();
        assert_eq!(shallow.get(0), Some(&Value::integer(1)));
        assert_eq!(alias.get(0), Some(&Value::integer(99)));
    }

    #[test]
    fn row_shallow_materializes_to_deep_row() {
        let deep = Row::new(vec![Value::integer(7)]);
        let shallow = RowShallow::from_clones(&deep);
        let back = shallow.to_row_deep();
        assert_eq!(back, deep);
    }

    #[test]
    fn document_project_drops_unrequested_fields() {
        let mut doc = Document::new();
        doc.set("a", Value::integer(1));
        doc.set("b", Value::integer(2));
        let projected = doc.project(&["a".to_string()]);
        assert_eq!(projected.get("a"), Some(&Value::integer(1)));
        assert_eq!(projected.get("b"), None);
    }
}
