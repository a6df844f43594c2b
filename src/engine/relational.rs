//! In-memory relational engine (spec §4.E).
//!
//! Storage = `map<name, {schema, rows}>` guarded by one coarse mutex per
//! instance, mirroring the teacher's single-writer model but without the
//! on-disk `SortedFile`/`CompactFile` machinery — tables live entirely in
//! memory here. Grounded on `table.rs`'s `insert`/`remove` pairing for
//! atomic-on-error semantics: compute on a copy, swap in on success.

use crate::predicate::Predicate;
use crate::resultset::{ColumnMeta, ResultSet};
use crate::row::Row;
use crate::schema::{validate_row, validate_unique_rows, TableSchema};
use crate::status::{KdbResult, Status};
use crate::value::Value;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

struct TableData {
    schema: TableSchema,
    rows: Vec<Row>,
}

/// Either a constant assignment map, or a computed-expression callback used
/// by the KadeQL executor for `UPDATE ... SET col = <expr>`.
pub enum Assignment<'a> {
    Constants(Vec<(String, Value)>),
    Computed(&'a dyn Fn(&Row, &TableSchema) -> KdbResult<Vec<(usize, Value)>>),
}

#[derive(Default)]
pub struct RelationalStore {
    tables: Mutex<FxHashMap<String, TableData>>,
}

impl RelationalStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_table(&self, name: &str, schema: TableSchema) -> KdbResult<()> {
        let mut tables = self.tables.lock();
        if tables.contains_key(name) {
            return Err(Status::already_exists(format!("table '{}' already exists", name)));
        }
        tables.insert(name.to_string(), TableData { schema, rows: Vec::new() });
        tracing::debug!(table = name, "created table");
        Ok(())
    }

    pub fn drop_table(&self, name: &str) -> KdbResult<()> {
        let mut tables = self.tables.lock();
        if tables.remove(name).is_none() {
            return Err(Status::not_found(format!("table '{}' not found", name)));
        }
        Ok(())
    }

    pub fn truncate_table(&self, name: &str) -> KdbResult<()> {
        let mut tables = self.tables.lock();
        let t = tables
            .get_mut(name)
            .ok_or_else(|| Status::not_found(format!("table '{}' not found", name)))?;
        t.rows.clear();
        Ok(())
    }

    pub fn list_tables(&self) -> Vec<String> {
        self.tables.lock().keys().cloned().collect()
    }

    /// Insert a row: validate, tentatively append, re-check uniqueness
    /// across all rows; on failure, revert the append and return
    /// `FailedPrecondition` (spec §4.E).
    pub fn insert_row(&self, name: &str, row: Row) -> KdbResult<()> {
        let mut tables = self.tables.lock();
        let t = tables
            .get_mut(name)
            .ok_or_else(|| Status::not_found(format!("table '{}' not found", name)))?;
        validate_row(&t.schema, row.values())?;
        t.rows.push(row);
        let slices = t.rows.iter().map(|r| r.values());
        if let Err(e) = validate_unique_rows(&t.schema, slices, true) {
            t.rows.pop();
            return Err(e);
        }
        Ok(())
    }

    /// Projection + predicate select. Returns a [`ResultSet`] with deep-cloned
    /// values.
    pub fn select(
        &self,
        name: &str,
        projection: &[String],
        where_: Option<&Predicate>,
    ) -> KdbResult<ResultSet> {
        let tables = self.tables.lock();
        let t = tables
            .get(name)
            .ok_or_else(|| Status::not_found(format!("table '{}' not found", name)))?;

        let proj_indices: Vec<usize> = if projection.is_empty() {
            (0..t.schema.columns.len()).collect()
        } else {
            let mut idxs = Vec::with_capacity(projection.len());
            for p in projection {
                let idx = t.schema.column_index(p).ok_or_else(|| {
                    Status::invalid_argument(format!("unknown column '{}'", p))
                })?;
                idxs.push(idx);
            }
            idxs
        };

        let columns: Vec<ColumnMeta> = proj_indices
            .iter()
            .map(|&i| ColumnMeta {
                name: t.schema.columns[i].name.clone(),
                data_type: t.schema.columns[i].data_type,
            })
            .collect();

        let mut rs = ResultSet::new(columns);
        for row in &t.rows {
            if let Some(pred) = where_ {
                if !pred.eval(row) {
                    continue;
                }
            }
            let values: Vec<Value> = proj_indices.iter().map(|&i| row.get(i).cloned().unwrap_or(Value::Null)).collect();
            rs.push_row(values);
        }
        Ok(rs)
    }

    /// Update rows matching `where_`. Validates assignment columns exist,
    /// applies on a copy of all rows, revalidates every mutated row,
    /// re-checks uniqueness, then swaps in on success (atomic-on-error).
    pub fn update_rows(
        &self,
        name: &str,
        assignment: Assignment,
        where_: Option<&Predicate>,
    ) -> KdbResult<u64> {
        let mut tables = self.tables.lock();
        let t = tables
            .get_mut(name)
            .ok_or_else(|| Status::not_found(format!("table '{}' not found", name)))?;

        let const_assignments: Vec<(usize, Value)> = match &assignment {
            Assignment::Constants(pairs) => {
                let mut resolved = Vec::with_capacity(pairs.len());
                for (col, val) in pairs {
                    let idx = t.schema.column_index(col).ok_or_else(|| {
                        Status::invalid_argument(format!("unknown column '{}'", col))
                    })?;
                    resolved.push((idx, val.clone()));
                }
                resolved
            }
            Assignment::Computed(_) => Vec::new(),
        };

        let mut new_rows = t.rows.clone();
        let mut affected = 0u64;
        for row in new_rows.iter_mut() {
            let matches = where_.map(|p| p.eval(row)).unwrap_or(true);
            if !matches {
                continue;
            }
            match &assignment {
                Assignment::Constants(_) => {
                    for (idx, val) in &const_assignments {
                        row.set(*idx, val.clone())?;
                    }
                }
                Assignment::Computed(f) => {
                    let computed = f(row, &t.schema)?;
                    for (idx, val) in computed {
                        row.set(idx, val)?;
                    }
                }
            }
            validate_row(&t.schema, row.values())?;
            affected += 1;
        }

        let slices = new_rows.iter().map(|r| r.values());
        validate_unique_rows(&t.schema, slices, true)?;

        t.rows = new_rows;
        Ok(affected)
    }

    /// `where_ = None` deletes all rows and returns the count removed;
    /// otherwise partitions rows, keeping non-matching ones.
    pub fn delete_rows(&self, name: &str, where_: Option<&Predicate>) -> KdbResult<u64> {
        let mut tables = self.tables.lock();
        let t = tables
            .get_mut(name)
            .ok_or_else(|| Status::not_found(format!("table '{}' not found", name)))?;
        let Some(pred) = where_ else {
            let n = t.rows.len() as u64;
            t.rows.clear();
            return Ok(n);
        };
        let before = t.rows.len();
        t.rows.retain(|r| !pred.eval(r));
        Ok((before - t.rows.len()) as u64)
    }

    /// Returns a clone of the table's schema (used by the KadeQL executor to
    /// resolve an implicit INSERT column list).
    pub fn table_schema(&self, name: &str) -> KdbResult<TableSchema> {
        let tables = self.tables.lock();
        tables
            .get(name)
            .map(|t| t.schema.clone())
            .ok_or_else(|| Status::not_found(format!("table '{}' not found", name)))
    }
}
