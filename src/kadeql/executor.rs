//! Statement execution: lowers a parsed, canonicalized `Statement` onto
//! `engine::relational::RelationalStore` (spec §4.I "Executor").

use super::ast::{Assign, BinOp, CmpOp, Delete, Expr, Insert, Literal, Select, Statement, Update};
use super::optimizer::canonicalize;
use super::parser::Parser;
use crate::engine::relational::{Assignment, RelationalStore};
use crate::predicate::{CompareOp, Predicate};
use crate::resultset::{ColumnMeta, ResultSet};
use crate::row::Row;
use crate::schema::{floor_div, TableSchema};
use crate::status::{KdbResult, Status};
use crate::value::{DataType, Value};

/// Parses, canonicalizes every predicate subtree, and executes against
/// `store` in one call.
pub fn execute(store: &RelationalStore, sql: &str) -> KdbResult<ResultSet> {
    let stmt = Parser::parse(sql)?;
    execute_statement(store, &stmt)
}

pub fn execute_statement(store: &RelationalStore, stmt: &Statement) -> KdbResult<ResultSet> {
    match stmt {
        Statement::Select(s) => exec_select(store, s),
        Statement::Insert(i) => exec_insert(store, i),
        Statement::Update(u) => exec_update(store, u),
        Statement::Delete(d) => exec_delete(store, d),
    }
}

fn is_aggregate_call(name: &str) -> bool {
    matches!(name.to_ascii_uppercase().as_str(), "TIME_BUCKET" | "FIRST" | "LAST")
}

fn exec_select(store: &RelationalStore, select: &Select) -> KdbResult<ResultSet> {
    let schema = store.table_schema(&select.from)?;
    let where_canon = select.where_.as_ref().map(canonicalize);
    let pred = where_canon.as_ref().map(|e| lower_predicate(e, &schema)).transpose()?;

    let is_aggregate = match &select.projection {
        super::ast::Projection::Items(items) => items.iter().any(|it| matches!(&it.expr, Expr::Call(name, _) if is_aggregate_call(name))),
        super::ast::Projection::Star => false,
    };

    if is_aggregate {
        let super::ast::Projection::Items(items) = &select.projection else { unreachable!() };
        return exec_aggregate_select(store, &select.from, &schema, items, pred.as_ref());
    }

    match &select.projection {
        super::ast::Projection::Star => store.select(&select.from, &[], pred.as_ref()),
        super::ast::Projection::Items(items) => {
            if items.iter().all(|it| matches!(it.expr, Expr::Ident(_)) && items.iter().all(|it| it.alias.is_none())) {
                let names: Vec<String> = items
                    .iter()
                    .map(|it| match &it.expr {
                        Expr::Ident(n) => n.clone(),
                        _ => unreachable!(),
                    })
                    .collect();
                store.select(&select.from, &names, pred.as_ref())
            } else {
                exec_projected_select(store, &select.from, &schema, items, pred.as_ref())
            }
        }
    }
}

/// Evaluates arbitrary (non-aggregate) projection expressions per row by
/// fetching all columns first, then mapping each row through the shared
/// interpreter.
fn exec_projected_select(
    store: &RelationalStore,
    table: &str,
    schema: &TableSchema,
    items: &[super::ast::ProjectionItem],
    pred: Option<&Predicate>,
) -> KdbResult<ResultSet> {
    let all = store.select(table, &[], pred)?;
    let columns: Vec<ColumnMeta> = items
        .iter()
        .map(|it| ColumnMeta {
            name: it.alias.clone().unwrap_or_else(|| render_name(&it.expr)),
            data_type: DataType::String, // expression columns are not schema-typed
        })
        .collect();
    let mut rs = ResultSet::new(columns);
    for row_vals in all.rows() {
        let row = Row::new(row_vals.clone());
        let mut out = Vec::with_capacity(items.len());
        for it in items {
            out.push(eval_expr(&it.expr, &row, schema)?);
        }
        rs.push_row(out);
    }
    Ok(rs)
}

fn render_name(expr: &Expr) -> String {
    match expr {
        Expr::Ident(n) => n.clone(),
        Expr::Literal(Literal::Str(s)) => s.clone(),
        Expr::Literal(Literal::Integer(i)) => i.to_string(),
        Expr::Literal(Literal::Float(f)) => f.to_string(),
        Expr::Call(name, _) => name.clone(),
        _ => "expr".to_string(),
    }
}

/// Single-group-or-one-bucket-column aggregate mode (spec §4.I, §9 caveat:
/// no general GROUP BY).
fn exec_aggregate_select(
    store: &RelationalStore,
    table: &str,
    schema: &TableSchema,
    items: &[super::ast::ProjectionItem],
    pred: Option<&Predicate>,
) -> KdbResult<ResultSet> {
    let all = store.select(table, &[], pred)?;
    let rows: Vec<Row> = all.rows().iter().map(|v| Row::new(v.clone())).collect();

    let bucket_call = items.iter().find_map(|it| match &it.expr {
        Expr::Call(name, args) if name.eq_ignore_ascii_case("TIME_BUCKET") => Some(args),
        _ => None,
    });

    let mut groups: std::collections::BTreeMap<i64, Vec<Row>> = std::collections::BTreeMap::new();
    if let Some(args) = bucket_call {
        if args.len() != 2 {
            return Err(Status::invalid_argument("TIME_BUCKET requires (column, width)"));
        }
        let width = match &args[1] {
            Expr::Literal(Literal::Integer(i)) => *i,
            _ => return Err(Status::invalid_argument("TIME_BUCKET width must be an integer literal")),
        };
        if width <= 0 {
            return Err(Status::invalid_argument("TIME_BUCKET width must be positive"));
        }
        for row in rows {
            let ts = eval_expr(&args[0], &row, schema)?.as_int()?;
            let bucket = floor_div(ts, width) * width;
            groups.entry(bucket).or_default().push(row);
        }
    } else {
        groups.entry(0).or_default().extend(rows);
    }

    let columns: Vec<ColumnMeta> = items
        .iter()
        .map(|it| ColumnMeta {
            name: it.alias.clone().unwrap_or_else(|| render_name(&it.expr)),
            data_type: DataType::String,
        })
        .collect();
    let mut rs = ResultSet::new(columns);

    for (bucket, group_rows) in &groups {
        let mut out = Vec::with_capacity(items.len());
        for it in items {
            out.push(eval_aggregate_item(&it.expr, *bucket, group_rows, schema)?);
        }
        rs.push_row(out);
    }
    Ok(rs)
}

fn eval_aggregate_item(expr: &Expr, bucket: i64, rows: &[Row], schema: &TableSchema) -> KdbResult<Value> {
    match expr {
        Expr::Call(name, args) if name.eq_ignore_ascii_case("TIME_BUCKET") => {
            let _ = args;
            Ok(Value::integer(bucket))
        }
        Expr::Call(name, args) if name.eq_ignore_ascii_case("FIRST") || name.eq_ignore_ascii_case("LAST") => {
            if args.is_empty() {
                return Err(Status::invalid_argument(format!("{} requires a value argument", name)));
            }
            let picked = if args.len() >= 2 {
                let ts_col = &args[1];
                let mut best: Option<(&Row, i64)> = None;
                for row in rows {
                    let ts = eval_expr(ts_col, row, schema)?.as_int()?;
                    let better = match best {
                        None => true,
                        Some((_, cur)) => {
                            if name.eq_ignore_ascii_case("FIRST") {
                                ts < cur
                            } else {
                                ts > cur
                            }
                        }
                    };
                    if better {
                        best = Some((row, ts));
                    }
                }
                best.map(|(r, _)| r)
            } else if name.eq_ignore_ascii_case("FIRST") {
                rows.first()
            } else {
                rows.last()
            };
            match picked {
                Some(row) => eval_expr(&args[0], row, schema),
                None => Ok(Value::Null),
            }
        }
        other => rows.first().map(|r| eval_expr(other, r, schema)).unwrap_or(Ok(Value::Null)),
    }
}

fn exec_insert(store: &RelationalStore, insert: &Insert) -> KdbResult<ResultSet> {
    let schema = store.table_schema(&insert.table)?;
    let columns: Vec<String> = match &insert.columns {
        Some(c) => c.clone(),
        None => schema.columns.iter().map(|c| c.name.clone()).collect(),
    };

    let mut inserted = 0u64;
    for tuple in &insert.rows {
        if tuple.len() != columns.len() {
            return Err(Status::invalid_argument(format!(
                "value count {} does not match column count {}",
                tuple.len(),
                columns.len()
            )));
        }
        let mut row = Row::with_arity(schema.len());
        for (col_name, expr) in columns.iter().zip(tuple.iter()) {
            let value = match expr {
                Expr::Literal(lit) => lit.to_value(),
                _ => return Err(Status::invalid_argument("INSERT values must be literals")),
            };
            let idx = schema
                .column_index(col_name)
                .ok_or_else(|| Status::invalid_argument(format!("unknown column '{}'", col_name)))?;
            row.set(idx, value)?;
        }
        store.insert_row(&insert.table, row)?;
        inserted += 1;
    }

    Ok(affected_result_set("inserted", inserted))
}

fn exec_update(store: &RelationalStore, update: &Update) -> KdbResult<ResultSet> {
    let schema = store.table_schema(&update.table)?;
    let where_canon = update.where_.as_ref().map(canonicalize);
    let pred = where_canon.as_ref().map(|e| lower_predicate(e, &schema)).transpose()?;

    let evaluator = |row: &Row, schema: &TableSchema| -> KdbResult<Vec<(usize, Value)>> {
        let mut out = Vec::with_capacity(update.assignments.len());
        for Assign { column, value } in &update.assignments {
            let idx = schema
                .column_index(column)
                .ok_or_else(|| Status::invalid_argument(format!("unknown column '{}'", column)))?;
            out.push((idx, eval_expr(value, row, schema)?));
        }
        Ok(out)
    };

    let affected = store.update_rows(&update.table, Assignment::Computed(&evaluator), pred.as_ref())?;
    Ok(affected_result_set("updated", affected))
}

fn exec_delete(store: &RelationalStore, delete: &Delete) -> KdbResult<ResultSet> {
    let schema = store.table_schema(&delete.table)?;
    let where_canon = delete.where_.as_ref().map(canonicalize);
    let pred = where_canon.as_ref().map(|e| lower_predicate(e, &schema)).transpose()?;
    let affected = store.delete_rows(&delete.table, pred.as_ref())?;
    Ok(affected_result_set("deleted", affected))
}

fn affected_result_set(synonym: &str, n: u64) -> ResultSet {
    let mut rs = ResultSet::new(vec![
        ColumnMeta { name: "affected".into(), data_type: DataType::Integer },
        ColumnMeta { name: synonym.into(), data_type: DataType::Integer },
    ]);
    rs.push_row(vec![Value::integer(n as i64), Value::integer(n as i64)]);
    rs
}

/// Builds a storage `Predicate` from a canonicalized boolean `Expr` tree.
/// Every comparison must have an identifier on one side and a literal on
/// the other; a reversed comparison is rewritten by mirroring the
/// operator. A bare identifier or literal used as a whole predicate is
/// `InvalidArgument`.
pub fn lower_predicate(expr: &Expr, schema: &TableSchema) -> KdbResult<Predicate> {
    match expr {
        Expr::BoolLiteral(true) => Ok(Predicate::And(vec![])),
        Expr::BoolLiteral(false) => Ok(Predicate::Or(vec![])),
        Expr::Cmp(op, l, r) => lower_comparison(*op, l, r, schema),
        Expr::And(_, _) => {
            let mut kids = Vec::new();
            flatten_and(expr, &mut kids, schema)?;
            Ok(Predicate::And(kids))
        }
        Expr::Or(_, _) => {
            let mut kids = Vec::new();
            flatten_or(expr, &mut kids, schema)?;
            Ok(Predicate::Or(kids))
        }
        Expr::Not(inner) => Ok(Predicate::Not(Box::new(lower_predicate(inner, schema)?))),
        Expr::Ident(_) | Expr::Literal(_) | Expr::Call(_, _) | Expr::Binary(_, _, _) => Err(
            Status::invalid_argument("identifiers or literals alone are not valid predicates"),
        ),
    }
}

fn flatten_and(expr: &Expr, out: &mut Vec<Predicate>, schema: &TableSchema) -> KdbResult<()> {
    match expr {
        Expr::And(a, b) => {
            flatten_and(a, out, schema)?;
            flatten_and(b, out, schema)?;
            Ok(())
        }
        other => {
            out.push(lower_predicate(other, schema)?);
            Ok(())
        }
    }
}

fn flatten_or(expr: &Expr, out: &mut Vec<Predicate>, schema: &TableSchema) -> KdbResult<()> {
    match expr {
        Expr::Or(a, b) => {
            flatten_or(a, out, schema)?;
            flatten_or(b, out, schema)?;
            Ok(())
        }
        other => {
            out.push(lower_predicate(other, schema)?);
            Ok(())
        }
    }
}

fn lower_comparison(op: CmpOp, l: &Expr, r: &Expr, schema: &TableSchema) -> KdbResult<Predicate> {
    match (l, r) {
        (Expr::Ident(name), other) if is_literal_like(other) => Ok(Predicate::Comparison {
            column: resolve_column(schema, name)?,
            op: op.to_compare_op(),
            rhs: literal_value(other)?,
        }),
        (other, Expr::Ident(name)) if is_literal_like(other) => Ok(Predicate::Comparison {
            column: resolve_column(schema, name)?,
            op: op.to_compare_op().mirror(),
            rhs: literal_value(other)?,
        }),
        _ => Err(Status::invalid_argument(
            "comparison must have an identifier on one side and a literal on the other",
        )),
    }
}

fn is_literal_like(expr: &Expr) -> bool {
    matches!(expr, Expr::Literal(_) | Expr::BoolLiteral(_))
}

fn literal_value(expr: &Expr) -> KdbResult<Value> {
    match expr {
        Expr::Literal(lit) => Ok(lit.to_value()),
        Expr::BoolLiteral(b) => Ok(Value::boolean(*b)),
        _ => Err(Status::invalid_argument("expected a literal")),
    }
}

fn resolve_column(schema: &TableSchema, name: &str) -> KdbResult<usize> {
    schema
        .column_index(name)
        .ok_or_else(|| Status::invalid_argument(format!("unknown column '{}'", name)))
}

/// Shared expression interpreter used by UPDATE's computed assignments and
/// by non-trivial SELECT projections. Arithmetic `+` concatenates when
/// either side is a String; division by zero is `InvalidArgument`.
pub fn eval_expr(expr: &Expr, row: &Row, schema: &TableSchema) -> KdbResult<Value> {
    match expr {
        Expr::Literal(lit) => Ok(lit.to_value()),
        Expr::BoolLiteral(b) => Ok(Value::boolean(*b)),
        Expr::Ident(name) => {
            let idx = resolve_column(schema, name)?;
            Ok(row.get(idx).cloned().unwrap_or(Value::Null))
        }
        Expr::Binary(op, l, r) => eval_binary(*op, eval_expr(l, row, schema)?, eval_expr(r, row, schema)?),
        Expr::Cmp(op, l, r) => {
            let lv = eval_expr(l, row, schema)?;
            let rv = eval_expr(r, row, schema)?;
            if lv.is_null() || rv.is_null() {
                return Ok(Value::boolean(false));
            }
            Ok(Value::boolean(op.to_compare_op().apply(lv.compare(&rv))))
        }
        Expr::Not(inner) => Ok(Value::boolean(!eval_expr(inner, row, schema)?.as_bool()?)),
        Expr::And(l, r) => {
            if !eval_expr(l, row, schema)?.as_bool()? {
                return Ok(Value::boolean(false));
            }
            Ok(Value::boolean(eval_expr(r, row, schema)?.as_bool()?))
        }
        Expr::Or(l, r) => {
            if eval_expr(l, row, schema)?.as_bool()? {
                return Ok(Value::boolean(true));
            }
            Ok(Value::boolean(eval_expr(r, row, schema)?.as_bool()?))
        }
        Expr::Call(name, _) => Err(Status::invalid_argument(format!("function '{}' is not valid here", name))),
    }
}

fn eval_binary(op: BinOp, l: Value, r: Value) -> KdbResult<Value> {
    if op == BinOp::Add && (matches!(l, Value::String(_)) || matches!(r, Value::String(_))) {
        return Ok(Value::string(format!("{}{}", l.to_string_form(), r.to_string_form())));
    }
    if matches!(l, Value::Float(_)) || matches!(r, Value::Float(_)) {
        let lf = l.as_float()?;
        let rf = r.as_float()?;
        return match op {
            BinOp::Add => Ok(Value::float(lf + rf)),
            BinOp::Sub => Ok(Value::float(lf - rf)),
            BinOp::Mul => Ok(Value::float(lf * rf)),
            BinOp::Div => {
                if rf == 0.0 {
                    Err(Status::invalid_argument("division by zero"))
                } else {
                    Ok(Value::float(lf / rf))
                }
            }
        };
    }
    let li = l.as_int()?;
    let ri = r.as_int()?;
    match op {
        BinOp::Add => Ok(Value::integer(li + ri)),
        BinOp::Sub => Ok(Value::integer(li - ri)),
        BinOp::Mul => Ok(Value::integer(li * ri)),
        BinOp::Div => {
            if ri == 0 {
                Err(Status::invalid_argument("division by zero"))
            } else {
                Ok(Value::integer(li / ri))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Column;
    use crate::value::DataType;

    fn users_store() -> RelationalStore {
        let store = RelationalStore::new();
        let schema = TableSchema::new(vec![
            Column::new("id", DataType::Integer).nullable(false).unique(true),
            Column::new("name", DataType::String).nullable(false),
            Column::new("age", DataType::Integer),
        ])
        .unwrap();
        store.create_table("users", schema).unwrap();
        store
    }

    #[test]
    fn scenario_s2_kadeql_end_to_end_with_optimizer() {
        let store = users_store();
        execute(&store, "INSERT INTO users (id, name, age) VALUES (1, 'Ada', 36)").unwrap();
        execute(&store, "INSERT INTO users (id, name, age) VALUES (2, 'Grace', 41)").unwrap();

        let rs = execute(
            &store,
            "SELECT name FROM users WHERE (age >= 20 AND name != 'Alice') OR (NOT (age < 30) AND name = 'Alice')",
        )
        .unwrap();
        let names: std::collections::HashSet<String> = (0..rs.row_count())
            .map(|i| rs.cell(i, 0).unwrap().as_string().unwrap())
            .collect();
        assert_eq!(names, ["Ada", "Grace"].iter().map(|s| s.to_string()).collect());

        let a = execute(&store, "SELECT name FROM users WHERE 25 < age").unwrap();
        let b = execute(&store, "SELECT name FROM users WHERE age > 25").unwrap();
        assert_eq!(a.row_count(), b.row_count());
    }

    #[test]
    fn insert_rejects_non_literal_value() {
        let store = users_store();
        let err = execute(&store, "INSERT INTO users (id, name, age) VALUES (1, 'Ada', 1 + 1)");
        assert!(err.is_err());
    }

    #[test]
    fn update_computes_assignment_via_interpreter() {
        let store = users_store();
        execute(&store, "INSERT INTO users (id, name, age) VALUES (1, 'Ada', 36)").unwrap();
        let rs = execute(&store, "UPDATE users SET age = age + 1 WHERE id = 1").unwrap();
        assert_eq!(rs.cell(0, 0).unwrap(), &Value::integer(1));
        let sel = execute(&store, "SELECT age FROM users WHERE id = 1").unwrap();
        assert_eq!(sel.cell(0, 0).unwrap(), &Value::integer(37));
    }

    #[test]
    fn delete_returns_affected_and_synonym_columns() {
        let store = users_store();
        execute(&store, "INSERT INTO users (id, name, age) VALUES (1, 'Ada', 50)").unwrap();
        let rs = execute(&store, "DELETE FROM users WHERE age > 40").unwrap();
        assert_eq!(rs.columns()[1].name, "deleted");
        assert_eq!(rs.cell(0, 0).unwrap(), &Value::integer(1));
    }

    #[test]
    fn division_by_zero_is_invalid_argument() {
        let store = users_store();
        execute(&store, "INSERT INTO users (id, name, age) VALUES (1, 'Ada', 10)").unwrap();
        let err = execute(&store, "UPDATE users SET age = age / 0 WHERE id = 1").unwrap_err();
        assert_eq!(err.code, crate::status::StatusCode::InvalidArgument);
    }
}
