use kadedb::engine::relational::RelationalStore;
use kadedb::predicate::{CompareOp, Predicate};
use kadedb::row::Row;
use kadedb::schema::{Column, TableSchema};
use kadedb::status::StatusCode;
use kadedb::value::{DataType, Value};

fn users() -> RelationalStore {
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
fn insert_reject_null_in_non_nullable_column() {
    let store = users();
    let err = store
        .insert_row("users", Row::new(vec![Value::integer(1), Value::null(), Value::integer(1)]))
        .unwrap_err();
    assert_eq!(err.code, StatusCode::InvalidArgument);
}

#[test]
fn duplicate_unique_key_leaves_table_unchanged() {
    let store = users();
    store
        .insert_row("users", Row::new(vec![Value::integer(1), Value::string("Ada"), Value::integer(36)]))
        .unwrap();
    let err = store
        .insert_row("users", Row::new(vec![Value::integer(1), Value::string("Dup"), Value::integer(0)]))
        .unwrap_err();
    assert_eq!(err.code, StatusCode::FailedPrecondition);
    assert_eq!(store.select("users", &[], None).unwrap().row_count(), 1);
}

#[test]
fn select_with_conjunction_predicate() {
    let store = users();
    store
        .insert_row("users", Row::new(vec![Value::integer(1), Value::string("Ada"), Value::integer(36)]))
        .unwrap();
    store
        .insert_row("users", Row::new(vec![Value::integer(2), Value::string("Grace"), Value::integer(41)]))
        .unwrap();
    let pred = Predicate::And(vec![
        Predicate::Comparison { column: 2, op: CompareOp::Gt, rhs: Value::integer(30) },
        Predicate::Comparison { column: 1, op: CompareOp::Ne, rhs: Value::string("Ada") },
    ]);
    let rs = store.select("users", &["name".to_string()], Some(&pred)).unwrap();
    assert_eq!(rs.row_count(), 1);
    assert_eq!(rs.cell(0, 0).unwrap(), &Value::string("Grace"));
}

#[test]
fn drop_table_then_use_is_not_found() {
    let store = users();
    store.drop_table("users").unwrap();
    let err = store.select("users", &[], None).unwrap_err();
    assert_eq!(err.code, StatusCode::NotFound);
}
