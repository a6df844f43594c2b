use kadedb::engine::relational::RelationalStore;
use kadedb::kadeql::executor::execute;
use kadedb::row::Row;
use kadedb::schema::{Column, TableSchema};
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
        .insert_row("users", Row::new(vec![Value::integer(1), Value::string("Ada"), Value::integer(36)]))
        .unwrap();
    store
        .insert_row("users", Row::new(vec![Value::integer(2), Value::string("Grace"), Value::integer(41)]))
        .unwrap();
    store
}

#[test]
fn scenario_s2_optimizer_canonicalized_query_matches_direct_equivalent() {
    let store = users();
    let sql = "SELECT name FROM users WHERE (age >= 20 AND name != 'Alice') OR (NOT (age < 30) AND name = 'Alice')";
    let rs = execute(&store, sql).unwrap();
    let mut names: Vec<String> = (0..rs.row_count())
        .map(|i| rs.cell(i, 0).unwrap().as_string().unwrap())
        .collect();
    names.sort();
    assert_eq!(names, vec!["Ada".to_string(), "Grace".to_string()]);

    let reversed = execute(&store, "SELECT name FROM users WHERE 25 < age").unwrap();
    let direct = execute(&store, "SELECT name FROM users WHERE age > 25").unwrap();
    assert_eq!(reversed.row_count(), direct.row_count());
}

#[test]
fn insert_update_delete_round_trip_through_kadeql() {
    let store = users();
    execute(&store, "INSERT INTO users (id, name, age) VALUES (3, 'Imogen', 19)").unwrap();
    assert_eq!(store.select("users", &[], None).unwrap().row_count(), 3);

    let updated = execute(&store, "UPDATE users SET age = age + 1 WHERE name = 'Imogen'").unwrap();
    assert_eq!(updated.cell(0, 0).unwrap(), &Value::integer(1));
    let rs = store.select("users", &["age".to_string()], None).unwrap();
    let ages: Vec<i64> = (0..rs.row_count()).map(|i| rs.cell(i, 0).unwrap().as_int().unwrap()).collect();
    assert!(ages.contains(&20));

    let deleted = execute(&store, "DELETE FROM users WHERE name = 'Imogen'").unwrap();
    assert_eq!(deleted.cell(0, 0).unwrap(), &Value::integer(1));
    assert_eq!(store.select("users", &[], None).unwrap().row_count(), 2);
}

#[test]
fn division_by_zero_in_update_expression_is_rejected() {
    let store = users();
    let err = execute(&store, "UPDATE users SET age = age / 0 WHERE id = 1").unwrap_err();
    assert_eq!(err.code, kadedb::status::StatusCode::InvalidArgument);
}
