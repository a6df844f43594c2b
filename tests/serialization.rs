use kadedb::row::Row;
use kadedb::schema::{Column, Constraints, TableSchema};
use kadedb::serialize::{binary, json};
use kadedb::value::{DataType, Value};

fn constrained_schema() -> TableSchema {
    TableSchema::new(vec![
        Column::new("name", DataType::String).with_constraints(Constraints {
            min_length: Some(1),
            max_length: Some(64),
            ..Constraints::none()
        }),
        Column::new("score", DataType::Integer).with_constraints(Constraints {
            min_value: Some(0.0),
            ..Constraints::none()
        }),
    ])
    .unwrap()
}

#[test]
fn scenario_s5_binary_and_json_round_trips_agree_on_row_acceptance() {
    let schema = constrained_schema();
    let good = vec![Value::string("Ada"), Value::integer(10)];
    let bad = vec![Value::string(""), Value::integer(-1)];

    let buf = binary::write_table_schema(&schema);
    let from_binary = binary::read_table_schema(&buf).unwrap();

    let j = json::table_schema_to_json(&schema);
    let from_json = json::table_schema_from_json(&j).unwrap();

    for candidate in [&good, &bad] {
        let original = kadedb::schema::validate_row(&schema, candidate).is_ok();
        let via_binary = kadedb::schema::validate_row(&from_binary, candidate).is_ok();
        let via_json = kadedb::schema::validate_row(&from_json, candidate).is_ok();
        assert_eq!(original, via_binary);
        assert_eq!(original, via_json);
    }
}

#[test]
fn row_binary_round_trip_preserves_nulls() {
    let row = Row::new(vec![Value::integer(7), Value::null(), Value::string("x")]);
    let buf = binary::write_row(&row);
    let back = binary::read_row(&buf).unwrap();
    assert_eq!(back, row);
}

#[test]
fn row_json_round_trip_preserves_values() {
    let row = Row::new(vec![Value::float(2.5), Value::boolean(true)]);
    let j = json::row_to_json(&row);
    let back = json::row_from_json(&j).unwrap();
    assert_eq!(back, row);
}
