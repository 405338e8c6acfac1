//! Cross-engine column-map alignment: discovery (A6) runs the same compiler over a source and
//! target catalog that come from two different dialects, so these exercise that path end to
//! end without touching a live database.

use std::collections::HashMap;

use pgcompare::config::{Engine, NumericCastMode};
use pgcompare::dialect::ColumnInfo;
use pgcompare::prelude::*;

fn column(owner: &str, table: &str, name: &str, data_type: &str, pk: bool) -> ColumnInfo {
    ColumnInfo {
        owner: owner.to_string(),
        table_name: table.to_string(),
        column_name: name.to_string(),
        data_type: data_type.to_string(),
        data_length: None,
        data_precision: Some(10),
        data_scale: Some(2),
        nullable: !pk,
        primary_key: pk,
    }
}

#[test]
fn postgres_to_oracle_numeric_columns_align_by_alias() {
    let source = vec![
        column("public", "emp", "emp_id", "integer", true),
        column("public", "emp", "salary", "numeric", false),
    ];
    let target = vec![
        column("HR", "EMP", "EMP_ID", "NUMBER", true),
        column("HR", "EMP", "SALARY", "NUMBER", false),
    ];

    let cast = CastCompiler::new(NumericCastMode::Standard, NumericCastMode::Standard, false);
    let map = pgcompare::colmap::compile_column_map(
        &source,
        &target,
        Engine::Postgres,
        Engine::Oracle,
        &cast,
        &HashMap::new(),
    )
    .expect("both sides agree on a single primary key column");

    assert_eq!(map.pk_aliases(), vec!["emp_id"]);
    let source_pk_sql = map.pk_select_list(Side::Source);
    let target_pk_sql = map.pk_select_list(Side::Target);
    assert_eq!(source_pk_sql.len(), 1);
    assert_eq!(target_pk_sql.len(), 1);
    assert!(target_pk_sql[0].contains("TO_CHAR") || target_pk_sql[0].contains("COALESCE"));

    let salary = map
        .entries
        .iter()
        .find(|e| e.column_alias == "salary")
        .unwrap();
    assert!(salary.supported);
    assert_eq!(salary.data_class, Some(DataClass::Numeric));
}

#[test]
fn mismatched_primary_key_arity_is_rejected() {
    let source = vec![
        column("public", "order_item", "order_id", "integer", true),
        column("public", "order_item", "line_nbr", "integer", true),
    ];
    let target = vec![column("dbo", "order_item", "order_id", "int", true)];

    let cast = CastCompiler::new(NumericCastMode::Standard, NumericCastMode::Standard, false);
    let result = pgcompare::colmap::compile_column_map(
        &source,
        &target,
        Engine::Postgres,
        Engine::SqlServer,
        &cast,
        &HashMap::new(),
    );

    assert!(result.is_err());
}

#[test]
fn alias_override_realigns_a_renamed_column() {
    let source = vec![
        column("public", "cust", "id", "integer", true),
        column("public", "cust", "full_name", "varchar", false),
    ];
    let target = vec![
        column("dbo", "customer", "id", "int", true),
        column("dbo", "customer", "cust_name", "varchar", false),
    ];

    let mut overrides = HashMap::new();
    overrides.insert("full_name".to_string(), "name".to_string());
    overrides.insert("cust_name".to_string(), "name".to_string());

    let cast = CastCompiler::new(NumericCastMode::Standard, NumericCastMode::Standard, false);
    let map = pgcompare::colmap::compile_column_map(
        &source,
        &target,
        Engine::Postgres,
        Engine::SqlServer,
        &cast,
        &overrides,
    )
    .unwrap();

    let renamed = map.entries.iter().find(|e| e.column_alias == "name").unwrap();
    assert!(renamed.supported);
    assert!(renamed.source.is_some());
    assert!(renamed.target.is_some());
}
