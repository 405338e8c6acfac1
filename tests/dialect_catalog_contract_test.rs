//! Every dialect's discovery catalog query must honor the uniform projection contract (section
//! 4.1): `nullable`/`pk` come back as literal `'Y'`/`'N'` text, not a native boolean or bit, so
//! `discover::parse_column_row` parses every engine's result set the same way.

use pgcompare::config::Engine;

fn dialects() -> Vec<(&'static str, Engine)> {
    vec![
        ("postgres", Engine::Postgres),
        ("oracle", Engine::Oracle),
        ("mysql", Engine::MySql),
        ("sqlserver", Engine::SqlServer),
        ("db2", Engine::Db2),
    ]
}

#[test]
fn column_projection_uses_y_n_text_for_nullable_and_primary_key() {
    for (name, engine) in dialects() {
        let sql = engine.dialect().select_columns_sql("my_schema", Some("my_table"));
        assert!(
            sql.contains("'Y'") && sql.contains("'N'"),
            "{name}: select_columns_sql should project nullable/pk as 'Y'/'N' text, got:\n{sql}"
        );
        assert!(
            !sql.contains("THEN 1 ELSE 0"),
            "{name}: select_columns_sql should not fall back to integer 1/0 projection"
        );
    }
}

#[test]
fn table_projection_is_nonempty_for_every_dialect() {
    for (name, engine) in dialects() {
        let sql = engine.dialect().select_tables_sql("my_schema");
        assert!(!sql.trim().is_empty(), "{name}: select_tables_sql returned empty SQL");
        assert!(sql.to_uppercase().contains("SELECT"), "{name}: expected a SELECT statement");
    }
}

#[test]
fn quote_folds_to_each_dialects_native_case_unless_reserved() {
    let postgres = Engine::Postgres.dialect();
    assert_eq!(postgres.quote("Customer", false), "customer");

    let oracle = Engine::Oracle.dialect();
    assert_eq!(oracle.quote("customer", false), "CUSTOMER");

    // preserve_case always forces quoting regardless of native case folding.
    assert_eq!(postgres.quote("Customer", true), postgres.quote_identifier("Customer"));
}
