//! Snapshot tests for the cast compiler's (C2) per-engine canonical-text expressions. These
//! pin the exact SQL text each dialect produces, the same way the SQL builder's own
//! `assert_snapshot!` tests pin generated DDL/DML.

use insta::assert_snapshot;
use pgcompare::config::{Engine, NumericCastMode};
use pgcompare::prelude::CastCompiler;

fn compiler() -> CastCompiler {
    CastCompiler::new(NumericCastMode::Standard, NumericCastMode::Standard, false)
}

#[test]
fn numeric_cast_postgres() {
    let sql = compiler()
        .compile(Engine::Postgres, "\"salary\"", "numeric", Some(10), Some(2), false)
        .unwrap();
    assert_snapshot!(sql.expression);
}

#[test]
fn numeric_cast_oracle() {
    let sql = compiler()
        .compile(Engine::Oracle, "\"SALARY\"", "NUMBER", Some(10), Some(2), false)
        .unwrap();
    assert_snapshot!(sql.expression);
}

#[test]
fn integer_cast_is_a_plain_text_coalesce() {
    let sql = compiler()
        .compile(Engine::MySql, "`id`", "int", Some(10), Some(0), false)
        .unwrap();
    assert_snapshot!(sql.expression);
}

#[test]
fn timestamp_with_zone_cast_sqlserver() {
    let sql = compiler()
        .compile(Engine::SqlServer, "[created_at]", "datetimeoffset", Some(0), Some(3), false)
        .unwrap();
    assert_snapshot!(sql.expression);
}

#[test]
fn boolean_cast_db2() {
    let sql = compiler()
        .compile(Engine::Db2, "\"ACTIVE\"", "boolean", None, None, false)
        .unwrap();
    assert_snapshot!(sql.expression);
}

#[test]
fn raw_mode_skips_normalization() {
    let raw = CastCompiler::new(NumericCastMode::Standard, NumericCastMode::Standard, true);
    let sql = raw
        .compile(Engine::Postgres, "\"salary\"", "numeric", Some(10), Some(2), false)
        .unwrap();
    assert_snapshot!(sql.expression);
}

#[test]
fn scientific_notation_mode_switches_large_magnitudes() {
    let notation = CastCompiler::new(NumericCastMode::Notation, NumericCastMode::Notation, false);
    let sql = notation
        .compile(Engine::Oracle, "\"AMOUNT\"", "NUMBER", Some(38), Some(10), false)
        .unwrap();
    assert_snapshot!(sql.expression);
}

#[test]
fn unsupported_type_is_rejected() {
    let result = compiler().compile(Engine::Postgres, "\"payload\"", "bytea_custom_unknown", None, None, false);
    assert!(result.is_err());
}
