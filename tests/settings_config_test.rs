//! Settings loading (A1): TOML parsing, `${VAR}` expansion, and the repo/source/target
//! connection resolution rules a misconfigured deployment hits first.

use std::fs;
use std::path::PathBuf;

use pgcompare::config::{expand_env_vars, Engine, Settings};

fn write_temp_toml(name: &str, content: &str) -> PathBuf {
    let mut path = std::env::temp_dir();
    path.push(format!("pgcompare_test_{name}_{}.toml", std::process::id()));
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn missing_file_is_a_settings_error() {
    let result = Settings::from_file("/nonexistent/pgcompare-does-not-exist.toml");
    assert!(result.is_err());
}

#[test]
fn repo_connection_requires_a_repo_section() {
    let path = write_temp_toml(
        "no_repo",
        r#"
        [source]
        engine = "postgres"
        host = "localhost"
        database = "app"
        "#,
    );
    let settings = Settings::from_file(&path).unwrap();
    assert!(settings.repo_connection().is_err());
    fs::remove_file(&path).ok();
}

#[test]
fn full_config_resolves_all_three_connections() {
    std::env::set_var("PGCOMPARE_TEST_PASSWORD", "s3cret");
    let path = write_temp_toml(
        "full",
        r#"
        [repo]
        engine = "postgres"
        host = "localhost"
        database = "pgcompare_repo"
        user = "pgcompare"
        password = "${PGCOMPARE_TEST_PASSWORD}"

        [source]
        engine = "oracle"
        host = "source.example.com"
        database = "ORCL"

        [target]
        engine = "mysql"
        host = "target.example.com"
        database = "app"

        [cast]
        number-cast = "standard"

        [log]
        level = "debug"
        "#,
    );

    let settings = Settings::from_file(&path).unwrap();
    let repo = settings.repo_connection().unwrap();
    assert_eq!(repo.engine, Engine::Postgres);
    assert_eq!(repo.password.as_deref(), Some("s3cret"));

    let source = settings.source_connection().unwrap();
    assert_eq!(source.engine, Engine::Oracle);

    let target = settings.target_connection().unwrap();
    assert_eq!(target.engine, Engine::MySql);

    assert_eq!(settings.log.level, "debug");

    fs::remove_file(&path).ok();
    std::env::remove_var("PGCOMPARE_TEST_PASSWORD");
}

#[test]
fn expand_env_vars_errs_on_missing_variable() {
    let result = expand_env_vars("${PGCOMPARE_TEST_DEFINITELY_UNSET_VAR}");
    assert!(result.is_err());
}

#[test]
fn expand_env_vars_substitutes_both_syntaxes() {
    std::env::set_var("PGCOMPARE_TEST_HOST", "db.internal");
    assert_eq!(expand_env_vars("${PGCOMPARE_TEST_HOST}").unwrap(), "db.internal");
    assert_eq!(expand_env_vars("$PGCOMPARE_TEST_HOST").unwrap(), "db.internal");
    std::env::remove_var("PGCOMPARE_TEST_HOST");
}
