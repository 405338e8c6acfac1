//! Per-engine SQL dialect definitions: identifier quoting, case folding, and catalog
//! introspection templates.
//!
//! This is pure string templating — no database access happens here. The connection layer
//! (`src/repo`, `src/extract.rs`) runs the SQL this module emits and hands back typed rows.
//!
//! ```ignore
//! use pgcompare::dialect::{Dialect, Engine};
//!
//! let dialect = Engine::Postgres.dialect();
//! let quoted = dialect.quote("user", false); // "user"
//! ```

pub mod helpers;
mod mysql;
mod oracle;
mod postgres;
mod mssql;
mod db2;

pub use db2::Db2;
pub use mssql::SqlServer;
pub use mysql::MySql;
pub use oracle::Oracle;
pub use postgres::Postgres;

use crate::config::Engine;
use helpers::NativeCase;

/// Uniform catalog-column projection returned by a dialect's `select_columns` query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub owner: String,
    pub table_name: String,
    pub column_name: String,
    pub data_type: String,
    pub data_length: Option<i64>,
    pub data_precision: Option<i64>,
    pub data_scale: Option<i64>,
    pub nullable: bool,
    pub primary_key: bool,
}

/// Uniform catalog-table projection returned by a dialect's `select_tables` query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableInfo {
    pub owner: String,
    pub table_name: String,
}

/// Per-engine SQL dialect: identifier quoting, case folding, reserved words, and catalog
/// introspection templates.
pub trait Dialect: std::fmt::Debug {
    /// Dialect name for display/logging.
    fn name(&self) -> &'static str;

    /// Quote character pair this dialect uses for identifiers.
    fn quote_identifier(&self, ident: &str) -> String;

    /// The case unquoted identifiers fold to in this engine's catalog.
    fn native_case(&self) -> NativeCase;

    /// Reserved words that force quoting even when `preserve_case` is false.
    fn is_reserved_word(&self, ident: &str) -> bool;

    /// Render an identifier, quoting when `preserve_case` is set or the identifier is a
    /// reserved word; otherwise folding to this dialect's native case unquoted.
    fn quote(&self, ident: &str, preserve_case: bool) -> String {
        if preserve_case || self.is_reserved_word(ident) {
            self.quote_identifier(ident)
        } else {
            helpers::fold_case(ident, self.native_case())
        }
    }

    /// SQL text that, run against this engine, returns the uniform table projection for a
    /// schema/owner.
    fn select_tables_sql(&self, schema: &str) -> String;

    /// SQL text that, run against this engine, returns the uniform column projection for a
    /// schema/owner (all tables) or a single table when `table` is given.
    fn select_columns_sql(&self, schema: &str, table: Option<&str>) -> String;
}

impl Engine {
    /// The dialect implementation for this engine.
    pub fn dialect(&self) -> &'static dyn Dialect {
        match self {
            Engine::Postgres => &Postgres,
            Engine::Oracle => &Oracle,
            Engine::MySql => &MySql,
            Engine::SqlServer => &SqlServer,
            Engine::Db2 => &Db2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_preserve_case() {
        assert_eq!(Engine::Postgres.dialect().quote("Users", true), "\"Users\"");
        assert_eq!(Engine::Postgres.dialect().quote("users", false), "users");
        assert_eq!(Engine::Oracle.dialect().quote("users", false), "USERS");
        assert_eq!(Engine::MySql.dialect().quote("Users", true), "`Users`");
        assert_eq!(Engine::SqlServer.dialect().quote("Users", true), "[Users]");
    }

    #[test]
    fn test_reserved_word_forces_quoting() {
        // "order" is reserved across all five engines
        assert_eq!(Engine::Postgres.dialect().quote("order", false), "\"order\"");
        assert_eq!(Engine::MySql.dialect().quote("order", false), "`order`");
    }

    #[test]
    fn test_dialect_names() {
        assert_eq!(Engine::Postgres.dialect().name(), "postgres");
        assert_eq!(Engine::Oracle.dialect().name(), "oracle");
        assert_eq!(Engine::MySql.dialect().name(), "mysql");
        assert_eq!(Engine::SqlServer.dialect().name(), "mssql");
        assert_eq!(Engine::Db2.dialect().name(), "db2");
    }
}
