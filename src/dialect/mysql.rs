//! MySQL/MariaDB dialect.
//!
//! - Backtick identifier quoting
//! - Lowercase case folding for unquoted identifiers
//! - Metadata from `information_schema.columns`

use super::helpers::{self, NativeCase};
use super::Dialect;

const RESERVED: &[&str] = &[
    "add", "all", "alter", "analyze", "and", "as", "asc", "between", "both", "by", "case",
    "change", "check", "collate", "column", "condition", "constraint", "create", "cross",
    "database", "default", "delete", "desc", "describe", "distinct", "div", "drop", "else",
    "elseif", "exists", "explain", "false", "for", "foreign", "from", "group", "having", "if",
    "in", "index", "insert", "interval", "into", "is", "join", "key", "keys", "left", "like",
    "limit", "lock", "match", "mod", "modifies", "natural", "not", "null", "on", "optimize",
    "option", "or", "order", "outer", "primary", "procedure", "range", "read", "references",
    "rename", "replace", "require", "restrict", "return", "revoke", "right", "schema", "select",
    "set", "show", "table", "then", "to", "trigger", "true", "union", "unique", "unlock",
    "update", "use", "using", "values", "when", "where", "while", "with",
];

#[derive(Debug, Clone, Copy)]
pub struct MySql;

impl Dialect for MySql {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_backtick(ident)
    }

    fn native_case(&self) -> NativeCase {
        NativeCase::Lower
    }

    fn is_reserved_word(&self, ident: &str) -> bool {
        RESERVED.contains(&ident.to_lowercase().as_str())
    }

    fn select_tables_sql(&self, schema: &str) -> String {
        format!(
            "SELECT table_schema AS owner, table_name \
             FROM information_schema.tables \
             WHERE table_schema = '{schema}' AND table_type = 'BASE TABLE' \
             ORDER BY table_name"
        )
    }

    fn select_columns_sql(&self, schema: &str, table: Option<&str>) -> String {
        let table_filter = match table {
            Some(t) => format!(" AND c.table_name = '{t}'"),
            None => String::new(),
        };
        format!(
            "SELECT c.table_schema AS owner, c.table_name, c.column_name, c.data_type, \
             c.character_maximum_length AS data_length, c.numeric_precision AS data_precision, \
             c.numeric_scale AS data_scale, \
             CASE WHEN c.is_nullable = 'YES' THEN 'Y' ELSE 'N' END AS nullable, \
             CASE WHEN c.column_key = 'PRI' THEN 'Y' ELSE 'N' END AS primary_key \
             FROM information_schema.columns c \
             WHERE c.table_schema = '{schema}'{table_filter} \
             ORDER BY c.table_name, c.ordinal_position"
        )
    }
}
