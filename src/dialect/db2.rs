//! DB2 dialect.
//!
//! - ANSI identifier quoting (`"`)
//! - Uppercase case folding for unquoted identifiers
//! - Metadata from `syscat.columns`

use super::helpers::{self, NativeCase};
use super::Dialect;

const RESERVED: &[&str] = &[
    "add", "all", "alter", "and", "any", "as", "asc", "between", "by", "case", "check",
    "column", "constraint", "create", "cross", "current", "default", "delete", "desc",
    "distinct", "drop", "else", "end", "exists", "for", "foreign", "from", "full", "group",
    "having", "in", "index", "inner", "insert", "intersect", "into", "is", "join", "key",
    "left", "like", "not", "null", "of", "on", "or", "order", "outer", "primary", "references",
    "right", "rownumber", "select", "set", "table", "then", "to", "union", "unique", "update",
    "user", "using", "values", "view", "where", "with",
];

#[derive(Debug, Clone, Copy)]
pub struct Db2;

impl Dialect for Db2 {
    fn name(&self) -> &'static str {
        "db2"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_double(ident)
    }

    fn native_case(&self) -> NativeCase {
        NativeCase::Upper
    }

    fn is_reserved_word(&self, ident: &str) -> bool {
        RESERVED.contains(&ident.to_lowercase().as_str())
    }

    fn select_tables_sql(&self, schema: &str) -> String {
        let owner = schema.to_uppercase();
        format!(
            "SELECT tabschema AS owner, tabname AS table_name \
             FROM syscat.tables \
             WHERE tabschema = '{owner}' AND type = 'T' \
             ORDER BY tabname"
        )
    }

    fn select_columns_sql(&self, schema: &str, table: Option<&str>) -> String {
        let owner = schema.to_uppercase();
        let table_filter = match table {
            Some(t) => format!(" AND c.tabname = '{}'", t.to_uppercase()),
            None => String::new(),
        };
        format!(
            "SELECT c.tabschema AS owner, c.tabname AS table_name, c.colname AS column_name, \
             c.typename AS data_type, c.length AS data_length, c.length AS data_precision, \
             c.scale AS data_scale, \
             CASE WHEN c.nulls = 'Y' THEN 'Y' ELSE 'N' END AS nullable, \
             CASE WHEN c.keyseq IS NOT NULL THEN 'Y' ELSE 'N' END AS primary_key \
             FROM syscat.columns c \
             WHERE c.tabschema = '{owner}'{table_filter} \
             ORDER BY c.tabname, c.colno"
        )
    }
}
