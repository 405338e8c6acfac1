//! Oracle dialect.
//!
//! - ANSI identifier quoting (`"`)
//! - Uppercase case folding for unquoted identifiers
//! - Metadata from `all_tab_columns`/`all_constraints`

use super::helpers::{self, NativeCase};
use super::Dialect;

const RESERVED: &[&str] = &[
    "access", "add", "all", "alter", "and", "any", "as", "asc", "audit", "between", "by", "char",
    "check", "cluster", "column", "comment", "compress", "connect", "create", "current", "date",
    "decimal", "default", "delete", "desc", "distinct", "drop", "else", "exclusive", "exists",
    "file", "float", "for", "from", "grant", "group", "having", "identified", "immediate", "in",
    "increment", "index", "initial", "insert", "integer", "intersect", "into", "is", "level",
    "like", "lock", "long", "maxextents", "minus", "mode", "modify", "noaudit", "nocompress",
    "not", "notfound", "nowait", "null", "number", "of", "offline", "on", "online", "option",
    "or", "order", "pctfree", "prior", "privileges", "public", "raw", "rename", "resource",
    "revoke", "row", "rowid", "rownum", "rows", "select", "session", "set", "share", "size",
    "smallint", "start", "successful", "synonym", "sysdate", "table", "then", "to", "trigger",
    "uid", "union", "unique", "update", "user", "validate", "values", "varchar", "varchar2",
    "view", "whenever", "where", "with",
];

#[derive(Debug, Clone, Copy)]
pub struct Oracle;

impl Dialect for Oracle {
    fn name(&self) -> &'static str {
        "oracle"
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
            "SELECT owner, table_name \
             FROM all_tables \
             WHERE owner = '{owner}' \
             ORDER BY table_name"
        )
    }

    fn select_columns_sql(&self, schema: &str, table: Option<&str>) -> String {
        let owner = schema.to_uppercase();
        let table_filter = match table {
            Some(t) => format!(" AND c.table_name = '{}'", t.to_uppercase()),
            None => String::new(),
        };
        format!(
            "SELECT c.owner, c.table_name, c.column_name, c.data_type, \
             c.data_length, c.data_precision, c.data_scale, \
             CASE WHEN c.nullable = 'Y' THEN 'Y' ELSE 'N' END AS nullable, \
             CASE WHEN EXISTS ( \
               SELECT 1 FROM all_constraints con \
               JOIN all_cons_columns cc \
                 ON con.constraint_name = cc.constraint_name AND con.owner = cc.owner \
               WHERE con.constraint_type = 'P' AND con.owner = c.owner \
                 AND con.table_name = c.table_name AND cc.column_name = c.column_name \
             ) THEN 'Y' ELSE 'N' END AS primary_key \
             FROM all_tab_columns c \
             WHERE c.owner = '{owner}'{table_filter} \
             ORDER BY c.table_name, c.column_id"
        )
    }
}
