//! SQL Server dialect.
//!
//! - Bracket identifier quoting
//! - Case-preserving/mixed-case storage, so unquoted identifiers are left as written rather
//!   than folded
//! - Metadata from `sys.columns`/`sys.tables`

use super::helpers::{self, NativeCase};
use super::Dialect;

const RESERVED: &[&str] = &[
    "add", "all", "alter", "and", "any", "as", "asc", "backup", "begin", "between", "break",
    "by", "cascade", "case", "check", "column", "commit", "constraint", "create", "cross",
    "database", "declare", "default", "delete", "desc", "distinct", "drop", "else", "end",
    "escape", "except", "exec", "execute", "exists", "foreign", "from", "full", "function",
    "goto", "grant", "group", "having", "identity", "if", "in", "index", "inner", "insert",
    "intersect", "into", "is", "join", "key", "left", "like", "not", "null", "of", "off", "on",
    "open", "option", "or", "order", "outer", "primary", "procedure", "public", "references",
    "return", "revoke", "right", "rollback", "rowcount", "select", "set", "table", "then", "to",
    "top", "transaction", "trigger", "truncate", "union", "unique", "update", "user", "values",
    "view", "where", "while", "with",
];

#[derive(Debug, Clone, Copy)]
pub struct SqlServer;

impl Dialect for SqlServer {
    fn name(&self) -> &'static str {
        "mssql"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_bracket(ident)
    }

    fn native_case(&self) -> NativeCase {
        NativeCase::Preserve
    }

    fn is_reserved_word(&self, ident: &str) -> bool {
        RESERVED.contains(&ident.to_lowercase().as_str())
    }

    fn select_tables_sql(&self, schema: &str) -> String {
        format!(
            "SELECT s.name AS owner, t.name AS table_name \
             FROM sys.tables t \
             JOIN sys.schemas s ON t.schema_id = s.schema_id \
             WHERE s.name = '{schema}' \
             ORDER BY t.name"
        )
    }

    fn select_columns_sql(&self, schema: &str, table: Option<&str>) -> String {
        let table_filter = match table {
            Some(t) => format!(" AND t.name = '{t}'"),
            None => String::new(),
        };
        format!(
            "SELECT s.name AS owner, t.name AS table_name, c.name AS column_name, \
             ty.name AS data_type, c.max_length AS data_length, c.precision AS data_precision, \
             c.scale AS data_scale, \
             CASE WHEN c.is_nullable = 1 THEN 'Y' ELSE 'N' END AS nullable, \
             CASE WHEN pk.column_id IS NOT NULL THEN 'Y' ELSE 'N' END AS primary_key \
             FROM sys.columns c \
             JOIN sys.tables t ON c.object_id = t.object_id \
             JOIN sys.schemas s ON t.schema_id = s.schema_id \
             JOIN sys.types ty ON c.user_type_id = ty.user_type_id \
             LEFT JOIN ( \
               SELECT ic.object_id, ic.column_id \
               FROM sys.index_columns ic \
               JOIN sys.indexes i ON ic.object_id = i.object_id AND ic.index_id = i.index_id \
               WHERE i.is_primary_key = 1 \
             ) pk ON pk.object_id = c.object_id AND pk.column_id = c.column_id \
             WHERE s.name = '{schema}'{table_filter} \
             ORDER BY t.name, c.column_id"
        )
    }
}
