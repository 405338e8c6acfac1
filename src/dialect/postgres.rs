//! PostgreSQL dialect.
//!
//! - ANSI identifier quoting (`"`)
//! - Lowercase case folding for unquoted identifiers
//! - Metadata from `information_schema`

use super::helpers::{self, NativeCase};
use super::Dialect;

const RESERVED: &[&str] = &[
    "all", "analyse", "analyze", "and", "any", "array", "as", "asc", "asymmetric", "both",
    "case", "cast", "check", "collate", "column", "constraint", "create", "current_date",
    "current_role", "current_time", "current_timestamp", "current_user", "default", "deferrable",
    "desc", "distinct", "do", "else", "end", "except", "false", "for", "foreign", "from",
    "grant", "group", "having", "in", "initially", "intersect", "into", "leading", "limit",
    "localtime", "localtimestamp", "new", "not", "null", "off", "offset", "old", "on", "only",
    "or", "order", "placing", "primary", "references", "select", "session_user", "some",
    "symmetric", "table", "then", "to", "trailing", "true", "union", "unique", "user", "using",
    "when", "where",
];

#[derive(Debug, Clone, Copy)]
pub struct Postgres;

impl Dialect for Postgres {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_double(ident)
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
             CASE WHEN EXISTS ( \
               SELECT 1 FROM information_schema.table_constraints tc \
               JOIN information_schema.key_column_usage kcu \
                 ON tc.constraint_name = kcu.constraint_name AND tc.table_schema = kcu.table_schema \
               WHERE tc.constraint_type = 'PRIMARY KEY' \
                 AND tc.table_schema = c.table_schema AND tc.table_name = c.table_name \
                 AND kcu.column_name = c.column_name \
             ) THEN 'Y' ELSE 'N' END AS primary_key \
             FROM information_schema.columns c \
             WHERE c.table_schema = '{schema}'{table_filter} \
             ORDER BY c.table_name, c.ordinal_position"
        )
    }
}
