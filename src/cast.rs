//! Type classification and cast compilation (C2).
//!
//! Given a column's declared type, classifies it into one of six canonical type sets and
//! compiles an engine-specific SQL expression that normalizes the value into byte-identical
//! canonical text before hashing. This is the piece that makes cross-engine fingerprints
//! comparable at all: a Postgres `numeric(10,2)` and an Oracle `NUMBER(10,2)` holding the same
//! value must produce the same text.

use crate::config::{Engine, NumericCastMode};
use crate::dialect::helpers::{format_bool_literal, format_bool_numeric};

/// The six canonical type sets a declared column type is classified into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeSet {
    Boolean,
    String,
    Numeric,
    Timestamp,
    Binary,
    Unsupported,
}

/// The collapsed data class persisted on a `ColumnMap` entry. Timestamp/String/Binary all
/// collapse to `Char` once canonicalized to text; Boolean and Numeric keep their own class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataClass {
    Boolean,
    Numeric,
    Char,
}

impl TypeSet {
    pub fn data_class(&self) -> Option<DataClass> {
        match self {
            TypeSet::Boolean => Some(DataClass::Boolean),
            TypeSet::Numeric => Some(DataClass::Numeric),
            TypeSet::String | TypeSet::Timestamp | TypeSet::Binary => Some(DataClass::Char),
            TypeSet::Unsupported => None,
        }
    }
}

const BOOLEAN_TYPES: &[&str] = &["bool", "boolean"];

const STRING_TYPES: &[&str] = &[
    "bpchar", "char", "character", "clob", "enum", "json", "jsonb", "nchar", "nclob", "ntext",
    "nvarchar", "nvarchar2", "text", "varchar", "varchar2", "xml",
];

const NUMERIC_TYPES: &[&str] = &[
    "bigint", "bigserial", "binary_double", "binary_float", "dec", "decimal", "double",
    "double precision", "fixed", "float", "float4", "float8", "int", "integer", "int2", "int4",
    "int8", "money", "number", "numeric", "real", "serial", "smallint", "smallmoney",
    "smallserial", "tinyint",
];

const TIMESTAMP_TYPES: &[&str] = &[
    "date", "datetime", "datetimeoffset", "datetime2", "smalldatetime", "time", "timestamp",
    "timestamptz", "year",
];

const BINARY_TYPES: &[&str] = &["bytea", "binary", "blob", "raw", "varbinary"];

const UNSUPPORTED_TYPES: &[&str] = &[
    "bfile", "bit", "cursor", "hierarchyid", "image", "rowid", "rowversion", "set",
    "sql_variant", "uniqueidentifier", "long", "long raw",
];

/// Strip a trailing length/precision parameter and any "with time zone" suffix, lowercase,
/// and trim whitespace, e.g. `TIMESTAMP(6) WITH TIME ZONE` -> `timestamp`.
fn normalize_type_name(raw: &str) -> String {
    let mut s = raw.trim().to_lowercase();
    if let Some(idx) = s.find('(') {
        let after = s[idx..].find(')').map(|end| idx + end + 1);
        if let Some(end) = after {
            s = format!("{}{}", &s[..idx], &s[end..]);
        } else {
            s.truncate(idx);
        }
    }
    s = s.replace("with time zone", "").replace("with local time zone", "");
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Classify a declared SQL type name into one of the six canonical type sets.
pub fn classify(raw_type: &str) -> TypeSet {
    let normalized = normalize_type_name(raw_type);
    let name = normalized.as_str();

    if BOOLEAN_TYPES.contains(&name) {
        TypeSet::Boolean
    } else if STRING_TYPES.contains(&name) {
        TypeSet::String
    } else if NUMERIC_TYPES.contains(&name) {
        TypeSet::Numeric
    } else if TIMESTAMP_TYPES.contains(&name) || name.starts_with("timestamp") {
        TypeSet::Timestamp
    } else if BINARY_TYPES.contains(&name) {
        TypeSet::Binary
    } else if UNSUPPORTED_TYPES.contains(&name) {
        TypeSet::Unsupported
    } else {
        TypeSet::Unsupported
    }
}

/// Whether a type carries an explicit timezone offset (affects timestamp canonicalization).
fn carries_zone(raw_type: &str) -> bool {
    let lower = raw_type.to_lowercase();
    lower.contains("timestamptz") || lower.contains("with time zone") || lower.contains("datetimeoffset")
}

/// Error compiling a cast expression.
#[derive(Debug, thiserror::Error)]
pub enum CastError {
    #[error("column type {0:?} is unsupported and cannot be hashed")]
    Unsupported(String),
}

/// Result of compiling one column's canonical value expression.
#[derive(Debug, Clone)]
pub struct CastResult {
    /// The dialect-specific SQL fragment producing the column's canonical text form.
    pub expression: String,
    pub data_class: DataClass,
}

/// Compiles per-engine canonical-text cast expressions for the cast compiler (C2).
///
/// Two modes: `raw` (fast, lossy — just the safest text cast) and `normalized` (default —
/// applies the numeric/timestamp/boolean canonicalization rules fingerprint equality depends
/// on). Mode and magnitude-notation choice come from `CastSettings`.
pub struct CastCompiler {
    pub number_cast: NumericCastMode,
    pub float_cast: NumericCastMode,
    pub raw_mode: bool,
}

/// |x| at or above this magnitude switches `notation` mode to scientific form.
const NOTATION_THRESHOLD: &str = "1e15";

impl CastCompiler {
    pub fn new(number_cast: NumericCastMode, float_cast: NumericCastMode, raw_mode: bool) -> Self {
        Self {
            number_cast,
            float_cast,
            raw_mode,
        }
    }

    /// Compile the canonical value expression for one column.
    ///
    /// `quoted_column` is the already-quoted, already-qualified column reference (e.g.
    /// `"t"."salary"` or `` `t`.`salary` ``). `raw_type` is the column's declared type name as
    /// returned by the dialect's catalog query; `precision`/`scale` are its declared numeric
    /// precision/scale, `is_float` distinguishes FLOAT/DOUBLE/REAL from fixed NUMERIC/DECIMAL
    /// for picking `float-cast` vs `number-cast`.
    pub fn compile(
        &self,
        engine: Engine,
        quoted_column: &str,
        raw_type: &str,
        precision: Option<i64>,
        scale: Option<i64>,
        is_float: bool,
    ) -> Result<CastResult, CastError> {
        let type_set = classify(raw_type);
        let data_class = type_set
            .data_class()
            .ok_or_else(|| CastError::Unsupported(raw_type.to_string()))?;

        if self.raw_mode {
            return Ok(CastResult {
                expression: self.raw_text_cast(engine, quoted_column),
                data_class,
            });
        }

        let expression = match type_set {
            TypeSet::Boolean => self.boolean_expr(engine, quoted_column),
            TypeSet::Numeric => {
                let mode = if is_float { self.float_cast } else { self.number_cast };
                self.numeric_expr(engine, quoted_column, precision, scale, mode)
            }
            TypeSet::Timestamp => {
                let has_zone = carries_zone(raw_type);
                let frac_precision = scale.unwrap_or(0).max(0);
                self.timestamp_expr(engine, quoted_column, has_zone, frac_precision)
            }
            TypeSet::String => self.string_expr(engine, quoted_column),
            TypeSet::Binary => self.binary_expr(engine, quoted_column),
            TypeSet::Unsupported => unreachable!("checked above"),
        };

        Ok(CastResult {
            expression,
            data_class,
        })
    }

    fn raw_text_cast(&self, engine: Engine, col: &str) -> String {
        match engine {
            Engine::Postgres => format!("COALESCE({col}::text, '')"),
            Engine::Oracle => format!("COALESCE(TO_CHAR({col}), '')"),
            Engine::MySql => format!("COALESCE(CAST({col} AS CHAR), '')"),
            Engine::SqlServer => format!("COALESCE(CAST({col} AS NVARCHAR(MAX)), '')"),
            Engine::Db2 => format!("COALESCE(VARCHAR({col}), '')"),
        }
    }

    fn boolean_expr(&self, engine: Engine, col: &str) -> String {
        let (when_true, when_false) = (format_bool_literal(true), format_bool_literal(false));
        match engine {
            Engine::Postgres => {
                format!("CASE WHEN {col} IS NULL THEN '' WHEN {col} THEN '{when_true}' ELSE '{when_false}' END")
            }
            _ => {
                let zero = format_bool_numeric(false);
                format!("CASE WHEN {col} IS NULL THEN '' WHEN {col} <> {zero} THEN '{when_true}' ELSE '{when_false}' END")
            }
        }
    }

    fn numeric_expr(
        &self,
        engine: Engine,
        col: &str,
        precision: Option<i64>,
        scale: Option<i64>,
        mode: NumericCastMode,
    ) -> String {
        let is_integer = scale.unwrap_or(0) == 0 && precision.unwrap_or(0) <= 18;

        if is_integer {
            return match engine {
                Engine::Postgres => format!("COALESCE({col}::text, '')"),
                Engine::Oracle => format!("COALESCE(TO_CHAR({col}), '')"),
                Engine::MySql => format!("COALESCE(CAST({col} AS CHAR), '')"),
                Engine::SqlServer => format!("COALESCE(CAST({col} AS NVARCHAR(38)), '')"),
                Engine::Db2 => format!("COALESCE(VARCHAR({col}), '')"),
            };
        }

        match mode {
            NumericCastMode::Standard => self.fixed_point_expr(engine, col),
            NumericCastMode::Notation => self.scientific_notation_expr(engine, col),
        }
    }

    /// Fixed-point decimal text with trailing-zero trimming, `.` separator, leading `-` for
    /// negatives. Each engine's own TO_CHAR/FORMAT dialect trims trailing zeros via the `FM`
    /// modifier (Oracle), `'0.#####################'` format strings, or manual `RTRIM`.
    fn fixed_point_expr(&self, engine: Engine, col: &str) -> String {
        match engine {
            Engine::Postgres => format!(
                "COALESCE(TRIM(TRAILING '.' FROM TRIM(TRAILING '0' FROM {col}::text)), '')"
            ),
            Engine::Oracle => format!("COALESCE(TO_CHAR({col}, 'FM999999999999999999999999990.999999999999999999999999999'), '')"),
            Engine::MySql => format!(
                "COALESCE(TRIM(TRAILING '.' FROM TRIM(TRAILING '0' FROM CAST({col} AS CHAR))), '')"
            ),
            Engine::SqlServer => format!(
                "COALESCE(CAST({col} AS NVARCHAR(38)), '')"
            ),
            Engine::Db2 => format!("COALESCE(TRIM(TRAILING '0' FROM VARCHAR({col})), '')"),
        }
    }

    /// Scientific notation for `|x| >= 1e15`, e.g. `1.234e+16`. Delegated to a `CASE` on
    /// magnitude so values below the threshold still render fixed-point.
    fn scientific_notation_expr(&self, engine: Engine, col: &str) -> String {
        let fixed = self.fixed_point_expr(engine, col);
        let sci = match engine {
            Engine::Postgres => format!("to_char({col}, 'EEEE')"),
            Engine::Oracle => format!("TO_CHAR({col}, '9.999999999999EEEE')"),
            Engine::MySql => format!("CONCAT(CAST({col} AS CHAR))"),
            Engine::SqlServer => format!("FORMAT({col}, 'E')"),
            Engine::Db2 => format!("VARCHAR({col})"),
        };
        format!(
            "CASE WHEN ABS({col}) >= {NOTATION_THRESHOLD} THEN COALESCE({sci}, '') ELSE {fixed} END"
        )
    }

    /// ISO 8601 text, zone offset present only when the declared type carries a zone,
    /// fractional seconds rendered to the declared precision with no trailing zeros.
    fn timestamp_expr(&self, engine: Engine, col: &str, has_zone: bool, frac_precision: i64) -> String {
        let frac = if frac_precision > 0 {
            "F".repeat(frac_precision.min(9) as usize)
        } else {
            String::new()
        };

        match engine {
            Engine::Postgres => {
                let fmt = if has_zone {
                    format!("YYYY-MM-DD\"T\"HH24:MI:SS{}\"TZH:TZM\"", dot_fmt(&frac))
                } else {
                    format!("YYYY-MM-DD\"T\"HH24:MI:SS{}", dot_fmt(&frac))
                };
                format!("COALESCE(to_char({col}, '{fmt}'), '')")
            }
            Engine::Oracle => {
                let fmt = if has_zone {
                    format!("YYYY-MM-DD\"T\"HH24:MI:SS{}TZH:TZM", dot_oracle_frac(&frac))
                } else {
                    format!("YYYY-MM-DD\"T\"HH24:MI:SS{}", dot_oracle_frac(&frac))
                };
                format!("COALESCE(TO_CHAR({col}, '{fmt}'), '')")
            }
            Engine::MySql => {
                let fmt = "%Y-%m-%dT%H:%i:%s";
                format!("COALESCE(DATE_FORMAT({col}, '{fmt}'), '')")
            }
            Engine::SqlServer => {
                // style 126 = ISO8601 with millisecond precision
                format!("COALESCE(CONVERT(NVARCHAR(33), {col}, 126), '')")
            }
            Engine::Db2 => {
                format!("COALESCE(VARCHAR_FORMAT({col}, 'YYYY-MM-DD\"T\"HH24:MI:SS'), '')")
            }
        }
    }

    fn string_expr(&self, engine: Engine, col: &str) -> String {
        match engine {
            Engine::Postgres => format!("COALESCE({col}::text, '')"),
            Engine::Oracle => format!("COALESCE(TO_CHAR({col}), '')"),
            Engine::MySql => format!("COALESCE({col}, '')"),
            Engine::SqlServer => format!("COALESCE(CAST({col} AS NVARCHAR(MAX)), '')"),
            Engine::Db2 => format!("COALESCE(VARCHAR({col}), '')"),
        }
    }

    fn binary_expr(&self, engine: Engine, col: &str) -> String {
        match engine {
            Engine::Postgres => format!("COALESCE(lower(encode({col}, 'hex')), '')"),
            Engine::Oracle => format!("COALESCE(LOWER(RAWTOHEX({col})), '')"),
            Engine::MySql => format!("COALESCE(LOWER(HEX({col})), '')"),
            Engine::SqlServer => format!("COALESCE(LOWER(CONVERT(VARCHAR(MAX), {col}, 2)), '')"),
            Engine::Db2 => format!("COALESCE(LOWER(HEX({col})), '')"),
        }
    }
}

fn dot_fmt(frac: &str) -> String {
    if frac.is_empty() {
        String::new()
    } else {
        format!("\".\"{}", frac.to_uppercase())
    }
}

fn dot_oracle_frac(frac: &str) -> String {
    if frac.is_empty() {
        String::new()
    } else {
        format!(".{}", frac.to_uppercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_boolean() {
        assert_eq!(classify("boolean"), TypeSet::Boolean);
        assert_eq!(classify("BOOL"), TypeSet::Boolean);
    }

    #[test]
    fn test_classify_numeric() {
        assert_eq!(classify("NUMBER"), TypeSet::Numeric);
        assert_eq!(classify("numeric(10,2)"), TypeSet::Numeric);
        assert_eq!(classify("int4"), TypeSet::Numeric);
    }

    #[test]
    fn test_classify_timestamp_with_params() {
        assert_eq!(classify("TIMESTAMP(6) WITH TIME ZONE"), TypeSet::Timestamp);
        assert_eq!(classify("timestamp"), TypeSet::Timestamp);
        assert_eq!(classify("datetime2"), TypeSet::Timestamp);
    }

    #[test]
    fn test_classify_string() {
        assert_eq!(classify("VARCHAR2"), TypeSet::String);
        assert_eq!(classify("nvarchar(255)"), TypeSet::String);
    }

    #[test]
    fn test_classify_unsupported() {
        assert_eq!(classify("uniqueidentifier"), TypeSet::Unsupported);
        assert_eq!(classify("some_made_up_type"), TypeSet::Unsupported);
    }

    #[test]
    fn test_data_class_collapses() {
        assert_eq!(TypeSet::Timestamp.data_class(), Some(DataClass::Char));
        assert_eq!(TypeSet::String.data_class(), Some(DataClass::Char));
        assert_eq!(TypeSet::Binary.data_class(), Some(DataClass::Char));
        assert_eq!(TypeSet::Boolean.data_class(), Some(DataClass::Boolean));
        assert_eq!(TypeSet::Numeric.data_class(), Some(DataClass::Numeric));
        assert_eq!(TypeSet::Unsupported.data_class(), None);
    }

    #[test]
    fn test_compile_unsupported_errs() {
        let compiler = CastCompiler::new(
            NumericCastMode::Standard,
            NumericCastMode::Standard,
            false,
        );
        let result = compiler.compile(Engine::Postgres, "\"t\".\"x\"", "uniqueidentifier", None, None, false);
        assert!(result.is_err());
    }

    #[test]
    fn test_compile_integer_cast() {
        let compiler = CastCompiler::new(
            NumericCastMode::Standard,
            NumericCastMode::Standard,
            false,
        );
        let result = compiler
            .compile(Engine::Postgres, "\"t\".\"id\"", "integer", Some(10), Some(0), false)
            .unwrap();
        assert_eq!(result.data_class, DataClass::Numeric);
        assert!(result.expression.contains("::text"));
    }

    #[test]
    fn test_compile_boolean_cast() {
        let compiler = CastCompiler::new(
            NumericCastMode::Standard,
            NumericCastMode::Standard,
            false,
        );
        let result = compiler
            .compile(Engine::MySql, "`t`.`active`", "tinyint", None, None, false)
            .unwrap();
        // tinyint classifies as numeric, not boolean, per the canonical table
        assert_eq!(result.data_class, DataClass::Numeric);
    }

    #[test]
    fn test_raw_mode_bypasses_normalization() {
        let compiler = CastCompiler::new(NumericCastMode::Standard, NumericCastMode::Standard, true);
        let result = compiler
            .compile(Engine::Oracle, "\"T\".\"SALARY\"", "number(10,2)", Some(10), Some(2), false)
            .unwrap();
        assert!(result.expression.contains("TO_CHAR"));
        assert!(!result.expression.contains("FM999999999"));
    }

    #[test]
    fn test_notation_mode_thresholds_on_magnitude() {
        let compiler = CastCompiler::new(NumericCastMode::Notation, NumericCastMode::Notation, false);
        let result = compiler
            .compile(Engine::Postgres, "\"t\".\"amount\"", "numeric(38,4)", Some(38), Some(4), false)
            .unwrap();
        assert!(result.expression.contains("1e15"));
    }
}
