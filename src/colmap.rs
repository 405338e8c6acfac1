//! Column-map compiler (C3).
//!
//! Aligns a source and target column list by case-insensitive alias into an ordered
//! `ColumnMap`, then compiles the per-side `pkExpression` and `columnExpression` SQL
//! fragments the Extractor uses to fingerprint rows. The same compiler backs both discovery
//! (A6) and the Reconciler, so the two never disagree about a column's canonical cast.

use std::collections::HashMap;

use crate::cast::{CastCompiler, CastError};
use crate::config::Engine;
use crate::dialect::ColumnInfo;
use crate::model::{ColumnMapEntry, ColumnSide, Side};

#[derive(Debug, thiserror::Error)]
pub enum ColMapError {
    #[error("no primary key columns found on either side for this table")]
    NoPrimaryKey,
    #[error("primary key column count differs between sides: source={source} target={target}")]
    PrimaryKeyArityMismatch { source: usize, target: usize },
    #[error("cast compilation failed for column {alias:?}: {source}")]
    Cast {
        alias: String,
        #[source]
        source: CastError,
    },
}

/// An aligned, ordered column map plus the compiled per-side SQL fragments the Extractor
/// embeds into its SELECT.
#[derive(Debug, Clone)]
pub struct ColumnMap {
    /// Ordered lexicographically by `column_alias` — never source-catalog order — so hash
    /// inputs stay alignment-stable across runs and across discovery/reconciliation.
    pub entries: Vec<ColumnMapEntry>,
}

impl ColumnMap {
    pub fn pk_entries(&self) -> impl Iterator<Item = &ColumnMapEntry> {
        self.entries.iter().filter(|e| e.is_primary_key())
    }

    pub fn hashable_entries(&self) -> impl Iterator<Item = &ColumnMapEntry> {
        self.entries
            .iter()
            .filter(|e| e.supported && !e.is_primary_key())
    }

    /// Ordered pk value expressions for one side — the leading columns of the Extractor's
    /// SELECT list. Concatenation and MD5 digest happen client-side in Rust (see
    /// `crate::extract`), not in SQL: this keeps the hash algorithm byte-identical across all
    /// five engines instead of depending on engine-specific hash functions.
    pub fn pk_select_list<'a>(&'a self, side: Side) -> Vec<&'a str> {
        self.pk_entries()
            .filter_map(|e| {
                let column = match side {
                    Side::Source => e.source.as_ref(),
                    Side::Target => e.target.as_ref(),
                };
                column.and_then(|c| c.value_expression.as_deref())
            })
            .collect()
    }

    /// Ordered non-pk, supported value expressions for one side — the trailing columns of
    /// the Extractor's SELECT list.
    pub fn column_select_list<'a>(&'a self, side: Side) -> Vec<&'a str> {
        self.hashable_entries()
            .filter_map(|e| {
                let column = match side {
                    Side::Source => e.source.as_ref(),
                    Side::Target => e.target.as_ref(),
                };
                column.and_then(|c| c.value_expression.as_deref())
            })
            .collect()
    }

    /// The pk column aliases in the same order `pk_select_list` emits their expressions, so
    /// the Extractor can zip row values back into a `{alias: value}` map.
    pub fn pk_aliases(&self) -> Vec<&str> {
        self.pk_entries().map(|e| e.column_alias.as_str()).collect()
    }

    /// Full SELECT list for one side: pk expressions first, then hashable column expressions,
    /// matching the order `extract::fingerprint_row` expects.
    pub fn select_list(&self, side: Side) -> Vec<&str> {
        let mut list = self.pk_select_list(side);
        list.extend(self.column_select_list(side));
        list
    }
}

/// Compile an aligned `ColumnMap` from a source/target catalog projection.
///
/// Columns are paired by case-insensitive alias (defaulting to the column name, overridden
/// by `alias_overrides` keyed on the source column name). A column present on only one side
/// becomes an entry with that side populated and `supported=false`. Both sides' primary-key
/// sets must be non-empty and equal in cardinality.
pub fn compile_column_map(
    source_columns: &[ColumnInfo],
    target_columns: &[ColumnInfo],
    source_engine: Engine,
    target_engine: Engine,
    cast: &CastCompiler,
    alias_overrides: &HashMap<String, String>,
) -> Result<ColumnMap, ColMapError> {
    let mut by_alias: HashMap<String, (Option<&ColumnInfo>, Option<&ColumnInfo>)> = HashMap::new();

    for col in source_columns {
        let alias = alias_for(&col.column_name, alias_overrides);
        by_alias.entry(alias).or_default().0 = Some(col);
    }
    for col in target_columns {
        let alias = alias_for(&col.column_name, alias_overrides);
        by_alias.entry(alias).or_default().1 = Some(col);
    }

    let mut aliases: Vec<String> = by_alias.keys().cloned().collect();
    aliases.sort();

    let mut entries = Vec::with_capacity(aliases.len());
    for alias in aliases {
        let (source, target) = by_alias.remove(&alias).expect("key came from this map");

        let source_side = source
            .map(|c| compile_side(c, source_engine, cast))
            .transpose()
            .map_err(|e| ColMapError::Cast {
                alias: alias.clone(),
                source: e,
            })?;
        let target_side = target
            .map(|c| compile_side(c, target_engine, cast))
            .transpose()
            .map_err(|e| ColMapError::Cast {
                alias: alias.clone(),
                source: e,
            })?;

        let both_present = source.is_some() && target.is_some();
        let both_supported = source_side
            .as_ref()
            .map(|s| s.value_expression.is_some())
            .unwrap_or(true)
            && target_side
                .as_ref()
                .map(|t| t.value_expression.is_some())
                .unwrap_or(true);

        let data_class = source_side
            .as_ref()
            .and_then(|s| if s.value_expression.is_some() { source.map(|c| crate::cast::classify(&c.data_type)) } else { None })
            .or_else(|| target_side.as_ref().and_then(|t| if t.value_expression.is_some() { target.map(|c| crate::cast::classify(&c.data_type)) } else { None }))
            .and_then(|ts| ts.data_class());

        entries.push(ColumnMapEntry {
            column_alias: alias,
            source: source_side,
            target: target_side,
            data_class,
            supported: both_present && both_supported,
        });
    }

    let source_pk_count = entries
        .iter()
        .filter(|e| e.source.as_ref().map(|s| s.primary_key).unwrap_or(false))
        .count();
    let target_pk_count = entries
        .iter()
        .filter(|e| e.target.as_ref().map(|t| t.primary_key).unwrap_or(false))
        .count();

    if source_pk_count == 0 || target_pk_count == 0 {
        return Err(ColMapError::NoPrimaryKey);
    }
    if source_pk_count != target_pk_count {
        return Err(ColMapError::PrimaryKeyArityMismatch {
            source: source_pk_count,
            target: target_pk_count,
        });
    }

    Ok(ColumnMap { entries })
}

fn alias_for(column_name: &str, overrides: &HashMap<String, String>) -> String {
    overrides
        .get(&column_name.to_lowercase())
        .cloned()
        .unwrap_or_else(|| column_name.to_lowercase())
}

fn compile_side(
    col: &ColumnInfo,
    engine: Engine,
    cast: &CastCompiler,
) -> Result<ColumnSide, CastError> {
    let preserve_case = false;
    let quoted = engine
        .dialect()
        .quote(&col.column_name, preserve_case);
    let is_float = col.data_type.to_lowercase().contains("float")
        || col.data_type.to_lowercase().contains("double")
        || col.data_type.to_lowercase() == "real";

    match cast.compile(
        engine,
        &quoted,
        &col.data_type,
        col.data_precision,
        col.data_scale,
        is_float,
    ) {
        Ok(result) => Ok(ColumnSide {
            column_name: col.column_name.clone(),
            data_type: col.data_type.clone(),
            data_length: col.data_length,
            data_precision: col.data_precision,
            data_scale: col.data_scale,
            nullable: col.nullable,
            primary_key: col.primary_key,
            preserve_case,
            value_expression: Some(result.expression),
        }),
        Err(_unsupported) => Ok(ColumnSide {
            column_name: col.column_name.clone(),
            data_type: col.data_type.clone(),
            data_length: col.data_length,
            data_precision: col.data_precision,
            data_scale: col.data_scale,
            nullable: col.nullable,
            primary_key: col.primary_key,
            preserve_case,
            value_expression: None,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NumericCastMode;

    fn col(name: &str, data_type: &str, pk: bool) -> ColumnInfo {
        ColumnInfo {
            owner: "public".to_string(),
            table_name: "emp".to_string(),
            column_name: name.to_string(),
            data_type: data_type.to_string(),
            data_length: None,
            data_precision: Some(10),
            data_scale: Some(0),
            nullable: !pk,
            primary_key: pk,
        }
    }

    #[test]
    fn test_alignment_orders_lexicographically() {
        let source = vec![col("id", "integer", true), col("name", "varchar", false)];
        let target = vec![col("id", "integer", true), col("name", "varchar", false)];
        let cast = CastCompiler::new(NumericCastMode::Standard, NumericCastMode::Standard, false);
        let map = compile_column_map(
            &source,
            &target,
            Engine::Postgres,
            Engine::Postgres,
            &cast,
            &HashMap::new(),
        )
        .unwrap();
        let aliases: Vec<&str> = map.entries.iter().map(|e| e.column_alias.as_str()).collect();
        assert_eq!(aliases, vec!["id", "name"]);
    }

    #[test]
    fn test_unmatched_column_excluded() {
        let source = vec![col("id", "integer", true), col("extra_source_only", "varchar", false)];
        let target = vec![col("id", "integer", true)];
        let cast = CastCompiler::new(NumericCastMode::Standard, NumericCastMode::Standard, false);
        let map = compile_column_map(
            &source,
            &target,
            Engine::Postgres,
            Engine::MySql,
            &cast,
            &HashMap::new(),
        )
        .unwrap();
        let extra = map
            .entries
            .iter()
            .find(|e| e.column_alias == "extra_source_only")
            .unwrap();
        assert!(!extra.supported);
        assert!(extra.target.is_none());
    }

    #[test]
    fn test_missing_primary_key_errs() {
        let source = vec![col("name", "varchar", false)];
        let target = vec![col("name", "varchar", false)];
        let cast = CastCompiler::new(NumericCastMode::Standard, NumericCastMode::Standard, false);
        let result = compile_column_map(
            &source,
            &target,
            Engine::Postgres,
            Engine::Postgres,
            &cast,
            &HashMap::new(),
        );
        assert!(matches!(result, Err(ColMapError::NoPrimaryKey)));
    }

    #[test]
    fn test_pk_select_list_has_one_expression_per_pk_column() {
        let source = vec![col("id", "integer", true)];
        let target = vec![col("id", "integer", true)];
        let cast = CastCompiler::new(NumericCastMode::Standard, NumericCastMode::Standard, false);
        let map = compile_column_map(
            &source,
            &target,
            Engine::Postgres,
            Engine::Postgres,
            &cast,
            &HashMap::new(),
        )
        .unwrap();
        let list = map.pk_select_list(Side::Source);
        assert_eq!(list.len(), 1);
        assert_eq!(map.pk_aliases(), vec!["id"]);
    }
}
