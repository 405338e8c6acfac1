//! Persisted and in-flight data model (section 3): the reconciliation entities that live in
//! the repository, plus the in-memory fingerprint shape that flows between Extractor and
//! Loader.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

use crate::cast::DataClass;

/// Which side of a reconciliation a record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Source,
    Target,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Source => "source",
            Side::Target => "target",
        }
    }

    pub fn other(&self) -> Side {
        match self {
            Side::Source => Side::Target,
            Side::Target => Side::Source,
        }
    }
}

/// A registered table under reconciliation: identity, owning project, and run grouping.
/// Created by discovery or `copy-table`; read by the Reconciler; never mutated mid-run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableEntry {
    pub tid: i64,
    pub project: i64,
    pub alias: String,
    pub enabled: bool,
    pub batch_nbr: i64,
    pub parallel_degree: u32,
}

/// One side's physical location for a `TableEntry`. Both sides must exist before a tid is
/// reconcilable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableMap {
    pub tid: i64,
    pub origin: Side,
    pub schema_name: String,
    pub table_name: String,
    pub mod_column: Option<String>,
    pub table_filter: Option<String>,
    pub preserve_case_schema: bool,
    pub preserve_case_table: bool,
}

/// Per-side column metadata paired into one logical `ColumnMap` entry by alias.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnSide {
    pub column_name: String,
    pub data_type: String,
    pub data_length: Option<i64>,
    pub data_precision: Option<i64>,
    pub data_scale: Option<i64>,
    pub nullable: bool,
    pub primary_key: bool,
    pub preserve_case: bool,
    /// Compiled canonical-text SQL fragment for this column, on this side.
    pub value_expression: Option<String>,
}

/// One logical column, aligned across source and target by case-insensitive alias.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnMapEntry {
    pub column_alias: String,
    pub source: Option<ColumnSide>,
    pub target: Option<ColumnSide>,
    pub data_class: Option<DataClass>,
    /// False when either side's type classified as UNSUPPORTED, or only one side has the
    /// column at all; excluded from the hash expression.
    pub supported: bool,
}

impl ColumnMapEntry {
    pub fn is_primary_key(&self) -> bool {
        self.source.as_ref().map(|s| s.primary_key).unwrap_or(false)
            || self.target.as_ref().map(|t| t.primary_key).unwrap_or(false)
    }
}

/// A streamed or staged row's content-addressed identity: primary key hash, non-key column
/// hash, and the primary key's textual values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RowFingerprint {
    pub tid: i64,
    /// 32-character lowercase hex MD5 digest over the ordered, canonicalized pk values.
    pub pk_hash: String,
    /// 32-character lowercase hex MD5 digest over the ordered, canonicalized non-pk values.
    pub column_hash: String,
    /// Maps pk column aliases to their canonical textual values.
    pub pk: BTreeMap<String, String>,
}

impl RowFingerprint {
    pub fn pk_json(&self) -> JsonValue {
        serde_json::to_value(&self.pk).expect("BTreeMap<String, String> always serializes")
    }
}

/// A fingerprint persisted into a side-specific staging table, keyed by (tid, batch_nbr).
#[derive(Debug, Clone)]
pub struct StagingRow {
    pub tid: i64,
    pub batch_nbr: i64,
    pub pk_hash: String,
    pub column_hash: String,
    pub pk: JsonValue,
}

/// A per-row verdict written by the Reconciler (and re-examined by the Rechecker).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingStatus {
    Missing,
    NotEqual,
}

/// A row-level reconciliation result, one row per side for `not_equal`, one row on the side
/// that has the data for `missing`.
#[derive(Debug, Clone)]
pub struct Finding {
    pub tid: i64,
    pub batch_nbr: i64,
    pub side: Side,
    pub pk: JsonValue,
    pub status: FindingStatus,
}

/// Outcome of the Rechecker re-examining a prior finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecheckOutcome {
    Confirmed,
    Resolved,
    StillMissing,
}

/// Action recorded in `dc_table_history` — which pipeline stage produced this history row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryAction {
    Compare,
    Check,
}

/// Summary counts and timing for one table's reconciliation run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunHistory {
    pub tid: i64,
    pub batch_nbr: i64,
    pub equal: u64,
    pub not_equal: u64,
    pub missing_source: u64,
    pub missing_target: u64,
    pub elapsed_ms: u64,
}

impl RunHistory {
    pub fn rows_per_second(&self) -> f64 {
        let total = self.equal + self.not_equal + self.missing_source + self.missing_target;
        if self.elapsed_ms == 0 {
            0.0
        } else {
            total as f64 / (self.elapsed_ms as f64 / 1000.0)
        }
    }

    pub fn out_of_sync(&self) -> u64 {
        self.not_equal + self.missing_source + self.missing_target
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_side_other() {
        assert_eq!(Side::Source.other(), Side::Target);
        assert_eq!(Side::Target.other(), Side::Source);
    }

    #[test]
    fn test_run_history_rows_per_second() {
        let h = RunHistory {
            tid: 1,
            batch_nbr: 1,
            equal: 900,
            not_equal: 50,
            missing_source: 25,
            missing_target: 25,
            elapsed_ms: 1000,
        };
        assert_eq!(h.rows_per_second(), 1000.0);
        assert_eq!(h.out_of_sync(), 100);
    }

    #[test]
    fn test_column_map_entry_pk_detection() {
        let entry = ColumnMapEntry {
            column_alias: "id".to_string(),
            source: Some(ColumnSide {
                column_name: "id".to_string(),
                data_type: "integer".to_string(),
                data_length: None,
                data_precision: Some(10),
                data_scale: Some(0),
                nullable: false,
                primary_key: true,
                preserve_case: false,
                value_expression: None,
            }),
            target: None,
            data_class: None,
            supported: true,
        };
        assert!(entry.is_primary_key());
    }
}
