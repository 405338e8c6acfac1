//! Staging table access: inserts (C6 Loader), truncation, the compare set-difference (C7
//! Reconciler), and findings persistence.

use deadpool_postgres::Pool;
use tokio_postgres::GenericClient;

use crate::error::PgCompareError;
use crate::model::{Finding, FindingStatus, RowFingerprint, Side};

fn staging_table(side: Side) -> &'static str {
    match side {
        Side::Source => "dc_source",
        Side::Target => "dc_target",
    }
}

fn findings_table(side: Side) -> &'static str {
    match side {
        Side::Source => "dc_source_findings",
        Side::Target => "dc_target_findings",
    }
}

/// Session settings a Loader applies at connection startup, trading staging-row durability
/// for sustained ingest rate (section 4.6): the compare SQL tolerates a crash by re-running
/// staging from scratch.
pub async fn apply_loader_session_settings(client: &impl GenericClient) -> Result<(), PgCompareError> {
    client
        .batch_execute(
            "SET synchronous_commit = off; \
             SET work_mem = '256MB'; \
             SET autocommit = false;",
        )
        .await
        .map_err(|e| PgCompareError::Repo(e.to_string()))
}

/// Clear staging rows for a (tid, batch_nbr) before a fresh `compare` run (not done in
/// `check` mode, which reuses the prior staging data as-is).
pub async fn truncate_staging(
    pool: &Pool,
    tid: i64,
    batch_nbr: i64,
) -> Result<(), PgCompareError> {
    let client = pool.get().await.map_err(|e| PgCompareError::Repo(e.to_string()))?;
    for side in [Side::Source, Side::Target] {
        let sql = format!(
            "DELETE FROM {} WHERE tid = $1 AND batch_nbr = $2",
            staging_table(side)
        );
        client
            .execute(&sql, &[&tid, &batch_nbr])
            .await
            .map_err(|e| PgCompareError::Repo(e.to_string()))?;
    }
    Ok(())
}

/// Batch-insert a side's fingerprints into its staging table.
pub async fn insert_batch(
    client: &impl GenericClient,
    side: Side,
    tid: i64,
    batch_nbr: i64,
    rows: &[RowFingerprint],
) -> Result<(), PgCompareError> {
    if rows.is_empty() {
        return Ok(());
    }

    let sql = format!(
        "INSERT INTO {} (tid, batch_nbr, pk_hash, column_hash, pk) VALUES ($1, $2, $3, $4, $5::jsonb)",
        staging_table(side)
    );
    let stmt = client
        .prepare(&sql)
        .await
        .map_err(|e| PgCompareError::Repo(e.to_string()))?;

    for row in rows {
        client
            .execute(&stmt, &[&tid, &batch_nbr, &row.pk_hash, &row.column_hash, &row.pk_json()])
            .await
            .map_err(|e| PgCompareError::Repo(e.to_string()))?;
    }

    Ok(())
}

/// Counts resulting from the compare set-difference (section 4.7 step 5).
#[derive(Debug, Clone, Copy, Default)]
pub struct CompareCounts {
    pub equal: u64,
    pub not_equal: u64,
    pub missing_source: u64,
    pub missing_target: u64,
}

/// Run the compare SQL for one (tid, batch_nbr): classify every staged pk_hash into
/// equal/not_equal/missing_source/missing_target and write findings for every non-equal row.
pub async fn compare(
    pool: &Pool,
    tid: i64,
    batch_nbr: i64,
) -> Result<(CompareCounts, Vec<Finding>), PgCompareError> {
    let client = pool.get().await.map_err(|e| PgCompareError::Repo(e.to_string()))?;

    let equal_sql = "SELECT count(*) FROM dc_source s JOIN dc_target t \
        ON s.tid = t.tid AND s.batch_nbr = t.batch_nbr AND s.pk_hash = t.pk_hash \
        WHERE s.tid = $1 AND s.batch_nbr = $2 AND s.column_hash = t.column_hash";
    let not_equal_sql = "SELECT s.pk FROM dc_source s JOIN dc_target t \
        ON s.tid = t.tid AND s.batch_nbr = t.batch_nbr AND s.pk_hash = t.pk_hash \
        WHERE s.tid = $1 AND s.batch_nbr = $2 AND s.column_hash <> t.column_hash";
    let missing_target_sql = "SELECT s.pk FROM dc_source s \
        WHERE s.tid = $1 AND s.batch_nbr = $2 AND NOT EXISTS ( \
            SELECT 1 FROM dc_target t WHERE t.tid = s.tid AND t.batch_nbr = s.batch_nbr AND t.pk_hash = s.pk_hash \
        )";
    let missing_source_sql = "SELECT t.pk FROM dc_target t \
        WHERE t.tid = $1 AND t.batch_nbr = $2 AND NOT EXISTS ( \
            SELECT 1 FROM dc_source s WHERE s.tid = t.tid AND s.batch_nbr = t.batch_nbr AND s.pk_hash = t.pk_hash \
        )";

    let equal_row = client
        .query_one(equal_sql, &[&tid, &batch_nbr])
        .await
        .map_err(|e| PgCompareError::Repo(e.to_string()))?;
    let equal: i64 = equal_row.get(0);

    let mut findings = Vec::new();

    let not_equal_rows = client
        .query(not_equal_sql, &[&tid, &batch_nbr])
        .await
        .map_err(|e| PgCompareError::Repo(e.to_string()))?;
    for row in &not_equal_rows {
        let pk: serde_json::Value = row.get(0);
        findings.push(Finding {
            tid,
            batch_nbr,
            side: Side::Source,
            pk: pk.clone(),
            status: FindingStatus::NotEqual,
        });
        findings.push(Finding {
            tid,
            batch_nbr,
            side: Side::Target,
            pk,
            status: FindingStatus::NotEqual,
        });
    }

    let missing_target_rows = client
        .query(missing_target_sql, &[&tid, &batch_nbr])
        .await
        .map_err(|e| PgCompareError::Repo(e.to_string()))?;
    for row in &missing_target_rows {
        findings.push(Finding {
            tid,
            batch_nbr,
            side: Side::Source,
            pk: row.get(0),
            status: FindingStatus::Missing,
        });
    }

    let missing_source_rows = client
        .query(missing_source_sql, &[&tid, &batch_nbr])
        .await
        .map_err(|e| PgCompareError::Repo(e.to_string()))?;
    for row in &missing_source_rows {
        findings.push(Finding {
            tid,
            batch_nbr,
            side: Side::Target,
            pk: row.get(0),
            status: FindingStatus::Missing,
        });
    }

    write_findings(&*client, &findings).await?;

    let counts = CompareCounts {
        equal: equal.max(0) as u64,
        not_equal: not_equal_rows.len() as u64,
        missing_target: missing_target_rows.len() as u64,
        missing_source: missing_source_rows.len() as u64,
    };

    Ok((counts, findings))
}

async fn write_findings(client: &impl GenericClient, findings: &[Finding]) -> Result<(), PgCompareError> {
    for finding in findings {
        let sql = format!(
            "INSERT INTO {} (tid, batch_nbr, pk, status) VALUES ($1, $2, $3::jsonb, $4)",
            findings_table(finding.side)
        );
        let status = match finding.status {
            FindingStatus::Missing => "missing",
            FindingStatus::NotEqual => "not_equal",
        };
        client
            .execute(&sql, &[&finding.tid, &finding.batch_nbr, &finding.pk, &status])
            .await
            .map_err(|e| PgCompareError::Repo(e.to_string()))?;
    }
    Ok(())
}

/// Load the findings from the previous run, for the Rechecker to re-examine.
pub async fn load_findings(
    pool: &Pool,
    tid: i64,
    batch_nbr: i64,
) -> Result<Vec<Finding>, PgCompareError> {
    let client = pool.get().await.map_err(|e| PgCompareError::Repo(e.to_string()))?;
    let mut findings = Vec::new();

    for side in [Side::Source, Side::Target] {
        let sql = format!(
            "SELECT pk, status FROM {} WHERE tid = $1 AND batch_nbr = $2",
            findings_table(side)
        );
        let rows = client
            .query(&sql, &[&tid, &batch_nbr])
            .await
            .map_err(|e| PgCompareError::Repo(e.to_string()))?;
        for row in &rows {
            let pk: serde_json::Value = row.get(0);
            let status_text: String = row.get(1);
            let status = match status_text.as_str() {
                "missing" => FindingStatus::Missing,
                _ => FindingStatus::NotEqual,
            };
            findings.push(Finding {
                tid,
                batch_nbr,
                side,
                pk,
                status,
            });
        }
    }

    Ok(findings)
}

/// Clear one finding the Rechecker confirmed is Resolved, keyed by its exact pk JSON.
pub async fn delete_finding(
    pool: &Pool,
    tid: i64,
    batch_nbr: i64,
    side: Side,
    pk: &serde_json::Value,
) -> Result<(), PgCompareError> {
    let client = pool.get().await.map_err(|e| PgCompareError::Repo(e.to_string()))?;
    let sql = format!(
        "DELETE FROM {} WHERE tid = $1 AND batch_nbr = $2 AND pk = $3::jsonb",
        findings_table(side)
    );
    client
        .execute(&sql, &[&tid, &batch_nbr, pk])
        .await
        .map_err(|e| PgCompareError::Repo(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_staging_table_names() {
        assert_eq!(staging_table(Side::Source), "dc_source");
        assert_eq!(staging_table(Side::Target), "dc_target");
    }

    #[test]
    fn test_findings_table_names() {
        assert_eq!(findings_table(Side::Source), "dc_source_findings");
        assert_eq!(findings_table(Side::Target), "dc_target_findings");
    }
}
