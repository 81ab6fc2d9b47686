use async_trait::async_trait;
use chrono::Utc;
use sqlx::types::Json;
use sqlx::Row;

use crate::{
    database::DatabasePool,
    error::ApiError,
    models::{RunSummary, SnapshotMeta, SubdomainEntry},
};

/// Persistence surface for scan runs and their result sets.
#[async_trait]
pub trait RunRepository: Send + Sync {
    /// Insert a new run row for `domain` and return its id.
    async fn start_run(&self, domain: &str) -> Result<i64, ApiError>;

    /// Finalize a run. A finalized run is immutable.
    async fn complete_run(&self, run_id: i64, total: i32, duration_ms: i32)
        -> Result<(), ApiError>;

    /// Persist the result set of a run. Rows are keyed by (run_id, name).
    async fn insert_results(
        &self,
        run_id: i64,
        entries: &[SubdomainEntry],
    ) -> Result<(), ApiError>;

    /// Latest completed run's results for a domain, ordered by hostname,
    /// plus its metadata. Empty when the domain has never completed a run.
    async fn load_snapshot(
        &self,
        domain: &str,
    ) -> Result<(Vec<SubdomainEntry>, Option<SnapshotMeta>), ApiError>;

    /// Bounded list of run summaries for a domain, newest first.
    async fn runs_for_domain(&self, domain: &str, limit: i64)
        -> Result<Vec<RunSummary>, ApiError>;

    /// Most recent completed runs across all domains.
    async fn recent_scans(&self, limit: i64) -> Result<Vec<RunSummary>, ApiError>;
}

pub struct SqlxRunRepository {
    pool: DatabasePool,
}

impl SqlxRunRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RunRepository for SqlxRunRepository {
    async fn start_run(&self, domain: &str) -> Result<i64, ApiError> {
        let row = sqlx::query(
            r#"
            INSERT INTO scan_runs (domain)
            VALUES ($1)
            RETURNING id
            "#,
        )
        .bind(domain)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get::<i64, _>("id"))
    }

    async fn complete_run(
        &self,
        run_id: i64,
        total: i32,
        duration_ms: i32,
    ) -> Result<(), ApiError> {
        sqlx::query(
            r#"
            UPDATE scan_runs
            SET completed_at = $2, total = $3, duration_ms = $4
            WHERE id = $1
            "#,
        )
        .bind(run_id)
        .bind(Utc::now())
        .bind(total)
        .bind(duration_ms)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn insert_results(
        &self,
        run_id: i64,
        entries: &[SubdomainEntry],
    ) -> Result<(), ApiError> {
        if entries.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for entry in entries {
            sqlx::query(
                r#"
                INSERT INTO run_results (run_id, name, ips, cname, http_status, tls, server)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ON CONFLICT (run_id, name) DO NOTHING
                "#,
            )
            .bind(run_id)
            .bind(&entry.name)
            .bind(Json(&entry.ips))
            .bind((!entry.cname.is_empty()).then_some(entry.cname.as_str()))
            .bind(entry.http_status)
            .bind(entry.tls)
            .bind((!entry.server.is_empty()).then_some(entry.server.as_str()))
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        Ok(())
    }

    async fn load_snapshot(
        &self,
        domain: &str,
    ) -> Result<(Vec<SubdomainEntry>, Option<SnapshotMeta>), ApiError> {
        let latest = sqlx::query(
            r#"
            SELECT id, completed_at, total, duration_ms
            FROM scan_runs
            WHERE domain = $1 AND completed_at IS NOT NULL
            ORDER BY completed_at DESC
            LIMIT 1
            "#,
        )
        .bind(domain)
        .fetch_optional(&self.pool)
        .await?;

        let Some(latest) = latest else {
            return Ok((Vec::new(), None));
        };

        let run_id: i64 = latest.get("id");
        let meta = SnapshotMeta {
            cached_at: latest.get("completed_at"),
            total: latest.get("total"),
            duration_ms: latest.get("duration_ms"),
        };

        let rows = sqlx::query(
            r#"
            SELECT name, ips, cname, http_status, tls, server
            FROM run_results
            WHERE run_id = $1
            ORDER BY name
            "#,
        )
        .bind(run_id)
        .fetch_all(&self.pool)
        .await?;

        let entries = rows
            .into_iter()
            .map(|row| SubdomainEntry {
                name: row.get("name"),
                ips: row.get::<Json<Vec<String>>, _>("ips").0,
                cname: row.get::<Option<String>, _>("cname").unwrap_or_default(),
                http_status: row.get("http_status"),
                tls: row.get("tls"),
                server: row.get::<Option<String>, _>("server").unwrap_or_default(),
            })
            .collect();

        Ok((entries, Some(meta)))
    }

    async fn runs_for_domain(
        &self,
        domain: &str,
        limit: i64,
    ) -> Result<Vec<RunSummary>, ApiError> {
        let rows = sqlx::query(
            r#"
            SELECT id, domain, started_at, completed_at, total, duration_ms
            FROM scan_runs
            WHERE domain = $1
            ORDER BY completed_at DESC NULLS LAST, started_at DESC
            LIMIT $2
            "#,
        )
        .bind(domain)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(summarize_row).collect())
    }

    async fn recent_scans(&self, limit: i64) -> Result<Vec<RunSummary>, ApiError> {
        let rows = sqlx::query(
            r#"
            SELECT id, domain, started_at, completed_at, total, duration_ms
            FROM scan_runs
            WHERE completed_at IS NOT NULL
            ORDER BY completed_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(summarize_row).collect())
    }
}

fn summarize_row(row: sqlx::postgres::PgRow) -> RunSummary {
    let completed: Option<chrono::DateTime<Utc>> = row.get("completed_at");
    let started: chrono::DateTime<Utc> = row.get("started_at");
    let timestamp = completed.unwrap_or(started);
    RunSummary {
        id: row.get("id"),
        domain: row.get("domain"),
        timestamp: Some(timestamp.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)),
        total: row.get("total"),
        duration_ms: row.get("duration_ms"),
    }
}
