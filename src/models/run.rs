use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

/// A persisted scan run. `completed_at`, `total` and `duration_ms` are
/// filled in at finalization and never change afterwards.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ScanRun {
    pub id: i64,
    pub domain: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub total: i32,
    pub duration_ms: Option<i32>,
}

/// Compact run description used by the history and recent endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub id: i64,
    pub domain: String,
    pub timestamp: Option<String>,
    pub total: i32,
    pub duration_ms: Option<i32>,
}

/// Metadata of the most recent completed run for a domain.
#[derive(Debug, Clone)]
pub struct SnapshotMeta {
    pub cached_at: DateTime<Utc>,
    pub total: i32,
    pub duration_ms: Option<i32>,
}
