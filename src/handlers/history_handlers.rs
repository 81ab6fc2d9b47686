use axum::{
    extract::{Query, State},
    response::Json,
};
use chrono::SecondsFormat;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{error::ApiError, utils::sanitize_domain, AppState};

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub domain: String,
}

/// Latest cached snapshot for a domain plus a bounded run history.
pub async fn history(
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<Value>, ApiError> {
    let domain = sanitize_domain(&params.domain)
        .ok_or_else(|| ApiError::validation("Invalid domain"))?;

    let (entries, meta) = state.run_repository.load_snapshot(&domain).await?;
    let runs = state
        .run_repository
        .runs_for_domain(&domain, state.config.per_domain_history_limit)
        .await?;

    let (cached, total) = match meta {
        Some(ref meta) => (
            Some(meta.cached_at.to_rfc3339_opts(SecondsFormat::Secs, true)),
            meta.total as usize,
        ),
        None => (None, entries.len()),
    };

    Ok(Json(json!({
        "domain": domain,
        "cached": cached,
        "total": total,
        "results": entries,
        "runs": runs,
    })))
}

#[derive(Debug, Deserialize)]
pub struct RecentParams {
    pub limit: Option<i64>,
}

/// Most recent completed runs across all domains. The requested limit is
/// clamped by the configured maximum.
pub async fn recent(
    State(state): State<AppState>,
    Query(params): Query<RecentParams>,
) -> Result<Json<Value>, ApiError> {
    let requested = params.limit.unwrap_or(10).clamp(1, 100);
    let effective = requested.min(state.config.recent_scans_limit);
    let recent = state.run_repository.recent_scans(effective).await?;
    Ok(Json(json!({ "recent": recent })))
}
