use axum::{
    extract::{Query, State},
    response::Json,
};
use serde::Deserialize;

use crate::{
    error::ApiError,
    models::{ProbeResponse, ResolvedHost, SubdomainEntry},
    services::external::Prober,
    utils::{now_iso, sanitize_domain},
    AppState,
};

#[derive(Debug, Deserialize)]
pub struct StatusParams {
    pub domain: String,
}

/// Synchronous single-host probe: per-name resolution plus one HTTP/TLS
/// probe. Does not touch the cache store.
pub async fn status(
    State(state): State<AppState>,
    Query(params): Query<StatusParams>,
) -> Result<Json<ProbeResponse>, ApiError> {
    let name = sanitize_domain(&params.domain)
        .ok_or_else(|| ApiError::validation("Invalid domain"))?;

    let host = state
        .dns_resolver
        .resolve_host(&name)
        .await
        .unwrap_or(ResolvedHost {
            name: name.clone(),
            ips: Vec::new(),
            cname: None,
        });

    let entry: SubdomainEntry = state.prober.probe(&host).await;

    Ok(Json(ProbeResponse {
        entry,
        last_probe: now_iso(),
    }))
}
