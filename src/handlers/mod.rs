pub mod history_handlers;
pub mod search_handlers;
pub mod status_handlers;

use axum::{extract::State, response::Json};
use serde_json::{json, Value};

use crate::{database, error::ApiError, utils::now_iso, AppState};

/// Liveness probe plus database reachability.
pub async fn health_check(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    database::health_check(&state.db_pool).await?;
    Ok(Json(json!({
        "status": "ok",
        "timestamp": now_iso(),
    })))
}

/// Service description for the root path.
pub async fn service_info(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "status": "ok",
        "features": {
            "massdns_available": state.config.massdns_path().is_some(),
            "history_enabled": true,
        },
        "rate_limit": {
            "enabled": state.config.rate_limit_enabled,
            "requests": state.config.rate_limit_requests,
            "window_seconds": state.config.rate_limit_window_seconds,
        },
    }))
}
