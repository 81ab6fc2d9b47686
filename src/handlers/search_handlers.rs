use axum::{
    extract::{Query, State},
    response::sse::{Event, KeepAlive, Sse},
    response::IntoResponse,
};
use futures::stream::StreamExt;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

use crate::{error::ApiError, models::SearchEvent, utils::sanitize_domain, AppState};

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub domain: String,
    #[serde(default)]
    pub refresh: bool,
}

/// Long-lived SSE stream of scan progress. Validation failures are
/// rejected with a plain 400 before the stream opens; anything that goes
/// wrong later arrives as an `error` stage message.
pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<impl IntoResponse, ApiError> {
    let domain = sanitize_domain(&params.domain)
        .ok_or_else(|| ApiError::validation("Invalid domain"))?;

    let (tx, rx) = mpsc::channel::<SearchEvent>(64);
    let pipeline = state.pipeline.clone();
    let task_domain = domain.clone();
    let refresh = params.refresh;

    tokio::spawn(async move {
        if let Err(err) = pipeline.search(&task_domain, refresh, tx.clone()).await {
            let error_id = Uuid::new_v4();
            tracing::error!(
                error_id = %error_id,
                domain = %task_domain,
                error = %err,
                "search pipeline failed"
            );
            let _ = tx
                .send(SearchEvent::error(&task_domain, err.to_string()))
                .await;
        }
    });

    let stream = ReceiverStream::new(rx).map(|event| Event::default().json_data(&event));

    let headers = [
        ("Cache-Control", "no-cache"),
        ("X-Accel-Buffering", "no"),
    ];
    Ok((headers, Sse::new(stream).keep_alive(KeepAlive::default())))
}
