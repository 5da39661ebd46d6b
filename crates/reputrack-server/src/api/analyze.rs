//! On-demand analysis triggers. The work runs in the background; callers get
//! `202 Accepted` as soon as the links are known to exist.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use reputrack_core::TrackedLink;
use serde::Serialize;

use crate::middleware::RequestId;

use super::{map_store_error, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Serialize)]
pub(super) struct AnalysisAccepted {
    scope: &'static str,
    id: i64,
    links: usize,
}

type Accepted = (StatusCode, Json<ApiResponse<AnalysisAccepted>>);

pub(super) async fn analyze_link(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(link_id): Path<i64>,
) -> Result<Accepted, ApiError> {
    let link = state
        .store
        .get_link(link_id)
        .await
        .map_err(|e| map_store_error(req_id.0.clone(), &e))?
        .ok_or_else(|| {
            ApiError::new(
                req_id.0.clone(),
                "not_found",
                format!("tracked link {link_id} not found"),
            )
        })?;

    spawn_batch(&state, "link", link_id, vec![link]);
    Ok(accepted(req_id, "link", link_id, 1))
}

pub(super) async fn analyze_product(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(product_id): Path<i64>,
) -> Result<Accepted, ApiError> {
    let links = state
        .store
        .links_for_product(product_id)
        .await
        .map_err(|e| map_store_error(req_id.0.clone(), &e))?;

    if links.is_empty() {
        return Err(ApiError::new(
            req_id.0,
            "not_found",
            format!("product {product_id} has no tracked links"),
        ));
    }

    let count = links.len();
    spawn_batch(&state, "product", product_id, links);
    Ok(accepted(req_id, "product", product_id, count))
}

fn accepted(req_id: RequestId, scope: &'static str, id: i64, links: usize) -> Accepted {
    (
        StatusCode::ACCEPTED,
        Json(ApiResponse {
            data: AnalysisAccepted { scope, id, links },
            meta: ResponseMeta::new(req_id.0),
        }),
    )
}

fn spawn_batch(state: &AppState, scope: &'static str, id: i64, links: Vec<TrackedLink>) {
    let orchestrator = Arc::clone(&state.orchestrator);
    state.tasks.spawn(async move {
        tracing::info!(scope, id, links = links.len(), "on-demand analysis started");
        let summary = orchestrator.run_batch(links).await;
        tracing::info!(
            scope,
            id,
            analyzed = summary.analyzed(),
            no_reviews = summary.no_reviews(),
            failed = summary.failed(),
            rating_drops = summary.rating_drops(),
            "on-demand analysis finished"
        );
    });
}
