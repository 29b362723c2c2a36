use axum::extract::{Query, State};
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use uuid::Uuid;

use crate::errors::Result;
use crate::models::{clamp_limit, page_offset, Pagination, ResultsPage};
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/results", get(list_results))
}

#[derive(Debug, Deserialize)]
pub struct ListResultsQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub task_id: Option<Uuid>,
    pub success: Option<bool>,
}

async fn list_results(
    State(state): State<AppState>,
    Query(query): Query<ListResultsQuery>,
) -> Result<Json<ResultsPage>> {
    let limit = clamp_limit(query.limit);
    let offset = page_offset(query.page, limit);
    let (results, total) =
        state.task_service.list_results(limit, offset, query.task_id, query.success).await?;
    Ok(Json(ResultsPage {
        results,
        pagination: Pagination { page: query.page.unwrap_or(1).max(1), limit, total },
    }))
}
