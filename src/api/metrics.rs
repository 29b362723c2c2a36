use axum::extract::State;
use axum::response::Json;
use axum::routing::get;
use axum::Router;

use crate::models::MetricsSnapshot;
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/metrics", get(metrics))
}

async fn metrics(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot().await)
}
