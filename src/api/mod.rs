pub mod health;
pub mod middleware;
pub mod metrics;
pub mod results;
pub mod tasks;

use axum::middleware;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::AppState;

pub fn create_router(state: AppState) -> Router {
    let api_v1 = Router::new()
        .merge(tasks::routes())
        .merge(results::routes())
        .merge(metrics::routes())
        .layer(middleware::from_fn(self::middleware::api_request_logging));

    Router::new()
        .merge(health::routes())
        .nest("/api/v1", api_v1)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
