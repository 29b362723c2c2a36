//! Task CRUD and cancellation. DTO and error-mapping style grounded on
//! `api/schedules/handlers.rs`'s `(StatusCode, Json<ErrorResponse>)` pattern,
//! generalized here to a blanket `IntoResponse` on [`crate::errors::Error`]
//! so every handler just returns `Result<_, Error>`.

use axum::extract::{Path, Query, State};
use axum::response::Json;
use axum::routing::{get, patch, post};
use axum::Router;
use serde::Deserialize;
use uuid::Uuid;

use crate::errors::Result;
use crate::models::{clamp_limit, page_offset, Action, PageParams, Pagination, Task, TaskStatus, TasksPage, Trigger};
use crate::service::TaskUpdate;
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/tasks", post(create_task).get(list_tasks))
        .route("/tasks/:id", get(get_task).patch(update_task))
        .route("/tasks/:id/cancel", post(cancel_task))
        .route("/tasks/:id/results", get(task_results))
}

#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    pub name: String,
    pub trigger: Trigger,
    pub action: Action,
}

async fn create_task(
    State(state): State<AppState>,
    Json(request): Json<CreateTaskRequest>,
) -> Result<Json<Task>> {
    let task = state
        .task_service
        .create_task(request.name, request.trigger, request.action)
        .await?;
    Ok(Json(task))
}

#[derive(Debug, Deserialize)]
pub struct ListTasksQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub status: Option<TaskStatus>,
}

async fn list_tasks(
    State(state): State<AppState>,
    Query(query): Query<ListTasksQuery>,
) -> Result<Json<TasksPage>> {
    let limit = clamp_limit(query.limit);
    let offset = page_offset(query.page, limit);
    let (tasks, total) = state.task_service.list_tasks(limit, offset, query.status).await?;
    Ok(Json(TasksPage {
        tasks,
        pagination: Pagination { page: query.page.unwrap_or(1).max(1), limit, total },
    }))
}

async fn get_task(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Task>> {
    let task = state.task_service.get_task(id).await?;
    Ok(Json(task))
}

#[derive(Debug, Deserialize)]
pub struct UpdateTaskRequest {
    pub name: Option<String>,
    pub trigger: Option<Trigger>,
    pub action: Option<Action>,
}

async fn update_task(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateTaskRequest>,
) -> Result<Json<Task>> {
    let task = state
        .task_service
        .update_task(
            id,
            TaskUpdate { name: request.name, trigger: request.trigger, action: request.action },
        )
        .await?;
    Ok(Json(task))
}

async fn cancel_task(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>> {
    state.task_service.cancel_task(id).await?;
    Ok(Json(serde_json::json!({ "cancelled": true })))
}

async fn task_results(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<PageParams>,
) -> Result<Json<crate::models::ResultsPage>> {
    let limit = clamp_limit(query.limit);
    let offset = page_offset(query.page, limit);
    let (results, total) = state.task_service.results_by_task(id, limit, offset).await?;
    Ok(Json(crate::models::ResultsPage {
        results,
        pagination: Pagination { page: query.page.unwrap_or(1).max(1), limit, total },
    }))
}
