//! Durable CRUD over tasks and results, plus the queries the scheduler needs
//! for recovery. Wraps the SeaORM entities in `database::{tasks,task_results}`
//! and converts to/from the domain types in `models`.
//!
//! Grounded on `schedule/service.rs`'s `ScheduleService` (entity lookups via
//! `Entity::find().filter(...)`, `ActiveModel` round-tripping through
//! `Set(...)`) and `database/job_queue.rs`'s append-only child-row insert.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};
use uuid::Uuid;

use crate::database::{task_results, tasks};
use crate::errors::Error;
use crate::models::{Action, HttpMethod, Task, TaskResult, TaskStatus, Trigger};

#[derive(Clone)]
pub struct Store {
    db: Arc<DatabaseConnection>,
}

impl Store {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn create_task(&self, task: &Task) -> Result<(), Error> {
        let existing = tasks::Entity::find_by_id(task.id).one(self.db.as_ref()).await?;
        if existing.is_some() {
            return Err(Error::Conflict(format!("task {} already exists", task.id)));
        }

        let model = to_active_model(task);
        model.insert(self.db.as_ref()).await?;
        Ok(())
    }

    pub async fn get_task(&self, id: Uuid) -> Result<Task, Error> {
        let model = tasks::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| Error::NotFound(format!("task {id}")))?;
        from_model(model)
    }

    pub async fn update_task(&self, task: &Task) -> Result<(), Error> {
        tasks::Entity::find_by_id(task.id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| Error::NotFound(format!("task {}", task.id)))?;

        let model = to_active_model(task);
        model.update(self.db.as_ref()).await?;
        Ok(())
    }

    pub async fn mark_cancelled(&self, id: Uuid) -> Result<(), Error> {
        let model = tasks::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| Error::NotFound(format!("task {id}")))?;

        if model.status == TaskStatus::Cancelled.as_str() {
            return Ok(());
        }
        if model.status == TaskStatus::Completed.as_str() {
            return Err(Error::Conflict(format!("task {id} is already completed")));
        }

        let mut active: tasks::ActiveModel = model.into();
        active.status = Set(TaskStatus::Cancelled.as_str().to_string());
        active.update(self.db.as_ref()).await?;
        Ok(())
    }

    pub async fn list_tasks(
        &self,
        limit: u64,
        offset: u64,
        status: Option<TaskStatus>,
    ) -> Result<(Vec<Task>, u64), Error> {
        let mut query = tasks::Entity::find();
        if let Some(status) = status {
            query = query.filter(tasks::Column::Status.eq(status.as_str()));
        }
        query = query.order_by_desc(tasks::Column::CreatedAt);

        let paginator = query.paginate(self.db.as_ref(), limit.max(1));
        let total = paginator.num_items().await?;
        let page_index = offset / limit.max(1);
        let models = paginator.fetch_page(page_index).await?;

        let tasks = models.into_iter().map(from_model).collect::<Result<Vec<_>, _>>()?;
        Ok((tasks, total))
    }

    /// Every scheduled task, unpaginated — the scheduler's restore-on-start
    /// working set.
    pub async fn scheduled_tasks(&self) -> Result<Vec<Task>, Error> {
        let models = tasks::Entity::find()
            .filter(tasks::Column::Status.eq(TaskStatus::Scheduled.as_str()))
            .all(self.db.as_ref())
            .await?;

        models.into_iter().map(from_model).collect()
    }

    /// Scheduled tasks whose `next_run` is null or `<= now` — the recovery
    /// sweep's working set.
    pub async fn due_tasks(&self, now: DateTime<Utc>) -> Result<Vec<Task>, Error> {
        let models = tasks::Entity::find()
            .filter(tasks::Column::Status.eq(TaskStatus::Scheduled.as_str()))
            .filter(
                Condition::any()
                    .add(tasks::Column::NextRun.is_null())
                    .add(tasks::Column::NextRun.lte(now)),
            )
            .all(self.db.as_ref())
            .await?;

        models.into_iter().map(from_model).collect()
    }

    pub async fn set_next_run(&self, id: Uuid, next_run: Option<DateTime<Utc>>) -> Result<(), Error> {
        let model = tasks::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| Error::NotFound(format!("task {id}")))?;

        let mut active: tasks::ActiveModel = model.into();
        active.next_run = Set(next_run);
        active.update(self.db.as_ref()).await?;
        Ok(())
    }

    pub async fn set_last_run(&self, id: Uuid, last_run: DateTime<Utc>) -> Result<(), Error> {
        let model = tasks::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| Error::NotFound(format!("task {id}")))?;

        let mut active: tasks::ActiveModel = model.into();
        active.last_run = Set(Some(last_run));
        active.update(self.db.as_ref()).await?;
        Ok(())
    }

    pub async fn mark_completed(&self, id: Uuid) -> Result<(), Error> {
        let model = tasks::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| Error::NotFound(format!("task {id}")))?;

        let mut active: tasks::ActiveModel = model.into();
        active.status = Set(TaskStatus::Completed.as_str().to_string());
        active.update(self.db.as_ref()).await?;
        Ok(())
    }

    pub async fn create_result(&self, result: &TaskResult) -> Result<(), Error> {
        tasks::Entity::find_by_id(result.task_id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| Error::NotFound(format!("task {}", result.task_id)))?;

        let active = result_to_active_model(result);
        active.insert(self.db.as_ref()).await?;
        Ok(())
    }

    pub async fn results_by_task(
        &self,
        task_id: Uuid,
        limit: u64,
        offset: u64,
    ) -> Result<(Vec<TaskResult>, u64), Error> {
        self.list_results(limit, offset, Some(task_id), None).await
    }

    pub async fn list_results(
        &self,
        limit: u64,
        offset: u64,
        task_id: Option<Uuid>,
        success: Option<bool>,
    ) -> Result<(Vec<TaskResult>, u64), Error> {
        let mut query = task_results::Entity::find();
        if let Some(task_id) = task_id {
            query = query.filter(task_results::Column::TaskId.eq(task_id));
        }
        if let Some(success) = success {
            query = query.filter(task_results::Column::Success.eq(success));
        }
        query = query.order_by_desc(task_results::Column::RunAt);

        let paginator = query.paginate(self.db.as_ref(), limit.max(1));
        let total = paginator.num_items().await?;
        let page_index = offset / limit.max(1);
        let models = paginator.fetch_page(page_index).await?;

        let results = models.into_iter().map(result_from_model).collect();
        Ok((results, total))
    }
}

fn to_active_model(task: &Task) -> tasks::ActiveModel {
    let (fire_at, cron_expr) = match &task.trigger {
        Trigger::OneOff { datetime } => (Some(*datetime), None),
        Trigger::Cron { cron } => (None, Some(cron.clone())),
    };

    tasks::ActiveModel {
        id: Set(task.id),
        name: Set(task.name.clone()),
        fire_at: Set(fire_at),
        cron_expr: Set(cron_expr),
        method: Set(task.action.method.as_str().to_string()),
        url: Set(task.action.url.clone()),
        headers: Set(serde_json::to_value(&task.action.headers).unwrap_or_default()),
        payload: Set(task.action.payload.clone()),
        status: Set(task.status.as_str().to_string()),
        created_at: Set(task.created_at),
        updated_at: Set(task.updated_at),
        next_run: Set(task.next_run),
        last_run: Set(task.last_run),
    }
}

fn from_model(model: tasks::Model) -> Result<Task, Error> {
    let trigger = match (model.fire_at, model.cron_expr) {
        (Some(datetime), None) => Trigger::OneOff { datetime },
        (None, Some(cron)) => Trigger::Cron { cron },
        _ => {
            return Err(Error::Internal(format!(
                "task {} has an inconsistent trigger representation",
                model.id
            )))
        }
    };

    let method = HttpMethod::from_str_internal(&model.method)?;
    let headers: HashMap<String, String> =
        serde_json::from_value(model.headers).unwrap_or_default();

    Ok(Task {
        id: model.id,
        name: model.name,
        trigger,
        action: Action {
            method,
            url: model.url,
            headers,
            payload: model.payload,
        },
        status: model.status.parse()?,
        created_at: model.created_at,
        updated_at: model.updated_at,
        next_run: model.next_run,
        last_run: model.last_run,
    })
}

fn result_to_active_model(result: &TaskResult) -> task_results::ActiveModel {
    task_results::ActiveModel {
        id: Set(result.id),
        task_id: Set(result.task_id),
        run_at: Set(result.run_at),
        duration_ms: Set(result.duration_ms),
        status_code: Set(result.status_code.map(|c| c as i32)),
        success: Set(result.success),
        response_headers: Set(serde_json::to_value(&result.response_headers).unwrap_or_default()),
        response_body: Set(result.response_body.clone()),
        error_message: Set(result.error_message.clone()),
    }
}

fn result_from_model(model: task_results::Model) -> TaskResult {
    TaskResult {
        id: model.id,
        task_id: model.task_id,
        run_at: model.run_at,
        duration_ms: model.duration_ms,
        status_code: model.status_code.map(|c| c as u16),
        success: model.success,
        response_headers: serde_json::from_value(model.response_headers).unwrap_or_default(),
        response_body: model.response_body,
        error_message: model.error_message,
    }
}

// `HttpMethod::from_str` already exists via `FromStr`; this helper keeps the
// `store` module free of an extra `use std::str::FromStr` just for one call
// site, and gives a store-flavored error message.
impl HttpMethod {
    fn from_str_internal(s: &str) -> Result<Self, Error> {
        use std::str::FromStr;
        HttpMethod::from_str(s).map_err(|_| Error::Internal(format!("stored invalid HTTP method: {s}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as Map;

    fn sample_task() -> Task {
        let now = Utc::now();
        Task::new(
            "ping".to_string(),
            Trigger::OneOff { datetime: now + chrono::Duration::seconds(30) },
            Action {
                method: HttpMethod::Get,
                url: "http://example.com".to_string(),
                headers: Map::new(),
                payload: None,
            },
            now,
        )
    }

    #[test]
    fn round_trips_through_active_model_conversion() {
        let task = sample_task();
        let active = to_active_model(&task);
        let model = tasks::Model {
            id: task.id,
            name: task.name.clone(),
            fire_at: match active.fire_at { Set(v) => v, _ => None },
            cron_expr: match active.cron_expr { Set(v) => v, _ => None },
            method: task.action.method.as_str().to_string(),
            url: task.action.url.clone(),
            headers: serde_json::to_value(&task.action.headers).unwrap(),
            payload: task.action.payload.clone(),
            status: task.status.as_str().to_string(),
            created_at: task.created_at,
            updated_at: task.updated_at,
            next_run: task.next_run,
            last_run: task.last_run,
        };

        let round_tripped = from_model(model).unwrap();
        assert_eq!(round_tripped.id, task.id);
        assert_eq!(round_tripped.name, task.name);
        assert_eq!(round_tripped.action.url, task.action.url);
    }
}
