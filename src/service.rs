//! Orchestrates task creation, update and cancellation across the store and
//! the scheduler: validate, compute `next_run`, persist, then arm or
//! unschedule the in-memory timer.
//!
//! Grounded on `schedule/service.rs`'s `ScheduleService::upsert_schedule`,
//! which validates a cron expression, computes the next execution and
//! persists the schedule row in one call.

use chrono::Utc;
use uuid::Uuid;

use crate::errors::{Error, Result};
use crate::models::{Action, Task, TaskStatus, Trigger};
use crate::scheduler::Scheduler;
use crate::store::Store;

#[derive(Clone)]
pub struct TaskService {
    store: Store,
    scheduler: Scheduler,
}

/// Fields a caller may update on an existing task. `None` leaves the field
/// unchanged; the trigger, if present, replaces the whole trigger and is
/// revalidated.
#[derive(Default)]
pub struct TaskUpdate {
    pub name: Option<String>,
    pub trigger: Option<Trigger>,
    pub action: Option<Action>,
}

impl TaskService {
    pub fn new(store: Store, scheduler: Scheduler) -> Self {
        Self { store, scheduler }
    }

    pub async fn create_task(&self, name: String, trigger: Trigger, action: Action) -> Result<Task> {
        if name.trim().is_empty() {
            return Err(Error::Validation("name must not be empty".to_string()));
        }

        let now = Utc::now();
        trigger.validate(now)?;
        action.validate()?;

        let mut task = Task::new(name, trigger, action, now);
        task.next_run = Some(compute_next_run(&task.trigger, now)?);

        self.store.create_task(&task).await?;
        self.scheduler.arm(&task).await?;
        Ok(task)
    }

    pub async fn get_task(&self, id: Uuid) -> Result<Task> {
        self.store.get_task(id).await
    }

    pub async fn list_tasks(
        &self,
        limit: u64,
        offset: u64,
        status: Option<TaskStatus>,
    ) -> Result<(Vec<Task>, u64)> {
        self.store.list_tasks(limit, offset, status).await
    }

    /// Applies `update` to an existing task. Only a task still in `scheduled`
    /// status may be updated; a changed trigger re-arms the scheduler entry.
    pub async fn update_task(&self, id: Uuid, update: TaskUpdate) -> Result<Task> {
        let mut task = self.store.get_task(id).await?;
        if task.status != TaskStatus::Scheduled {
            return Err(Error::Conflict(format!(
                "task {id} is {} and can no longer be updated",
                task.status.as_str()
            )));
        }

        let now = Utc::now();
        let trigger_changed = update.trigger.is_some();

        if let Some(name) = update.name {
            if name.trim().is_empty() {
                return Err(Error::Validation("name must not be empty".to_string()));
            }
            task.name = name;
        }
        if let Some(trigger) = update.trigger {
            trigger.validate(now)?;
            task.trigger = trigger;
        }
        if let Some(action) = update.action {
            action.validate()?;
            task.action = action;
        }
        task.updated_at = now;

        if trigger_changed {
            task.next_run = Some(compute_next_run(&task.trigger, now)?);
        }

        self.store.update_task(&task).await?;

        if trigger_changed {
            self.scheduler.unschedule(task.id).await;
            self.scheduler.arm(&task).await?;
        }

        Ok(task)
    }

    /// Cancels a task: marks it cancelled in the store and drops its live
    /// timer or cron registration. Idempotent.
    pub async fn cancel_task(&self, id: Uuid) -> Result<()> {
        self.store.mark_cancelled(id).await?;
        self.scheduler.unschedule(id).await;
        Ok(())
    }

    pub async fn results_by_task(
        &self,
        task_id: Uuid,
        limit: u64,
        offset: u64,
    ) -> Result<(Vec<crate::models::TaskResult>, u64)> {
        // Surface NotFound for an unknown task rather than an empty page.
        self.store.get_task(task_id).await?;
        self.store.results_by_task(task_id, limit, offset).await
    }

    pub async fn list_results(
        &self,
        limit: u64,
        offset: u64,
        task_id: Option<Uuid>,
        success: Option<bool>,
    ) -> Result<(Vec<crate::models::TaskResult>, u64)> {
        self.store.list_results(limit, offset, task_id, success).await
    }
}

/// A one-off's next run is just its fire instant; a cron's is the evaluator's
/// next match after `now`.
fn compute_next_run(trigger: &Trigger, now: chrono::DateTime<Utc>) -> Result<chrono::DateTime<Utc>> {
    match trigger {
        Trigger::OneOff { datetime } => Ok(*datetime),
        Trigger::Cron { cron } => crate::cron::next_after(cron, now),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_off_next_run_is_its_own_fire_at() {
        let now = Utc::now();
        let fire_at = now + chrono::Duration::minutes(5);
        let trigger = Trigger::OneOff { datetime: fire_at };
        assert_eq!(compute_next_run(&trigger, now).unwrap(), fire_at);
    }

    #[test]
    fn cron_next_run_comes_from_the_evaluator() {
        let now = Utc::now();
        let trigger = Trigger::Cron { cron: "*/5 * * * *".to_string() };
        let next = compute_next_run(&trigger, now).unwrap();
        assert!(next > now);
    }
}
