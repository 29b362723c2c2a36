use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use taskd::establish_connection;
use taskd::executor::RetryingExecutor;
use taskd::metrics::MetricsSink;
use taskd::models::{Action, HttpMethod, TaskStatus, Trigger};
use taskd::scheduler::Scheduler;
use taskd::service::{TaskService, TaskUpdate};
use taskd::store::Store;

async fn new_service() -> TaskService {
    let db = establish_connection("sqlite::memory:").await.unwrap();
    let store = Store::new(Arc::new(db));
    let executor = RetryingExecutor::new(10_000, 3, Duration::from_millis(10), Duration::from_secs(5));
    let scheduler = Scheduler::new(store.clone(), executor, MetricsSink::new(), Duration::from_secs(60));
    TaskService::new(store, scheduler)
}

fn ping_action() -> Action {
    Action {
        method: HttpMethod::Get,
        url: "http://127.0.0.1:9/unused".to_string(),
        headers: HashMap::new(),
        payload: None,
    }
}

#[tokio::test]
async fn create_then_get_round_trips() {
    let service = new_service().await;
    let fire_at = Utc::now() + chrono::Duration::minutes(10);
    let created = service
        .create_task("ping".to_string(), Trigger::OneOff { datetime: fire_at }, ping_action())
        .await
        .unwrap();

    let fetched = service.get_task(created.id).await.unwrap();
    assert_eq!(fetched.id, created.id);
    assert_eq!(fetched.status, TaskStatus::Scheduled);
    assert_eq!(fetched.next_run, Some(fire_at));
}

#[tokio::test]
async fn create_rejects_past_one_off() {
    let service = new_service().await;
    let fire_at = Utc::now() - chrono::Duration::seconds(1);
    let err = service
        .create_task("late".to_string(), Trigger::OneOff { datetime: fire_at }, ping_action())
        .await
        .unwrap_err();
    assert!(matches!(err, taskd::errors::Error::Validation(_)));

    let (tasks, total) = service.list_tasks(10, 0, None).await.unwrap();
    assert_eq!(total, 0);
    assert!(tasks.is_empty());
}

#[tokio::test]
async fn create_rejects_empty_name() {
    let service = new_service().await;
    let fire_at = Utc::now() + chrono::Duration::minutes(10);
    let err = service
        .create_task("  ".to_string(), Trigger::OneOff { datetime: fire_at }, ping_action())
        .await
        .unwrap_err();
    assert!(matches!(err, taskd::errors::Error::Validation(_)));
}

#[tokio::test]
async fn create_rejects_invalid_cron() {
    let service = new_service().await;
    let err = service
        .create_task(
            "bad-cron".to_string(),
            Trigger::Cron { cron: "not a cron".to_string() },
            ping_action(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, taskd::errors::Error::Validation(_)));

    let (_, total) = service.list_tasks(10, 0, None).await.unwrap();
    assert_eq!(total, 0);
}

#[tokio::test]
async fn cancel_is_idempotent_but_conflicts_on_completed() {
    let service = new_service().await;
    let fire_at = Utc::now() + chrono::Duration::minutes(10);
    let task = service
        .create_task("cancel-me".to_string(), Trigger::OneOff { datetime: fire_at }, ping_action())
        .await
        .unwrap();

    service.cancel_task(task.id).await.unwrap();
    service.cancel_task(task.id).await.unwrap(); // idempotent, not a conflict

    let cancelled = service.get_task(task.id).await.unwrap();
    assert_eq!(cancelled.status, TaskStatus::Cancelled);
}

#[tokio::test]
async fn update_rejects_mutation_of_non_scheduled_task() {
    let service = new_service().await;
    let fire_at = Utc::now() + chrono::Duration::minutes(10);
    let task = service
        .create_task("freeze-me".to_string(), Trigger::OneOff { datetime: fire_at }, ping_action())
        .await
        .unwrap();
    service.cancel_task(task.id).await.unwrap();

    let err = service
        .update_task(task.id, TaskUpdate { name: Some("renamed".to_string()), trigger: None, action: None })
        .await
        .unwrap_err();
    assert!(matches!(err, taskd::errors::Error::Conflict(_)));
}

#[tokio::test]
async fn list_tasks_filters_by_status() {
    let service = new_service().await;
    let fire_at = Utc::now() + chrono::Duration::minutes(10);
    let kept = service
        .create_task("kept".to_string(), Trigger::OneOff { datetime: fire_at }, ping_action())
        .await
        .unwrap();
    let cancelled = service
        .create_task("cancelled".to_string(), Trigger::OneOff { datetime: fire_at }, ping_action())
        .await
        .unwrap();
    service.cancel_task(cancelled.id).await.unwrap();

    let (scheduled, total) = service.list_tasks(10, 0, Some(TaskStatus::Scheduled)).await.unwrap();
    assert_eq!(total, 1);
    assert_eq!(scheduled[0].id, kept.id);
}
