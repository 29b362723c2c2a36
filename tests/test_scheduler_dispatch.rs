use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use axum::Router;
use chrono::Utc;
use tokio::net::TcpListener;

use taskd::establish_connection;
use taskd::executor::RetryingExecutor;
use taskd::metrics::MetricsSink;
use taskd::models::{Action, HttpMethod, TaskStatus, Trigger};
use taskd::scheduler::Scheduler;
use taskd::service::TaskService;
use taskd::store::Store;

async fn spawn_ping_server() -> String {
    let app = Router::new().route("/ping", get(|| async { "pong" }));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/ping")
}

async fn new_service() -> TaskService {
    let db = establish_connection("sqlite::memory:").await.unwrap();
    let store = Store::new(Arc::new(db));
    let executor = RetryingExecutor::new(10_000, 3, Duration::from_millis(20), Duration::from_secs(5));
    let scheduler = Scheduler::new(store.clone(), executor, MetricsSink::new(), Duration::from_secs(60));
    TaskService::new(store, scheduler)
}

#[tokio::test]
async fn one_off_task_fires_and_completes() {
    let url = spawn_ping_server().await;
    let service = new_service().await;

    let fire_at = Utc::now() + chrono::Duration::milliseconds(100);
    let task = service
        .create_task(
            "ping-once".to_string(),
            Trigger::OneOff { datetime: fire_at },
            Action { method: HttpMethod::Get, url, headers: HashMap::new(), payload: None },
        )
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(600)).await;

    let completed = service.get_task(task.id).await.unwrap();
    assert_eq!(completed.status, TaskStatus::Completed);
    assert!(completed.last_run.is_some());

    let (results, total) = service.results_by_task(task.id, 10, 0).await.unwrap();
    assert_eq!(total, 1);
    assert!(results[0].success);
    assert_eq!(results[0].status_code, Some(200));
}

#[tokio::test]
async fn cancelling_before_fire_prevents_the_timer_from_firing() {
    let url = spawn_ping_server().await;
    let service = new_service().await;

    let fire_at = Utc::now() + chrono::Duration::milliseconds(800);
    let task = service
        .create_task(
            "ping-cancelled".to_string(),
            Trigger::OneOff { datetime: fire_at },
            Action { method: HttpMethod::Get, url, headers: HashMap::new(), payload: None },
        )
        .await
        .unwrap();

    service.cancel_task(task.id).await.unwrap();
    tokio::time::sleep(Duration::from_millis(1_200)).await;

    let cancelled = service.get_task(task.id).await.unwrap();
    assert_eq!(cancelled.status, TaskStatus::Cancelled);

    let (_, total) = service.results_by_task(task.id, 10, 0).await.unwrap();
    assert_eq!(total, 0);
}

#[tokio::test]
async fn immediate_one_off_fires_without_waiting_for_a_timer() {
    let url = spawn_ping_server().await;
    let service = new_service().await;

    // fire_at just barely in the future so it passes create-time validation
    // but has already elapsed by the time the scheduler arms it.
    let fire_at = Utc::now() + chrono::Duration::milliseconds(1);
    let task = service
        .create_task(
            "ping-immediate".to_string(),
            Trigger::OneOff { datetime: fire_at },
            Action { method: HttpMethod::Get, url, headers: HashMap::new(), payload: None },
        )
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(300)).await;

    let completed = service.get_task(task.id).await.unwrap();
    assert_eq!(completed.status, TaskStatus::Completed);
}
