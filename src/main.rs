mod api;
mod config;
mod cron;
mod database;
mod errors;
mod executor;
mod metrics;
mod models;
mod scheduler;
mod service;
mod store;

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;

use config::Config;
use database::establish_connection;
use executor::RetryingExecutor;
use metrics::MetricsSink;
use scheduler::Scheduler;
use service::TaskService;
use store::Store;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<sea_orm::DatabaseConnection>,
    pub config: Arc<Config>,
    pub task_service: TaskService,
    pub metrics: MetricsSink,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt().json().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let config = Config::from_env()?;
    tracing::info!(port = config.port, "starting taskd");

    let db = establish_connection(&config.database_url).await?;
    let db = Arc::new(db);

    let store = Store::new(db.clone());
    let executor = RetryingExecutor::new(
        config.response_body_cap_bytes,
        config.retry_max_attempts,
        Duration::from_secs(config.retry_delay_secs),
        Duration::from_secs(config.executor_timeout_secs),
    );
    let metrics = MetricsSink::new();

    let scheduler = Scheduler::new(
        store.clone(),
        executor,
        metrics.clone(),
        Duration::from_secs(config.sweep_interval_secs),
    );
    scheduler.start().await?;

    let task_service = TaskService::new(store, scheduler.clone());
    let port = config.port;
    let grace = Duration::from_secs(config.executor_timeout_secs)
        + Duration::from_secs(config.retry_delay_secs) * config.retry_max_attempts;
    let config = Arc::new(config);

    let state = AppState { db, config, task_service, metrics };

    let app = api::create_router(state);

    let listener = TcpListener::bind(&format!("0.0.0.0:{port}")).await?;
    tracing::info!(port, "taskd listening");

    let shutdown_signal = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
        tracing::info!("received shutdown signal");
    };

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal).await?;

    tracing::info!("draining in-flight dispatches");
    scheduler.shutdown(grace).await;
    tracing::info!("shutdown complete");

    Ok(())
}
