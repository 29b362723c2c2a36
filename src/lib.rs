use std::sync::Arc;

pub mod api;
pub mod config;
pub mod cron;
pub mod database;
pub mod errors;
pub mod executor;
pub mod metrics;
pub mod models;
pub mod scheduler;
pub mod service;
pub mod store;

pub use database::establish_connection;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<sea_orm::DatabaseConnection>,
    pub config: Arc<config::Config>,
    pub task_service: service::TaskService,
    pub metrics: metrics::MetricsSink,
}
