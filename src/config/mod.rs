use crate::errors::Error;
use std::env;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub executor_timeout_secs: u64,
    pub retry_max_attempts: u32,
    pub retry_delay_secs: u64,
    pub response_body_cap_bytes: usize,
    pub sweep_interval_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, Error> {
        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite:data/taskd.db?mode=rwc".to_string());

        let port = env::var("PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .map_err(|_| Error::Config("Invalid PORT value".to_string()))?;

        let executor_timeout_secs = env::var("TASKD_EXECUTOR_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .map_err(|_| Error::Config("Invalid TASKD_EXECUTOR_TIMEOUT_SECS value".to_string()))?;

        let retry_max_attempts = env::var("TASKD_RETRY_MAX_ATTEMPTS")
            .unwrap_or_else(|_| "3".to_string())
            .parse()
            .map_err(|_| Error::Config("Invalid TASKD_RETRY_MAX_ATTEMPTS value".to_string()))?;

        let retry_delay_secs = env::var("TASKD_RETRY_DELAY_SECS")
            .unwrap_or_else(|_| "5".to_string())
            .parse()
            .map_err(|_| Error::Config("Invalid TASKD_RETRY_DELAY_SECS value".to_string()))?;

        let response_body_cap_bytes = env::var("TASKD_RESPONSE_BODY_CAP_BYTES")
            .unwrap_or_else(|_| "10000".to_string())
            .parse()
            .map_err(|_| Error::Config("Invalid TASKD_RESPONSE_BODY_CAP_BYTES value".to_string()))?;

        let sweep_interval_secs = env::var("TASKD_SWEEP_INTERVAL_SECS")
            .unwrap_or_else(|_| "60".to_string())
            .parse()
            .map_err(|_| Error::Config("Invalid TASKD_SWEEP_INTERVAL_SECS value".to_string()))?;

        // Ensure the sqlite data directory exists before sea-orm tries to open it.
        if let Some(db_path_str) = database_url.strip_prefix("sqlite:") {
            if let Some(db_path) = db_path_str.split('?').next() {
                if let Some(parent) = std::path::Path::new(db_path).parent() {
                    std::fs::create_dir_all(parent)
                        .map_err(|e| Error::Config(format!("Failed to create data directory: {e}")))?;
                }
            }
        }

        Ok(Config {
            database_url,
            port,
            executor_timeout_secs,
            retry_max_attempts,
            retry_delay_secs,
            response_body_cap_bytes,
            sweep_interval_secs,
        })
    }
}
