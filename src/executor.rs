//! The executor performs one HTTP attempt for a task's action and returns a
//! structured [`TaskResult`]. [`RetryingExecutor`] wraps it with bounded,
//! fixed-delay retry.
//!
//! Grounded on `utils/http_client.rs`'s `AppExecutor`: a shared `reqwest::Client`,
//! a method-dispatch builder, and a retry loop around a single-attempt call.
//! Generalized from SwissPipe's fixed webhook/OpenObserve app types to an
//! arbitrary method/url/headers/body action, and from exponential backoff to
//! the spec's fixed-delay retry.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use chrono::Utc;
use reqwest::Client;
use uuid::Uuid;

use crate::models::{truncate_body, Action, HttpMethod, TaskResult};

/// Performs a single HTTP attempt for an action.
pub struct Executor {
    client: Client,
    response_body_cap_bytes: usize,
}

const DEFAULT_USER_AGENT: &str = "taskd-scheduler/1.0";

impl Executor {
    pub fn new(response_body_cap_bytes: usize) -> Self {
        Self {
            client: Client::builder()
                .pool_max_idle_per_host(10)
                .pool_idle_timeout(Duration::from_secs(90))
                .build()
                .expect("failed to build reqwest client"),
            response_body_cap_bytes,
        }
    }

    /// Runs one attempt, timing out after `timeout`. Always returns `Ok` —
    /// transport failures are encoded into the result, not propagated as an
    /// error, matching the executor's single-attempt contract.
    pub async fn attempt(&self, task_id: Uuid, action: &Action, timeout: Duration) -> TaskResult {
        let start = Instant::now();
        let run_at = Utc::now();

        let result = self.send_request(action, timeout).await;

        let duration_ms = start.elapsed().as_millis() as i64;

        match result {
            Ok((status_code, headers, body)) => {
                let truncated = truncate_body(&body, self.response_body_cap_bytes);
                TaskResult {
                    id: Uuid::now_v7(),
                    task_id,
                    run_at,
                    duration_ms,
                    status_code: Some(status_code),
                    success: (200..300).contains(&status_code),
                    response_headers: headers,
                    response_body: Some(truncated),
                    error_message: None,
                }
            }
            Err(err) => TaskResult {
                id: Uuid::now_v7(),
                task_id,
                run_at,
                duration_ms,
                status_code: None,
                success: false,
                response_headers: HashMap::new(),
                response_body: None,
                error_message: Some(err),
            },
        }
    }

    async fn send_request(
        &self,
        action: &Action,
        timeout: Duration,
    ) -> Result<(u16, HashMap<String, String>, String), String> {
        let method = reqwest::Method::from_bytes(action.method.as_str().as_bytes())
            .map_err(|e| e.to_string())?;

        let mut request = self.client.request(method, &action.url);

        let has_content_type = action
            .headers
            .keys()
            .any(|k| k.eq_ignore_ascii_case("content-type"));
        let has_user_agent = action
            .headers
            .keys()
            .any(|k| k.eq_ignore_ascii_case("user-agent"));

        for (key, value) in &action.headers {
            request = request.header(key, value);
        }

        if !has_user_agent {
            request = request.header("User-Agent", DEFAULT_USER_AGENT);
        }

        if let Some(payload) = &action.payload {
            if !has_content_type {
                let content_type = if serde_json::from_str::<serde_json::Value>(payload).is_ok() {
                    "application/json"
                } else {
                    "application/x-www-form-urlencoded"
                };
                request = request.header("Content-Type", content_type);
            }
            request = request.body(payload.clone());
        }

        let response = request
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status_code = response.status().as_u16();

        let mut headers = HashMap::new();
        for (name, value) in response.headers() {
            if let Ok(value_str) = value.to_str() {
                headers
                    .entry(name.as_str().to_string())
                    .or_insert_with(|| value_str.to_string());
            }
        }

        let body = response.text().await.map_err(|e| e.to_string())?;

        Ok((status_code, headers, body))
    }
}

/// Wraps [`Executor`] with bounded retry: up to `max_attempts` total tries
/// separated by a fixed delay. Retries on any non-success result (transport
/// failure or non-2xx). Returns the last attempt's result only — intermediate
/// attempts are never stored.
pub struct RetryingExecutor {
    executor: Executor,
    max_attempts: u32,
    retry_delay: Duration,
    timeout: Duration,
}

impl RetryingExecutor {
    pub fn new(
        response_body_cap_bytes: usize,
        max_attempts: u32,
        retry_delay: Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            executor: Executor::new(response_body_cap_bytes),
            max_attempts: max_attempts.max(1),
            retry_delay,
            timeout,
        }
    }

    pub async fn fire(&self, task_id: Uuid, action: &Action) -> TaskResult {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let result = self.executor.attempt(task_id, action, self.timeout).await;

            if result.success || attempt >= self.max_attempts {
                return result;
            }

            tracing::debug!(
                task_id = %task_id,
                attempt,
                max_attempts = self.max_attempts,
                "firing failed, retrying after delay"
            );
            tokio::time::sleep(self.retry_delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as Map;

    fn action(method: HttpMethod, url: &str) -> Action {
        Action {
            method,
            url: url.to_string(),
            headers: Map::new(),
            payload: None,
        }
    }

    #[tokio::test]
    async fn transport_failure_has_no_status_code_and_carries_error() {
        let executor = Executor::new(10_000);
        let action = action(HttpMethod::Get, "http://127.0.0.1:1/unreachable");
        let result = executor
            .attempt(Uuid::now_v7(), &action, Duration::from_millis(200))
            .await;
        assert!(!result.success);
        assert!(result.status_code.is_none());
        assert!(result.error_message.is_some());
    }

    async fn spawn_content_type_echo_server() -> (String, std::sync::Arc<tokio::sync::Mutex<Option<String>>>) {
        use axum::extract::State;
        use axum::http::HeaderMap;

        let seen = std::sync::Arc::new(tokio::sync::Mutex::new(None));
        let app_state = seen.clone();

        async fn echo(State(seen): State<std::sync::Arc<tokio::sync::Mutex<Option<String>>>>, headers: HeaderMap) -> &'static str {
            let content_type = headers
                .get("content-type")
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string());
            *seen.lock().await = content_type;
            "ok"
        }

        let app = axum::Router::new()
            .route("/echo", axum::routing::post(echo))
            .with_state(app_state);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}/echo"), seen)
    }

    #[tokio::test]
    async fn infers_json_content_type_when_payload_parses_as_json() {
        let (url, seen) = spawn_content_type_echo_server().await;
        let executor = Executor::new(10_000);
        let mut action = action(HttpMethod::Post, &url);
        action.payload = Some(r#"{"hello":"world"}"#.to_string());

        let result = executor.attempt(Uuid::now_v7(), &action, Duration::from_secs(1)).await;
        assert!(result.success);
        assert_eq!(seen.lock().await.as_deref(), Some("application/json"));
    }

    #[tokio::test]
    async fn infers_form_urlencoded_content_type_when_payload_is_not_json() {
        let (url, seen) = spawn_content_type_echo_server().await;
        let executor = Executor::new(10_000);
        let mut action = action(HttpMethod::Post, &url);
        action.payload = Some("name=value&other=thing".to_string());

        let result = executor.attempt(Uuid::now_v7(), &action, Duration::from_secs(1)).await;
        assert!(result.success);
        assert_eq!(seen.lock().await.as_deref(), Some("application/x-www-form-urlencoded"));
    }
}
