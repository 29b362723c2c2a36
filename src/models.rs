use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::Error;

/// HTTP methods a task's action may use. Only the methods sensible for an
/// outbound webhook-style call are supported.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
        }
    }
}

impl FromStr for HttpMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "DELETE" => Ok(HttpMethod::Delete),
            "PATCH" => Ok(HttpMethod::Patch),
            "HEAD" => Ok(HttpMethod::Head),
            "OPTIONS" => Ok(HttpMethod::Options),
            other => Err(Error::Validation(format!("unsupported HTTP method: {other}"))),
        }
    }
}

/// The outbound request a task fires when dispatched.
///
/// `payload` is carried as an opaque string rather than typed JSON: a task's
/// body is whatever bytes the caller supplies, and the executor infers its
/// `Content-Type` at send time by attempting a JSON parse (see
/// `executor::send_request`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Action {
    pub method: HttpMethod,
    pub url: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub payload: Option<String>,
}

impl Action {
    /// Validates the URL has an http(s) scheme. Does not perform DNS
    /// resolution or any other network access.
    pub fn validate(&self) -> Result<(), Error> {
        let parsed = url::Url::parse(&self.url)
            .map_err(|e| Error::Validation(format!("invalid url: {e}")))?;
        match parsed.scheme() {
            "http" | "https" => Ok(()),
            other => Err(Error::Validation(format!(
                "unsupported URL scheme: {other}"
            ))),
        }
    }
}

/// Exactly one of a one-off absolute instant or a recurring cron expression.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Trigger {
    OneOff { datetime: DateTime<Utc> },
    Cron { cron: String },
}

impl Trigger {
    pub fn validate(&self, now: DateTime<Utc>) -> Result<(), Error> {
        match self {
            Trigger::OneOff { datetime } => {
                if *datetime <= now {
                    return Err(Error::Validation(
                        "one-off fire_at must be strictly in the future".to_string(),
                    ));
                }
                Ok(())
            }
            Trigger::Cron { cron } => {
                crate::cron::parse(cron)?;
                Ok(())
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Scheduled,
    Completed,
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Scheduled => "scheduled",
            TaskStatus::Completed => "completed",
            TaskStatus::Cancelled => "cancelled",
        }
    }
}

impl FromStr for TaskStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(TaskStatus::Scheduled),
            "completed" => Ok(TaskStatus::Completed),
            "cancelled" => Ok(TaskStatus::Cancelled),
            other => Err(Error::Internal(format!("unknown task status: {other}"))),
        }
    }
}

/// A scheduled unit of work, as held by the store and surfaced on the wire.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub name: String,
    pub trigger: Trigger,
    pub action: Action,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub next_run: Option<DateTime<Utc>>,
    pub last_run: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(name: String, trigger: Trigger, action: Action, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::now_v7(),
            name,
            trigger,
            action,
            status: TaskStatus::Scheduled,
            created_at: now,
            updated_at: now,
            next_run: None,
            last_run: None,
        }
    }

    pub fn is_cron(&self) -> bool {
        matches!(self.trigger, Trigger::Cron { .. })
    }
}

/// One firing attempt, append-only once written.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TaskResult {
    pub id: Uuid,
    pub task_id: Uuid,
    pub run_at: DateTime<Utc>,
    pub duration_ms: i64,
    pub status_code: Option<u16>,
    pub success: bool,
    pub response_headers: HashMap<String, String>,
    pub response_body: Option<String>,
    pub error_message: Option<String>,
}

/// Body cap enforced by the executor; truncated bodies carry this marker.
pub const RESPONSE_BODY_CAP_BYTES: usize = 10_000;
pub const TRUNCATION_MARKER: &str = "... (truncated)";

/// Truncates `body` to at most [`RESPONSE_BODY_CAP_BYTES`] bytes, appending
/// [`TRUNCATION_MARKER`] when truncation occurred. Operates on UTF-8
/// boundaries so the result is always valid text.
pub fn truncate_body(body: &str, cap: usize) -> String {
    if body.len() <= cap {
        return body.to_string();
    }
    let mut end = cap;
    while end > 0 && !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}{}", &body[..end], TRUNCATION_MARKER)
}

#[derive(Debug, Deserialize)]
pub struct PageParams {
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

pub const DEFAULT_PAGE_SIZE: u64 = 10;
pub const MAX_PAGE_SIZE: u64 = 100;

/// Clamps a requested page size into `[1, 100]`, falling back to the default
/// when zero or absent.
pub fn clamp_limit(limit: Option<u64>) -> u64 {
    match limit {
        None | Some(0) => DEFAULT_PAGE_SIZE,
        Some(n) => n.min(MAX_PAGE_SIZE),
    }
}

pub fn page_offset(page: Option<u64>, limit: u64) -> u64 {
    let page = page.unwrap_or(1).max(1);
    (page - 1) * limit
}

#[derive(Debug, Serialize)]
pub struct Pagination {
    pub page: u64,
    pub limit: u64,
    pub total: u64,
}

#[derive(Debug, Serialize)]
pub struct TasksPage {
    pub tasks: Vec<Task>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize)]
pub struct ResultsPage {
    pub results: Vec<TaskResult>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub total_tasks_executed: u64,
    pub successful_tasks: u64,
    pub failed_tasks: u64,
    pub success_rate_percent: f64,
    pub average_execution_ms: f64,
    pub tasks_per_minute: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_body_under_cap_is_unchanged() {
        let body = "hello world";
        assert_eq!(truncate_body(body, 10_000), body);
    }

    #[test]
    fn truncate_body_over_cap_appends_marker() {
        let body = "a".repeat(10_001);
        let truncated = truncate_body(&body, RESPONSE_BODY_CAP_BYTES);
        assert_eq!(truncated.len(), RESPONSE_BODY_CAP_BYTES + TRUNCATION_MARKER.len());
        assert!(truncated.ends_with(TRUNCATION_MARKER));
    }

    #[test]
    fn clamp_limit_defaults_on_zero_or_absent() {
        assert_eq!(clamp_limit(None), DEFAULT_PAGE_SIZE);
        assert_eq!(clamp_limit(Some(0)), DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn clamp_limit_caps_at_max() {
        assert_eq!(clamp_limit(Some(1000)), MAX_PAGE_SIZE);
        assert_eq!(clamp_limit(Some(50)), 50);
    }

    #[test]
    fn one_off_trigger_rejects_past_instant() {
        let now = Utc::now();
        let trigger = Trigger::OneOff { datetime: now - chrono::Duration::seconds(1) };
        assert!(trigger.validate(now).is_err());
    }

    #[test]
    fn action_rejects_non_http_scheme() {
        let action = Action {
            method: HttpMethod::Get,
            url: "ftp://example.com".to_string(),
            headers: HashMap::new(),
            payload: None,
        };
        assert!(action.validate().is_err());
    }
}
