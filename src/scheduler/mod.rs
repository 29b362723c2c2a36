//! The in-memory coordinator that turns persisted tasks into timed firings.
//!
//! Grounded on `schedule/scheduler.rs`'s `CronSchedulerService`: an
//! `Arc<RwLock<HashMap<...>>>` of live handles, a `restore_from_database`
//! startup pass, per-entry `tokio::spawn` + `sleep_until` timers, and a
//! `shutdown` that drains them. The teacher gives cron entries their own
//! `sleep_until` each; here cron entries share one ticker (see
//! `SPEC_FULL.md` §5) while one-off entries keep the teacher's per-task
//! timer shape, since each one-off only ever fires once.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Notify, RwLock};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::cron;
use crate::executor::RetryingExecutor;
use crate::metrics::MetricsSink;
use crate::models::{Task, TaskStatus, Trigger};
use crate::store::Store;

/// A live cron registration: the parsed schedule and the next instant the
/// coordinator's ticker should fire it at.
struct CronEntry {
    schedule: ::cron::Schedule,
    next_run: DateTime<Utc>,
}

/// Coordinates firing of scheduled tasks against the store.
///
/// Cheap to clone for handing to spawned tasks: every field is itself an
/// `Arc` or wraps one.
#[derive(Clone)]
pub struct Scheduler {
    store: Store,
    executor: Arc<RetryingExecutor>,
    metrics: MetricsSink,
    one_off_timers: Arc<RwLock<HashMap<Uuid, JoinHandle<()>>>>,
    cron_registry: Arc<RwLock<HashMap<Uuid, CronEntry>>>,
    in_flight: Arc<InFlight>,
    sweep_interval: Duration,
    shutting_down: Arc<std::sync::atomic::AtomicBool>,
}

/// Tracks dispatches that are currently running an HTTP attempt, so shutdown
/// can wait out a grace period instead of abandoning them mid-flight.
struct InFlight {
    count: std::sync::atomic::AtomicI64,
    idle: Notify,
}

impl InFlight {
    fn new() -> Self {
        Self { count: std::sync::atomic::AtomicI64::new(0), idle: Notify::new() }
    }

    fn enter(&self) {
        self.count.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    }

    fn exit(&self) {
        let previous = self.count.fetch_sub(1, std::sync::atomic::Ordering::SeqCst);
        if previous <= 1 {
            self.idle.notify_waiters();
        }
    }

    fn current(&self) -> i64 {
        self.count.load(std::sync::atomic::Ordering::SeqCst)
    }
}

impl Scheduler {
    pub fn new(
        store: Store,
        executor: RetryingExecutor,
        metrics: MetricsSink,
        sweep_interval: Duration,
    ) -> Self {
        Self {
            store,
            executor: Arc::new(executor),
            metrics,
            one_off_timers: Arc::new(RwLock::new(HashMap::new())),
            cron_registry: Arc::new(RwLock::new(HashMap::new())),
            in_flight: Arc::new(InFlight::new()),
            sweep_interval,
            shutting_down: Arc::new(std::sync::atomic::AtomicBool::new(false)),
        }
    }

    /// Loads every scheduled task from the store and arms it, then spawns the
    /// cron ticker and the recovery sweep. Call once at startup.
    pub async fn start(&self) -> Result<(), crate::errors::Error> {
        let tasks = self.store.scheduled_tasks().await?;
        let count = tasks.len();
        for task in tasks {
            if let Err(err) = self.arm(&task).await {
                tracing::warn!(task_id = %task.id, error = %err, "failed to arm task on restore");
            }
        }
        tracing::info!(restored = count, "scheduler restored tasks from the store");

        self.spawn_cron_ticker();
        self.spawn_sweep();
        Ok(())
    }

    /// Arms a scheduled task: a one-off gets a per-task timer, a cron task
    /// gets a registry entry picked up by the shared ticker.
    pub async fn arm(&self, task: &Task) -> Result<(), crate::errors::Error> {
        match &task.trigger {
            Trigger::OneOff { datetime } => self.arm_one_off(task.id, *datetime).await,
            Trigger::Cron { cron: expr } => self.arm_cron(task.id, expr).await,
        }
        Ok(())
    }

    /// Cancels a task's in-memory registration. Safe to call for a task with
    /// no live registration (e.g. one already fired).
    pub async fn unschedule(&self, id: Uuid) {
        if let Some(handle) = self.one_off_timers.write().await.remove(&id) {
            handle.abort();
        }
        self.cron_registry.write().await.remove(&id);
    }

    async fn arm_one_off(&self, id: Uuid, fire_at: DateTime<Utc>) {
        let scheduler = self.clone();
        let handle = tokio::spawn(async move {
            let now = Utc::now();
            if fire_at > now {
                let delay = (fire_at - now).to_std().unwrap_or(Duration::ZERO);
                tokio::time::sleep(delay).await;
            }
            scheduler.one_off_timers.write().await.remove(&id);
            scheduler.dispatch(id).await;
        });

        if let Some(previous) = self.one_off_timers.write().await.insert(id, handle) {
            previous.abort();
        }
    }

    async fn arm_cron(&self, id: Uuid, expr: &str) {
        let schedule = match cron::parse(expr) {
            Ok(schedule) => schedule,
            Err(err) => {
                tracing::warn!(task_id = %id, error = %err, "refusing to arm task with invalid cron");
                return;
            }
        };
        let now = Utc::now();
        let next_run = match cron::next_after_schedule(&schedule, now) {
            Ok(next_run) => next_run,
            Err(err) => {
                tracing::warn!(task_id = %id, error = %err, "cron schedule has no future firing");
                return;
            }
        };
        self.cron_registry.write().await.insert(id, CronEntry { schedule, next_run });
    }

    fn spawn_cron_ticker(&self) {
        let scheduler = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(1));
            loop {
                ticker.tick().await;
                scheduler.cron_tick().await;
            }
        });
    }

    async fn cron_tick(&self) {
        if self.shutting_down.load(std::sync::atomic::Ordering::SeqCst) {
            return;
        }

        let now = Utc::now();
        let mut due = Vec::new();
        {
            let mut registry = self.cron_registry.write().await;
            for (id, entry) in registry.iter_mut() {
                if entry.next_run <= now {
                    due.push(*id);
                    if let Ok(next_run) = cron::next_after_schedule(&entry.schedule, now) {
                        entry.next_run = next_run;
                    }
                }
            }
        }

        for id in due {
            let scheduler = self.clone();
            tokio::spawn(async move {
                scheduler.dispatch(id).await;
            });
        }
    }

    fn spawn_sweep(&self) {
        let scheduler = self.clone();
        let interval = self.sweep_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                scheduler.recovery_sweep().await;
            }
        });
    }

    /// Reconciles the store against in-memory state: fires one-off tasks that
    /// became due without a live timer (e.g. after a restart) and re-persists
    /// drifted `next_run` values for cron tasks. Never dispatches a cron task
    /// directly — that stays the ticker's job.
    async fn recovery_sweep(&self) {
        if self.shutting_down.load(std::sync::atomic::Ordering::SeqCst) {
            return;
        }

        let now = Utc::now();
        let due = match self.store.due_tasks(now).await {
            Ok(due) => due,
            Err(err) => {
                tracing::warn!(error = %err, "recovery sweep failed to load due tasks");
                return;
            }
        };

        for task in due {
            match &task.trigger {
                Trigger::OneOff { .. } => {
                    let has_timer = self.one_off_timers.read().await.contains_key(&task.id);
                    if !has_timer {
                        tracing::info!(task_id = %task.id, "recovery sweep dispatching overdue one-off task");
                        let scheduler = self.clone();
                        let id = task.id;
                        tokio::spawn(async move {
                            scheduler.dispatch(id).await;
                        });
                    }
                }
                Trigger::Cron { cron: expr } => {
                    let next_run = match cron::next_after(expr, now) {
                        Ok(next_run) => next_run,
                        Err(err) => {
                            tracing::warn!(task_id = %task.id, error = %err, "sweep could not compute next cron firing");
                            continue;
                        }
                    };
                    if let Err(err) = self.store.set_next_run(task.id, Some(next_run)).await {
                        tracing::warn!(task_id = %task.id, error = %err, "sweep failed to persist next_run");
                        continue;
                    }
                    if !self.cron_registry.read().await.contains_key(&task.id) {
                        self.arm_cron(task.id, expr).await;
                    }
                }
            }
        }
    }

    /// Shared dispatch body: re-reads the task, fires it through the
    /// retrying executor, records the result and metrics, and advances the
    /// task's state. Re-reading guards against a task cancelled after it was
    /// armed but before its timer or tick fired.
    async fn dispatch(&self, task_id: Uuid) {
        self.in_flight.enter();
        let outcome = self.dispatch_inner(task_id).await;
        self.in_flight.exit();

        if let Err(err) = outcome {
            tracing::warn!(task_id = %task_id, error = %err, "dispatch failed");
        }
    }

    async fn dispatch_inner(&self, task_id: Uuid) -> Result<(), crate::errors::Error> {
        let task = match self.store.get_task(task_id).await {
            Ok(task) => task,
            Err(crate::errors::Error::NotFound(_)) => return Ok(()),
            Err(err) => return Err(err),
        };

        if task.status != TaskStatus::Scheduled {
            tracing::debug!(task_id = %task_id, status = ?task.status, "skipping dispatch of non-scheduled task");
            return Ok(());
        }

        let start = Utc::now();
        let mut result = self.executor.fire(task.id, &task.action).await;
        result.run_at = start;

        self.metrics.record(result.success, result.duration_ms).await;

        if let Err(err) = self.store.create_result(&result).await {
            tracing::warn!(task_id = %task_id, error = %err, "failed to persist task result");
        }
        if let Err(err) = self.store.set_last_run(task_id, start).await {
            tracing::warn!(task_id = %task_id, error = %err, "failed to persist last_run");
        }

        match &task.trigger {
            Trigger::OneOff { .. } => {
                self.store.mark_completed(task_id).await?;
            }
            Trigger::Cron { cron: expr } => {
                let next_run = cron::next_after(expr, start)?;
                self.store.set_next_run(task_id, Some(next_run)).await?;
            }
        }

        Ok(())
    }

    /// Stops new dispatches (the cron ticker and recovery sweep both check
    /// `shutting_down` before acting), cancels all live timers and cron
    /// registrations, then waits up to `grace` for in-flight dispatches to
    /// finish. Polls rather than relying solely on `Notify`, since a dispatch
    /// can complete (and notify) between our checking `in_flight` and
    /// starting to wait on it.
    pub async fn shutdown(&self, grace: Duration) {
        self.shutting_down.store(true, std::sync::atomic::Ordering::SeqCst);

        let mut timers = self.one_off_timers.write().await;
        for (_, handle) in timers.drain() {
            handle.abort();
        }
        drop(timers);
        self.cron_registry.write().await.clear();

        let deadline = tokio::time::Instant::now() + grace;
        while self.in_flight.current() > 0 && tokio::time::Instant::now() < deadline {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            let wait = self.in_flight.idle.notified();
            let _ = tokio::time::timeout(remaining.min(Duration::from_millis(200)), wait).await;
        }

        if self.in_flight.current() > 0 {
            tracing::warn!(
                remaining = self.in_flight.current(),
                "shutdown grace period elapsed with dispatches still in flight"
            );
        }
    }
}
