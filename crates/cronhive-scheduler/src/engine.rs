use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use cronhive_core::config::SchedulerConfig;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    clock::{Clock, SystemClock},
    cron::CronExpr,
    error::{Result, SchedulerError},
    executor::CommandRunner,
    schedule::compute_next_run,
    types::{CreateTask, LogEntry, Schedule, Task, TaskId, TaskStatus, TaskView},
};

/// Owns every task and the background timer that drives each running one.
///
/// Cheap to clone; all clones share the same registry. Every read or write
/// of task state goes through one mutex, which is never held while a
/// command runs.
#[derive(Clone)]
pub struct TaskScheduler {
    shared: Arc<Shared>,
}

struct Shared {
    registry: Mutex<Registry>,
    runner: Arc<dyn CommandRunner>,
    clock: Arc<dyn Clock>,
    max_log_entries: Option<usize>,
}

/// Task records plus a side table of live scheduling primitives.
#[derive(Default)]
struct Registry {
    tasks: HashMap<TaskId, Task>,
    schedules: HashMap<TaskId, ScheduleHandle>,
}

/// Handle to the tokio task that fires a schedule. Cancelling the token stops
/// future fires; a run that already started still completes.
struct ScheduleHandle {
    token: CancellationToken,
}

impl Registry {
    fn task_mut(&mut self, id: &TaskId) -> Result<&mut Task> {
        self.tasks.get_mut(id).ok_or_else(|| SchedulerError::not_found(id))
    }

    /// Stop the task's schedule, if any.
    fn release(&mut self, id: &TaskId) {
        if let Some(handle) = self.schedules.remove(id) {
            handle.token.cancel();
            debug!(task_id = %id, "schedule released");
        }
    }
}

impl TaskScheduler {
    pub fn new(runner: Arc<dyn CommandRunner>, config: &SchedulerConfig) -> Self {
        Self::with_clock(runner, Arc::new(SystemClock), config)
    }

    pub fn with_clock(
        runner: Arc<dyn CommandRunner>,
        clock: Arc<dyn Clock>,
        config: &SchedulerConfig,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                registry: Mutex::new(Registry::default()),
                runner,
                clock,
                max_log_entries: config.max_log_entries,
            }),
        }
    }

    /// Validate `request`, register the task as running and arm its schedule.
    ///
    /// Must be called from within a tokio runtime.
    pub fn create(&self, request: CreateTask) -> Result<TaskView> {
        let spec = request.validate()?;
        let task = Task::new(spec);
        let id = task.id.clone();

        let mut registry = self.shared.lock();
        info!(task_id = %id, name = %task.spec.name, kind = task.spec.schedule.kind(), "task created");
        registry.tasks.insert(id.clone(), task);
        self.shared.arm(&mut registry, &id);
        Ok(registry.task_mut(&id)?.view())
    }

    /// Snapshots of every task, oldest first.
    pub fn list(&self) -> Vec<TaskView> {
        let registry = self.shared.lock();
        let mut views: Vec<TaskView> = registry.tasks.values().map(Task::view).collect();
        views.sort_by(|a, b| a.id.cmp(&b.id));
        views
    }

    pub fn get(&self, id: &TaskId) -> Result<TaskView> {
        let registry = self.shared.lock();
        registry
            .tasks
            .get(id)
            .map(Task::view)
            .ok_or_else(|| SchedulerError::not_found(id))
    }

    /// Flip running ⇄ paused.
    pub fn toggle(&self, id: &TaskId) -> Result<TaskView> {
        let mut registry = self.shared.lock();
        let status = registry.task_mut(id)?.status;
        match status {
            TaskStatus::Running => self.shared.pause_locked(&mut registry, id)?,
            TaskStatus::Paused => self.shared.resume_locked(&mut registry, id)?,
        }
        let view = registry.task_mut(id)?.view();
        debug!(task_id = %id, from = %status, to = %view.status, "task toggled");
        Ok(view)
    }

    /// Pause the task. No-op when it is already paused.
    pub fn pause(&self, id: &TaskId) -> Result<TaskView> {
        let mut registry = self.shared.lock();
        if registry.task_mut(id)?.status == TaskStatus::Running {
            self.shared.pause_locked(&mut registry, id)?;
        }
        Ok(registry.task_mut(id)?.view())
    }

    /// Resume the task. No-op when it is already running.
    pub fn resume(&self, id: &TaskId) -> Result<TaskView> {
        let mut registry = self.shared.lock();
        if registry.task_mut(id)?.status == TaskStatus::Paused {
            self.shared.resume_locked(&mut registry, id)?;
        }
        Ok(registry.task_mut(id)?.view())
    }

    /// Run the command now, whatever the task's status, and wait for it.
    ///
    /// The schedule is left alone. Fails with `TaskNotFound` if the task is
    /// deleted while the command runs; the result is then discarded.
    pub async fn run_now(&self, id: &TaskId) -> Result<TaskView> {
        let command = {
            let mut registry = self.shared.lock();
            registry.task_mut(id)?.spec.command.clone()
        };

        info!(task_id = %id, "manual run");
        let entry = self.shared.runner.run(&command).await;

        let mut registry = self.shared.lock();
        let task = registry.task_mut(id)?;
        task.record(entry, self.shared.max_log_entries);
        Ok(task.view())
    }

    /// Stop the task's schedule and forget it.
    pub fn delete(&self, id: &TaskId) -> Result<()> {
        let mut registry = self.shared.lock();
        if registry.tasks.remove(id).is_none() {
            return Err(SchedulerError::not_found(id));
        }
        registry.release(id);
        info!(task_id = %id, "task deleted");
        Ok(())
    }

    /// Run history, newest first.
    pub fn logs(&self, id: &TaskId) -> Result<Vec<LogEntry>> {
        let mut registry = self.shared.lock();
        Ok(registry.task_mut(id)?.logs.iter().cloned().collect())
    }

    pub fn clear_logs(&self, id: &TaskId) -> Result<()> {
        let mut registry = self.shared.lock();
        registry.task_mut(id)?.logs.clear();
        info!(task_id = %id, "logs cleared");
        Ok(())
    }

    /// Stop every schedule. Commands already running finish on their own.
    pub fn shutdown(&self) {
        let mut registry = self.shared.lock();
        let ids: Vec<TaskId> = registry.schedules.keys().cloned().collect();
        for id in &ids {
            registry.release(id);
        }
        info!(stopped = ids.len(), "scheduler shut down");
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().expect("task registry poisoned")
    }

    fn pause_locked(&self, registry: &mut Registry, id: &TaskId) -> Result<()> {
        registry.release(id);
        let task = registry.task_mut(id)?;
        task.status = TaskStatus::Paused;
        task.next_run_at = None;
        info!(task_id = %id, "task paused");
        Ok(())
    }

    fn resume_locked(self: &Arc<Self>, registry: &mut Registry, id: &TaskId) -> Result<()> {
        registry.task_mut(id)?.status = TaskStatus::Running;
        self.arm(registry, id);
        info!(task_id = %id, "task resumed");
        Ok(())
    }

    /// Replace the task's schedule with a fresh one built from its definition.
    fn arm(self: &Arc<Self>, registry: &mut Registry, id: &TaskId) {
        registry.release(id);
        let Some(task) = registry.tasks.get_mut(id) else {
            return;
        };

        let now = self.clock.now();
        let next = compute_next_run(&task.spec.schedule, now);
        task.next_run_at = next;

        let token = CancellationToken::new();
        match (&task.spec.schedule, next) {
            (Schedule::Interval { every }, _) => {
                tokio::spawn(Arc::clone(self).run_interval(id.clone(), *every, token.clone()));
            }
            (Schedule::Cron(expr), Some(first)) => {
                tokio::spawn(Arc::clone(self).run_cron(
                    id.clone(),
                    expr.clone(),
                    first,
                    token.clone(),
                ));
            }
            (Schedule::Cron(expr), None) => {
                warn!(task_id = %id, cron = %expr, "cron expression has no upcoming occurrence; task will not fire");
                return;
            }
        }
        debug!(task_id = %id, next_run_at = ?next, "schedule armed");
        registry.schedules.insert(id.clone(), ScheduleHandle { token });
    }

    /// Recurring ticker: one fire per period, first one a period from now.
    async fn run_interval(self: Arc<Self>, id: TaskId, every: Duration, token: CancellationToken) {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + every, every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {}
            }
            let fired_at = self.clock.now();
            let Some(command) = self.begin_fire(&id, &token) else {
                break;
            };
            let entry = self.runner.run(&command).await;
            let next = chrono::Duration::from_std(every)
                .ok()
                .and_then(|every| fired_at.checked_add_signed(every));
            self.finish_fire(&id, &token, entry, next);
        }
        debug!(task_id = %id, "interval loop stopped");
    }

    /// Timer chain: sleep until the next occurrence, run, compute the one
    /// after, repeat. Stops for good when no further occurrence exists.
    async fn run_cron(
        self: Arc<Self>,
        id: TaskId,
        expr: CronExpr,
        first: DateTime<Utc>,
        token: CancellationToken,
    ) {
        let mut due = first;
        loop {
            let delay = (due - self.clock.now()).to_std().unwrap_or(Duration::ZERO);
            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
            let Some(command) = self.begin_fire(&id, &token) else {
                break;
            };
            let entry = self.runner.run(&command).await;

            // Never compute from before the occurrence just handled, so a
            // timer that wakes a little early cannot fire the same minute twice.
            let next = expr.next_after(self.clock.now().max(due));
            self.finish_fire(&id, &token, entry, next);

            match next {
                Some(next) => due = next,
                None => {
                    warn!(task_id = %id, cron = %expr, "no further cron occurrence; schedule stopped");
                    break;
                }
            }
        }
        debug!(task_id = %id, "cron loop stopped");
    }

    /// The command to run for this fire, or `None` when the schedule was
    /// released or the task is gone or paused.
    fn begin_fire(&self, id: &TaskId, token: &CancellationToken) -> Option<String> {
        let registry = self.lock();
        if token.is_cancelled() {
            return None;
        }
        let task = registry.tasks.get(id)?;
        if task.status != TaskStatus::Running {
            return None;
        }
        debug!(task_id = %id, "schedule fired");
        Some(task.spec.command.clone())
    }

    /// Record a scheduled run. The result is kept even if the task was paused
    /// while the command ran; `next_run_at` only moves while still armed.
    fn finish_fire(
        &self,
        id: &TaskId,
        token: &CancellationToken,
        entry: LogEntry,
        next: Option<DateTime<Utc>>,
    ) {
        let mut registry = self.lock();
        let Some(task) = registry.tasks.get_mut(id) else {
            debug!(task_id = %id, "task deleted during run; result dropped");
            return;
        };
        if !entry.success {
            warn!(task_id = %id, message = %entry.message, "scheduled run failed");
        }
        task.record(entry, self.max_log_entries);
        if !token.is_cancelled() && task.status == TaskStatus::Running {
            task.next_run_at = next;
        }
    }
}
