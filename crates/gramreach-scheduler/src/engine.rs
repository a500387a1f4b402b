//! Scheduler engine — a single polling worker that fires campaigns at
//! their wall-clock minute.
//!
//! The worker never runs campaigns itself: each due task is handed to an
//! injected executor callback, which keeps this crate free of browser
//! concerns. Ticks read a cloned snapshot of the schedule list, so adds
//! and removals never race an in-flight tick.

use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{Local, Utc};
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use gramreach_core::error::Result;
use gramreach_core::types::RunSummary;

use crate::store::TaskStore;
use crate::tasks::{CLOCK_FORMAT, ScheduledTask};

/// How often the worker compares the clock against the schedule list.
pub const POLL_INTERVAL: Duration = Duration::from_secs(30);
/// Sleep after each executed task so an entry fires once per minute.
/// Several entries on the same minute accumulate these sleeps; later
/// ones start correspondingly late.
pub const GUARD_INTERVAL: Duration = Duration::from_secs(60);

/// Boxed future returned by a task executor.
pub type TaskFuture = Pin<Box<dyn Future<Output = Result<RunSummary>> + Send>>;
/// Callback that runs one scheduled campaign to completion.
pub type TaskExecutor = Arc<dyn Fn(ScheduledTask) -> TaskFuture + Send + Sync>;

/// The scheduler — owns the schedule list, its persistence, and the
/// polling worker.
pub struct TaskScheduler {
    inner: Arc<SchedulerShared>,
    worker: Mutex<Option<JoinHandle<()>>>,
    poll_interval: Duration,
    guard_interval: Duration,
}

/// State shared between the handle and the worker task.
struct SchedulerShared {
    tasks: Mutex<Vec<ScheduledTask>>,
    store: TaskStore,
    executor: TaskExecutor,
    stopping: AtomicBool,
    stop_signal: Notify,
}

impl TaskScheduler {
    /// Create a scheduler over the given store directory, loading any
    /// persisted tasks. The executor is invoked once per due task.
    pub fn new<F, Fut>(store_dir: &Path, executor: F) -> Self
    where
        F: Fn(ScheduledTask) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<RunSummary>> + Send + 'static,
    {
        let store = TaskStore::new(store_dir);
        let tasks = store.load();
        if !tasks.is_empty() {
            tracing::info!("📅 Loaded {} scheduled task(s)", tasks.len());
        }
        let executor: TaskExecutor = Arc::new(move |task| Box::pin(executor(task)));
        Self {
            inner: Arc::new(SchedulerShared {
                tasks: Mutex::new(tasks),
                store,
                executor,
                stopping: AtomicBool::new(false),
                stop_signal: Notify::new(),
            }),
            worker: Mutex::new(None),
            poll_interval: POLL_INTERVAL,
            guard_interval: GUARD_INTERVAL,
        }
    }

    /// Override the poll and guard intervals. Production uses the
    /// defaults; tests shrink them.
    pub fn with_intervals(mut self, poll: Duration, guard: Duration) -> Self {
        self.poll_interval = poll;
        self.guard_interval = guard;
        self
    }

    /// Add a task to the schedule and persist the list. The task is not
    /// kept if persistence fails.
    pub fn add_task(&self, task: ScheduledTask) -> Result<()> {
        let (id, time) = (task.id.clone(), task.time.clone());
        let mut tasks = self.inner.tasks.lock().unwrap();
        tasks.push(task);
        if let Err(e) = self.inner.store.save(&tasks) {
            tasks.pop();
            return Err(e);
        }
        tracing::info!("📅 Schedule added: {id} at {time}");
        Ok(())
    }

    /// Remove a task by id. Returns false for an unknown id.
    pub fn remove_task(&self, id: &str) -> bool {
        let mut tasks = self.inner.tasks.lock().unwrap();
        let len = tasks.len();
        tasks.retain(|t| t.id != id);
        if tasks.len() < len {
            tracing::info!("🗑️ Schedule removed: {id}");
            if let Err(e) = self.inner.store.save(&tasks) {
                tracing::warn!("⚠️ Failed to save schedules: {e}");
            }
            true
        } else {
            false
        }
    }

    /// Snapshot of the schedule list.
    pub fn list_tasks(&self) -> Vec<ScheduledTask> {
        self.inner.tasks.lock().unwrap().clone()
    }

    /// Tasks that trigger at the given `HH:MM` minute, in insertion order.
    pub fn due_tasks(&self, clock: &str) -> Vec<ScheduledTask> {
        self.inner.due_tasks(clock)
    }

    /// Spawn the polling worker. A second call while the worker lives is
    /// a no-op.
    pub fn start(&self) {
        let mut worker = self.worker.lock().unwrap();
        if worker.as_ref().is_some_and(|h| !h.is_finished()) {
            tracing::debug!("⏰ Scheduler worker already running");
            return;
        }
        self.inner.stopping.store(false, Ordering::SeqCst);
        let shared = self.inner.clone();
        let poll = self.poll_interval;
        let guard = self.guard_interval;
        *worker = Some(tokio::spawn(worker_loop(shared, poll, guard)));
    }

    /// Signal the worker to stop and wait for it to exit. An in-flight
    /// campaign is not cancelled; it completes before the worker stops.
    pub async fn stop(&self) {
        let handle = self.worker.lock().unwrap().take();
        let Some(handle) = handle else {
            return;
        };
        self.inner.stopping.store(true, Ordering::SeqCst);
        self.inner.stop_signal.notify_one();
        if let Err(e) = handle.await {
            tracing::warn!("⚠️ Scheduler worker ended abnormally: {e}");
        }
        tracing::info!("⏰ Scheduler worker stopped");
    }

    pub fn is_running(&self) -> bool {
        self.worker
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }
}

impl SchedulerShared {
    fn due_tasks(&self, clock: &str) -> Vec<ScheduledTask> {
        self.tasks
            .lock()
            .unwrap()
            .iter()
            .filter(|t| t.is_due(clock))
            .cloned()
            .collect()
    }

    /// Stamp a task after execution. The task may have been removed while
    /// it ran; that's fine, there is nothing to stamp then.
    fn mark_ran(&self, id: &str) {
        let mut tasks = self.tasks.lock().unwrap();
        if let Some(task) = tasks.iter_mut().find(|t| t.id == id) {
            task.last_run = Some(Utc::now());
            task.run_count += 1;
        }
        if let Err(e) = self.store.save(&tasks) {
            tracing::warn!("⚠️ Failed to save schedules: {e}");
        }
    }
}

/// The polling loop. Due tasks run serially in insertion order; a failed
/// run is logged and the loop keeps going.
async fn worker_loop(shared: Arc<SchedulerShared>, poll: Duration, guard: Duration) {
    tracing::info!("⏰ Scheduler started (check every {}s)", poll.as_secs());

    'poll: loop {
        tokio::select! {
            _ = tokio::time::sleep(poll) => {}
            _ = shared.stop_signal.notified() => {}
        }
        if shared.stopping.load(Ordering::SeqCst) {
            break;
        }

        let clock = Local::now().format(CLOCK_FORMAT).to_string();
        for task in shared.due_tasks(&clock) {
            tracing::info!("🔔 Scheduled campaign due at {}: {}", task.time, task.id);
            let id = task.id.clone();
            match (shared.executor)(task).await {
                Ok(summary) => {
                    tracing::info!(
                        "✅ Scheduled campaign done: {} sent ({:?})",
                        summary.sent,
                        summary.reason
                    );
                }
                Err(e) => {
                    tracing::warn!("⚠️ Scheduled campaign failed: {e}");
                }
            }
            shared.mark_ran(&id);

            tokio::select! {
                _ = tokio::time::sleep(guard) => {}
                _ = shared.stop_signal.notified() => {}
            }
            if shared.stopping.load(Ordering::SeqCst) {
                break 'poll;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;
    use std::path::PathBuf;

    use gramreach_core::error::GramReachError;
    use gramreach_core::types::{CampaignConfig, StopReason};

    type Recorder = Arc<Mutex<Vec<String>>>;

    fn campaign(message: &str) -> CampaignConfig {
        CampaignConfig {
            username: "user".into(),
            password: "pass".into(),
            message: message.into(),
            ..Default::default()
        }
    }

    fn task_at(time: &str, message: &str) -> ScheduledTask {
        ScheduledTask::new(time, campaign(message), "profiles.csv").unwrap()
    }

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(name);
        std::fs::remove_dir_all(&dir).ok();
        dir
    }

    fn noop_scheduler(dir: &Path) -> TaskScheduler {
        TaskScheduler::new(dir, |_task| async {
            Ok(RunSummary {
                sent: 0,
                reason: StopReason::Completed,
            })
        })
    }

    fn current_minute() -> String {
        Local::now().format(CLOCK_FORMAT).to_string()
    }

    /// Worker tests trigger on the current minute; don't start one right
    /// before the minute rolls over.
    async fn settle_minute_boundary() {
        if Local::now().second() >= 57 {
            tokio::time::sleep(Duration::from_secs(4)).await;
        }
    }

    async fn wait_until(mut cond: impl FnMut() -> bool) {
        for _ in 0..500 {
            if cond() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not met within 5s");
    }

    #[tokio::test]
    async fn test_tasks_persist_across_restart() {
        let dir = temp_dir("gramreach-test-sched-persist");
        let sched = noop_scheduler(&dir);
        sched.add_task(task_at("09:00", "hi")).unwrap();
        sched.add_task(task_at("18:30", "hi")).unwrap();

        let reloaded = noop_scheduler(&dir);
        let tasks = reloaded.list_tasks();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].time, "09:00");
        assert_eq!(tasks[1].time, "18:30");
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_remove_task_by_id() {
        let dir = temp_dir("gramreach-test-sched-remove");
        let sched = noop_scheduler(&dir);
        let task = task_at("09:00", "hi");
        let id = task.id.clone();
        sched.add_task(task).unwrap();

        assert!(sched.remove_task(&id));
        assert!(sched.list_tasks().is_empty());
        // Stale id: already gone.
        assert!(!sched.remove_task(&id));
        assert!(!sched.remove_task("no-such-task"));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_due_tasks_exact_minute_in_insertion_order() {
        let dir = temp_dir("gramreach-test-sched-due");
        let sched = noop_scheduler(&dir);
        let first = task_at("09:00", "first");
        let other = task_at("12:30", "other");
        let second = task_at("9:00", "second");
        let (a, b) = (first.id.clone(), second.id.clone());
        sched.add_task(first).unwrap();
        sched.add_task(other).unwrap();
        sched.add_task(second).unwrap();

        let due = sched.due_tasks("09:00");
        assert_eq!(due.len(), 2);
        assert_eq!(due[0].id, a);
        assert_eq!(due[1].id, b);
        assert!(sched.due_tasks("09:01").is_empty());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_worker_executes_due_task_once() {
        settle_minute_boundary().await;
        let dir = temp_dir("gramreach-test-sched-exec");
        let recorder: Recorder = Arc::new(Mutex::new(Vec::new()));
        let rec = recorder.clone();
        let sched = TaskScheduler::new(&dir, move |task: ScheduledTask| {
            let rec = rec.clone();
            async move {
                rec.lock().unwrap().push(task.id);
                Ok(RunSummary {
                    sent: 2,
                    reason: StopReason::Completed,
                })
            }
        })
        .with_intervals(Duration::from_millis(10), Duration::from_secs(10));

        let task = task_at(&current_minute(), "hi");
        let id = task.id.clone();
        sched.add_task(task).unwrap();

        sched.start();
        // Second start while the worker lives must not add a worker.
        sched.start();
        assert!(sched.is_running());

        wait_until(|| !recorder.lock().unwrap().is_empty()).await;
        // The guard sleep keeps the single worker from re-firing; a
        // duplicate worker would have fired again by now.
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(*recorder.lock().unwrap(), vec![id.clone()]);

        let tasks = sched.list_tasks();
        assert_eq!(tasks[0].run_count, 1);
        assert!(tasks[0].last_run.is_some());

        sched.stop().await;
        assert!(!sched.is_running());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_same_minute_tasks_run_serially_and_errors_continue() {
        settle_minute_boundary().await;
        let dir = temp_dir("gramreach-test-sched-serial");
        let recorder: Recorder = Arc::new(Mutex::new(Vec::new()));
        let rec = recorder.clone();
        let sched = TaskScheduler::new(&dir, move |task: ScheduledTask| {
            let rec = rec.clone();
            async move {
                rec.lock().unwrap().push(task.id);
                if task.config.message == "boom" {
                    Err(GramReachError::Session("driver gone".into()))
                } else {
                    Ok(RunSummary {
                        sent: 1,
                        reason: StopReason::Completed,
                    })
                }
            }
        })
        .with_intervals(Duration::from_millis(10), Duration::from_millis(10));

        let now = current_minute();
        let failing = task_at(&now, "boom");
        let healthy = task_at(&now, "hi");
        let (a, b) = (failing.id.clone(), healthy.id.clone());
        sched.add_task(failing).unwrap();
        sched.add_task(healthy).unwrap();

        sched.start();
        wait_until(|| recorder.lock().unwrap().len() >= 2).await;
        sched.stop().await;

        let seen = recorder.lock().unwrap().clone();
        assert_eq!(&seen[..2], &[a, b]);
        // Both stamped, the failed one included.
        for task in sched.list_tasks() {
            assert!(task.run_count >= 1);
        }
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_stop_waits_for_in_flight_run() {
        settle_minute_boundary().await;
        let dir = temp_dir("gramreach-test-sched-stop");
        let recorder: Recorder = Arc::new(Mutex::new(Vec::new()));
        let rec = recorder.clone();
        let sched = TaskScheduler::new(&dir, move |_task: ScheduledTask| {
            let rec = rec.clone();
            async move {
                rec.lock().unwrap().push("begin".into());
                tokio::time::sleep(Duration::from_millis(200)).await;
                rec.lock().unwrap().push("end".into());
                Ok(RunSummary {
                    sent: 0,
                    reason: StopReason::Completed,
                })
            }
        })
        .with_intervals(Duration::from_millis(10), Duration::from_secs(10));

        sched.add_task(task_at(&current_minute(), "hi")).unwrap();
        sched.start();
        wait_until(|| !recorder.lock().unwrap().is_empty()).await;

        sched.stop().await;
        // Join semantics: the in-flight run finished before stop returned.
        assert_eq!(*recorder.lock().unwrap(), vec!["begin", "end"]);
        assert!(!sched.is_running());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_stop_without_start_is_noop() {
        let dir = temp_dir("gramreach-test-sched-nostart");
        let sched = noop_scheduler(&dir);
        sched.stop().await;
        assert!(!sched.is_running());
        std::fs::remove_dir_all(&dir).ok();
    }
}
