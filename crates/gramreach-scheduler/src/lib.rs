//! # GramReach Scheduler
//!
//! Daily wall-clock scheduling for campaigns. A single polling worker
//! compares the local `HH:MM` clock against persisted schedule entries
//! and hands each due entry to an injected executor. File-based state,
//! zero overhead when idle.

pub mod engine;
pub mod store;
pub mod tasks;

pub use engine::{GUARD_INTERVAL, POLL_INTERVAL, TaskExecutor, TaskFuture, TaskScheduler};
pub use store::TaskStore;
pub use tasks::{CLOCK_FORMAT, ScheduledTask, normalize_clock_time};
