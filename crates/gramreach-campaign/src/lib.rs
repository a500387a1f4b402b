//! # GramReach Campaign
//!
//! The campaign runner: drives a [`Messenger`](gramreach_core::traits::Messenger)
//! through a profile list with log-based dedup, randomized pacing, a
//! per-run send cap, and cooperative cancellation. Progress is published
//! over a watch channel; the runner owns all counters.

pub mod progress;
pub mod runner;

pub use progress::ProgressTracker;
pub use runner::{run, spawn_campaign, RunHandle};
