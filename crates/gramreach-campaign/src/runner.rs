//! The campaign loop: dedup, pacing, cancellation, guaranteed teardown.
//!
//! One invocation works through one profile list in source order. Dedup is
//! snapshot-based: the set of already-messaged profiles is read from the
//! result log once at run start and extended in memory as sends succeed.
//! Entries written by another run while this one is in flight are not
//! re-read.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use rand::Rng;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use gramreach_core::traits::Messenger;
use gramreach_core::types::{
    CampaignConfig, Profile, ResultRecord, RunProgress, RunSummary, SendStatus, StopReason,
};
use gramreach_store::ResultLog;

use crate::progress::ProgressTracker;

/// Run one campaign to completion.
///
/// The messenger is closed exactly once before returning, on every exit
/// path: auth failure, limit, cancellation, or list exhaustion. Every
/// attempted profile gets one result row; skipped profiles get none.
pub async fn run<M: Messenger>(
    messenger: &mut M,
    profiles: &[Profile],
    config: &CampaignConfig,
    log: &ResultLog,
    cancel: &AtomicBool,
    progress: &mut ProgressTracker,
) -> RunSummary {
    log.initialize();
    let sent_before = log.successful_profiles();
    tracing::info!(
        "🚀 Starting campaign: {} profiles, limit {}, {} already messaged",
        profiles.len(),
        config.max_messages,
        sent_before.len()
    );

    let summary = match messenger.login(&config.username, &config.password).await {
        Ok(()) => send_loop(messenger, profiles, config, log, cancel, progress, sent_before).await,
        Err(e) => {
            tracing::error!("❌ Login failed, aborting campaign: {e}");
            RunSummary {
                sent: 0,
                reason: StopReason::AuthFailed,
            }
        }
    };

    messenger.close().await;
    progress.finish(summary.reason);
    tracing::info!(
        "🏁 Campaign finished: {} sent ({:?})",
        summary.sent,
        summary.reason
    );
    summary
}

/// The per-profile loop. Runs only on an authenticated messenger; never
/// touches the session afterwards, so the caller can close it uncondi-
/// tionally.
async fn send_loop<M: Messenger>(
    messenger: &mut M,
    profiles: &[Profile],
    config: &CampaignConfig,
    log: &ResultLog,
    cancel: &AtomicBool,
    progress: &mut ProgressTracker,
    mut already_sent: HashSet<Profile>,
) -> RunSummary {
    let mut sent: u32 = 0;
    let mut reason = StopReason::Completed;
    let interval = Duration::from_secs(config.time_interval_secs);
    let mut interval_clock = tokio::time::Instant::now();

    for profile in profiles {
        if already_sent.contains(profile) {
            tracing::info!("⏭️ Skipping {profile} (already messaged)");
            progress.record_skip();
            continue;
        }
        if cancel.load(Ordering::SeqCst) {
            tracing::info!("🛑 Cancellation requested, stopping after current profile");
            reason = StopReason::Cancelled;
            break;
        }
        if sent >= config.max_messages {
            tracing::info!("🔒 Message limit reached ({sent}/{})", config.max_messages);
            reason = StopReason::LimitReached;
            break;
        }

        match messenger.send_message(profile, &config.message).await {
            Ok(()) => {
                log.append(&ResultRecord::new(
                    profile.clone(),
                    SendStatus::Success,
                    &config.message,
                    "",
                ));
                sent += 1;
                already_sent.insert(profile.clone());
                progress.record_sent();
            }
            Err(e) => {
                tracing::warn!("⚠️ Send to {profile} failed: {e}");
                log.append(&ResultRecord::new(
                    profile.clone(),
                    SendStatus::Failed,
                    &config.message,
                    &e.to_string(),
                ));
                progress.record_failed();
            }
        }

        if interval_clock.elapsed() >= interval {
            let mins = uniform_range(
                config.cooldown_min_mins as f64,
                config.cooldown_max_mins as f64,
            );
            tracing::info!("😴 Batch interval elapsed, cooling down for {mins:.1} min");
            pace_sleep(Duration::from_secs_f64(mins * 60.0)).await;
            interval_clock = tokio::time::Instant::now();
        }

        let (dmin, dmax) = config.message_delay_secs;
        pace_sleep(Duration::from_secs_f64(uniform_range(dmin, dmax))).await;
    }

    RunSummary { sent, reason }
}

/// Uniformly random value in `[min, max]`; a degenerate range yields `min`.
fn uniform_range(min: f64, max: f64) -> f64 {
    if max > min {
        rand::thread_rng().gen_range(min..=max)
    } else {
        min
    }
}

async fn pace_sleep(duration: Duration) {
    if !duration.is_zero() {
        tokio::time::sleep(duration).await;
    }
}

/// A campaign running as a background task.
///
/// Created by [`spawn_campaign`]; the dashboard keeps one of these per
/// launch and polls [`RunHandle::latest`] for display.
pub struct RunHandle {
    progress: watch::Receiver<RunProgress>,
    cancel: Arc<AtomicBool>,
    task: JoinHandle<RunSummary>,
}

impl RunHandle {
    /// Most recent progress snapshot.
    pub fn latest(&self) -> RunProgress {
        *self.progress.borrow()
    }

    /// A fresh receiver for an observer that wants to watch for changes.
    pub fn subscribe(&self) -> watch::Receiver<RunProgress> {
        self.progress.clone()
    }

    /// Ask the run to stop. The current profile attempt still completes.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the run and return its summary. `None` if the task
    /// panicked.
    pub async fn join(self) -> Option<RunSummary> {
        self.task.await.ok()
    }
}

/// Launch a campaign on a background task and hand back its handle.
pub fn spawn_campaign<M>(
    mut messenger: M,
    profiles: Vec<Profile>,
    config: CampaignConfig,
    log: ResultLog,
) -> RunHandle
where
    M: Messenger + 'static,
{
    let cancel = Arc::new(AtomicBool::new(false));
    let (mut progress, rx) =
        ProgressTracker::channel(profiles.len() as u32, config.max_messages);

    let flag = cancel.clone();
    let task = tokio::spawn(async move {
        run(&mut messenger, &profiles, &config, &log, &flag, &mut progress).await
    });

    RunHandle {
        progress: rx,
        cancel,
        task,
    }
}
