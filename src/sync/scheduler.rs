//! Background triggers for push and pull.
//!
//! Two tasks run per scheduler:
//! - the push task watches the queue count and pushes whenever it grows;
//! - the timer task ticks immediately and then every pull interval, retrying
//!   push (for items left by failed attempts) and running a pull. A sign-in
//!   triggers the same work right away.
//!
//! Push and pull may interleave; the pull's dirty and pending-removal
//! exclusions keep it off anything push still owns.

use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::{SyncOutcome, SyncService};
use crate::config::SyncConfig;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SchedulerOptions {
    pub pull_interval: Duration,
    pub push_on_change: bool,
}

impl From<&SyncConfig> for SchedulerOptions {
    fn from(config: &SyncConfig) -> Self {
        Self {
            pull_interval: Duration::from_secs(config.pull_interval_secs),
            push_on_change: config.push_on_change,
        }
    }
}

pub struct Scheduler;

impl Scheduler {
    /// Spawns the background tasks. Must be called within a tokio runtime.
    pub fn start(service: SyncService, options: SchedulerOptions) -> SchedulerHandle {
        let (stop_tx, stop_rx) = watch::channel(false);
        let mut tasks = Vec::new();

        if options.push_on_change {
            tasks.push(tokio::spawn(push_loop(service.clone(), stop_rx.clone())));
        }
        tasks.push(tokio::spawn(timer_loop(service, options.pull_interval, stop_rx)));

        info!(
            "Scheduler started (pull every {}s, push on change: {})",
            options.pull_interval.as_secs(),
            options.push_on_change
        );
        SchedulerHandle { stop: stop_tx, tasks }
    }
}

/// Owner of the scheduler's tasks.
pub struct SchedulerHandle {
    stop: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl SchedulerHandle {
    /// Signals both tasks to stop and waits for them. A push or pull already
    /// in flight finishes first.
    pub async fn shutdown(self) {
        let _ = self.stop.send(true);
        for task in self.tasks {
            if let Err(e) = task.await {
                warn!("Scheduler task ended abnormally: {e}");
            }
        }
        info!("Scheduler stopped");
    }
}

async fn push_loop(service: SyncService, mut stop: watch::Receiver<bool>) {
    let mut pending = service.queue().subscribe();
    // Queue count left behind by our own runs: retained items and other
    // users' items. Only growth past it is new work.
    let mut floor = 0;

    loop {
        loop {
            let count = *pending.borrow_and_update();
            if count <= floor {
                floor = count;
                break;
            }
            floor = push_until_settled(&service).await;
        }

        tokio::select! {
            _ = stop.changed() => break,
            changed = pending.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }
    debug!("Push task stopped");
}

/// Pushes until a run leaves nothing but retained items behind. A run
/// already in flight is waited out rather than skipped, since it may have
/// read the queue before the newest items were added. Returns the queue
/// count observed after the last run.
async fn push_until_settled(service: &SyncService) -> u64 {
    loop {
        let outcome = service.push().await;
        let retained = match &outcome {
            SyncOutcome::AlreadyRunning => {
                debug!("Push in flight, running again once it ends");
                service.push_idle().await;
                continue;
            }
            SyncOutcome::Completed(report) => Some(report.retained),
            _ => None,
        };
        log_push(&outcome);

        let floor = service.queue().pending();
        let (Some(retained), Some(user_id)) = (retained, service.session().user_id()) else {
            return floor;
        };
        match service.queue().len_for_user(&user_id).await {
            // Items queued while the run was going
            Ok(queued) if queued > retained as u64 => continue,
            Ok(_) => return floor,
            Err(e) => {
                warn!("Could not recount the queue: {e:#}");
                return floor;
            }
        }
    }
}

async fn timer_loop(service: SyncService, interval: Duration, mut stop: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut session = service.session().subscribe();

    loop {
        tokio::select! {
            _ = stop.changed() => break,
            _ = ticker.tick() => sync_now(&service).await,
            changed = session.changed() => {
                if changed.is_err() {
                    break;
                }
                let signed_in = session.borrow_and_update().is_some();
                if signed_in {
                    info!("Session started, syncing now");
                    sync_now(&service).await;
                    ticker.reset();
                }
            }
        }
    }
    debug!("Timer task stopped");
}

/// Retries pending pushes, then pulls.
async fn sync_now(service: &SyncService) {
    if service.queue().pending() > 0 {
        log_push(&service.push().await);
    }
    match service.pull().await {
        SyncOutcome::Completed(report) if !report.failed.is_empty() => {
            warn!("Pull completed with failures: {:?}", report.failed);
        }
        SyncOutcome::Failed(message) => warn!("Pull failed: {message}"),
        _ => {}
    }
}

fn log_push(outcome: &SyncOutcome<super::PushReport>) {
    match outcome {
        SyncOutcome::AlreadyRunning => debug!("Push skipped, another run is in flight"),
        SyncOutcome::NoSession => debug!("Push skipped, no session"),
        SyncOutcome::Failed(message) => warn!("Push failed: {message}"),
        SyncOutcome::Completed(report) if report.retained > 0 => {
            debug!("{} mutations left for the next attempt", report.retained);
        }
        SyncOutcome::Completed(_) => {}
    }
}
