//! Scheduler for periodic background jobs.
//!
//! Each job runs in its own task on a fixed interval. The first run happens
//! one full interval after registration; a run that overlaps the next tick
//! delays it instead of starting a second copy, and ticks missed meanwhile
//! are skipped. Shutdown lets a run in progress finish.

use std::fmt::Display;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

struct Job {
    name: String,
    handle: JoinHandle<()>,
}

/// Owns the periodic job tasks. Dropping the scheduler stops every job
/// after its current run.
pub struct Scheduler {
    shutdown: watch::Sender<bool>,
    jobs: Mutex<Vec<Job>>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            shutdown,
            jobs: Mutex::new(Vec::new()),
        }
    }

    /// Run `job` every `interval` until shutdown. Job errors are logged and
    /// the schedule continues.
    pub fn run_periodic<F, Fut, E>(&self, name: impl Into<String>, interval: Duration, job: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Display,
    {
        let name = name.into();
        let mut shutdown = self.shutdown.subscribe();
        let task_name = name.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            info!(job = %task_name, interval_secs = interval.as_secs(), "Periodic job scheduled");

            loop {
                tokio::select! {
                    biased;
                    _ = shutdown.changed() => break,
                    _ = ticker.tick() => {}
                }
                if *shutdown.borrow() {
                    break;
                }

                let started = Instant::now();
                match job().await {
                    Ok(()) => debug!(
                        job = %task_name,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Periodic job finished"
                    ),
                    Err(e) => error!(job = %task_name, error = %e, "Periodic job failed"),
                }
            }

            info!(job = %task_name, "Periodic job stopped");
        });

        self.lock_jobs().push(Job { name, handle });
    }

    /// Names of the registered jobs, in registration order.
    pub fn job_names(&self) -> Vec<String> {
        self.lock_jobs().iter().map(|j| j.name.clone()).collect()
    }

    /// Signal every job to stop after its current run.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    /// Wait for every job task to exit. Call after [`Scheduler::shutdown`].
    pub async fn join(&self) {
        let jobs: Vec<Job> = std::mem::take(&mut *self.lock_jobs());
        for job in jobs {
            if let Err(e) = job.handle.await {
                warn!(job = %job.name, error = %e, "Periodic job task ended abnormally");
            }
        }
    }

    fn lock_jobs(&self) -> std::sync::MutexGuard<'_, Vec<Job>> {
        self.jobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
