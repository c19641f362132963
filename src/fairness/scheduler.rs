//! # Refresh Scheduler
//!
//! Runs a refresh pass on a fixed interval in the background.
//!
//! The loop owns a dedicated worker thread hosting a single-threaded tokio
//! runtime, so it keeps ticking no matter what the caller's threads (or
//! the caller's own runtime) are doing. A failing or panicking pass is
//! logged and the loop moves on to the next tick; only `shutdown` (or
//! dropping the scheduler) ends it.

use std::panic::{self, AssertUnwindSafe};
use std::thread;
use std::time::Duration;

use tokio::runtime::Builder;
use tokio::sync::oneshot;
use tokio::time::{self, Instant, MissedTickBehavior};

use super::errors::{FairnessError, FairnessResult};
use super::rebalancer::RebalanceOutcome;

const WORKER_THREAD_NAME: &str = "permit-refresh";

/// How often permit capacities are recomputed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshInterval {
    /// No background loop; passes run only when invoked manually
    Disabled,
    /// One pass per period
    Every(Duration),
}

impl RefreshInterval {
    /// Seconds form used by configuration files. `0` and `u64::MAX` disable
    /// the loop.
    pub fn from_secs(secs: u64) -> Self {
        if secs == 0 || secs == u64::MAX {
            Self::Disabled
        } else {
            Self::Every(Duration::from_secs(secs))
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::Every(_))
    }
}

impl From<Duration> for RefreshInterval {
    /// `Duration::MAX` is the disabled sentinel
    fn from(period: Duration) -> Self {
        if period == Duration::MAX {
            Self::Disabled
        } else {
            Self::Every(period)
        }
    }
}

/// Handle to a running refresh loop
#[derive(Debug)]
pub struct RefreshScheduler {
    shutdown_tx: Option<oneshot::Sender<()>>,
    worker: Option<thread::JoinHandle<u64>>,
}

impl RefreshScheduler {
    /// Spawn the refresh loop on its own worker thread.
    ///
    /// The first pass runs one full period after start. Works the same
    /// from plain threads and from inside any tokio runtime.
    pub fn start<F>(period: Duration, pass: F) -> FairnessResult<Self>
    where
        F: Fn() -> FairnessResult<RebalanceOutcome> + Send + 'static,
    {
        if period.is_zero() {
            return Err(FairnessError::InvalidRefreshInterval {
                reason: "period must be non-zero".to_string(),
            });
        }
        let start = Instant::now().checked_add(period).ok_or_else(|| {
            FairnessError::InvalidRefreshInterval {
                reason: format!("period {:?} overflows the timer", period),
            }
        })?;

        let runtime = Builder::new_current_thread()
            .enable_time()
            .build()
            .map_err(|e| FairnessError::SchedulerSpawn {
                reason: e.to_string(),
            })?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let worker = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || runtime.block_on(refresh_loop(start, period, pass, shutdown_rx)))
            .map_err(|e| FairnessError::SchedulerSpawn {
                reason: e.to_string(),
            })?;

        Ok(Self {
            shutdown_tx: Some(shutdown_tx),
            worker: Some(worker),
        })
    }

    /// Whether the worker thread is still alive
    pub fn is_running(&self) -> bool {
        self.worker
            .as_ref()
            .map(|w| !w.is_finished())
            .unwrap_or(false)
    }

    /// Stop the loop and wait for the worker thread to exit. A pass already
    /// in progress finishes first.
    ///
    /// Returns the number of ticks the loop handled, or `None` if the loop
    /// was already stopped.
    pub fn shutdown(&mut self) -> Option<u64> {
        if let Some(tx) = self.shutdown_tx.take() {
            // Receiver gone means the worker already exited
            let _ = tx.send(());
        }
        let worker = self.worker.take()?;
        if worker.thread().id() == thread::current().id() {
            // Dropped from inside a pass; the loop sees the signal on its own
            return None;
        }
        match worker.join() {
            Ok(passes) => Some(passes),
            Err(_) => {
                tracing::error!("permit refresh worker thread panicked outside a pass");
                None
            }
        }
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn refresh_loop<F>(
    start: Instant,
    period: Duration,
    pass: F,
    mut shutdown_rx: oneshot::Receiver<()>,
) -> u64
where
    F: Fn() -> FairnessResult<RebalanceOutcome>,
{
    let mut interval = time::interval_at(start, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::info!(period_ms = period.as_millis() as u64, "permit refresh loop starting");
    let mut passes = 0u64;
    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown_rx => break,
            _ = interval.tick() => {
                passes += 1;
                run_pass(&pass);
            }
        }
    }
    tracing::info!(passes, "permit refresh loop stopped");
    passes
}

fn run_pass<F>(pass: &F)
where
    F: Fn() -> FairnessResult<RebalanceOutcome>,
{
    match panic::catch_unwind(AssertUnwindSafe(pass)) {
        Ok(Ok(RebalanceOutcome::Applied(changes))) => {
            tracing::debug!(buckets = changes.len(), "scheduled permit refresh applied");
        }
        Ok(Ok(RebalanceOutcome::Skipped)) => {
            tracing::debug!("scheduled permit refresh skipped, no demand observed");
        }
        Ok(Err(e)) => {
            tracing::warn!(error = %e, code = e.error_code(), "scheduled permit refresh failed");
        }
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "<unknown panic payload>".to_string());
            tracing::error!(panic = %message, "scheduled permit refresh panicked");
        }
    }
}
