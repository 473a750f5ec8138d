//! Periodic reindex scheduling.
//!
//! The scheduler thread measures elapsed time against the last completed
//! build (or the storage mtime before the first one) and runs a reindex
//! inline whenever the interval has passed and no build is active. Its
//! sleep is a condvar wait so shutdown wakes it immediately instead of
//! waiting out the interval.

use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use crate::engine::build::{run_reindex, try_begin_build};
use crate::engine::shared::{unix_now_secs, IndexShared};

/// Sleep floor: an overdue interval must not degrade into a busy loop.
const MIN_SLEEP: Duration = Duration::from_secs(1);

/// Shutdown signal the scheduler sleeps on.
#[derive(Debug, Default)]
pub(crate) struct SchedulerSignal {
    stop: Mutex<bool>,
    condvar: Condvar,
}

impl SchedulerSignal {
    pub fn shutdown(&self) {
        if let Ok(mut stop) = self.stop.lock() {
            *stop = true;
        }
        self.condvar.notify_all();
    }

    /// Sleeps for up to `timeout`; returns true once shutdown is requested.
    /// A spurious early wakeup only costs one extra scheduling pass.
    pub fn wait(&self, timeout: Duration) -> bool {
        let Ok(stop) = self.stop.lock() else {
            return true;
        };
        if *stop {
            return true;
        }
        match self.condvar.wait_timeout(stop, timeout) {
            Ok((stop, _)) => *stop,
            Err(_) => true,
        }
    }
}

/// Scheduler loop. Terminates only on shutdown or cancellation.
pub(crate) fn run(shared: Arc<IndexShared>, interval: Duration) {
    log::info!(
        "periodic reindexing enabled interval_secs={}",
        interval.as_secs()
    );
    loop {
        if shared.cancel.is_cancelled() {
            break;
        }

        let elapsed = elapsed_since_reference(&shared);
        if elapsed > interval {
            match try_begin_build(&shared, true) {
                Ok(Some(guard)) => {
                    log::info!("interval elapsed, starting scheduled reindex");
                    run_reindex(shared.clone(), guard);
                }
                Ok(None) => {
                    log::debug!("scheduled reindex skipped, build already in progress");
                }
                Err(error) => {
                    log::error!("scheduler stopping: {error}");
                    break;
                }
            }
        }

        let remaining = next_sleep(interval, elapsed_since_reference(&shared));
        if shared.scheduler_signal.wait(remaining) {
            break;
        }
    }
    log::debug!("scheduler stopped");
}

fn elapsed_since_reference(shared: &IndexShared) -> Duration {
    Duration::from_secs(unix_now_secs().saturating_sub(shared.schedule_reference()))
}

/// Time until the next check, clamped so an overrunning build cannot
/// produce a zero or negative sleep.
fn next_sleep(interval: Duration, elapsed: Duration) -> Duration {
    interval.saturating_sub(elapsed).max(MIN_SLEEP)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn sleep_is_the_remaining_interval() {
        assert_eq!(
            next_sleep(Duration::from_secs(60), Duration::from_secs(10)),
            Duration::from_secs(50)
        );
    }

    #[test]
    fn overdue_interval_clamps_to_floor() {
        assert_eq!(
            next_sleep(Duration::from_secs(60), Duration::from_secs(60)),
            MIN_SLEEP
        );
        assert_eq!(
            next_sleep(Duration::from_secs(60), Duration::from_secs(3600)),
            MIN_SLEEP
        );
    }

    #[test]
    fn shutdown_wakes_a_sleeping_wait() {
        let signal = Arc::new(SchedulerSignal::default());
        let waiter = signal.clone();
        let started = Instant::now();
        let handle = std::thread::spawn(move || waiter.wait(Duration::from_secs(30)));
        std::thread::sleep(Duration::from_millis(50));
        signal.shutdown();
        assert!(handle.join().unwrap());
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn wait_after_shutdown_returns_immediately() {
        let signal = SchedulerSignal::default();
        signal.shutdown();
        assert!(signal.wait(Duration::from_secs(30)));
    }
}
