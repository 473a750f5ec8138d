//! Shared index state.
//!
//! One `IndexShared` is the process-wide context: the database behind its
//! access lock, the build flags behind theirs, the cancellation flag and
//! the scheduling clock. Components receive it by reference; there are no
//! ambient globals.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::cancel::CancelFlag;
use crate::database::Database;
use crate::engine::scheduler::SchedulerSignal;

/// Booleans guarded by the flag lock. Check-and-set under that lock is the
/// sole mechanism preventing two builds from running concurrently.
#[derive(Debug, Default)]
pub(crate) struct BuildFlags {
    pub build_in_progress: bool,
    pub reindex_in_progress: bool,
}

/// Process-wide indexing context.
#[derive(Debug)]
pub(crate) struct IndexShared {
    /// Root of the tree being indexed.
    pub root: PathBuf,
    /// Canonical storage path of the main database.
    pub index_path: PathBuf,
    /// Database-access lock. Held for the entire initial build, but only
    /// for the swap step of a reindex.
    pub db: Mutex<Database>,
    /// Build-flag lock.
    pub flags: Mutex<BuildFlags>,
    /// Cooperative cancellation, raised by `exit!`.
    pub cancel: CancelFlag,
    /// Wakes the periodic scheduler out of its sleep on shutdown.
    pub scheduler_signal: SchedulerSignal,
    /// Unix seconds of the last completed build; 0 before any build has
    /// finished in this process.
    pub last_build_finished: AtomicU64,
    /// On-disk mtime of the storage at load time, used as the schedule
    /// reference until a build completes.
    pub storage_mtime: AtomicU64,
}

impl IndexShared {
    pub fn note_build_finished(&self) {
        self.last_build_finished
            .store(unix_now_secs(), Ordering::Relaxed);
    }

    /// Reference point for the periodic scheduler: the last completed
    /// build, or the storage mtime before the first one.
    pub fn schedule_reference(&self) -> u64 {
        match self.last_build_finished.load(Ordering::Relaxed) {
            0 => self.storage_mtime.load(Ordering::Relaxed),
            finished => finished,
        }
    }
}

/// Returns the current Unix timestamp in seconds.
pub(crate) fn unix_now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|value| value.as_secs())
        .unwrap_or(0)
}
