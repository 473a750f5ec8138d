//! Build/reindex engine and its concurrency protocol.
//!
//! The engine owns the process-wide [`IndexShared`] context and the build
//! and scheduler threads. Two locks coordinate everything: the database
//! lock serializes readers against the initial build and the swap step of
//! a reindex, and the flag lock makes starting a build an atomic
//! check-and-set so only one build can ever run at a time.

mod build;
mod scheduler;
mod shared;

use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::atomic::AtomicU64;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::cancel::CancelFlag;
use crate::database::{Database, INITIAL_CAPACITY};
use crate::error::{lock_poisoned_error, IndexError, Result};
use self::shared::{unix_now_secs, BuildFlags, IndexShared};

/// How `shutdown` treats in-flight work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownMode {
    /// Wait for any running build to complete.
    Graceful,
    /// Cancel builds and the scheduler at their next safe point.
    Forced,
}

/// Engine handle: one per process, created at startup and consumed by
/// [`Indexer::shutdown`].
#[derive(Debug)]
pub struct Indexer {
    shared: Arc<IndexShared>,
    build_thread: Mutex<Option<JoinHandle<()>>>,
    scheduler_thread: Mutex<Option<JoinHandle<()>>>,
}

impl Indexer {
    /// Loads the database at `index_path`, or creates it and starts the
    /// initial build (which holds the database lock for its entire walk).
    /// The returned flag tells whether an existing index was loaded.
    pub fn open(root: &Path, index_path: &Path) -> Result<(Self, bool)> {
        // A temp database can only be left behind by a crashed process.
        match fs::remove_file(build::temp_index_path(index_path)) {
            Ok(()) => log::warn!("removed orphaned temp database from a previous run"),
            Err(error) if error.kind() == ErrorKind::NotFound => {}
            Err(error) => log::warn!("cannot remove orphaned temp database: {error}"),
        }

        let existing = Database::open(index_path)?;
        let loaded = existing.is_some();
        let (db, mtime) = match existing {
            Some(db) => (db, file_mtime_secs(index_path)),
            None => (
                Database::create(index_path, INITIAL_CAPACITY)?,
                unix_now_secs(),
            ),
        };
        let entries = db.len();

        let shared = Arc::new(IndexShared {
            root: root.to_path_buf(),
            index_path: index_path.to_path_buf(),
            db: Mutex::new(db),
            flags: Mutex::new(BuildFlags::default()),
            cancel: CancelFlag::new(),
            scheduler_signal: scheduler::SchedulerSignal::default(),
            last_build_finished: AtomicU64::new(0),
            storage_mtime: AtomicU64::new(mtime),
        });
        let indexer = Self {
            shared: shared.clone(),
            build_thread: Mutex::new(None),
            scheduler_thread: Mutex::new(None),
        };

        if loaded {
            log::info!(
                "index loaded path={} entries={entries}",
                index_path.display()
            );
        } else {
            let guard = build::try_begin_build(&shared, false)?
                .ok_or_else(|| IndexError::Internal("build flag set before startup".to_string()))?;
            let build_shared = shared.clone();
            let handle = std::thread::spawn(move || build::run_initial_build(build_shared, guard));
            *indexer
                .build_thread
                .lock()
                .map_err(|_| lock_poisoned_error("build thread"))? = Some(handle);
            log::info!(
                "index created path={} root={}, initial build started",
                index_path.display(),
                root.display()
            );
        }

        Ok((indexer, loaded))
    }

    /// Starts a reindex unless a build is already in progress. Returns
    /// whether one was started.
    pub fn trigger_reindex(&self) -> Result<bool> {
        let Some(guard) = build::try_begin_build(&self.shared, true)? else {
            return Ok(false);
        };
        let shared = self.shared.clone();
        let handle = std::thread::spawn(move || build::run_reindex(shared, guard));

        let mut slot = self
            .build_thread
            .lock()
            .map_err(|_| lock_poisoned_error("build thread"))?;
        // The previous build finished (the flags were clear); reap it.
        if let Some(previous) = slot.take() {
            let _ = previous.join();
        }
        *slot = Some(handle);
        Ok(true)
    }

    pub fn build_in_progress(&self) -> Result<bool> {
        Ok(self
            .shared
            .flags
            .lock()
            .map_err(|_| lock_poisoned_error("build flags"))?
            .build_in_progress)
    }

    /// Runs `f` against the main database under the database-access lock.
    /// Everything `f` sees is one consistent snapshot.
    pub fn read<R>(&self, f: impl FnOnce(&Database) -> R) -> Result<R> {
        let db = self
            .shared
            .db
            .lock()
            .map_err(|_| lock_poisoned_error("database"))?;
        Ok(f(&db))
    }

    /// Starts the periodic scheduler. The interval is validated by the CLI.
    pub fn start_scheduler(&self, interval: Duration) -> Result<()> {
        let shared = self.shared.clone();
        let handle = std::thread::spawn(move || scheduler::run(shared, interval));
        *self
            .scheduler_thread
            .lock()
            .map_err(|_| lock_poisoned_error("scheduler thread"))? = Some(handle);
        Ok(())
    }

    /// Tears the engine down on every exit path. Consuming `self` makes
    /// the handler run at most once; each step is best-effort with errors
    /// logged. After the joins nothing is in flight: the build threads'
    /// own guards have either finalized or discarded any reindex.
    pub fn shutdown(self, mode: ShutdownMode) {
        if mode == ShutdownMode::Forced {
            self.shared.cancel.cancel();
        }
        self.shared.scheduler_signal.shutdown();

        if let Some(handle) = take_handle(&self.scheduler_thread) {
            let _ = handle.join();
        }
        if let Some(handle) = take_handle(&self.build_thread) {
            let _ = handle.join();
        }

        match self.shared.db.lock() {
            Ok(db) => {
                if let Err(error) = db.flush() {
                    log::warn!("final flush failed: {error}");
                }
            }
            Err(_) => log::warn!("database lock poisoned during shutdown"),
        }
        log::info!("index shutdown complete");
    }
}

fn take_handle(slot: &Mutex<Option<JoinHandle<()>>>) -> Option<JoinHandle<()>> {
    slot.lock().ok().and_then(|mut slot| slot.take())
}

fn file_mtime_secs(path: &Path) -> u64 {
    fs::metadata(path)
        .and_then(|metadata| metadata.modified())
        .ok()
        .and_then(|value| value.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|value| value.as_secs())
        .unwrap_or(0)
}
