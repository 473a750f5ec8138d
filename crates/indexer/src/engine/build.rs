//! Initial build and reindex execution.
//!
//! Both build paths run under a `FlagGuard` so the build flags are cleared
//! on every exit path, including cancellation. A reindex additionally holds
//! a `TempFileGuard` that removes the half-built temporary database unless
//! the swap went through.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::database::Database;
use crate::engine::shared::IndexShared;
use crate::error::{lock_poisoned_error, IndexError, Result};
use crate::walk::walk;

/// Sibling path the reindex builds into before the swap.
pub(crate) fn temp_index_path(index_path: &Path) -> PathBuf {
    let mut name = index_path.as_os_str().to_os_string();
    name.push("-temp");
    PathBuf::from(name)
}

/// Clears the build flags when dropped.
pub(crate) struct FlagGuard {
    shared: Arc<IndexShared>,
    reindex: bool,
}

impl Drop for FlagGuard {
    fn drop(&mut self) {
        if let Ok(mut flags) = self.shared.flags.lock() {
            flags.build_in_progress = false;
            if self.reindex {
                flags.reindex_in_progress = false;
            }
        }
    }
}

/// The atomic check-and-set: returns `None` when a build is already in
/// progress, otherwise marks one started and hands back the clearing guard.
pub(crate) fn try_begin_build(shared: &Arc<IndexShared>, reindex: bool) -> Result<Option<FlagGuard>> {
    let mut flags = shared
        .flags
        .lock()
        .map_err(|_| lock_poisoned_error("build flags"))?;
    if flags.build_in_progress {
        return Ok(None);
    }
    flags.build_in_progress = true;
    flags.reindex_in_progress = reindex;
    drop(flags);
    Ok(Some(FlagGuard {
        shared: shared.clone(),
        reindex,
    }))
}

/// Removes the temp database file on drop unless the swap disarmed it.
struct TempFileGuard {
    path: PathBuf,
    armed: bool,
}

impl TempFileGuard {
    fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Err(error) = fs::remove_file(&self.path) {
            if error.kind() != std::io::ErrorKind::NotFound {
                log::warn!(
                    "failed to remove temp database {}: {error}",
                    self.path.display()
                );
            }
        }
    }
}

/// Entry point for the initial-build thread.
pub(crate) fn run_initial_build(shared: Arc<IndexShared>, guard: FlagGuard) {
    let result = initial_build(&shared);
    finish_build("indexing", result, guard);
}

/// Entry point for a reindex, on its own thread (the `index` command) or
/// inline on the scheduler thread.
pub(crate) fn run_reindex(shared: Arc<IndexShared>, guard: FlagGuard) {
    let result = reindex(&shared);
    finish_build("reindexing", result, guard);
}

/// Builds the main database in place. The database lock is held for the
/// whole walk: this only runs before the system is advertised as ready, so
/// blocking queries for the duration is acceptable.
fn initial_build(shared: &Arc<IndexShared>) -> Result<usize> {
    let mut db = shared
        .db
        .lock()
        .map_err(|_| lock_poisoned_error("database"))?;
    let appended = walk(&shared.root, &mut db, &shared.cancel)?;
    db.flush()?;
    drop(db);

    shared.note_build_finished();
    Ok(appended)
}

/// Builds a temporary database without the database lock, then atomically
/// swaps it in. Readers keep the old view for the entire walk.
fn reindex(shared: &Arc<IndexShared>) -> Result<usize> {
    let capacity = shared
        .db
        .lock()
        .map_err(|_| lock_poisoned_error("database"))?
        .capacity();

    let temp_path = temp_index_path(&shared.index_path);
    let mut temp_guard = TempFileGuard::new(temp_path.clone());
    let mut temp = Database::create(&temp_path, capacity)?;
    let appended = walk(&shared.root, &mut temp, &shared.cancel)?;
    temp.flush()?;

    if shared.cancel.is_cancelled() {
        return Err(IndexError::Cancelled);
    }
    let mut db = shared
        .db
        .lock()
        .map_err(|_| lock_poisoned_error("database"))?;
    // Rename-first swap: the canonical file is atomically replaced before
    // the old mapping goes away, so no point of this sequence leaves the
    // canonical path without a complete database.
    fs::rename(&temp_path, &shared.index_path).map_err(|source| IndexError::Storage {
        path: shared.index_path.clone(),
        source,
    })?;
    temp_guard.disarm();
    temp.set_path(shared.index_path.clone());
    *db = temp;
    drop(db);

    shared.note_build_finished();
    Ok(appended)
}

/// Common tail of every build: clear the flags first, then report. Fatal
/// storage errors terminate the process once no lock or guard is held.
fn finish_build(what: &str, result: Result<usize>, guard: FlagGuard) {
    drop(guard);
    match result {
        Ok(appended) => log::info!("{what} finished, {appended} entries indexed"),
        Err(IndexError::Cancelled) => log::info!("{what} cancelled"),
        Err(error) => {
            log::error!("{what} failed: {error}");
            if error.is_fatal() {
                std::process::exit(1);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temp_path_is_a_sibling() {
        assert_eq!(
            temp_index_path(Path::new("/home/u/.mole-index")),
            PathBuf::from("/home/u/.mole-index-temp")
        );
    }
}
