//! Directory traversal feeding the build-target database.
//!
//! The walk is physical (symlinks are never followed) and depth-first in
//! preorder: a directory's record lands before its children. Directory
//! entries are sorted by name so the resulting database is deterministic
//! for a given tree.

use std::fs::{self, Metadata};
use std::os::unix::fs::MetadataExt;
use std::path::Path;

use crate::cancel::CancelFlag;
use crate::classify::classify_file;
use crate::database::Database;
use crate::error::{IndexError, Result};
use crate::record::{IndexedRecord, TypeTag};

/// Walks `root`, appending a record for every directory and every
/// signature-matched regular file. Returns the number of records appended.
///
/// Unreadable entries are logged and skipped; cancellation aborts the walk
/// with [`IndexError::Cancelled`].
pub fn walk(root: &Path, db: &mut Database, cancel: &CancelFlag) -> Result<usize> {
    let mut appended = 0;
    visit(root, db, cancel, &mut appended)?;
    Ok(appended)
}

fn visit(path: &Path, db: &mut Database, cancel: &CancelFlag, appended: &mut usize) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(IndexError::Cancelled);
    }

    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(error) => {
            log::warn!("skipping unreadable entry {}: {error}", path.display());
            return Ok(());
        }
    };
    let file_type = metadata.file_type();

    if file_type.is_dir() {
        append_record(db, path, &metadata, TypeTag::Directory)?;
        *appended += 1;

        let read_dir = match fs::read_dir(path) {
            Ok(read_dir) => read_dir,
            Err(error) => {
                log::warn!("cannot list {}: {error}", path.display());
                return Ok(());
            }
        };
        let mut entries: Vec<_> = read_dir.filter_map(std::result::Result::ok).collect();
        entries.sort_by_key(|entry| entry.file_name());
        for entry in entries {
            visit(&entry.path(), db, cancel, appended)?;
        }
    } else if file_type.is_file() {
        match classify_file(path) {
            Ok(Some(tag)) => {
                append_record(db, path, &metadata, tag)?;
                *appended += 1;
            }
            Ok(None) => {}
            Err(error) => {
                log::warn!("cannot classify {}: {error}", path.display());
            }
        }
    }
    // Symlinks and special files are not indexed.

    Ok(())
}

fn append_record(
    db: &mut Database,
    path: &Path,
    metadata: &Metadata,
    tag: TypeTag,
) -> Result<()> {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned());
    let record = IndexedRecord::new(
        &name,
        &path.to_string_lossy(),
        metadata.len() as i64,
        metadata.uid(),
        tag,
    );
    db.append(&record)?;
    Ok(())
}
