use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage failure on {}: {source}", .path.display())]
    Storage {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("corrupt index: {0}")]
    Corrupt(String),

    #[error("build cancelled")]
    Cancelled,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl IndexError {
    /// Storage errors leave the on-disk database in an unusable state and
    /// terminate the process once every lock has been released.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Storage { .. })
    }
}

pub type Result<T> = std::result::Result<T, IndexError>;

/// Error for a poisoned lock; the named lock tells the reader which one.
pub fn lock_poisoned_error(what: &str) -> IndexError {
    IndexError::Internal(format!("{what} lock poisoned"))
}
