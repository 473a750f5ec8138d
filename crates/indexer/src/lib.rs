//! File-system indexing library.
//!
//! This crate provides the core of the mole indexer:
//! - Fixed-width record format over a growable memory-mapped database
//! - Directory walking with byte-signature classification
//! - Build/reindex engine with a double-buffered atomic swap
//! - Periodic reindex scheduling and query predicates

pub mod cancel;
pub mod classify;
pub mod database;
pub mod engine;
pub mod error;
pub mod query;
pub mod record;
pub mod walk;

// Re-export main types
pub use cancel::CancelFlag;
pub use database::Database;
pub use engine::{Indexer, ShutdownMode};
pub use error::{IndexError, Result};
pub use query::{Predicate, TypeCounts};
pub use record::{IndexedRecord, TypeTag};
