//! Sled-backed persistence.
//!
//! [`DbOperations`] is the synchronous read facade over cached trees; all
//! writes go through the [`writer`] funnel so gameplay threads never touch
//! disk. Row shapes mirror the lock, lock-location and access-list tables.

pub mod core;
pub mod rows;
pub mod writer;

pub use core::DbOperations;
pub use rows::{AccessRow, AccessScope, LockLocationRow, LockRow};
pub use writer::{StorageHandle, StorageWriter, WriteOp};
