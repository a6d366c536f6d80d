//! Per-player session state.
//!
//! Sessions hold the ephemeral unlock set (locks opened by password this
//! session) and nothing else. They are owned by the [`LockManager`]
//! (`crate::locker::manager`), keyed by user id, created on demand and
//! dropped on disconnect; none of this is ever persisted.

use std::collections::HashSet;

use crate::locker::types::LockId;

#[derive(Debug, Default)]
pub struct PlayerSession {
    unlocked: HashSet<LockId>,
}

impl PlayerSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_unlocked(&self, lock: LockId) -> bool {
        self.unlocked.contains(&lock)
    }

    pub fn add_unlock(&mut self, lock: LockId) {
        self.unlocked.insert(lock);
    }

    /// Called when a lock is deleted so the id cannot leak into a future
    /// lock reusing it.
    pub fn forget(&mut self, lock: LockId) {
        self.unlocked.remove(&lock);
    }
}
