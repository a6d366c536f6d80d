//! KeyBook credential items.
//!
//! A KeyBook is an in-game item whose payload embeds a lock id and the
//! lock's secret at issue time. It unlocks exactly that lock for whoever
//! holds it, until the lock's secret is rotated. Presenting a stale book is
//! destructive: the book turns inert and the holder is punished, so
//! brute-forcing credentials costs the credential itself.

use serde::{Deserialize, Serialize};

use crate::locker::lock::Lock;
use crate::locker::types::LockId;

/// Item payload attached by the host when a KeyBook is issued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyBook {
    pub lock_id: LockId,
    pub secret: Vec<u8>,
    /// Set once the book has been invalidated. Broken books stay broken.
    #[serde(default)]
    pub broken: bool,
}

/// Result of presenting a KeyBook to a lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyBookOutcome {
    /// Id and secret match: access is granted.
    Unlocks,
    /// The book belongs to a different lock: access is denied, the book is
    /// untouched ("nothing happens").
    WrongLock,
    /// The book matches the lock but its secret was rotated: access is
    /// denied, the book must be invalidated and the holder punished.
    Stale,
    /// An already-invalidated book: denied, no further side effects.
    Broken,
}

impl KeyBook {
    pub fn issue(lock: &Lock) -> Self {
        Self {
            lock_id: lock.id,
            secret: lock.key_book_secret().to_vec(),
            broken: false,
        }
    }

    pub fn is_valid_for(&self, lock: &Lock) -> bool {
        !self.broken && self.lock_id == lock.id && self.secret == lock.key_book_secret()
    }

    pub fn check(&self, lock: &Lock) -> KeyBookOutcome {
        if self.broken {
            return KeyBookOutcome::Broken;
        }
        if self.lock_id != lock.id {
            return KeyBookOutcome::WrongLock;
        }
        if self.secret != lock.key_book_secret() {
            return KeyBookOutcome::Stale;
        }
        KeyBookOutcome::Unlocks
    }

    /// Marks the book inert. The host is expected to also swap the item
    /// type and rename it, which is why broken books are never punished
    /// twice.
    pub fn invalidate(&mut self) {
        self.broken = true;
    }
}
