//! The protection record: one lock over one or more blocks, or one entity.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::host::{EntityId, UserId, WorldId};
use crate::locker::password;
use crate::locker::types::{AccessLevel, LockId, LockType, ProtectedType, ProtectionFlag};
use crate::math::BlockPos;

/// A single protection. Block locks cover one or more discrete positions in
/// one world (double chests, door pairs); entity locks bind to an entity id
/// and carry no positions.
#[derive(Debug, Clone)]
pub struct Lock {
    pub id: LockId,
    pub owner: UserId,
    kind: ProtectedType,
    lock_type: LockType,
    flags: u16,
    /// Password digest (32 bytes) or KeyBook color pass (4 bytes).
    pub(crate) secret: Vec<u8>,
    pub entity: Option<EntityId>,
    pub world: Option<WorldId>,
    pub(crate) locations: Vec<BlockPos>,
    pub created: DateTime<Utc>,
    pub last_access: DateTime<Utc>,

    /// Lock-scoped access entries. Owner-global entries live in the
    /// manager, keyed by owner.
    pub(crate) access: HashMap<UserId, AccessLevel>,

    // Runtime-only state below; never persisted.
    pub(crate) last_notify: Option<DateTime<Utc>>,
    pub(crate) last_key_notify: Option<DateTime<Utc>>,
    pub(crate) dirty: bool,
}

impl Lock {
    /// Creates a lock record.
    ///
    /// Panics when `lock_type` is not supported for `kind`; that is a
    /// programmer error in the calling command layer, not user input.
    pub fn new(
        id: LockId,
        owner: UserId,
        lock_type: LockType,
        kind: ProtectedType,
        secret: Vec<u8>,
        now: DateTime<Utc>,
    ) -> Self {
        assert!(
            lock_type.supports(kind),
            "lock type {:?} is not supported for {:?}",
            lock_type,
            kind
        );
        Self {
            id,
            owner,
            kind,
            lock_type,
            flags: ProtectionFlag::NONE,
            secret,
            entity: None,
            world: None,
            locations: Vec::new(),
            created: now,
            last_access: now,
            access: HashMap::new(),
            last_notify: None,
            last_key_notify: None,
            dirty: true,
        }
    }

    pub fn kind(&self) -> ProtectedType {
        self.kind
    }

    pub fn lock_type(&self) -> LockType {
        self.lock_type
    }

    pub fn is_public(&self) -> bool {
        self.lock_type == LockType::Public
    }

    pub fn is_owner(&self, user: UserId) -> bool {
        self.owner == user
    }

    pub fn is_block_lock(&self) -> bool {
        !self.locations.is_empty()
    }

    pub fn locations(&self) -> &[BlockPos] {
        &self.locations
    }

    pub fn first_location(&self) -> Option<(WorldId, BlockPos)> {
        Some((self.world?, *self.locations.first()?))
    }

    pub fn flags(&self) -> u16 {
        self.flags
    }

    pub fn has_flag(&self, flag: ProtectionFlag) -> bool {
        self.flags & flag.bit() == flag.bit()
    }

    /// Replaces the flag word, silently dropping bits the kind does not
    /// support.
    pub fn set_flags(&mut self, flags: u16) {
        let supported = self
            .kind
            .supported_flags()
            .iter()
            .fold(0u16, |acc, flag| acc | flag.bit());
        self.flags = flags & supported;
        self.dirty = true;
    }

    pub fn set_owner(&mut self, owner: UserId) {
        self.owner = owner;
        self.dirty = true;
    }

    /// A real password is set iff the secret is longer than a color pass.
    pub fn has_password(&self) -> bool {
        self.secret.len() > password::COLOR_PASS_LEN
    }

    pub fn check_password(&self, supplied: &str) -> bool {
        password::check_password(&self.secret, supplied)
    }

    /// Rotates the secret, invalidating every outstanding KeyBook. Also
    /// clears any password, reverting the lock to color-pass mode.
    pub fn invalidate_key_books(&mut self) {
        self.secret = password::generate_color_pass();
        self.dirty = true;
    }

    /// Current secret as embedded into newly issued KeyBooks.
    pub fn key_book_secret(&self) -> &[u8] {
        &self.secret
    }

    pub fn touch_access(&mut self, now: DateTime<Utc>) {
        self.last_access = now;
        self.dirty = true;
    }

    /// Lock-scoped access entry for `user`, if any. Owner-global grants are
    /// resolved by the manager.
    pub fn access_entry(&self, user: UserId) -> Option<AccessLevel> {
        self.access.get(&user).copied()
    }

    pub fn accessors(&self) -> impl Iterator<Item = (&UserId, &AccessLevel)> {
        self.access.iter()
    }
}

/// Outcome of an access-list mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetAccessResult {
    /// A new entry was inserted.
    Inserted,
    /// An existing entry changed level.
    Updated,
    /// An existing entry was removed.
    Removed,
    /// Removal was requested but no entry existed.
    NoChange,
}

impl Lock {
    /// Adds, updates or removes the lock-scoped access entry for `user`.
    pub fn set_access(&mut self, user: UserId, add: bool, level: AccessLevel) -> SetAccessResult {
        if add {
            let result = match self.access.insert(user, level) {
                None => SetAccessResult::Inserted,
                Some(previous) if previous != level => SetAccessResult::Updated,
                Some(_) => SetAccessResult::NoChange,
            };
            self.dirty = true;
            result
        } else if self.access.remove(&user).is_some() {
            self.dirty = true;
            SetAccessResult::Removed
        } else {
            SetAccessResult::NoChange
        }
    }
}
