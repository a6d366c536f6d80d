//! Lock lifecycle and spatial lookup.
//!
//! The manager owns every loaded lock, three spatial indexes (by exact
//! position, by chunk column, by protected entity), the owner-global access
//! lists and the per-player sessions. All mutation happens synchronously on
//! the caller's thread and is reflected in the indexes before the call
//! returns; persistence trails behind through the storage writer.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};
use log::{info, warn};

use crate::config::LockerConfig;
use crate::db_operations::rows::{AccessRow, AccessScope, LockLocationRow, LockRow};
use crate::db_operations::{DbOperations, StorageHandle, WriteOp};
use crate::error::{BlockwardError, BlockwardResult};
use crate::host::{EntityId, Feedback, HostContext, UserId, WorldId};
use crate::host::perms;
use crate::locker::lock::{Lock, SetAccessResult};
use crate::locker::password;
use crate::locker::session::PlayerSession;
use crate::locker::types::{AccessLevel, LockId, LockType, ProtectedType};
use crate::math::{BlockPos, ChunkPos};

/// Notification suppression window.
const NOTIFY_WINDOW_SECS: i64 = 60;

pub struct LockManager {
    config: LockerConfig,
    db: DbOperations,
    storage: StorageHandle,

    locks_by_id: HashMap<LockId, Lock>,
    by_location: HashMap<WorldId, HashMap<u64, LockId>>,
    by_chunk: HashMap<WorldId, HashMap<u64, HashSet<LockId>>>,
    entity_locks: HashMap<EntityId, LockId>,

    /// Owner-global grants, loaded lazily per owner.
    global_access: HashMap<UserId, HashMap<UserId, AccessLevel>>,

    sessions: HashMap<UserId, PlayerSession>,

    /// Doors waiting to be auto-closed, by due time.
    pending_closes: HashMap<LockId, DateTime<Utc>>,
}

impl LockManager {
    pub fn new(db: DbOperations, storage: StorageHandle, config: LockerConfig) -> Self {
        Self {
            config,
            db,
            storage,
            locks_by_id: HashMap::new(),
            by_location: HashMap::new(),
            by_chunk: HashMap::new(),
            entity_locks: HashMap::new(),
            global_access: HashMap::new(),
            sessions: HashMap::new(),
            pending_closes: HashMap::new(),
        }
    }

    pub fn config(&self) -> &LockerConfig {
        &self.config
    }

    // ---- loading ----------------------------------------------------------

    /// Loads every block lock of a world into the indexes.
    pub fn load_world(&mut self, world: WorldId) -> BlockwardResult<usize> {
        self.load_locations(world, None)
    }

    /// Loads the block locks of a chunk window (inclusive corners).
    pub fn load_chunks(
        &mut self,
        world: WorldId,
        min: ChunkPos,
        max: ChunkPos,
    ) -> BlockwardResult<usize> {
        self.load_locations(world, Some((min, max)))
    }

    fn load_locations(
        &mut self,
        world: WorldId,
        window: Option<(ChunkPos, ChunkPos)>,
    ) -> BlockwardResult<usize> {
        let rows = self.db.locations_in_world(&world, window)?;
        let mut by_lock: HashMap<LockId, Vec<LockLocationRow>> = HashMap::new();
        for row in rows {
            by_lock.entry(row.lock_id).or_default().push(row);
        }

        let mut loaded = 0;
        for (lock_id, locations) in by_lock {
            if self.locks_by_id.contains_key(&lock_id) {
                continue;
            }
            let Some(row) = self.db.get_lock(lock_id)? else {
                // Index inconsistency: locations without a lock row are
                // treated as no protection.
                warn!("dangling lock locations for lock {lock_id}");
                continue;
            };
            let lock = self.assemble(row, Some((world, locations)))?;
            self.index_lock(lock);
            loaded += 1;
        }
        info!("loaded {loaded} locks");
        Ok(loaded)
    }

    fn assemble(
        &self,
        row: LockRow,
        locations: Option<(WorldId, Vec<LockLocationRow>)>,
    ) -> BlockwardResult<Lock> {
        let kind = ProtectedType::from_id(row.protected_type)
            .ok_or_else(|| BlockwardError::InvalidData(format!("kind {}", row.protected_type)))?;
        let lock_type = LockType::from_id(row.lock_type)
            .ok_or_else(|| BlockwardError::InvalidData(format!("lock type {}", row.lock_type)))?;

        let mut lock = Lock::new(row.id, row.owner_id, lock_type, kind, row.secret, row.created);
        lock.last_access = row.last_access;
        lock.set_flags(row.flags);
        lock.entity = row.entity_uid;
        if let Some((world, rows)) = locations {
            lock.world = Some(world);
            lock.locations = rows.iter().map(|r| r.pos()).collect();
        }
        for access in self.db.lock_access_rows(row.id)? {
            if let AccessScope::Lock { user, .. } = access.scope {
                lock.access.insert(user, AccessLevel(access.level));
            }
        }
        lock.dirty = false;
        Ok(lock)
    }

    fn index_lock(&mut self, lock: Lock) {
        if let Some(entity) = lock.entity {
            self.entity_locks.insert(entity, lock.id);
        }
        if let Some(world) = lock.world {
            let locations = self.by_location.entry(world).or_default();
            let chunks = self.by_chunk.entry(world).or_default();
            for pos in lock.locations() {
                locations.insert(pos.location_key(), lock.id);
                chunks
                    .entry(pos.chunk().chunk_key())
                    .or_default()
                    .insert(lock.id);
            }
        }
        self.locks_by_id.insert(lock.id, lock);
    }

    // ---- lookup -----------------------------------------------------------

    pub fn get_lock_at(&self, world: WorldId, pos: &BlockPos) -> Option<&Lock> {
        let id = self.by_location.get(&world)?.get(&pos.location_key())?;
        self.locks_by_id.get(id)
    }

    pub fn lock_id_at(&self, world: WorldId, pos: &BlockPos) -> Option<LockId> {
        self.by_location
            .get(&world)?
            .get(&pos.location_key())
            .copied()
    }

    pub fn get_lock(&self, id: LockId) -> Option<&Lock> {
        self.locks_by_id.get(&id)
    }

    pub(crate) fn get_lock_mut(&mut self, id: LockId) -> Option<&mut Lock> {
        self.locks_by_id.get_mut(&id)
    }

    /// Lock bound to an entity, falling back to storage for entities whose
    /// lock was never loaded this run.
    pub fn entity_lock_id(&mut self, entity: &EntityId) -> Option<LockId> {
        if let Some(id) = self.entity_locks.get(entity) {
            return Some(*id);
        }
        match self.db.get_entity_lock(entity) {
            Ok(Some(row)) => {
                let id = row.id;
                match self.assemble(row, None) {
                    Ok(lock) => {
                        self.index_lock(lock);
                        Some(id)
                    }
                    Err(e) => {
                        warn!("could not assemble entity lock {id}: {e}");
                        None
                    }
                }
            }
            Ok(None) => None,
            Err(e) => {
                // Missing or unreadable storage is "no protection", never a
                // crash.
                warn!("entity lock lookup failed: {e}");
                None
            }
        }
    }

    /// Loads a lock by id, falling back to storage. Block locks loaded this
    /// way join the spatial indexes of their recorded world.
    pub fn lock_by_id(&mut self, id: LockId) -> Option<&Lock> {
        if !self.locks_by_id.contains_key(&id) {
            let row = match self.db.get_lock(id) {
                Ok(Some(row)) => row,
                Ok(None) => return None,
                Err(e) => {
                    warn!("lock lookup failed: {e}");
                    return None;
                }
            };
            match self.assemble(row, None) {
                Ok(lock) => self.index_lock(lock),
                Err(e) => {
                    warn!("could not assemble lock {id}: {e}");
                    return None;
                }
            }
        }
        self.locks_by_id.get(&id)
    }

    // ---- creation ---------------------------------------------------------

    /// Creates a block lock covering `positions` (already expanded to the
    /// full structure). Fails when any position is protected already.
    pub fn create_lock(
        &mut self,
        world: WorldId,
        positions: Vec<BlockPos>,
        block_type: &str,
        owner: UserId,
        lock_type: LockType,
        password_text: Option<&str>,
        host: &HostContext,
    ) -> BlockwardResult<LockId> {
        assert!(!positions.is_empty(), "block lock needs at least one position");
        for pos in &positions {
            if self.lock_id_at(world, pos).is_some() {
                host.messenger.send(owner, Feedback::AlreadyProtected);
                return Err(BlockwardError::AlreadyProtected);
            }
        }

        let kind = ProtectedType::for_block(block_type);
        let id = self.db.next_lock_id()?;
        let now = Utc::now();
        let secret = match password_text {
            Some(text) => password::digest_password(text),
            None => password::generate_color_pass(),
        };
        let mut lock = Lock::new(id, owner, lock_type, kind, secret, now);
        lock.world = Some(world);
        lock.locations = positions;
        lock.set_flags(self.default_flags(&self.config.block_protections, block_type));

        self.persist_new(&lock);
        host.messenger.send(owner, Feedback::LockCreated(lock_type));
        self.index_lock(lock);
        Ok(id)
    }

    /// Creates an entity lock. Hostile and non-protectable entities are
    /// rejected as user input errors.
    pub fn create_entity_lock(
        &mut self,
        entity: EntityId,
        entity_type: &str,
        living: bool,
        hostile: bool,
        owner: UserId,
        lock_type: LockType,
        password_text: Option<&str>,
        host: &HostContext,
    ) -> BlockwardResult<LockId> {
        if self.entity_lock_id(&entity).is_some() {
            host.messenger.send(owner, Feedback::AlreadyProtected);
            return Err(BlockwardError::AlreadyProtected);
        }
        let kind = ProtectedType::for_entity(entity_type, living, hostile).ok_or_else(|| {
            BlockwardError::InvalidData(format!("{entity_type} cannot be protected"))
        })?;

        let id = self.db.next_lock_id()?;
        let now = Utc::now();
        let secret = match password_text {
            Some(text) => password::digest_password(text),
            None => password::generate_color_pass(),
        };
        let mut lock = Lock::new(id, owner, lock_type, kind, secret, now);
        lock.entity = Some(entity);
        lock.set_flags(self.default_flags(&self.config.entity_protections, entity_type));

        self.persist_new(&lock);
        host.messenger.send(owner, Feedback::LockCreated(lock_type));
        self.index_lock(lock);
        Ok(id)
    }

    fn default_flags(
        &self,
        defaults: &[crate::config::ProtectionDefaults],
        type_id: &str,
    ) -> u16 {
        defaults
            .iter()
            .find(|d| d.type_id == type_id)
            .map(|d| d.flag_bits())
            .unwrap_or(0)
    }

    fn persist_new(&self, lock: &Lock) {
        self.storage.submit(WriteOp::UpsertLock(Self::to_row(lock)));
        if let Some(world) = lock.world {
            for pos in lock.locations() {
                self.storage
                    .submit(WriteOp::PutLocation(LockLocationRow::new(
                        lock.id, world, *pos,
                    )));
            }
        }
    }

    fn to_row(lock: &Lock) -> LockRow {
        LockRow {
            id: lock.id,
            owner_id: lock.owner,
            flags: lock.flags(),
            protected_type: lock.kind().id(),
            lock_type: lock.lock_type().id(),
            secret: lock.secret.clone(),
            entity_uid: lock.entity,
            last_access: lock.last_access,
            created: lock.created,
        }
    }

    // ---- mutation ---------------------------------------------------------

    /// Extends a block lock onto an additional position.
    pub fn extend_lock(
        &mut self,
        id: LockId,
        world: WorldId,
        pos: BlockPos,
    ) -> BlockwardResult<()> {
        if self.lock_id_at(world, &pos).is_some() {
            return Err(BlockwardError::AlreadyProtected);
        }
        let lock = self
            .locks_by_id
            .get_mut(&id)
            .ok_or(BlockwardError::LockNotFound(id))?;
        if lock.world != Some(world) {
            return Err(BlockwardError::InvalidData(
                "cannot extend a lock across worlds".into(),
            ));
        }
        lock.locations.push(pos);

        self.by_location
            .entry(world)
            .or_default()
            .insert(pos.location_key(), id);
        self.by_chunk
            .entry(world)
            .or_default()
            .entry(pos.chunk().chunk_key())
            .or_default()
            .insert(id);
        self.storage
            .submit(WriteOp::PutLocation(LockLocationRow::new(id, world, pos)));
        Ok(())
    }

    /// Removes a lock. `destroyed` skips the authorization check (the
    /// protected thing is already gone). Returns whether removal happened.
    pub fn remove_lock(
        &mut self,
        id: LockId,
        requestor: Option<UserId>,
        destroyed: bool,
        host: &HostContext,
    ) -> bool {
        let Some(lock) = self.locks_by_id.get(&id) else {
            return false;
        };
        let authorized = destroyed
            || requestor.is_some_and(|user| {
                lock.is_owner(user)
                    || host
                        .perms
                        .has_permission(user, perms::LOCKER_REMOVE_OTHER)
            });
        if !authorized {
            if let Some(user) = requestor {
                host.messenger.send(user, Feedback::NotYourProtection);
            }
            return false;
        }

        let lock = self.locks_by_id.remove(&id).expect("checked above");
        if let Some(entity) = lock.entity {
            self.entity_locks.remove(&entity);
        }
        if let Some(world) = lock.world {
            if let Some(locations) = self.by_location.get_mut(&world) {
                for pos in lock.locations() {
                    locations.remove(&pos.location_key());
                }
            }
            if let Some(chunks) = self.by_chunk.get_mut(&world) {
                for pos in lock.locations() {
                    if let Some(set) = chunks.get_mut(&pos.chunk().chunk_key()) {
                        set.remove(&id);
                    }
                }
            }
            for pos in lock.locations() {
                self.storage
                    .submit(WriteOp::DeleteLocation { world, pos: *pos });
            }
        }
        self.pending_closes.remove(&id);
        for session in self.sessions.values_mut() {
            session.forget(id);
        }
        self.storage.submit(WriteOp::DeleteLock {
            id,
            entity: lock.entity,
        });

        if let Some(user) = requestor {
            host.messenger.send(user, Feedback::LockRemoved);
        }
        true
    }

    /// Edits the access list of a lock on behalf of `actor`.
    pub fn set_access(
        &mut self,
        id: LockId,
        actor: UserId,
        target: UserId,
        add: bool,
        level: AccessLevel,
        host: &HostContext,
    ) -> BlockwardResult<SetAccessResult> {
        let global = self.global_entry(actor, id);
        let lock = self
            .locks_by_id
            .get_mut(&id)
            .ok_or(BlockwardError::LockNotFound(id))?;

        let admin = lock
            .access_entry(actor)
            .or(global)
            .is_some_and(|level| level.is_admin());
        let authorized = lock.is_owner(actor)
            || admin
            || host.perms.has_permission(actor, perms::LOCKER_MODIFY_OTHER);
        if !authorized {
            return Err(BlockwardError::InvalidData(
                "not allowed to modify this access list".into(),
            ));
        }
        if lock.is_public() {
            return Err(BlockwardError::InvalidData(
                "public protections have no access list".into(),
            ));
        }

        let result = lock.set_access(target, add, level);
        match result {
            SetAccessResult::Inserted | SetAccessResult::Updated => {
                self.storage.submit(WriteOp::UpsertAccess(AccessRow {
                    scope: AccessScope::Lock {
                        lock_id: id,
                        user: target,
                    },
                    level: level.0,
                }));
            }
            SetAccessResult::Removed => {
                self.storage.submit(WriteOp::DeleteAccess(AccessScope::Lock {
                    lock_id: id,
                    user: target,
                }));
            }
            SetAccessResult::NoChange => {}
        }
        Ok(result)
    }

    /// Edits an owner-global access entry spanning all of `owner`'s locks.
    pub fn set_global_access(
        &mut self,
        owner: UserId,
        target: UserId,
        add: bool,
        level: AccessLevel,
    ) -> SetAccessResult {
        self.ensure_global_loaded(owner);
        let entries = self.global_access.entry(owner).or_default();
        let result = if add {
            match entries.insert(target, level) {
                None => SetAccessResult::Inserted,
                Some(previous) if previous != level => SetAccessResult::Updated,
                Some(_) => SetAccessResult::NoChange,
            }
        } else if entries.remove(&target).is_some() {
            SetAccessResult::Removed
        } else {
            SetAccessResult::NoChange
        };

        let scope = AccessScope::Owner {
            owner,
            user: target,
        };
        match result {
            SetAccessResult::Inserted | SetAccessResult::Updated => self
                .storage
                .submit(WriteOp::UpsertAccess(AccessRow {
                    scope,
                    level: level.0,
                })),
            SetAccessResult::Removed => self.storage.submit(WriteOp::DeleteAccess(scope)),
            SetAccessResult::NoChange => {}
        }
        result
    }

    fn ensure_global_loaded(&mut self, owner: UserId) {
        if self.global_access.contains_key(&owner) {
            return;
        }
        let mut entries = HashMap::new();
        match self.db.owner_access_rows(&owner) {
            Ok(rows) => {
                for row in rows {
                    entries.insert(row.user(), AccessLevel(row.level));
                }
            }
            Err(e) => warn!("could not load global access for {owner}: {e}"),
        }
        self.global_access.insert(owner, entries);
    }

    fn global_entry(&mut self, user: UserId, lock_id: LockId) -> Option<AccessLevel> {
        let owner = self.locks_by_id.get(&lock_id)?.owner;
        self.ensure_global_loaded(owner);
        self.global_access.get(&owner)?.get(&user).copied()
    }

    /// Merged access entry for the resolver: the lock-scoped entry wins
    /// over an owner-global one.
    pub fn access_for(&mut self, lock_id: LockId, user: UserId) -> Option<AccessLevel> {
        let direct = self
            .locks_by_id
            .get(&lock_id)
            .and_then(|lock| lock.access_entry(user));
        direct.or_else(|| self.global_entry(user, lock_id))
    }

    // ---- sessions ---------------------------------------------------------

    pub fn session(&mut self, user: UserId) -> &mut PlayerSession {
        self.sessions.entry(user).or_default()
    }

    pub fn has_unlocked(&self, user: UserId, lock: LockId) -> bool {
        self.sessions
            .get(&user)
            .is_some_and(|session| session.has_unlocked(lock))
    }

    /// Drops all ephemeral state of a disconnecting player.
    pub fn end_session(&mut self, user: UserId) {
        self.sessions.remove(&user);
    }

    /// Password attempt against a lock; on success the unlock is recorded
    /// in the actor's session until disconnect.
    pub fn unlock(&mut self, actor: UserId, id: LockId, supplied: &str, host: &HostContext) {
        use crate::locker::resolver::{check_unlock, UnlockOutcome};
        let Some(lock) = self.locks_by_id.get(&id) else {
            return;
        };
        match check_unlock(lock, supplied) {
            UnlockOutcome::NoPassword => {
                host.messenger.send(actor, Feedback::UnlockNoPassword);
            }
            UnlockOutcome::Success => {
                self.session(actor).add_unlock(id);
                host.messenger.send(actor, Feedback::UnlockSuccess);
            }
            UnlockOutcome::WrongPassword => {
                // Punitive feedback; the host applies the sting.
                host.messenger.send(actor, Feedback::UnlockWrongPassword);
            }
        }
    }

    // ---- notifications ----------------------------------------------------

    /// Sends the rate-limited access notification to the owner, when the
    /// lock asks for it.
    pub fn notify_usage(&mut self, id: LockId, accessor: UserId, now: DateTime<Utc>, host: &HostContext) {
        use crate::locker::types::ProtectionFlag;
        if host
            .perms
            .has_permission(accessor, perms::LOCKER_PREVENT_NOTIFY)
        {
            return;
        }
        let Some(lock) = self.locks_by_id.get_mut(&id) else {
            return;
        };
        if !lock.has_flag(ProtectionFlag::NotifyAccess) || lock.is_owner(accessor) {
            return;
        }
        if !window_elapsed(lock.last_notify, now) {
            return;
        }
        lock.last_notify = Some(now);
        let owner = lock.owner;
        let location = lock.first_location();
        host.messenger.send(
            owner,
            Feedback::AccessNotification {
                accessor,
                lock_id: id,
                location,
            },
        );
    }

    /// Rate-limited notice that a KeyBook was used on the owner's lock.
    pub fn notify_key_usage(&mut self, id: LockId, accessor: UserId, now: DateTime<Utc>, host: &HostContext) {
        let Some(lock) = self.locks_by_id.get_mut(&id) else {
            return;
        };
        if lock.is_owner(accessor) || !window_elapsed(lock.last_key_notify, now) {
            return;
        }
        lock.last_key_notify = Some(now);
        let owner = lock.owner;
        host.messenger
            .send(owner, Feedback::KeyUsageNotification { accessor });
    }

    // ---- door auto-close --------------------------------------------------

    /// Records a door use; schedules (or reschedules) the auto-close when
    /// the lock carries AUTOCLOSE and the config enables it.
    pub fn note_door_use(&mut self, id: LockId, opened: bool, now: DateTime<Utc>) {
        use crate::locker::types::ProtectionFlag;
        self.pending_closes.remove(&id);
        if !opened || !self.config.auto_close_enable {
            return;
        }
        let Some(lock) = self.locks_by_id.get(&id) else {
            return;
        };
        if lock.has_flag(ProtectionFlag::Autoclose) {
            self.pending_closes
                .insert(id, now + Duration::seconds(self.config.auto_close_seconds as i64));
        }
    }

    /// Doors due for closing; the host toggles the blocks. Each entry is
    /// returned once.
    pub fn due_closes(&mut self, now: DateTime<Utc>) -> Vec<(LockId, Vec<BlockPos>)> {
        let due: Vec<LockId> = self
            .pending_closes
            .iter()
            .filter(|(_, at)| **at <= now)
            .map(|(id, _)| *id)
            .collect();
        due.iter()
            .filter_map(|id| {
                self.pending_closes.remove(id);
                let lock = self.locks_by_id.get(id)?;
                Some((*id, lock.locations().to_vec()))
            })
            .collect()
    }

    // ---- maintenance ------------------------------------------------------

    /// Whether this lock is currently enforced, given the owner-online
    /// config toggles.
    pub fn is_enforced(&self, lock: &Lock, host: &HostContext) -> bool {
        let online = host.players.is_online(lock.owner);
        if self.config.protect_when_only_offline && online {
            return false;
        }
        if self.config.protect_when_only_online && !online {
            return false;
        }
        true
    }

    /// Flushes the changed rows (last-access bumps, flag edits) of every
    /// loaded lock.
    pub fn save_all(&mut self) {
        let mut saved = 0;
        for lock in self.locks_by_id.values_mut() {
            if lock.dirty {
                lock.dirty = false;
                saved += 1;
                self.storage.submit(WriteOp::UpsertLock(Self::to_row(lock)));
            }
        }
        if saved > 0 {
            info!("queued {saved} changed locks for saving");
        }
    }

    /// Removes every lock owned by `owner`. Returns how many were removed.
    pub fn purge_locks_from(&mut self, owner: UserId, host: &HostContext) -> BlockwardResult<usize> {
        info!("purging locks of {owner}");
        let mut ids: HashSet<LockId> = self
            .locks_by_id
            .values()
            .filter(|lock| lock.owner == owner)
            .map(|lock| lock.id)
            .collect();
        for row in self.db.all_locks()? {
            if row.owner_id == owner {
                ids.insert(row.id);
            }
        }
        let mut purged = 0;
        for id in ids {
            self.lock_by_id(id);
            if self.remove_lock(id, None, true, host) {
                purged += 1;
            }
        }
        info!("{purged} locks purged");
        Ok(purged)
    }

    /// Removes locks whose last access predates the configured cleanup age.
    pub fn purge_old_locks(&mut self, now: DateTime<Utc>, host: &HostContext) -> BlockwardResult<usize> {
        let cutoff = now - Duration::days(self.config.cleanup_age_days as i64);
        info!("purging locks not used since {cutoff}");
        let mut ids: HashSet<LockId> = self
            .locks_by_id
            .values()
            .filter(|lock| lock.last_access < cutoff)
            .map(|lock| lock.id)
            .collect();
        for row in self.db.all_locks()? {
            if row.last_access < cutoff {
                ids.insert(row.id);
            }
        }
        let mut purged = 0;
        for id in ids {
            self.lock_by_id(id);
            if self.remove_lock(id, None, true, host) {
                purged += 1;
            }
        }
        info!("{purged} old locks purged");
        Ok(purged)
    }
}

fn window_elapsed(last: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    match last {
        None => true,
        Some(last) => (now - last).num_seconds() > NOTIFY_WINDOW_SECS,
    }
}
